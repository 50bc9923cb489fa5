//! OCPP 1.6 configuration key store
//!
//! `{key, value, readonly, visible, reboot}` records with stable iteration
//! order. GetConfiguration only exposes visible keys; ChangeConfiguration
//! honors readonly and reboot-required flags.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationKey {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub reboot: bool,
}

fn default_visible() -> bool {
    true
}

impl ConfigurationKey {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            readonly: false,
            visible: true,
            reboot: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn reboot_required(mut self) -> Self {
        self.reboot = true;
        self
    }
}

/// Outcome of a ChangeConfiguration write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKeyOutcome {
    Accepted,
    RebootRequired,
    Rejected,
    NotSupported,
}

#[derive(Default)]
pub struct ConfigurationKeyStore {
    keys: RwLock<Vec<ConfigurationKey>>,
}

impl ConfigurationKeyStore {
    pub fn new(keys: Vec<ConfigurationKey>) -> Self {
        Self {
            keys: RwLock::new(keys),
        }
    }

    /// The standard defaults a fresh 1.6 station starts with.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            ConfigurationKey::new("AuthorizeRemoteTxRequests", "true"),
            ConfigurationKey::new("ClockAlignedDataInterval", "0"),
            ConfigurationKey::new("ConnectionTimeOut", "120"),
            ConfigurationKey::new("GetConfigurationMaxKeys", "50").read_only(),
            ConfigurationKey::new("HeartbeatInterval", "300"),
            ConfigurationKey::new("LocalAuthListEnabled", "true"),
            ConfigurationKey::new("AuthorizationCacheEnabled", "true"),
            ConfigurationKey::new("AllowOfflineTxForUnknownId", "false"),
            ConfigurationKey::new("LocalPreAuthorize", "false"),
            ConfigurationKey::new("MeterValueSampleInterval", "60"),
            ConfigurationKey::new("NumberOfConnectors", "1").read_only(),
            ConfigurationKey::new("ResetRetries", "1"),
            ConfigurationKey::new("StopTransactionOnInvalidId", "true"),
            ConfigurationKey::new("SupportedFeatureProfiles", "Core,LocalAuthListManagement,RemoteTrigger,Reservation,SmartCharging")
                .read_only(),
            ConfigurationKey::new("TransactionMessageAttempts", "3"),
            ConfigurationKey::new("TransactionMessageRetryInterval", "60"),
            ConfigurationKey::new("UnlockConnectorOnEVSideDisconnect", "true"),
            ConfigurationKey::new("WebSocketPingInterval", "54"),
            ConfigurationKey::new("AuthorizationKey", "").hidden(),
            ConfigurationKey::new("ConnectorPhaseRotation", "NotApplicable"),
        ])
    }

    pub fn get(&self, key: &str) -> Option<ConfigurationKey> {
        self.keys.read().iter().find(|k| k.key == key).cloned()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|k| k.value)
    }

    pub fn int_value(&self, key: &str) -> Option<i64> {
        self.value(key)?.parse().ok()
    }

    pub fn bool_value(&self, key: &str) -> Option<bool> {
        self.value(key)?.parse().ok()
    }

    /// GetConfiguration view: `(known visible keys, unknown key names)`.
    /// `requested = None` returns every visible key.
    pub fn configuration_view(
        &self,
        requested: Option<&[String]>,
    ) -> (Vec<ConfigurationKey>, Vec<String>) {
        let keys = self.keys.read();
        match requested {
            None => (keys.iter().filter(|k| k.visible).cloned().collect(), vec![]),
            Some(names) => {
                let mut known = Vec::new();
                let mut unknown = Vec::new();
                for name in names {
                    match keys.iter().find(|k| &k.key == name && k.visible) {
                        Some(k) => known.push(k.clone()),
                        None => unknown.push(name.clone()),
                    }
                }
                (known, unknown)
            }
        }
    }

    /// ChangeConfiguration write with the standard outcome matrix.
    pub fn change(&self, key: &str, value: &str) -> ChangeKeyOutcome {
        let mut keys = self.keys.write();
        match keys.iter_mut().find(|k| k.key == key) {
            None => ChangeKeyOutcome::NotSupported,
            Some(entry) if entry.readonly => ChangeKeyOutcome::Rejected,
            Some(entry) => {
                entry.value = Some(value.to_string());
                if entry.reboot {
                    ChangeKeyOutcome::RebootRequired
                } else {
                    ChangeKeyOutcome::Accepted
                }
            }
        }
    }

    /// Insert or overwrite a key, preserving position for existing keys.
    pub fn upsert(&self, key: ConfigurationKey) {
        let mut keys = self.keys.write();
        match keys.iter_mut().find(|k| k.key == key.key) {
            Some(existing) => *existing = key,
            None => keys.push(key),
        }
    }

    pub fn snapshot(&self) -> Vec<ConfigurationKey> {
        self.keys.read().clone()
    }

    pub fn load(&self, keys: Vec<ConfigurationKey>) {
        *self.keys.write() = keys;
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_outcomes() {
        let store = ConfigurationKeyStore::with_defaults();
        assert_eq!(store.change("HeartbeatInterval", "120"), ChangeKeyOutcome::Accepted);
        assert_eq!(store.value("HeartbeatInterval").as_deref(), Some("120"));

        assert_eq!(
            store.change("NumberOfConnectors", "4"),
            ChangeKeyOutcome::Rejected
        );
        assert_eq!(
            store.change("NoSuchKey", "x"),
            ChangeKeyOutcome::NotSupported
        );

        store.upsert(ConfigurationKey::new("CertificateStoreMaxLength", "10").reboot_required());
        assert_eq!(
            store.change("CertificateStoreMaxLength", "20"),
            ChangeKeyOutcome::RebootRequired
        );
        // The value is stored even when a reboot is still due.
        assert_eq!(store.value("CertificateStoreMaxLength").as_deref(), Some("20"));
    }

    #[test]
    fn hidden_keys_stay_out_of_get_configuration() {
        let store = ConfigurationKeyStore::with_defaults();
        let (all, _) = store.configuration_view(None);
        assert!(all.iter().all(|k| k.key != "AuthorizationKey"));

        let (known, unknown) = store.configuration_view(Some(&[
            "AuthorizationKey".to_string(),
            "HeartbeatInterval".to_string(),
            "Bogus".to_string(),
        ]));
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].key, "HeartbeatInterval");
        assert_eq!(unknown, vec!["AuthorizationKey".to_string(), "Bogus".to_string()]);
    }

    #[test]
    fn iteration_order_is_stable() {
        let store = ConfigurationKeyStore::with_defaults();
        let first = store.configuration_view(None).0;
        let second = store.configuration_view(None).0;
        let names: Vec<_> = first.iter().map(|k| k.key.clone()).collect();
        let names2: Vec<_> = second.iter().map(|k| k.key.clone()).collect();
        assert_eq!(names, names2);
    }
}
