//! Persisted station configuration
//!
//! One JSON document per station, keyed by hash id. The loader/saver is a
//! trait so the execution environment can substitute its own storage; the
//! bundled implementation writes `<directory>/<hash_id>.json`.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::atg::AtgStatus;
use crate::shared::SimulatorError;
use crate::station::connector::ConnectorState;
use crate::station::evse::Evse;
use crate::station::info::StationInfo;
use crate::template::hash::content_hash;
use crate::vars::{ConfigurationKey, PersistedVariableAttribute};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingStationConfiguration {
    pub station_info: StationInfo,
    /// OCPP 1.6 stations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_key: Option<Vec<ConfigurationKey>>,
    /// OCPP 2.0.1 stations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_attributes: Option<Vec<PersistedVariableAttribute>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectors_status: Option<Vec<ConnectorState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evses_status: Option<Vec<Evse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_transaction_generator_statuses: Option<Vec<AtgStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_hash: Option<String>,
}

impl ChargingStationConfiguration {
    pub fn new(station_info: StationInfo) -> Self {
        Self {
            station_info,
            configuration_key: None,
            variable_attributes: None,
            connectors_status: None,
            evses_status: None,
            automatic_transaction_generator_statuses: None,
            configuration_hash: None,
        }
    }

    /// Content hash over everything except the hash field itself.
    pub fn compute_hash(&self) -> String {
        let mut clone = self.clone();
        clone.configuration_hash = None;
        // Serializing a fully-owned value cannot fail.
        content_hash(&serde_json::to_string(&clone).unwrap())
    }
}

/// Storage contract the station core consumes.
pub trait ConfigurationStore: Send + Sync {
    fn load(&self, hash_id: &str) -> Result<Option<ChargingStationConfiguration>, SimulatorError>;
    fn save(
        &self,
        hash_id: &str,
        configuration: &ChargingStationConfiguration,
    ) -> Result<(), SimulatorError>;
}

/// JSON file store, one file per station hash id.
pub struct JsonFileConfigurationStore {
    directory: PathBuf,
}

impl JsonFileConfigurationStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, hash_id: &str) -> PathBuf {
        self.directory.join(format!("{hash_id}.json"))
    }
}

impl ConfigurationStore for JsonFileConfigurationStore {
    fn load(&self, hash_id: &str) -> Result<Option<ChargingStationConfiguration>, SimulatorError> {
        let path = self.path_for(hash_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(configuration) => {
                debug!(hash_id, path = %path.display(), "Loaded station configuration");
                Ok(Some(configuration))
            }
            Err(e) => {
                // A corrupt file is ignored rather than fatal; the station
                // falls back to its template defaults.
                warn!(hash_id, error = %e, "Discarding unreadable station configuration");
                Ok(None)
            }
        }
    }

    fn save(
        &self,
        hash_id: &str,
        configuration: &ChargingStationConfiguration,
    ) -> Result<(), SimulatorError> {
        fs::create_dir_all(&self.directory)?;
        let mut to_write = configuration.clone();
        to_write.configuration_hash = Some(configuration.compute_hash());
        let path = self.path_for(hash_id);
        fs::write(&path, serde_json::to_vec_pretty(&to_write)?)?;
        debug!(hash_id, path = %path.display(), "Saved station configuration");
        Ok(())
    }
}

/// Discards everything; used when persistence is disabled.
pub struct NullConfigurationStore;

impl ConfigurationStore for NullConfigurationStore {
    fn load(&self, _hash_id: &str) -> Result<Option<ChargingStationConfiguration>, SimulatorError> {
        Ok(None)
    }

    fn save(
        &self,
        _hash_id: &str,
        _configuration: &ChargingStationConfiguration,
    ) -> Result<(), SimulatorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_info() -> StationInfo {
        let template: crate::template::StationTemplate =
            serde_json::from_value(serde_json::json!({
                "baseName": "CS-PERSIST",
                "supervisionUrls": ["ws://localhost/ocpp"],
                "chargePointModel": "M",
                "chargePointVendor": "V"
            }))
            .unwrap();
        StationInfo::from_template(&template, "deadbeef", 1)
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigurationStore::new(dir.path());

        let mut configuration = ChargingStationConfiguration::new(station_info());
        configuration.configuration_key =
            Some(vec![crate::vars::ConfigurationKey::new("HeartbeatInterval", "300")]);

        store.save("abc123", &configuration).unwrap();
        let loaded = store.load("abc123").unwrap().unwrap();

        assert_eq!(loaded.station_info.station_id, "CS-PERSIST-000001");
        assert!(loaded.configuration_hash.is_some());
        assert_eq!(
            loaded.configuration_key.unwrap()[0].value.as_deref(),
            Some("300")
        );
    }

    #[test]
    fn missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigurationStore::new(dir.path());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn corrupt_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        let store = JsonFileConfigurationStore::new(dir.path());
        assert!(store.load("bad").unwrap().is_none());
    }

    #[test]
    fn hash_ignores_the_hash_field() {
        let configuration = ChargingStationConfiguration::new(station_info());
        let h1 = configuration.compute_hash();
        let mut with_hash = configuration.clone();
        with_hash.configuration_hash = Some(h1.clone());
        assert_eq!(with_hash.compute_hash(), h1);
    }
}
