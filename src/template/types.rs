//! Station template model
//!
//! A template is the immutable prototype a fleet of stations is stamped
//! from: identity fields, electrical characteristics, connector/EVSE layout,
//! supervision endpoints and ATG parameters. Templates are content-hashed;
//! the hash seeds every derived station identity.

use serde::{Deserialize, Serialize};

use crate::ocpp::OcppVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdTagDistribution {
    Random,
    RoundRobin,
    ConnectorAffinity,
}

impl Default for IdTagDistribution {
    fn default() -> Self {
        Self::Random
    }
}

/// Automatic transaction generator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtgTemplate {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_min_delay")]
    pub min_delay_between_two_transactions: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_between_two_transactions: u64,
    #[serde(default = "default_min_duration")]
    pub min_duration: u64,
    #[serde(default = "default_max_duration")]
    pub max_duration: u64,
    #[serde(default = "default_probability")]
    pub probability_of_start: f64,
    #[serde(default = "default_stop_after_hours")]
    pub stop_after_hours: f64,
    #[serde(default)]
    pub stop_absolute_duration: bool,
    #[serde(default = "default_true")]
    pub stop_on_connection_failure: bool,
    #[serde(default)]
    pub require_authorize: bool,
    #[serde(default)]
    pub id_tag_distribution: IdTagDistribution,
    #[serde(default)]
    pub id_tags: Vec<String>,
}

fn default_min_delay() -> u64 {
    15
}
fn default_max_delay() -> u64 {
    30
}
fn default_min_duration() -> u64 {
    60
}
fn default_max_duration() -> u64 {
    120
}
fn default_probability() -> f64 {
    0.25
}
fn default_stop_after_hours() -> f64 {
    0.25
}
fn default_true() -> bool {
    true
}

impl Default for AtgTemplate {
    fn default() -> Self {
        Self {
            enable: false,
            min_delay_between_two_transactions: default_min_delay(),
            max_delay_between_two_transactions: default_max_delay(),
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            probability_of_start: default_probability(),
            stop_after_hours: default_stop_after_hours(),
            stop_absolute_duration: false,
            stop_on_connection_failure: true,
            require_authorize: false,
            id_tag_distribution: IdTagDistribution::Random,
            id_tags: Vec::new(),
        }
    }
}

/// Reconnection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectTemplate {
    #[serde(default = "default_true")]
    pub exponential_backoff: bool,
    #[serde(default = "default_reconnect_base")]
    pub base_delay_seconds: u64,
    #[serde(default = "default_reconnect_max_delay")]
    pub max_delay_seconds: u64,
    /// `-1` retries forever.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
}

fn default_reconnect_base() -> u64 {
    2
}
fn default_reconnect_max_delay() -> u64 {
    300
}
fn default_max_retries() -> i32 {
    -1
}

impl Default for ReconnectTemplate {
    fn default() -> Self {
        Self {
            exponential_backoff: true,
            base_delay_seconds: default_reconnect_base(),
            max_delay_seconds: default_reconnect_max_delay(),
            max_retries: default_max_retries(),
        }
    }
}

/// EVSE layout entry (OCPP 2.0.1 stations).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvseTemplate {
    #[serde(default = "default_one")]
    pub connector_count: u32,
}

fn default_one() -> u32 {
    1
}

/// Firmware-upgrade simulation descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareUpgradeTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_upgrade_pattern: Option<String>,
    #[serde(default)]
    pub reset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTemplate {
    pub base_name: String,
    #[serde(default)]
    pub ocpp_version: OcppVersion,
    pub supervision_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervision_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervision_password: Option<String>,

    pub charge_point_model: String,
    pub charge_point_vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_point_serial_number_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_serial_number_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_type: Option<String>,

    /// Maximum station power in watts.
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default = "default_voltage")]
    pub voltage_out: f64,
    #[serde(default = "default_phases")]
    pub number_of_phases: u32,
    /// Overrides the computed divider (number of charging connectors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_divider: Option<u32>,

    #[serde(default = "default_one")]
    pub number_of_connectors: u32,
    /// 2.0.1 stations: EVSE layout replaces the flat connector list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evses: Option<Vec<EvseTemplate>>,

    /// Measurands sampled during transactions.
    #[serde(default = "default_measurands")]
    pub sampled_measurands: Vec<String>,
    #[serde(default = "default_meter_interval")]
    pub meter_value_sample_interval: u64,

    #[serde(default = "default_true")]
    pub ocpp_strict_compliance: bool,
    /// Queue transaction events while offline and drain them on reconnect.
    #[serde(default = "default_true")]
    pub allow_offline_tx: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_timeout_seconds: Option<u64>,

    #[serde(default)]
    pub reconnect: ReconnectTemplate,
    #[serde(default)]
    pub automatic_transaction_generator: Option<AtgTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_upgrade: Option<FirmwareUpgradeTemplate>,
    /// Per-action opt-out matrix; absent actions are supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_support: Option<std::collections::HashMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_transfer_vendor_id: Option<String>,
}

fn default_power() -> f64 {
    22_000.0
}
fn default_voltage() -> f64 {
    230.0
}
fn default_phases() -> u32 {
    3
}
fn default_measurands() -> Vec<String> {
    vec!["Energy.Active.Import.Register".to_string()]
}
fn default_meter_interval() -> u64 {
    60
}

impl StationTemplate {
    /// Total connector count across the layout.
    pub fn connector_count(&self) -> u32 {
        match &self.evses {
            Some(evses) => evses.iter().map(|e| e.connector_count).sum(),
            None => self.number_of_connectors,
        }
    }

    /// Connectors sharing the station's power budget.
    pub fn effective_power_divider(&self) -> u32 {
        self.power_divider.unwrap_or_else(|| self.connector_count())
    }

    /// Whether the template disabled a server-initiated action.
    pub fn supports_command(&self, action: &str) -> bool {
        self.command_support
            .as_ref()
            .and_then(|m| m.get(action))
            .copied()
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn minimal_template() -> StationTemplate {
        serde_json::from_value(serde_json::json!({
            "baseName": "CS-TEST",
            "supervisionUrls": ["ws://localhost:8180/ocpp"],
            "chargePointModel": "Simulator-1",
            "chargePointVendor": "Texnouz"
        }))
        .unwrap()
    }

    #[test]
    fn defaults_fill_in() {
        let template = minimal_template();
        assert_eq!(template.ocpp_version, OcppVersion::V16);
        assert_eq!(template.number_of_connectors, 1);
        assert_eq!(template.power, 22_000.0);
        assert!(template.ocpp_strict_compliance);
        assert_eq!(template.effective_power_divider(), 1);
        assert!(template.supports_command("Reset"));
    }

    #[test]
    fn evse_layout_drives_connector_count() {
        let mut template = minimal_template();
        template.evses = Some(vec![
            EvseTemplate { connector_count: 2 },
            EvseTemplate { connector_count: 1 },
        ]);
        assert_eq!(template.connector_count(), 3);
    }

    #[test]
    fn command_support_matrix_opts_out() {
        let mut template = minimal_template();
        template.command_support =
            Some([("UnlockConnector".to_string(), false)].into_iter().collect());
        assert!(!template.supports_command("UnlockConnector"));
        assert!(template.supports_command("Reset"));
    }
}
