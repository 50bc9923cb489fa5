//! Station identity and runtime options, derived from a template instance.

use serde::{Deserialize, Serialize};

use crate::ocpp::{OcppVersion, DEFAULT_MESSAGE_TIMEOUT_SECS};
use crate::template::{hash, ReconnectTemplate, StationTemplate};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationInfo {
    /// Stable identity derived from (template hash, index, base name).
    pub hash_id: String,
    /// Wire identity, used in the WebSocket path.
    pub station_id: String,
    pub template_hash: String,
    pub template_index: u32,
    pub ocpp_version: OcppVersion,
    pub charge_point_model: String,
    pub charge_point_vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_point_serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_type: Option<String>,
    pub supervision_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervision_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervision_password: Option<String>,
    /// Maximum station power (W).
    pub maximum_power: f64,
    pub voltage_out: f64,
    pub number_of_phases: u32,
}

impl StationInfo {
    pub fn from_template(template: &StationTemplate, template_hash: &str, index: u32) -> Self {
        let station_id = hash::station_name(&template.base_name, index);
        Self {
            hash_id: hash::station_hash_id(template_hash, index, &template.base_name),
            station_id: station_id.clone(),
            template_hash: template_hash.to_string(),
            template_index: index,
            ocpp_version: template.ocpp_version,
            charge_point_model: template.charge_point_model.clone(),
            charge_point_vendor: template.charge_point_vendor.clone(),
            firmware_version: template.firmware_version.clone(),
            charge_point_serial_number: template
                .charge_point_serial_number_prefix
                .as_ref()
                .map(|prefix| format!("{prefix}{index:06}")),
            meter_serial_number: template
                .meter_serial_number_prefix
                .as_ref()
                .map(|prefix| format!("{prefix}{index:06}")),
            meter_type: template.meter_type.clone(),
            supervision_urls: template.supervision_urls.clone(),
            supervision_user: template.supervision_user.clone(),
            supervision_password: template.supervision_password.clone(),
            maximum_power: template.power,
            voltage_out: template.voltage_out,
            number_of_phases: template.number_of_phases,
        }
    }

    /// The supervision URL for this station, round-robined over the list by
    /// template index.
    pub fn supervision_url(&self) -> &str {
        let idx = self.template_index as usize % self.supervision_urls.len().max(1);
        self.supervision_urls
            .get(idx)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Behavioral knobs resolved once at station build time.
#[derive(Debug, Clone)]
pub struct StationOptions {
    pub ocpp_strict_compliance: bool,
    pub allow_offline_tx: bool,
    /// Skip a heartbeat when another CALL went out within the interval.
    pub heartbeat_only_when_idle: bool,
    pub message_timeout_secs: u64,
    pub meter_value_sample_interval_secs: u64,
    pub sampled_measurands: Vec<String>,
    pub power_divider: u32,
    pub reconnect: ReconnectTemplate,
    pub atg: Option<crate::template::AtgTemplate>,
    pub data_transfer_vendor_id: Option<String>,
    pub command_support: Option<std::collections::HashMap<String, bool>>,
}

impl StationOptions {
    pub fn from_template(template: &StationTemplate) -> Self {
        Self {
            ocpp_strict_compliance: template.ocpp_strict_compliance,
            allow_offline_tx: template.allow_offline_tx,
            heartbeat_only_when_idle: true,
            message_timeout_secs: template
                .message_timeout_seconds
                .unwrap_or(DEFAULT_MESSAGE_TIMEOUT_SECS),
            meter_value_sample_interval_secs: template.meter_value_sample_interval,
            sampled_measurands: template.sampled_measurands.clone(),
            power_divider: template.effective_power_divider(),
            reconnect: template.reconnect.clone(),
            atg: template.automatic_transaction_generator.clone(),
            data_transfer_vendor_id: template.data_transfer_vendor_id.clone(),
            command_support: template.command_support.clone(),
        }
    }

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

    fn template() -> StationTemplate {
        serde_json::from_value(serde_json::json!({
            "baseName": "CS-INFO",
            "supervisionUrls": ["ws://a/ocpp", "ws://b/ocpp"],
            "chargePointModel": "M",
            "chargePointVendor": "V",
            "chargePointSerialNumberPrefix": "SN-"
        }))
        .unwrap()
    }

    #[test]
    fn identity_is_stable_per_index() {
        let t = template();
        let a1 = StationInfo::from_template(&t, "hash", 1);
        let a2 = StationInfo::from_template(&t, "hash", 1);
        let b = StationInfo::from_template(&t, "hash", 2);
        assert_eq!(a1.hash_id, a2.hash_id);
        assert_ne!(a1.hash_id, b.hash_id);
        assert_eq!(a1.station_id, "CS-INFO-000001");
        assert_eq!(a1.charge_point_serial_number.as_deref(), Some("SN-000001"));
    }

    #[test]
    fn supervision_urls_round_robin_by_index() {
        let t = template();
        let first = StationInfo::from_template(&t, "hash", 2);
        let second = StationInfo::from_template(&t, "hash", 3);
        assert_eq!(first.supervision_url(), "ws://a/ocpp");
        assert_eq!(second.supervision_url(), "ws://b/ocpp");
    }
}
