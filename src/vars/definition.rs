//! Standard component/variable definitions
//!
//! Process-wide, read-mostly after init. Stations resolve Get/SetVariables
//! requests against this registry; per-station values live in the
//! [`VariableManager`](super::VariableManager) store.

use once_cell::sync::Lazy;

use super::attribute::{
    AttributeDefinition, VariableConstraints, VariableDataType, VariableDefinition,
};

pub const COMPONENT_CHARGING_STATION: &str = "ChargingStation";
pub const COMPONENT_SECURITY_CTRLR: &str = "SecurityCtrlr";
pub const COMPONENT_AUTH_CTRLR: &str = "AuthCtrlr";
pub const COMPONENT_AUTH_CACHE_CTRLR: &str = "AuthCacheCtrlr";
pub const COMPONENT_LOCAL_AUTH_LIST_CTRLR: &str = "LocalAuthListCtrlr";
pub const COMPONENT_TX_CTRLR: &str = "TxCtrlr";
pub const COMPONENT_CLOCK_CTRLR: &str = "ClockCtrlr";
pub const COMPONENT_OCPP_COMM_CTRLR: &str = "OCPPCommCtrlr";
pub const COMPONENT_SAMPLED_DATA_CTRLR: &str = "SampledDataCtrlr";
pub const COMPONENT_TARIFF_COST_CTRLR: &str = "TariffCostCtrlr";

pub const VAR_HEARTBEAT_INTERVAL: &str = "HeartbeatInterval";
pub const VAR_WEBSOCKET_PING_INTERVAL: &str = "WebSocketPingInterval";
pub const VAR_MESSAGE_TIMEOUT: &str = "MessageTimeout";
pub const VAR_AVAILABILITY_STATE: &str = "AvailabilityState";
pub const VAR_ITEMS_PER_MESSAGE_GET: &str = "ItemsPerMessageGetVariables";
pub const VAR_ITEMS_PER_MESSAGE_SET: &str = "ItemsPerMessageSetVariables";
pub const VAR_BYTES_PER_MESSAGE_GET: &str = "BytesPerMessageGetVariables";
pub const VAR_BYTES_PER_MESSAGE_SET: &str = "BytesPerMessageSetVariables";
pub const VAR_VALUE_SIZE: &str = "ValueSize";
pub const VAR_CONFIGURATION_VALUE_SIZE: &str = "ConfigurationValueSize";
pub const VAR_TX_UPDATED_INTERVAL: &str = "TxUpdatedInterval";
pub const VAR_ENABLED: &str = "Enabled";
pub const VAR_AUTHORIZE_REMOTE_START: &str = "AuthorizeRemoteStart";
pub const VAR_LOCAL_AUTHORIZE_OFFLINE: &str = "LocalAuthorizeOffline";
pub const VAR_DATE_TIME: &str = "DateTime";
pub const VAR_BASIC_AUTH_PASSWORD: &str = "BasicAuthPassword";

/// Absolute fallback for the per-value size limit when neither `ValueSize`
/// nor `ConfigurationValueSize` carries a positive value.
pub const DEFAULT_VALUE_SIZE_LIMIT: usize = 2500;

fn integer(
    component: &str,
    variable: &str,
    default: &str,
    min: f64,
    max: f64,
) -> VariableDefinition {
    VariableDefinition {
        component: component.to_string(),
        variable: variable.to_string(),
        instance_required: false,
        data_type: VariableDataType::Integer,
        constraints: VariableConstraints {
            min_limit: Some(min),
            max_limit: Some(max),
            ..Default::default()
        },
        attributes: vec![AttributeDefinition::actual(Some(default))],
    }
}

fn boolean(component: &str, variable: &str, default: &str) -> VariableDefinition {
    VariableDefinition {
        component: component.to_string(),
        variable: variable.to_string(),
        instance_required: false,
        data_type: VariableDataType::Boolean,
        constraints: VariableConstraints::default(),
        attributes: vec![AttributeDefinition::actual(Some(default))],
    }
}

static STANDARD_DEFINITIONS: Lazy<Vec<VariableDefinition>> = Lazy::new(|| {
    let mut defs = vec![
        integer(COMPONENT_CHARGING_STATION, VAR_HEARTBEAT_INTERVAL, "60", 1.0, 86400.0),
        integer(COMPONENT_CHARGING_STATION, VAR_WEBSOCKET_PING_INTERVAL, "30", 0.0, 3600.0),
        // Applying a new CALL timeout needs the session re-armed.
        {
            let mut def = integer(COMPONENT_CHARGING_STATION, VAR_MESSAGE_TIMEOUT, "30", 1.0, 600.0);
            def.attributes = vec![AttributeDefinition::actual(Some("30")).reboot_required()];
            def
        },
        {
            let mut def = VariableDefinition {
                component: COMPONENT_CHARGING_STATION.to_string(),
                variable: VAR_AVAILABILITY_STATE.to_string(),
                instance_required: false,
                data_type: VariableDataType::OptionList,
                constraints: VariableConstraints {
                    values_list: Some(
                        ["Available", "Occupied", "Reserved", "Unavailable", "Faulted"]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    ),
                    ..Default::default()
                },
                attributes: vec![
                    AttributeDefinition::actual(Some("Available")).read_only().volatile(),
                ],
            };
            def.constraints.max_length = Some(20);
            def
        },
        integer(COMPONENT_CHARGING_STATION, VAR_ITEMS_PER_MESSAGE_GET, "50", 1.0, 500.0),
        integer(COMPONENT_CHARGING_STATION, VAR_ITEMS_PER_MESSAGE_SET, "50", 1.0, 500.0),
        integer(COMPONENT_CHARGING_STATION, VAR_BYTES_PER_MESSAGE_GET, "8192", 1.0, 1_000_000.0),
        integer(COMPONENT_CHARGING_STATION, VAR_BYTES_PER_MESSAGE_SET, "8192", 1.0, 1_000_000.0),
        integer(COMPONENT_CHARGING_STATION, VAR_VALUE_SIZE, "2500", 0.0, 100_000.0),
        // Unset by default; ValueSize alone bounds values then.
        VariableDefinition {
            component: COMPONENT_CHARGING_STATION.to_string(),
            variable: VAR_CONFIGURATION_VALUE_SIZE.to_string(),
            instance_required: false,
            data_type: VariableDataType::Integer,
            constraints: VariableConstraints {
                min_limit: Some(0.0),
                max_limit: Some(100_000.0),
                ..Default::default()
            },
            attributes: vec![AttributeDefinition::actual(None)],
        },
        VariableDefinition {
            component: COMPONENT_SECURITY_CTRLR.to_string(),
            variable: VAR_BASIC_AUTH_PASSWORD.to_string(),
            instance_required: false,
            data_type: VariableDataType::String,
            constraints: VariableConstraints {
                max_length: Some(40),
                ..Default::default()
            },
            attributes: vec![AttributeDefinition::actual(None).write_only()],
        },
        VariableDefinition {
            component: COMPONENT_SECURITY_CTRLR.to_string(),
            variable: "OrganizationName".to_string(),
            instance_required: false,
            data_type: VariableDataType::String,
            constraints: VariableConstraints {
                max_length: Some(50),
                ..Default::default()
            },
            attributes: vec![AttributeDefinition::actual(Some("Texnouz"))],
        },
        boolean(COMPONENT_AUTH_CTRLR, VAR_ENABLED, "true"),
        boolean(COMPONENT_AUTH_CTRLR, VAR_AUTHORIZE_REMOTE_START, "true"),
        boolean(COMPONENT_AUTH_CTRLR, VAR_LOCAL_AUTHORIZE_OFFLINE, "true"),
        boolean(COMPONENT_AUTH_CTRLR, "OfflineTxForUnknownIdEnabled", "false"),
        boolean(COMPONENT_AUTH_CACHE_CTRLR, VAR_ENABLED, "true"),
        boolean(COMPONENT_LOCAL_AUTH_LIST_CTRLR, VAR_ENABLED, "true"),
        {
            let mut def = integer(COMPONENT_LOCAL_AUTH_LIST_CTRLR, "Entries", "0", 0.0, 100_000.0);
            def.attributes = vec![AttributeDefinition::actual(Some("0")).read_only().volatile()];
            def
        },
        // Reverts to its default on reset_runtime_overrides().
        {
            let mut def = integer(COMPONENT_TX_CTRLR, VAR_TX_UPDATED_INTERVAL, "30", 1.0, 86400.0);
            def.attributes = vec![AttributeDefinition::actual(Some("30")).volatile()];
            def
        },
        integer(COMPONENT_TX_CTRLR, "EVConnectionTimeOut", "120", 1.0, 3600.0),
        boolean(COMPONENT_TX_CTRLR, "StopTxOnInvalidId", "true"),
        boolean(COMPONENT_TX_CTRLR, "StopTxOnEVSideDisconnect", "true"),
        // Wall-clock is not writable through SetVariables.
        VariableDefinition {
            component: COMPONENT_CLOCK_CTRLR.to_string(),
            variable: VAR_DATE_TIME.to_string(),
            instance_required: false,
            data_type: VariableDataType::DateTime,
            constraints: VariableConstraints::default(),
            attributes: vec![
                AttributeDefinition::actual(None).read_only().immutable().volatile(),
            ],
        },
        VariableDefinition {
            component: COMPONENT_CLOCK_CTRLR.to_string(),
            variable: "TimeSource".to_string(),
            instance_required: false,
            data_type: VariableDataType::String,
            constraints: VariableConstraints {
                max_length: Some(100),
                ..Default::default()
            },
            attributes: vec![AttributeDefinition::actual(Some("Heartbeat"))],
        },
        integer(COMPONENT_OCPP_COMM_CTRLR, "RetryBackOffRepeatTimes", "3", 0.0, 20.0),
        integer(COMPONENT_OCPP_COMM_CTRLR, "RetryBackOffWaitMinimum", "3", 1.0, 3600.0),
        integer(COMPONENT_OCPP_COMM_CTRLR, "NetworkProfileConnectionAttempts", "3", 1.0, 100.0),
        VariableDefinition {
            component: COMPONENT_SAMPLED_DATA_CTRLR.to_string(),
            variable: "TxUpdatedMeasurands".to_string(),
            instance_required: false,
            data_type: VariableDataType::String,
            constraints: VariableConstraints {
                max_length: Some(500),
                ..Default::default()
            },
            attributes: vec![AttributeDefinition::actual(Some(
                "Energy.Active.Import.Register",
            ))],
        },
        // Per-language fallback text; only addressable with a language
        // instance.
        VariableDefinition {
            component: COMPONENT_TARIFF_COST_CTRLR.to_string(),
            variable: "TariffFallbackMessage".to_string(),
            instance_required: true,
            data_type: VariableDataType::String,
            constraints: VariableConstraints {
                max_length: Some(255),
                ..Default::default()
            },
            attributes: vec![AttributeDefinition::actual(Some("Standard tariff applies"))],
        },
    ];
    defs.sort_by(|a, b| (a.component.clone(), a.variable.clone()).cmp(&(b.component.clone(), b.variable.clone())));
    defs
});

/// The process-wide definition registry.
pub fn standard_definitions() -> &'static [VariableDefinition] {
    &STANDARD_DEFINITIONS
}

pub fn component_known(component: &str) -> bool {
    STANDARD_DEFINITIONS.iter().any(|d| d.component == component)
}

pub fn find_definition(component: &str, variable: &str) -> Option<&'static VariableDefinition> {
    STANDARD_DEFINITIONS
        .iter()
        .find(|d| d.component == component && d.variable == variable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_variables_resolve() {
        assert!(find_definition(COMPONENT_CHARGING_STATION, VAR_HEARTBEAT_INTERVAL).is_some());
        assert!(find_definition(COMPONENT_CHARGING_STATION, VAR_WEBSOCKET_PING_INTERVAL).is_some());
        assert!(find_definition(COMPONENT_CHARGING_STATION, "InvalidVariable").is_none());
        assert!(!component_known("InvalidComponent"));
    }

    #[test]
    fn message_timeout_requires_reboot() {
        let def = find_definition(COMPONENT_CHARGING_STATION, VAR_MESSAGE_TIMEOUT).unwrap();
        assert!(def.attributes[0].reboot_required);
    }
}
