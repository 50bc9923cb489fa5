//! OCPP 2.0.1 variable manager
//!
//! Resolves GetVariables/SetVariables batches against the definition
//! registry and the per-station value store. Every request produces exactly
//! one result, in order, echoing its component and variable; batch limits
//! produce blanket rejections rather than CALL errors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rust_ocpp::v2_0_1::datatypes::get_variable_data_type::GetVariableDataType;
use rust_ocpp::v2_0_1::datatypes::get_variable_result_type::GetVariableResultType;
use rust_ocpp::v2_0_1::datatypes::set_variable_data_type::SetVariableDataType;
use rust_ocpp::v2_0_1::datatypes::set_variable_result_type::SetVariableResultType;
use rust_ocpp::v2_0_1::datatypes::status_info_type::StatusInfoType;
use rust_ocpp::v2_0_1::enumerations::get_variable_status_enum_type::GetVariableStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::set_variable_status_enum_type::SetVariableStatusEnumType;

use super::attribute::{AttributeType, Mutability};
use super::definition::{self, DEFAULT_VALUE_SIZE_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StoreKey {
    component: String,
    component_instance: Option<String>,
    evse_id: Option<i32>,
    variable: String,
    variable_instance: Option<String>,
    attribute: AttributeType,
}

impl StoreKey {
    fn from_address(
        component: &rust_ocpp::v2_0_1::datatypes::component_type::ComponentType,
        variable: &rust_ocpp::v2_0_1::datatypes::variable_type::VariableType,
        attribute: AttributeType,
    ) -> Self {
        Self {
            component: component.name.clone(),
            component_instance: component.instance.clone(),
            evse_id: component.evse.as_ref().map(|e| e.id),
            variable: variable.name.clone(),
            variable_instance: variable.instance.clone(),
            attribute,
        }
    }
}

/// One persisted attribute value, as written to the station configuration
/// file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedVariableAttribute {
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_id: Option<i32>,
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_instance: Option<String>,
    pub attribute_type: AttributeType,
    pub value: String,
}

pub struct VariableManager {
    store: RwLock<HashMap<StoreKey, String>>,
    reboot_pending: AtomicBool,
}

impl Default for VariableManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableManager {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            reboot_pending: AtomicBool::new(false),
        }
    }

    // ── GetVariables ───────────────────────────────────────

    pub fn get_variables(&self, requests: &[GetVariableDataType]) -> Vec<GetVariableResultType> {
        let items_limit = self.int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_ITEMS_PER_MESSAGE_GET);
        if let Some(limit) = items_limit {
            if requests.len() as i64 > limit {
                return self.blanket_get(requests, "TooManyElements");
            }
        }

        let bytes_limit = self.int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_BYTES_PER_MESSAGE_GET);
        if let Some(limit) = bytes_limit {
            let request_bytes = serde_json::to_vec(requests).map(|v| v.len()).unwrap_or(0);
            if request_bytes as i64 > limit {
                return self.blanket_get(requests, "TooLargeElement");
            }
        }

        let results: Vec<GetVariableResultType> =
            requests.iter().map(|r| self.get_one(r)).collect();

        // The response itself is bounded by the same byte limit.
        if let Some(limit) = bytes_limit {
            let response_bytes = serde_json::to_vec(&results).map(|v| v.len()).unwrap_or(0);
            if response_bytes as i64 > limit {
                return self.blanket_get(requests, "TooLargeElement");
            }
        }

        results
    }

    fn get_one(&self, request: &GetVariableDataType) -> GetVariableResultType {
        let attribute_type = request
            .attribute_type
            .as_ref()
            .map(AttributeType::from_wire)
            .unwrap_or(AttributeType::Actual);

        let mut result = GetVariableResultType {
            attribute_status: GetVariableStatusEnumType::Accepted,
            attribute_status_info: None,
            attribute_type: request.attribute_type.clone(),
            attribute_value: None,
            component: request.component.clone(),
            variable: request.variable.clone(),
        };

        if !definition::component_known(&request.component.name) {
            result.attribute_status = GetVariableStatusEnumType::UnknownComponent;
            return result;
        }

        let def = match definition::find_definition(&request.component.name, &request.variable.name)
        {
            Some(def) => def,
            None => {
                result.attribute_status = GetVariableStatusEnumType::UnknownVariable;
                return result;
            }
        };

        let attr_def = match def.attribute(attribute_type) {
            Some(attr) => attr,
            None => {
                result.attribute_status = GetVariableStatusEnumType::NotSupportedAttributeType;
                return result;
            }
        };

        if attr_def.mutability == Mutability::WriteOnly {
            result.attribute_status = GetVariableStatusEnumType::Rejected;
            result.attribute_status_info = Some(status_info("WriteOnly"));
            return result;
        }

        // Instance constraint ranks below attribute support and mutability.
        if def.instance_required && request.variable.instance.is_none() {
            result.attribute_status = GetVariableStatusEnumType::UnknownVariable;
            return result;
        }

        let key = StoreKey::from_address(&request.component, &request.variable, attribute_type);
        let stored = self.store.read().get(&key).cloned();

        let value = match stored {
            Some(v) => v,
            None => match &attr_def.default_value {
                // Self-heal: materialize the default the first time a known
                // variable is read without a stored attribute.
                Some(default) => {
                    debug!(
                        component = request.component.name.as_str(),
                        variable = request.variable.name.as_str(),
                        "Materializing default for unset variable attribute"
                    );
                    self.store.write().insert(key, default.clone());
                    default.clone()
                }
                None => String::new(),
            },
        };

        result.attribute_value = Some(value);
        result
    }

    fn blanket_get(
        &self,
        requests: &[GetVariableDataType],
        reason: &str,
    ) -> Vec<GetVariableResultType> {
        warn!(count = requests.len(), reason, "GetVariables batch rejected");
        requests
            .iter()
            .map(|r| GetVariableResultType {
                attribute_status: GetVariableStatusEnumType::Rejected,
                attribute_status_info: Some(status_info(reason)),
                attribute_type: r.attribute_type.clone(),
                attribute_value: None,
                component: r.component.clone(),
                variable: r.variable.clone(),
            })
            .collect()
    }

    // ── SetVariables ───────────────────────────────────────

    pub fn set_variables(&self, requests: &[SetVariableDataType]) -> Vec<SetVariableResultType> {
        let items_limit = self.int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_ITEMS_PER_MESSAGE_SET);
        if let Some(limit) = items_limit {
            if requests.len() as i64 > limit {
                return self.blanket_set(requests, "TooManyElements");
            }
        }

        let bytes_limit = self.int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_BYTES_PER_MESSAGE_SET);
        if let Some(limit) = bytes_limit {
            let request_bytes = serde_json::to_vec(requests).map(|v| v.len()).unwrap_or(0);
            if request_bytes as i64 > limit {
                return self.blanket_set(requests, "TooLargeElement");
            }
        }

        requests.iter().map(|r| self.set_one(r)).collect()
    }

    fn set_one(&self, request: &SetVariableDataType) -> SetVariableResultType {
        let attribute_type = request
            .attribute_type
            .as_ref()
            .map(AttributeType::from_wire)
            .unwrap_or(AttributeType::Actual);

        let mut result = SetVariableResultType {
            attribute_type: request.attribute_type.clone(),
            attribute_status: SetVariableStatusEnumType::Accepted,
            attribute_status_info: None,
            component: request.component.clone(),
            variable: request.variable.clone(),
        };

        if !definition::component_known(&request.component.name) {
            result.attribute_status = SetVariableStatusEnumType::UnknownComponent;
            return result;
        }

        let def = match definition::find_definition(&request.component.name, &request.variable.name)
        {
            Some(def) => def,
            None => {
                result.attribute_status = SetVariableStatusEnumType::UnknownVariable;
                return result;
            }
        };

        let attr_def = match def.attribute(attribute_type) {
            Some(attr) => attr,
            None => {
                result.attribute_status = SetVariableStatusEnumType::NotSupportedAttributeType;
                result.attribute_status_info = Some(status_info("UnsupportedParam"));
                return result;
            }
        };

        if attr_def.immutable {
            result.attribute_status = SetVariableStatusEnumType::Rejected;
            result.attribute_status_info = Some(status_info("ImmutableVariable"));
            return result;
        }

        if attr_def.mutability == Mutability::ReadOnly {
            result.attribute_status = SetVariableStatusEnumType::Rejected;
            result.attribute_status_info = Some(status_info("ReadOnly"));
            return result;
        }

        // Instance constraint ranks below attribute support and mutability.
        if def.instance_required && request.variable.instance.is_none() {
            result.attribute_status = SetVariableStatusEnumType::UnknownVariable;
            return result;
        }

        let value = &request.attribute_value;

        if value.len() > self.effective_value_size() {
            result.attribute_status = SetVariableStatusEnumType::Rejected;
            result.attribute_status_info = Some(status_info("TooLargeElement"));
            return result;
        }

        if let Some(reason) = def.constraints.violation(def.data_type, value) {
            result.attribute_status = SetVariableStatusEnumType::Rejected;
            result.attribute_status_info = Some(StatusInfoType {
                reason_code: "PropertyConstraintViolation".to_string(),
                additional_info: Some(reason.to_string()),
            });
            return result;
        }

        let key = StoreKey::from_address(&request.component, &request.variable, attribute_type);

        {
            let store = self.store.read();
            let current = store
                .get(&key)
                .cloned()
                .or_else(|| attr_def.default_value.clone());
            if current.as_deref() == Some(value.as_str()) {
                // Unchanged value: accepted no-op, no persistence side effect.
                return result;
            }
        }

        self.store.write().insert(key, value.clone());

        if attr_def.reboot_required {
            self.reboot_pending.store(true, Ordering::SeqCst);
            result.attribute_status = SetVariableStatusEnumType::RebootRequired;
            result.attribute_status_info = Some(status_info("ChangeRequiresReboot"));
        }

        result
    }

    fn blanket_set(
        &self,
        requests: &[SetVariableDataType],
        reason: &str,
    ) -> Vec<SetVariableResultType> {
        warn!(count = requests.len(), reason, "SetVariables batch rejected");
        requests
            .iter()
            .map(|r| SetVariableResultType {
                attribute_type: r.attribute_type.clone(),
                attribute_status: SetVariableStatusEnumType::Rejected,
                attribute_status_info: Some(status_info(reason)),
                component: r.component.clone(),
                variable: r.variable.clone(),
            })
            .collect()
    }

    // ── Direct access for the station runtime ──────────────

    /// Stored-or-default Actual value of a standard variable.
    pub fn value_of(&self, component: &str, variable: &str) -> Option<String> {
        let def = definition::find_definition(component, variable)?;
        let key = StoreKey {
            component: component.to_string(),
            component_instance: None,
            evse_id: None,
            variable: variable.to_string(),
            variable_instance: None,
            attribute: AttributeType::Actual,
        };
        self.store
            .read()
            .get(&key)
            .cloned()
            .or_else(|| def.attribute(AttributeType::Actual)?.default_value.clone())
    }

    pub fn int_of(&self, component: &str, variable: &str) -> Option<i64> {
        self.value_of(component, variable)?.parse().ok()
    }

    pub fn bool_of(&self, component: &str, variable: &str) -> Option<bool> {
        self.value_of(component, variable)?.parse().ok()
    }

    /// Write a runtime-maintained value (e.g. `AvailabilityState`) without
    /// the SetVariables checks.
    pub fn set_internal(&self, component: &str, variable: &str, value: impl Into<String>) {
        let key = StoreKey {
            component: component.to_string(),
            component_instance: None,
            evse_id: None,
            variable: variable.to_string(),
            variable_instance: None,
            attribute: AttributeType::Actual,
        };
        self.store.write().insert(key, value.into());
    }

    /// Effective per-value size limit: the smaller of the positive
    /// `ValueSize`/`ConfigurationValueSize`, else the absolute default.
    pub fn effective_value_size(&self) -> usize {
        let value_size = self
            .int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_VALUE_SIZE)
            .filter(|v| *v > 0);
        let config_size = self
            .int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_CONFIGURATION_VALUE_SIZE)
            .filter(|v| *v > 0);

        match (value_size, config_size) {
            (Some(a), Some(b)) => a.min(b) as usize,
            (Some(a), None) => a as usize,
            (None, Some(b)) => b as usize,
            (None, None) => DEFAULT_VALUE_SIZE_LIMIT,
        }
    }

    /// Drop every non-persistent attribute back to its default.
    pub fn reset_runtime_overrides(&self) {
        let mut store = self.store.write();
        store.retain(|key, _| {
            definition::find_definition(&key.component, &key.variable)
                .and_then(|def| def.attribute(key.attribute))
                .map(|attr| attr.persistent)
                .unwrap_or(true)
        });
    }

    pub fn reboot_pending(&self) -> bool {
        self.reboot_pending.load(Ordering::SeqCst)
    }

    pub fn clear_reboot_pending(&self) {
        self.reboot_pending.store(false, Ordering::SeqCst);
    }

    // ── Persistence ────────────────────────────────────────

    /// Snapshot of every stored persistent attribute.
    pub fn persisted_attributes(&self) -> Vec<PersistedVariableAttribute> {
        let store = self.store.read();
        let mut records: Vec<PersistedVariableAttribute> = store
            .iter()
            .filter(|(key, _)| {
                definition::find_definition(&key.component, &key.variable)
                    .and_then(|def| def.attribute(key.attribute))
                    .map(|attr| attr.persistent)
                    .unwrap_or(false)
            })
            .map(|(key, value)| PersistedVariableAttribute {
                component: key.component.clone(),
                component_instance: key.component_instance.clone(),
                evse_id: key.evse_id,
                variable: key.variable.clone(),
                variable_instance: key.variable_instance.clone(),
                attribute_type: key.attribute,
                value: value.clone(),
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.component, &a.variable)
                .cmp(&(&b.component, &b.variable))
        });
        records
    }

    pub fn load_persisted(&self, records: Vec<PersistedVariableAttribute>) {
        let mut store = self.store.write();
        for record in records {
            let key = StoreKey {
                component: record.component,
                component_instance: record.component_instance,
                evse_id: record.evse_id,
                variable: record.variable,
                variable_instance: record.variable_instance,
                attribute: record.attribute_type,
            };
            store.insert(key, record.value);
        }
    }
}

fn status_info(reason_code: &str) -> StatusInfoType {
    StatusInfoType {
        reason_code: reason_code.to_string(),
        additional_info: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ocpp::v2_0_1::datatypes::component_type::ComponentType;
    use rust_ocpp::v2_0_1::datatypes::variable_type::VariableType;
    use rust_ocpp::v2_0_1::enumerations::attribute_enum_type::AttributeEnumType;

    fn component(name: &str) -> ComponentType {
        ComponentType {
            name: name.to_string(),
            instance: None,
            evse: None,
        }
    }

    fn variable(name: &str) -> VariableType {
        VariableType {
            name: name.to_string(),
            instance: None,
        }
    }

    fn get_request(component_name: &str, variable_name: &str) -> GetVariableDataType {
        GetVariableDataType {
            attribute_type: None,
            component: component(component_name),
            variable: variable(variable_name),
        }
    }

    fn set_request(component_name: &str, variable_name: &str, value: &str) -> SetVariableDataType {
        SetVariableDataType {
            attribute_type: Some(AttributeEnumType::Actual),
            attribute_value: value.to_string(),
            component: component(component_name),
            variable: variable(variable_name),
        }
    }

    #[test]
    fn get_variables_mixed_batch_preserves_order_and_statuses() {
        let manager = VariableManager::new();
        let requests = vec![
            get_request("ChargingStation", "HeartbeatInterval"),
            get_request("ChargingStation", "WebSocketPingInterval"),
            get_request("ChargingStation", "InvalidVariable"),
            get_request("InvalidComponent", "HeartbeatInterval"),
        ];

        let results = manager.get_variables(&requests);
        assert_eq!(results.len(), 4);

        assert_eq!(results[0].attribute_status, GetVariableStatusEnumType::Accepted);
        assert_eq!(results[0].attribute_value.as_deref(), Some("60"));
        assert_eq!(results[1].attribute_status, GetVariableStatusEnumType::Accepted);
        assert_eq!(results[1].attribute_value.as_deref(), Some("30"));
        assert_eq!(
            results[2].attribute_status,
            GetVariableStatusEnumType::UnknownVariable
        );
        assert!(results[2].attribute_value.is_none());
        assert_eq!(
            results[3].attribute_status,
            GetVariableStatusEnumType::UnknownComponent
        );
        assert!(results[3].attribute_value.is_none());

        // Each result echoes its request's addressing.
        assert_eq!(results[2].variable.name, "InvalidVariable");
        assert_eq!(results[3].component.name, "InvalidComponent");
    }

    #[test]
    fn reboot_required_set_stores_value() {
        let manager = VariableManager::new();
        let results =
            manager.set_variables(&[set_request("ChargingStation", "MessageTimeout", "35")]);
        assert_eq!(
            results[0].attribute_status,
            SetVariableStatusEnumType::RebootRequired
        );
        assert_eq!(
            results[0]
                .attribute_status_info
                .as_ref()
                .unwrap()
                .reason_code,
            "ChangeRequiresReboot"
        );
        assert!(manager.reboot_pending());

        let get = manager.get_variables(&[get_request("ChargingStation", "MessageTimeout")]);
        assert_eq!(get[0].attribute_value.as_deref(), Some("35"));
    }

    #[test]
    fn unchanged_value_is_accepted_noop() {
        let manager = VariableManager::new();
        // Default HeartbeatInterval is "60"; setting "60" again must not
        // trip the reboot flag path nor store anything new.
        let results =
            manager.set_variables(&[set_request("ChargingStation", "HeartbeatInterval", "60")]);
        assert_eq!(results[0].attribute_status, SetVariableStatusEnumType::Accepted);
        assert!(manager.persisted_attributes().is_empty());
    }

    #[test]
    fn read_only_and_immutable_rejections() {
        let manager = VariableManager::new();
        let results = manager.set_variables(&[
            set_request("ChargingStation", "AvailabilityState", "Faulted"),
            set_request("ClockCtrlr", "DateTime", "2024-01-01T00:00:00Z"),
        ]);
        assert_eq!(results[0].attribute_status, SetVariableStatusEnumType::Rejected);
        assert_eq!(
            results[0].attribute_status_info.as_ref().unwrap().reason_code,
            "ReadOnly"
        );
        assert_eq!(results[1].attribute_status, SetVariableStatusEnumType::Rejected);
        assert_eq!(
            results[1].attribute_status_info.as_ref().unwrap().reason_code,
            "ImmutableVariable"
        );
    }

    #[test]
    fn write_only_get_is_rejected_without_value() {
        let manager = VariableManager::new();
        let results = manager.get_variables(&[get_request("SecurityCtrlr", "BasicAuthPassword")]);
        assert_eq!(results[0].attribute_status, GetVariableStatusEnumType::Rejected);
        assert!(results[0].attribute_value.is_none());
    }

    #[test]
    fn constraint_violation_is_rejected() {
        let manager = VariableManager::new();
        let results = manager.set_variables(&[set_request(
            "ChargingStation",
            "HeartbeatInterval",
            "not-a-number",
        )]);
        assert_eq!(results[0].attribute_status, SetVariableStatusEnumType::Rejected);
        assert_eq!(
            results[0].attribute_status_info.as_ref().unwrap().reason_code,
            "PropertyConstraintViolation"
        );
    }

    #[test]
    fn items_limit_blankets_whole_batch() {
        let manager = VariableManager::new();
        manager.set_internal("ChargingStation", "ItemsPerMessageGetVariables", "2");

        let requests = vec![
            get_request("ChargingStation", "HeartbeatInterval"),
            get_request("ChargingStation", "WebSocketPingInterval"),
            get_request("ChargingStation", "MessageTimeout"),
        ];
        let results = manager.get_variables(&requests);
        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.attribute_status, GetVariableStatusEnumType::Rejected);
            assert_eq!(
                result.attribute_status_info.as_ref().unwrap().reason_code,
                "TooManyElements"
            );
        }
    }

    #[test]
    fn oversized_value_is_too_large() {
        let manager = VariableManager::new();
        manager.set_internal("ChargingStation", "ValueSize", "4");
        let results = manager.set_variables(&[set_request(
            "SecurityCtrlr",
            "OrganizationName",
            "LongerThanFour",
        )]);
        assert_eq!(results[0].attribute_status, SetVariableStatusEnumType::Rejected);
        assert_eq!(
            results[0].attribute_status_info.as_ref().unwrap().reason_code,
            "TooLargeElement"
        );
    }

    #[test]
    fn runtime_overrides_revert_non_persistent_values() {
        let manager = VariableManager::new();
        let results = manager.set_variables(&[set_request("TxCtrlr", "TxUpdatedInterval", "10")]);
        assert_eq!(results[0].attribute_status, SetVariableStatusEnumType::Accepted);
        assert_eq!(manager.int_of("TxCtrlr", "TxUpdatedInterval"), Some(10));

        manager.reset_runtime_overrides();
        assert_eq!(manager.int_of("TxCtrlr", "TxUpdatedInterval"), Some(30));

        // Persistent values survive.
        manager.set_variables(&[set_request("ChargingStation", "HeartbeatInterval", "90")]);
        manager.reset_runtime_overrides();
        assert_eq!(
            manager.int_of("ChargingStation", "HeartbeatInterval"),
            Some(90)
        );
    }

    #[test]
    fn get_instance_constraint_ranks_below_attribute_support() {
        let manager = VariableManager::new();

        // Both violated at once: the unsupported attribute type wins.
        let mut request = get_request("TariffCostCtrlr", "TariffFallbackMessage");
        request.attribute_type = Some(AttributeEnumType::Target);
        let results = manager.get_variables(&[request]);
        assert_eq!(
            results[0].attribute_status,
            GetVariableStatusEnumType::NotSupportedAttributeType
        );
        assert!(results[0].attribute_value.is_none());

        // Only the instance missing.
        let results =
            manager.get_variables(&[get_request("TariffCostCtrlr", "TariffFallbackMessage")]);
        assert_eq!(
            results[0].attribute_status,
            GetVariableStatusEnumType::UnknownVariable
        );
        assert!(results[0].attribute_value.is_none());

        // Instance present: resolves to the default.
        let mut request = get_request("TariffCostCtrlr", "TariffFallbackMessage");
        request.variable.instance = Some("en".to_string());
        let results = manager.get_variables(&[request]);
        assert_eq!(results[0].attribute_status, GetVariableStatusEnumType::Accepted);
        assert_eq!(
            results[0].attribute_value.as_deref(),
            Some("Standard tariff applies")
        );
    }

    #[test]
    fn set_instance_constraint_ranks_below_mutability() {
        let manager = VariableManager::new();

        // Both violated at once: the unsupported attribute type wins.
        let mut request = set_request("TariffCostCtrlr", "TariffFallbackMessage", "text");
        request.attribute_type = Some(AttributeEnumType::MaxSet);
        let results = manager.set_variables(&[request]);
        assert_eq!(
            results[0].attribute_status,
            SetVariableStatusEnumType::NotSupportedAttributeType
        );

        // Only the instance missing.
        let results = manager.set_variables(&[set_request(
            "TariffCostCtrlr",
            "TariffFallbackMessage",
            "text",
        )]);
        assert_eq!(
            results[0].attribute_status,
            SetVariableStatusEnumType::UnknownVariable
        );

        // Instance present: stored and readable back under that instance.
        let mut request = set_request("TariffCostCtrlr", "TariffFallbackMessage", "Sondertarif");
        request.variable.instance = Some("de".to_string());
        let results = manager.set_variables(&[request]);
        assert_eq!(results[0].attribute_status, SetVariableStatusEnumType::Accepted);

        let mut read = get_request("TariffCostCtrlr", "TariffFallbackMessage");
        read.variable.instance = Some("de".to_string());
        let results = manager.get_variables(&[read]);
        assert_eq!(results[0].attribute_value.as_deref(), Some("Sondertarif"));
    }

    #[test]
    fn persisted_roundtrip() {
        let manager = VariableManager::new();
        manager.set_variables(&[set_request("ChargingStation", "HeartbeatInterval", "120")]);
        let records = manager.persisted_attributes();
        assert_eq!(records.len(), 1);

        let restored = VariableManager::new();
        restored.load_persisted(records);
        assert_eq!(
            restored.int_of("ChargingStation", "HeartbeatInterval"),
            Some(120)
        );
    }

    #[test]
    fn effective_value_size_prefers_smaller_positive() {
        let manager = VariableManager::new();
        assert_eq!(manager.effective_value_size(), 2500);
        manager.set_internal("ChargingStation", "ConfigurationValueSize", "1000");
        assert_eq!(manager.effective_value_size(), 1000);
        manager.set_internal("ChargingStation", "ValueSize", "0");
        assert_eq!(manager.effective_value_size(), 1000);
        manager.set_internal("ChargingStation", "ConfigurationValueSize", "0");
        assert_eq!(manager.effective_value_size(), DEFAULT_VALUE_SIZE_LIMIT);
    }
}
