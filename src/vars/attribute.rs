//! Variable attribute model
//!
//! A variable is addressed by (component, instance, evse) + (name, instance)
//! and owns up to four attributes (Actual/Target/MinSet/MaxSet), each with
//! its own mutability, persistence and reboot semantics.

use rust_ocpp::v2_0_1::enumerations::attribute_enum_type::AttributeEnumType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Actual,
    Target,
    MinSet,
    MaxSet,
}

impl AttributeType {
    pub fn from_wire(attribute: &AttributeEnumType) -> Self {
        match attribute {
            AttributeEnumType::Actual => Self::Actual,
            AttributeEnumType::Target => Self::Target,
            AttributeEnumType::MinSet => Self::MinSet,
            AttributeEnumType::MaxSet => Self::MaxSet,
        }
    }

    pub fn to_wire(self) -> AttributeEnumType {
        match self {
            Self::Actual => AttributeEnumType::Actual,
            Self::Target => AttributeEnumType::Target,
            Self::MinSet => AttributeEnumType::MinSet,
            Self::MaxSet => AttributeEnumType::MaxSet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutability {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Value syntax accepted by an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableDataType {
    String,
    Decimal,
    Integer,
    DateTime,
    Boolean,
    OptionList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Allowed values for `OptionList`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values_list: Option<Vec<String>>,
}

impl VariableConstraints {
    /// Check `value` against the data type and limits. Returns the failure
    /// reason, `None` when the value is acceptable.
    pub fn violation(&self, data_type: VariableDataType, value: &str) -> Option<&'static str> {
        match data_type {
            VariableDataType::String => {}
            VariableDataType::Boolean => {
                if !matches!(value, "true" | "false") {
                    return Some("expected 'true' or 'false'");
                }
            }
            VariableDataType::Integer => {
                let parsed: i64 = match value.parse() {
                    Ok(v) => v,
                    Err(_) => return Some("expected an integer"),
                };
                if self.min_limit.is_some_and(|min| (parsed as f64) < min) {
                    return Some("below minimum");
                }
                if self.max_limit.is_some_and(|max| (parsed as f64) > max) {
                    return Some("above maximum");
                }
            }
            VariableDataType::Decimal => {
                let parsed: f64 = match value.parse() {
                    Ok(v) => v,
                    Err(_) => return Some("expected a decimal"),
                };
                if self.min_limit.is_some_and(|min| parsed < min) {
                    return Some("below minimum");
                }
                if self.max_limit.is_some_and(|max| parsed > max) {
                    return Some("above maximum");
                }
            }
            VariableDataType::DateTime => {
                if chrono::DateTime::parse_from_rfc3339(value).is_err() {
                    return Some("expected an RFC 3339 date-time");
                }
            }
            VariableDataType::OptionList => {
                if let Some(values) = &self.values_list {
                    if !values.iter().any(|v| v == value) {
                        return Some("not in the allowed value list");
                    }
                }
            }
        }

        if self.max_length.is_some_and(|max| value.len() > max) {
            return Some("value too long");
        }
        None
    }
}

/// Static description of one attribute of one variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub attribute_type: AttributeType,
    pub mutability: Mutability,
    /// Survives `reset_runtime_overrides()`.
    pub persistent: bool,
    /// Writes answer `RebootRequired` instead of `Accepted`.
    pub reboot_required: bool,
    /// Writes answer `Rejected(ImmutableVariable)`.
    pub immutable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl AttributeDefinition {
    pub fn actual(default_value: Option<&str>) -> Self {
        Self {
            attribute_type: AttributeType::Actual,
            mutability: Mutability::ReadWrite,
            persistent: true,
            reboot_required: false,
            immutable: false,
            default_value: default_value.map(str::to_string),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.mutability = Mutability::ReadOnly;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.mutability = Mutability::WriteOnly;
        self
    }

    pub fn reboot_required(mut self) -> Self {
        self.reboot_required = true;
        self
    }

    pub fn volatile(mut self) -> Self {
        self.persistent = false;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}

/// Static description of a variable and its attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub component: String,
    pub variable: String,
    /// The variable only exists with an instance qualifier.
    pub instance_required: bool,
    pub data_type: VariableDataType,
    #[serde(default)]
    pub constraints: VariableConstraints,
    pub attributes: Vec<AttributeDefinition>,
}

impl VariableDefinition {
    pub fn attribute(&self, attribute_type: AttributeType) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|a| a.attribute_type == attribute_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_limits() {
        let constraints = VariableConstraints {
            min_limit: Some(1.0),
            max_limit: Some(86400.0),
            ..Default::default()
        };
        assert!(constraints.violation(VariableDataType::Integer, "30").is_none());
        assert!(constraints.violation(VariableDataType::Integer, "0").is_some());
        assert!(constraints.violation(VariableDataType::Integer, "90000").is_some());
        assert!(constraints.violation(VariableDataType::Integer, "abc").is_some());
    }

    #[test]
    fn boolean_syntax() {
        let constraints = VariableConstraints::default();
        assert!(constraints.violation(VariableDataType::Boolean, "true").is_none());
        assert!(constraints.violation(VariableDataType::Boolean, "TRUE").is_some());
    }

    #[test]
    fn option_list_membership() {
        let constraints = VariableConstraints {
            values_list: Some(vec!["A".into(), "B".into()]),
            ..Default::default()
        };
        assert!(constraints.violation(VariableDataType::OptionList, "A").is_none());
        assert!(constraints.violation(VariableDataType::OptionList, "C").is_some());
    }
}
