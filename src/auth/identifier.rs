//! Unified identifier model
//!
//! A single identifier type covers the 1.6 idTag and the 2.0.1 idToken so
//! the strategy chain and the ATG are version-agnostic; the version adapters
//! translate at the wire boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ocpp::OcppVersion;

/// The kind of credential behind an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierType {
    IdTag,
    Central,
    Local,
    #[serde(rename = "ISO14443")]
    Iso14443,
    #[serde(rename = "ISO15693")]
    Iso15693,
    KeyCode,
    EMaid,
    MacAddress,
    NoAuthorization,
}

/// Version-neutral authorization identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedIdentifier {
    #[serde(rename = "type")]
    pub kind: IdentifierType,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<OcppVersion>,
}

impl UnifiedIdentifier {
    pub fn new(kind: IdentifierType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            parent: None,
            additional_info: None,
            version: None,
        }
    }

    /// A plain 1.6-style id tag.
    pub fn id_tag(value: impl Into<String>) -> Self {
        Self::new(IdentifierType::IdTag, value)
    }

    /// A 2.0.1 central token.
    pub fn central(value: impl Into<String>) -> Self {
        Self::new(IdentifierType::Central, value)
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_version(mut self, version: OcppVersion) -> Self {
        self.version = Some(version);
        self
    }
}

/// Length bounds: 1–20 characters for OCPP 1.6 idTags, 1–36 for 2.0.1
/// idTokens.
pub fn is_valid_identifier(identifier: &UnifiedIdentifier, version: OcppVersion) -> bool {
    let len = identifier.value.chars().count();
    len >= 1 && len <= version.max_identifier_length()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_bounds_per_version() {
        let ok16 = UnifiedIdentifier::id_tag("A".repeat(20));
        let long16 = UnifiedIdentifier::id_tag("A".repeat(21));
        let empty = UnifiedIdentifier::id_tag("");

        assert!(is_valid_identifier(&ok16, OcppVersion::V16));
        assert!(!is_valid_identifier(&long16, OcppVersion::V16));
        assert!(!is_valid_identifier(&empty, OcppVersion::V16));

        let ok201 = UnifiedIdentifier::central("A".repeat(36));
        let long201 = UnifiedIdentifier::central("A".repeat(37));
        assert!(is_valid_identifier(&ok201, OcppVersion::V201));
        assert!(!is_valid_identifier(&long201, OcppVersion::V201));
        // a 21-char token is fine for 2.0.1 but not for 1.6
        let mid = UnifiedIdentifier::central("A".repeat(21));
        assert!(is_valid_identifier(&mid, OcppVersion::V201));
        assert!(!is_valid_identifier(&mid, OcppVersion::V16));
    }
}
