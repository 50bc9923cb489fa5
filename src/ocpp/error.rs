//! OCPP wire error codes and the typed CALL_ERROR carrier
//!
//! An [`OcppError`] is a value, not an exception: inbound it is produced by
//! the command dispatcher and serialized as a CALL_ERROR frame; outbound it
//! is the rejection a caller observes when the CSMS answers a CALL with a
//! CALL_ERROR.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::OcppVersion;

/// OCPP-J error codes, covering both the 1.6 and 2.0.1 vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcppErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    SecurityError,
    /// Payload is syntactically incorrect. Spelled `FormationViolation` in
    /// 1.6 and `FormatViolation` in 2.0.1.
    FormatViolation,
    PropertyConstraintViolation,
    OccurrenceConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

impl OcppErrorCode {
    /// The wire spelling of this code for the given protocol version.
    pub fn as_wire_str(&self, version: OcppVersion) -> &'static str {
        match self {
            Self::NotImplemented => "NotImplemented",
            Self::NotSupported => "NotSupported",
            Self::InternalError => "InternalError",
            Self::ProtocolError => "ProtocolError",
            Self::SecurityError => "SecurityError",
            Self::FormatViolation => match version {
                OcppVersion::V16 => "FormationViolation",
                OcppVersion::V201 => "FormatViolation",
            },
            Self::PropertyConstraintViolation => "PropertyConstraintViolation",
            Self::OccurrenceConstraintViolation => "OccurenceConstraintViolation",
            Self::TypeConstraintViolation => "TypeConstraintViolation",
            Self::GenericError => "GenericError",
        }
    }
}

impl fmt::Display for OcppErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A typed OCPP error, emitted on the wire as a CALL_ERROR frame.
#[derive(Debug, Clone, Error)]
#[error("{code}: {description}")]
pub struct OcppError {
    pub code: OcppErrorCode,
    pub description: String,
    pub details: Value,
}

impl OcppError {
    pub fn new(code: OcppErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            details: Value::Object(Default::default()),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn not_implemented(action: &str) -> Self {
        Self::new(
            OcppErrorCode::NotImplemented,
            format!("Requested action '{action}' is not known by this charging station"),
        )
    }

    pub fn not_supported(action: &str) -> Self {
        Self::new(
            OcppErrorCode::NotSupported,
            format!("Requested action '{action}' is recognized but not supported"),
        )
    }

    pub fn format_violation(description: impl Into<String>) -> Self {
        Self::new(OcppErrorCode::FormatViolation, description)
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(OcppErrorCode::InternalError, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_violation_spelling_tracks_version() {
        let code = OcppErrorCode::FormatViolation;
        assert_eq!(code.as_wire_str(OcppVersion::V16), "FormationViolation");
        assert_eq!(code.as_wire_str(OcppVersion::V201), "FormatViolation");
    }
}
