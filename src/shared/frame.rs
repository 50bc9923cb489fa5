//! OCPP-J framing, station side
//!
//! The transport envelope is the same three-element family across OCPP 1.6
//! and 2.0.1: `[2,id,action,payload]`, `[3,id,payload]`,
//! `[4,id,code,description,details]`. Payloads stay raw `serde_json::Value`
//! so arbitrary key order survives the round trip untouched.
//!
//! Decoding distinguishes two failure tiers, because the station's duties
//! differ: a frame whose message id is recoverable ([`DecodeError::Malformed`])
//! can still be answered with a `FormationViolation` CALL_ERROR; a frame
//! without one ([`DecodeError::Garbage`]) can only be dropped.

use serde_json::{json, Value};
use thiserror::Error;

/// OCPP-J message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call,
    CallResult,
    CallError,
}

impl MessageType {
    pub fn code(self) -> u64 {
        match self {
            Self::Call => 2,
            Self::CallResult => 3,
            Self::CallError => 4,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            2 => Some(Self::Call),
            3 => Some(Self::CallResult),
            4 => Some(Self::CallError),
            _ => None,
        }
    }
}

/// A decoded OCPP-J frame (version-agnostic transport envelope).
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl OcppFrame {
    // ── Decoding ───────────────────────────────────────────

    /// Decode raw WebSocket text into a frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let fields: Vec<Value> = serde_json::from_str(text)
            .map_err(|e| DecodeError::Garbage(format!("not a JSON array: {e}")))?;

        let code = fields
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| DecodeError::Garbage("message type is not a number".into()))?;
        let kind = MessageType::from_code(code)
            .ok_or_else(|| DecodeError::Garbage(format!("unknown message type {code}")))?;

        // Without an id there is nothing to correlate or answer.
        let unique_id = fields
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::Garbage("unique id is not a string".into()))?
            .to_string();

        let frame = match kind {
            MessageType::Call => {
                let action = fields
                    .get(2)
                    .and_then(Value::as_str)
                    .ok_or_else(|| DecodeError::Malformed {
                        unique_id: unique_id.clone(),
                        detail: "action must be a string".into(),
                    })?
                    .to_string();
                let payload = fields.get(3).cloned().ok_or_else(|| DecodeError::Malformed {
                    unique_id: unique_id.clone(),
                    detail: "call payload is missing".into(),
                })?;
                Self::Call {
                    unique_id,
                    action,
                    payload,
                }
            }
            MessageType::CallResult => Self::CallResult {
                unique_id,
                payload: fields.get(2).cloned().unwrap_or_else(|| json!({})),
            },
            MessageType::CallError => Self::CallError {
                unique_id,
                error_code: fields
                    .get(2)
                    .and_then(Value::as_str)
                    .unwrap_or("InternalError")
                    .to_string(),
                error_description: fields
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                error_details: fields.get(4).cloned().unwrap_or_else(|| json!({})),
            },
        };
        Ok(frame)
    }

    // ── Encoding ───────────────────────────────────────────

    /// Encode this frame to wire text.
    pub fn encode(&self) -> String {
        let frame = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => json!([MessageType::Call.code(), unique_id, action, payload]),
            Self::CallResult { unique_id, payload } => {
                json!([MessageType::CallResult.code(), unique_id, payload])
            }
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => json!([
                MessageType::CallError.code(),
                unique_id,
                error_code,
                error_description,
                error_details
            ]),
        };
        frame.to_string()
    }

    // ── Helpers ────────────────────────────────────────────

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }

    /// A CALL_ERROR answering `unique_id`, with empty details.
    pub fn error_frame(
        unique_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: json!({}),
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────

/// Frame decode failures, split by whether the station can still answer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No message id to answer under; drop and log.
    #[error("unusable frame: {0}")]
    Garbage(String),

    /// Recoverable id; answer with a formation-violation CALL_ERROR.
    #[error("malformed frame {unique_id}: {detail}")]
    Malformed { unique_id: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_server_call() {
        let frame = OcppFrame::decode(r#"[2,"m1","Reset",{"type":"Immediate"}]"#).unwrap();
        match frame {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => {
                assert_eq!(unique_id, "m1");
                assert_eq!(action, "Reset");
                assert_eq!(payload["type"], "Immediate");
            }
            _ => panic!("expected a Call frame"),
        }
    }

    #[test]
    fn decodes_call_result_and_error() {
        let result = OcppFrame::decode(
            r#"[3,"m1",{"status":"Accepted","currentTime":"2024-01-01T00:00:00Z","interval":30}]"#,
        )
        .unwrap();
        match result {
            OcppFrame::CallResult { unique_id, payload } => {
                assert_eq!(unique_id, "m1");
                assert_eq!(payload["interval"], 30);
            }
            _ => panic!("expected a CallResult frame"),
        }

        let error =
            OcppFrame::decode(r#"[4,"m2","NotImplemented","Requested Action is not known",{}]"#)
                .unwrap();
        match error {
            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                ..
            } => {
                assert_eq!(unique_id, "m2");
                assert_eq!(error_code, "NotImplemented");
                assert_eq!(error_description, "Requested Action is not known");
            }
            _ => panic!("expected a CallError frame"),
        }
    }

    #[test]
    fn garbage_frames_cannot_be_answered() {
        for text in [
            "not json",
            "[]",
            r#"["2","m1","Reset",{}]"#,
            r#"[9,"m1",{}]"#,
            r#"[2,17,"Reset",{}]"#,
        ] {
            assert!(
                matches!(OcppFrame::decode(text), Err(DecodeError::Garbage(_))),
                "{text} should be garbage"
            );
        }
    }

    #[test]
    fn malformed_call_keeps_the_id_for_the_call_error_answer() {
        let err = OcppFrame::decode(r#"[2,"m7",42,{}]"#).unwrap_err();
        match err {
            DecodeError::Malformed { unique_id, .. } => assert_eq!(unique_id, "m7"),
            other => panic!("expected Malformed, got {other:?}"),
        }

        let err = OcppFrame::decode(r#"[2,"m8","Reset"]"#).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { unique_id, .. } if unique_id == "m8"));
    }

    #[test]
    fn roundtrip_preserves_payload_key_order() {
        let text = r#"[2,"m9","BootNotification",{"chargePointVendor":"V","chargePointModel":"M"}]"#;
        let frame = OcppFrame::decode(text).unwrap();
        let reparsed = OcppFrame::decode(&frame.encode()).unwrap();
        assert_eq!(frame, reparsed);
    }

    #[test]
    fn error_frame_roundtrip() {
        let frame = OcppFrame::error_frame("m3", "FormationViolation", "action must be a string");
        let decoded = OcppFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.unique_id(), "m3");
        assert!(matches!(decoded, OcppFrame::CallError { .. }));
    }
}
