//! Control-plane wire protocol
//!
//! Request frames are `[id, procedure, payload]`, responses `[id, result]`;
//! events broadcast to subscribers are plain JSON objects. Subprotocols
//! `ui0.0.1` and `ui0.0.2` share this framing.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

pub const UI_SUBPROTOCOLS: [&str; 2] = ["ui0.0.1", "ui0.0.2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureName {
    StartChargingStation,
    StopChargingStation,
    OpenConnection,
    CloseConnection,
    StartTransaction,
    StopTransaction,
    StartAutomaticTransactionGenerator,
    StopAutomaticTransactionGenerator,
    StatusNotification,
    ListTemplates,
}

impl ProcedureName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartChargingStation => "startChargingStation",
            Self::StopChargingStation => "stopChargingStation",
            Self::OpenConnection => "openConnection",
            Self::CloseConnection => "closeConnection",
            Self::StartTransaction => "startTransaction",
            Self::StopTransaction => "stopTransaction",
            Self::StartAutomaticTransactionGenerator => "startAutomaticTransactionGenerator",
            Self::StopAutomaticTransactionGenerator => "stopAutomaticTransactionGenerator",
            Self::StatusNotification => "statusNotification",
            Self::ListTemplates => "listTemplates",
        }
    }
}

impl FromStr for ProcedureName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "startChargingStation" => Self::StartChargingStation,
            "stopChargingStation" => Self::StopChargingStation,
            "openConnection" => Self::OpenConnection,
            "closeConnection" => Self::CloseConnection,
            "startTransaction" => Self::StartTransaction,
            "stopTransaction" => Self::StopTransaction,
            "startAutomaticTransactionGenerator" => Self::StartAutomaticTransactionGenerator,
            "stopAutomaticTransactionGenerator" => Self::StopAutomaticTransactionGenerator,
            "statusNotification" => Self::StatusNotification,
            "listTemplates" => Self::ListTemplates,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for ProcedureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common payload: which stations a procedure targets (all when absent).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPayload {
    #[serde(default)]
    pub hash_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionPayload {
    #[serde(default)]
    pub hash_ids: Option<Vec<String>>,
    #[serde(default)]
    pub connector_id: Option<u32>,
    #[serde(default)]
    pub id_tag: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTransactionPayload {
    #[serde(default)]
    pub hash_ids: Option<Vec<String>>,
    #[serde(default)]
    pub transaction_id: Option<Value>,
}

impl StopTransactionPayload {
    /// 1.6 sends integers, 2.0.1 strings; normalize to the wire string.
    pub fn transaction_id_string(&self) -> Option<String> {
        match &self.transaction_id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct UiRequest {
    pub id: String,
    pub procedure: String,
    pub payload: Value,
}

pub fn parse_request(text: &str) -> Result<UiRequest, String> {
    let frame: Vec<Value> =
        serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
    if frame.len() < 2 {
        return Err("request frame needs [id, procedure, payload]".to_string());
    }
    let id = frame[0]
        .as_str()
        .ok_or("request id must be a string")?
        .to_string();
    let procedure = frame[1]
        .as_str()
        .ok_or("procedure must be a string")?
        .to_string();
    let payload = frame.get(2).cloned().unwrap_or(Value::Object(Default::default()));
    Ok(UiRequest {
        id,
        procedure,
        payload,
    })
}

pub fn encode_response(id: &str, result: Value) -> String {
    // Serializing owned values cannot fail.
    serde_json::to_string(&serde_json::json!([id, result])).unwrap()
}

pub fn accepts_ui_subprotocol(offer: &str) -> Option<&'static str> {
    offer
        .split(',')
        .map(str::trim)
        .find_map(|candidate| UI_SUBPROTOCOLS.iter().find(|p| **p == candidate).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_request_frames() {
        let request =
            parse_request(r#"["req-1","startTransaction",{"connectorId":1,"idTag":"T"}]"#).unwrap();
        assert_eq!(request.id, "req-1");
        assert_eq!(request.procedure, "startTransaction");
        assert_eq!(request.payload["connectorId"], 1);

        // Payload may be omitted.
        let bare = parse_request(r#"["req-2","statusNotification"]"#).unwrap();
        assert!(bare.payload.is_object());

        assert!(parse_request("[]").is_err());
        assert!(parse_request(r#"[1,"x"]"#).is_err());
    }

    #[test]
    fn encodes_response_frames() {
        let text = encode_response("req-1", json!({"status": "success"}));
        let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0], "req-1");
        assert_eq!(parsed[1]["status"], "success");
    }

    #[test]
    fn procedure_names_round_trip() {
        for name in [
            ProcedureName::StartChargingStation,
            ProcedureName::StopAutomaticTransactionGenerator,
            ProcedureName::StatusNotification,
        ] {
            assert_eq!(name.as_str().parse::<ProcedureName>(), Ok(name));
        }
        assert!("selfDestruct".parse::<ProcedureName>().is_err());
    }

    #[test]
    fn stop_transaction_id_normalizes() {
        let p: StopTransactionPayload =
            serde_json::from_value(json!({"transactionId": 42})).unwrap();
        assert_eq!(p.transaction_id_string().as_deref(), Some("42"));
        let p: StopTransactionPayload =
            serde_json::from_value(json!({"transactionId": "uuid-1"})).unwrap();
        assert_eq!(p.transaction_id_string().as_deref(), Some("uuid-1"));
    }

    #[test]
    fn subprotocol_negotiation_picks_known_offer() {
        assert_eq!(accepts_ui_subprotocol("ui0.0.1"), Some("ui0.0.1"));
        assert_eq!(accepts_ui_subprotocol("foo, ui0.0.2"), Some("ui0.0.2"));
        assert_eq!(accepts_ui_subprotocol("ocpp1.6"), None);
    }
}
