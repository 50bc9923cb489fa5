//! Station-initiated OCPP 2.0.1 requests
//!
//! TransactionEvent replaces the 1.6 Start/StopTransaction pair; the
//! builders here own the seq_no bookkeeping rules (0 on Started, evse and
//! idToken only on Started).

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use rust_ocpp::v2_0_1::datatypes::charging_station_type::ChargingStationType;
use rust_ocpp::v2_0_1::datatypes::evse_type::EVSEType;
use rust_ocpp::v2_0_1::datatypes::meter_value_type::MeterValueType;
use rust_ocpp::v2_0_1::datatypes::transaction_type::TransactionType;
use rust_ocpp::v2_0_1::enumerations::boot_reason_enum_type::BootReasonEnumType;
use rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType;
use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::reason_enum_type::ReasonEnumType;
use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;
use rust_ocpp::v2_0_1::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v2_0_1::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v2_0_1::messages::heartbeat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v2_0_1::messages::sign_certificate::{
    SignCertificateRequest, SignCertificateResponse,
};
use rust_ocpp::v2_0_1::messages::status_notification::StatusNotificationRequest;
use rust_ocpp::v2_0_1::messages::transaction_event::{
    TransactionEventRequest, TransactionEventResponse,
};

use crate::auth::adapter::v201 as auth_adapter;
use crate::auth::UnifiedIdentifier;
use crate::session::SessionHandle;
use crate::shared::SessionError;
use crate::station::info::StationInfo;

fn encode<T: serde::Serialize>(request: &T) -> Result<Value, SessionError> {
    serde_json::to_value(request).map_err(SessionError::Serialization)
}

fn decode<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, SessionError> {
    serde_json::from_value(payload).map_err(SessionError::Serialization)
}

pub fn boot_notification_payload(info: &StationInfo) -> Result<Value, SessionError> {
    encode(&BootNotificationRequest {
        charging_station: ChargingStationType {
            model: info.charge_point_model.clone(),
            vendor_name: info.charge_point_vendor.clone(),
            firmware_version: info.firmware_version.clone(),
            serial_number: info.charge_point_serial_number.clone(),
            modem: None,
        },
        reason: BootReasonEnumType::PowerUp,
    })
}

pub async fn boot_notification(
    session: &SessionHandle,
    info: &StationInfo,
) -> Result<BootNotificationResponse, SessionError> {
    info!(station_id = info.station_id.as_str(), "Sending BootNotification");
    let response = session
        .call("BootNotification", boot_notification_payload(info)?)
        .await?;
    decode(response)
}

pub async fn heartbeat(session: &SessionHandle) -> Result<HeartbeatResponse, SessionError> {
    let response = session.call("Heartbeat", encode(&HeartbeatRequest {})?).await?;
    decode(response)
}

pub async fn authorize(
    session: &SessionHandle,
    identifier: &UnifiedIdentifier,
) -> Result<AuthorizeResponse, SessionError> {
    let response = session
        .call(
            "Authorize",
            encode(&AuthorizeRequest {
                certificate: None,
                id_token: auth_adapter::to_id_token(identifier),
                iso_15118_certificate_hash_data: None,
            })?,
        )
        .await?;
    decode(response)
}

pub fn status_notification_payload(
    evse_id: u32,
    connector_id: u32,
    status: ConnectorStatusEnumType,
) -> Result<Value, SessionError> {
    encode(&StatusNotificationRequest {
        timestamp: Utc::now(),
        connector_status: status,
        evse_id: evse_id as i32,
        connector_id: connector_id as i32,
    })
}

pub async fn status_notification(
    session: &SessionHandle,
    evse_id: u32,
    connector_id: u32,
    status: ConnectorStatusEnumType,
) -> Result<(), SessionError> {
    let payload = status_notification_payload(evse_id, connector_id, status)?;
    session.call("StatusNotification", payload).await?;
    Ok(())
}

/// Everything a TransactionEvent needs beyond the transaction itself.
pub struct TransactionEventParts {
    pub event_type: TransactionEventEnumType,
    pub trigger_reason: TriggerReasonEnumType,
    pub seq_no: u64,
    pub transaction_id: String,
    pub charging_state: Option<ChargingStateEnumType>,
    pub stopped_reason: Option<ReasonEnumType>,
    pub remote_start_id: Option<i32>,
    /// Only set on the Started event.
    pub evse: Option<(u32, u32)>,
    /// Only set on the Started event.
    pub id_token: Option<UnifiedIdentifier>,
    pub meter_value: Option<Vec<MeterValueType>>,
    pub offline: bool,
}

pub fn transaction_event_payload(parts: &TransactionEventParts) -> Result<Value, SessionError> {
    encode(&TransactionEventRequest {
        event_type: parts.event_type.clone(),
        timestamp: Utc::now(),
        trigger_reason: parts.trigger_reason.clone(),
        seq_no: parts.seq_no as i32,
        offline: parts.offline.then_some(true),
        number_of_phases_used: None,
        cable_max_current: None,
        reservation_id: None,
        transaction_info: TransactionType {
            transaction_id: parts.transaction_id.clone(),
            charging_state: parts.charging_state.clone(),
            time_spent_charging: None,
            stopped_reason: parts.stopped_reason.clone(),
            remote_start_id: parts.remote_start_id,
        },
        id_token: parts
            .id_token
            .as_ref()
            .map(auth_adapter::to_id_token),
        evse: parts.evse.map(|(evse_id, connector_id)| EVSEType {
            id: evse_id as i32,
            connector_id: Some(connector_id as i32),
        }),
        meter_value: parts.meter_value.clone(),
    })
}

pub async fn transaction_event(
    session: &SessionHandle,
    payload: Value,
) -> Result<TransactionEventResponse, SessionError> {
    let response = session.call("TransactionEvent", payload).await?;
    decode(response)
}

pub fn parse_transaction_event_response(
    payload: Value,
) -> Result<TransactionEventResponse, SessionError> {
    decode(payload)
}

pub async fn sign_certificate(
    session: &SessionHandle,
    csr: String,
) -> Result<SignCertificateResponse, SessionError> {
    let response = session
        .call(
            "SignCertificate",
            encode(&SignCertificateRequest {
                csr,
                certificate_type: None,
            })?,
        )
        .await?;
    decode(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_event_carries_evse_and_token_with_seq_zero() {
        let parts = TransactionEventParts {
            event_type: TransactionEventEnumType::Started,
            trigger_reason: TriggerReasonEnumType::Authorized,
            seq_no: 0,
            transaction_id: "tx-1".into(),
            charging_state: Some(ChargingStateEnumType::Charging),
            stopped_reason: None,
            remote_start_id: None,
            evse: Some((1, 1)),
            id_token: Some(UnifiedIdentifier::central("TAG")),
            meter_value: None,
            offline: false,
        };
        let payload = transaction_event_payload(&parts).unwrap();
        assert_eq!(payload["eventType"], "Started");
        assert_eq!(payload["seqNo"], 0);
        assert_eq!(payload["evse"]["id"], 1);
        assert_eq!(payload["idToken"]["idToken"], "TAG");
        assert!(payload.get("offline").is_none());
    }

    #[test]
    fn updated_event_omits_evse_and_token() {
        let parts = TransactionEventParts {
            event_type: TransactionEventEnumType::Updated,
            trigger_reason: TriggerReasonEnumType::MeterValuePeriodic,
            seq_no: 3,
            transaction_id: "tx-1".into(),
            charging_state: Some(ChargingStateEnumType::Charging),
            stopped_reason: None,
            remote_start_id: None,
            evse: None,
            id_token: None,
            meter_value: None,
            offline: true,
        };
        let payload = transaction_event_payload(&parts).unwrap();
        assert_eq!(payload["seqNo"], 3);
        assert!(payload.get("evse").is_none());
        assert!(payload.get("idToken").is_none());
        assert_eq!(payload["offline"], true);
    }
}
