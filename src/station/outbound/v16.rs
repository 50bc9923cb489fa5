//! Station-initiated OCPP 1.6 requests
//!
//! Builders and senders for the CP→CS message set. Each function builds the
//! typed `rust_ocpp` request, sends it through the session and parses the
//! typed response.

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v1_6::messages::meter_values::MeterValuesRequest;
use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::messages::status_notification::StatusNotificationRequest;
use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use rust_ocpp::v1_6::types::{ChargePointErrorCode, ChargePointStatus, MeterValue, Reason};

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
        charge_point_vendor: info.charge_point_vendor.clone(),
        charge_point_model: info.charge_point_model.clone(),
        charge_point_serial_number: info.charge_point_serial_number.clone(),
        charge_box_serial_number: None,
        firmware_version: info.firmware_version.clone(),
        iccid: None,
        imsi: None,
        meter_type: info.meter_type.clone(),
        meter_serial_number: info.meter_serial_number.clone(),
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
    let response = session
        .call("Heartbeat", encode(&HeartbeatRequest {})?)
        .await?;
    decode(response)
}

pub async fn authorize(
    session: &SessionHandle,
    id_tag: &str,
) -> Result<AuthorizeResponse, SessionError> {
    let response = session
        .call(
            "Authorize",
            encode(&AuthorizeRequest {
                id_tag: id_tag.to_string(),
            })?,
        )
        .await?;
    decode(response)
}

pub fn status_notification_payload(
    connector_id: u32,
    status: ChargePointStatus,
) -> Result<Value, SessionError> {
    encode(&StatusNotificationRequest {
        connector_id,
        error_code: ChargePointErrorCode::NoError,
        info: None,
        status,
        timestamp: Some(Utc::now()),
        vendor_id: None,
        vendor_error_code: None,
    })
}

pub async fn status_notification(
    session: &SessionHandle,
    connector_id: u32,
    status: ChargePointStatus,
) -> Result<(), SessionError> {
    let payload = status_notification_payload(connector_id, status)?;
    session.call("StatusNotification", payload).await?;
    Ok(())
}

pub fn start_transaction_payload(
    connector_id: u32,
    id_tag: &str,
    meter_start_wh: f64,
    reservation_id: Option<i32>,
) -> Result<Value, SessionError> {
    encode(&StartTransactionRequest {
        connector_id,
        id_tag: id_tag.to_string(),
        meter_start: meter_start_wh.round() as i32,
        reservation_id,
        timestamp: Utc::now(),
    })
}

pub async fn start_transaction(
    session: &SessionHandle,
    payload: Value,
) -> Result<StartTransactionResponse, SessionError> {
    let response = session.call("StartTransaction", payload).await?;
    decode(response)
}

pub fn stop_transaction_payload(
    transaction_id: i32,
    id_tag: Option<&str>,
    meter_stop_wh: f64,
    reason: Option<Reason>,
) -> Result<Value, SessionError> {
    encode(&StopTransactionRequest {
        id_tag: id_tag.map(str::to_string),
        meter_stop: meter_stop_wh.round() as i32,
        timestamp: Utc::now(),
        transaction_id,
        reason,
        transaction_data: None,
    })
}

pub async fn stop_transaction(
    session: &SessionHandle,
    payload: Value,
) -> Result<StopTransactionResponse, SessionError> {
    let response = session.call("StopTransaction", payload).await?;
    decode(response)
}

pub fn meter_values_payload(
    connector_id: u32,
    transaction_id: Option<i32>,
    meter_value: Vec<MeterValue>,
) -> Result<Value, SessionError> {
    encode(&MeterValuesRequest {
        connector_id,
        transaction_id,
        meter_value,
    })
}

pub async fn meter_values(session: &SessionHandle, payload: Value) -> Result<(), SessionError> {
    session.call("MeterValues", payload).await?;
    Ok(())
}

/// Parse a StartTransaction response out of a drained offline send.
pub fn parse_start_transaction_response(
    payload: Value,
) -> Result<StartTransactionResponse, SessionError> {
    decode(payload)
}

/// Parse a StopTransaction response out of a drained offline send.
pub fn parse_stop_transaction_response(
    payload: Value,
) -> Result<StopTransactionResponse, SessionError> {
    decode(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_payload_carries_identity() {
        let template: crate::template::StationTemplate =
            serde_json::from_value(serde_json::json!({
                "baseName": "CS-OUT",
                "supervisionUrls": ["ws://localhost/ocpp"],
                "chargePointModel": "Simulator-1",
                "chargePointVendor": "Texnouz",
                "firmwareVersion": "1.2.3"
            }))
            .unwrap();
        let info = StationInfo::from_template(&template, "hash", 1);

        let payload = boot_notification_payload(&info).unwrap();
        assert_eq!(payload["chargePointModel"], "Simulator-1");
        assert_eq!(payload["chargePointVendor"], "Texnouz");
        assert_eq!(payload["firmwareVersion"], "1.2.3");
    }

    #[test]
    fn stop_payload_rounds_register() {
        let payload =
            stop_transaction_payload(7, Some("TAG"), 1234.56, Some(Reason::Remote)).unwrap();
        assert_eq!(payload["transactionId"], 7);
        assert_eq!(payload["meterStop"], 1235);
        assert_eq!(payload["reason"], "Remote");
    }
}
