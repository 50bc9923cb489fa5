//! Strict-compliance payload validation
//!
//! Every OCPP payload that crosses the wire can be checked against the typed
//! message models, keyed by (version, action, direction). Inbound CALLs that
//! fail validation are answered with a `FormationViolation` /
//! `FormatViolation` CALL_ERROR; outbound violations are our own bug and are
//! logged by the caller.
//!
//! Validation is a typed round-trip: deserializing into the corresponding
//! model enforces required fields, enum values and field types. Actions
//! without a model registered here pass through unchecked.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{OcppError, OcppVersion};

/// Whether a payload is a request (CALL) or a response (CALL_RESULT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

fn check<T: DeserializeOwned>(payload: &Value) -> Result<(), OcppError> {
    serde_json::from_value::<T>(payload.clone())
        .map(|_| ())
        .map_err(|e| OcppError::format_violation(e.to_string()))
}

/// Validate `payload` for `action` against the typed OCPP message models.
pub fn validate_payload(
    version: OcppVersion,
    action: &str,
    direction: Direction,
    payload: &Value,
) -> Result<(), OcppError> {
    match version {
        OcppVersion::V16 => validate_v16(action, direction, payload),
        OcppVersion::V201 => validate_v201(action, direction, payload),
    }
}

fn validate_v16(action: &str, direction: Direction, payload: &Value) -> Result<(), OcppError> {
    use rust_ocpp::v1_6::messages::*;
    use Direction::*;

    match (action, direction) {
        ("BootNotification", Request) => {
            check::<boot_notification::BootNotificationRequest>(payload)
        }
        ("BootNotification", Response) => {
            check::<boot_notification::BootNotificationResponse>(payload)
        }
        ("Heartbeat", Request) => check::<heart_beat::HeartbeatRequest>(payload),
        ("Heartbeat", Response) => check::<heart_beat::HeartbeatResponse>(payload),
        ("Authorize", Request) => check::<authorize::AuthorizeRequest>(payload),
        ("Authorize", Response) => check::<authorize::AuthorizeResponse>(payload),
        ("StartTransaction", Request) => {
            check::<start_transaction::StartTransactionRequest>(payload)
        }
        ("StartTransaction", Response) => {
            check::<start_transaction::StartTransactionResponse>(payload)
        }
        ("StopTransaction", Request) => check::<stop_transaction::StopTransactionRequest>(payload),
        ("StopTransaction", Response) => {
            check::<stop_transaction::StopTransactionResponse>(payload)
        }
        ("MeterValues", Request) => check::<meter_values::MeterValuesRequest>(payload),
        ("MeterValues", Response) => check::<meter_values::MeterValuesResponse>(payload),
        ("StatusNotification", Request) => {
            check::<status_notification::StatusNotificationRequest>(payload)
        }
        ("StatusNotification", Response) => {
            check::<status_notification::StatusNotificationResponse>(payload)
        }
        ("DataTransfer", Request) => check::<data_transfer::DataTransferRequest>(payload),
        ("DataTransfer", Response) => check::<data_transfer::DataTransferResponse>(payload),
        ("FirmwareStatusNotification", Request) => {
            check::<firmware_status_notification::FirmwareStatusNotificationRequest>(payload)
        }
        ("Reset", Request) => check::<reset::ResetRequest>(payload),
        ("Reset", Response) => check::<reset::ResetResponse>(payload),
        ("UnlockConnector", Request) => check::<unlock_connector::UnlockConnectorRequest>(payload),
        ("UnlockConnector", Response) => {
            check::<unlock_connector::UnlockConnectorResponse>(payload)
        }
        ("ChangeAvailability", Request) => {
            check::<change_availability::ChangeAvailabilityRequest>(payload)
        }
        ("ChangeAvailability", Response) => {
            check::<change_availability::ChangeAvailabilityResponse>(payload)
        }
        ("ChangeConfiguration", Request) => {
            check::<change_configuration::ChangeConfigurationRequest>(payload)
        }
        ("ChangeConfiguration", Response) => {
            check::<change_configuration::ChangeConfigurationResponse>(payload)
        }
        ("GetConfiguration", Request) => {
            check::<get_configuration::GetConfigurationRequest>(payload)
        }
        ("GetConfiguration", Response) => {
            check::<get_configuration::GetConfigurationResponse>(payload)
        }
        ("RemoteStartTransaction", Request) => {
            check::<remote_start_transaction::RemoteStartTransactionRequest>(payload)
        }
        ("RemoteStartTransaction", Response) => {
            check::<remote_start_transaction::RemoteStartTransactionResponse>(payload)
        }
        ("RemoteStopTransaction", Request) => {
            check::<remote_stop_transaction::RemoteStopTransactionRequest>(payload)
        }
        ("RemoteStopTransaction", Response) => {
            check::<remote_stop_transaction::RemoteStopTransactionResponse>(payload)
        }
        ("TriggerMessage", Request) => check::<trigger_message::TriggerMessageRequest>(payload),
        ("TriggerMessage", Response) => check::<trigger_message::TriggerMessageResponse>(payload),
        ("ReserveNow", Request) => check::<reserve_now::ReserveNowRequest>(payload),
        ("ReserveNow", Response) => check::<reserve_now::ReserveNowResponse>(payload),
        ("CancelReservation", Request) => {
            check::<cancel_reservation::CancelReservationRequest>(payload)
        }
        ("CancelReservation", Response) => {
            check::<cancel_reservation::CancelReservationResponse>(payload)
        }
        ("SendLocalList", Request) => check::<send_local_list::SendLocalListRequest>(payload),
        ("SendLocalList", Response) => check::<send_local_list::SendLocalListResponse>(payload),
        ("GetLocalListVersion", Request) => {
            check::<get_local_list_version::GetLocalListVersionRequest>(payload)
        }
        ("GetLocalListVersion", Response) => {
            check::<get_local_list_version::GetLocalListVersionResponse>(payload)
        }
        ("ClearCache", Request) => check::<clear_cache::ClearCacheRequest>(payload),
        ("ClearCache", Response) => check::<clear_cache::ClearCacheResponse>(payload),
        _ => Ok(()),
    }
}

fn validate_v201(action: &str, direction: Direction, payload: &Value) -> Result<(), OcppError> {
    use rust_ocpp::v2_0_1::messages::*;
    use Direction::*;

    match (action, direction) {
        ("BootNotification", Request) => {
            check::<boot_notification::BootNotificationRequest>(payload)
        }
        ("BootNotification", Response) => {
            check::<boot_notification::BootNotificationResponse>(payload)
        }
        ("Heartbeat", Request) => check::<heartbeat::HeartbeatRequest>(payload),
        ("Heartbeat", Response) => check::<heartbeat::HeartbeatResponse>(payload),
        ("Authorize", Request) => check::<authorize::AuthorizeRequest>(payload),
        ("Authorize", Response) => check::<authorize::AuthorizeResponse>(payload),
        ("TransactionEvent", Request) => {
            check::<transaction_event::TransactionEventRequest>(payload)
        }
        ("TransactionEvent", Response) => {
            check::<transaction_event::TransactionEventResponse>(payload)
        }
        ("StatusNotification", Request) => {
            check::<status_notification::StatusNotificationRequest>(payload)
        }
        ("StatusNotification", Response) => {
            check::<status_notification::StatusNotificationResponse>(payload)
        }
        ("MeterValues", Request) => check::<meter_values::MeterValuesRequest>(payload),
        ("MeterValues", Response) => check::<meter_values::MeterValuesResponse>(payload),
        ("DataTransfer", Request) => check::<datatransfer::DataTransferRequest>(payload),
        ("DataTransfer", Response) => check::<datatransfer::DataTransferResponse>(payload),
        ("Reset", Request) => check::<reset::ResetRequest>(payload),
        ("Reset", Response) => check::<reset::ResetResponse>(payload),
        ("UnlockConnector", Request) => check::<unlock_connector::UnlockConnectorRequest>(payload),
        ("UnlockConnector", Response) => {
            check::<unlock_connector::UnlockConnectorResponse>(payload)
        }
        ("ChangeAvailability", Request) => {
            check::<change_availability::ChangeAvailabilityRequest>(payload)
        }
        ("ChangeAvailability", Response) => {
            check::<change_availability::ChangeAvailabilityResponse>(payload)
        }
        ("RequestStartTransaction", Request) => {
            check::<request_start_transaction::RequestStartTransactionRequest>(payload)
        }
        ("RequestStartTransaction", Response) => {
            check::<request_start_transaction::RequestStartTransactionResponse>(payload)
        }
        ("RequestStopTransaction", Request) => {
            check::<request_stop_transaction::RequestStopTransactionRequest>(payload)
        }
        ("RequestStopTransaction", Response) => {
            check::<request_stop_transaction::RequestStopTransactionResponse>(payload)
        }
        ("GetVariables", Request) => check::<get_variables::GetVariablesRequest>(payload),
        ("GetVariables", Response) => check::<get_variables::GetVariablesResponse>(payload),
        ("SetVariables", Request) => check::<set_variables::SetVariablesRequest>(payload),
        ("SetVariables", Response) => check::<set_variables::SetVariablesResponse>(payload),
        ("TriggerMessage", Request) => check::<trigger_message::TriggerMessageRequest>(payload),
        ("TriggerMessage", Response) => check::<trigger_message::TriggerMessageResponse>(payload),
        ("ReserveNow", Request) => check::<reserve_now::ReserveNowRequest>(payload),
        ("ReserveNow", Response) => check::<reserve_now::ReserveNowResponse>(payload),
        ("CancelReservation", Request) => {
            check::<cancel_reservation::CancelReservationRequest>(payload)
        }
        ("CancelReservation", Response) => {
            check::<cancel_reservation::CancelReservationResponse>(payload)
        }
        ("SendLocalList", Request) => check::<send_local_list::SendLocalListRequest>(payload),
        ("SendLocalList", Response) => check::<send_local_list::SendLocalListResponse>(payload),
        ("GetLocalListVersion", Request) => {
            check::<get_local_list_version::GetLocalListVersionRequest>(payload)
        }
        ("GetLocalListVersion", Response) => {
            check::<get_local_list_version::GetLocalListVersionResponse>(payload)
        }
        ("ClearCache", Request) => check::<clear_cache::ClearCacheRequest>(payload),
        ("ClearCache", Response) => check::<clear_cache::ClearCacheResponse>(payload),
        ("CertificateSigned", Request) => {
            check::<certificate_signed::CertificateSignedRequest>(payload)
        }
        ("CertificateSigned", Response) => {
            check::<certificate_signed::CertificateSignedResponse>(payload)
        }
        ("InstallCertificate", Request) => {
            check::<install_certificate::InstallCertificateRequest>(payload)
        }
        ("InstallCertificate", Response) => {
            check::<install_certificate::InstallCertificateResponse>(payload)
        }
        ("DeleteCertificate", Request) => {
            check::<delete_certificate::DeleteCertificateRequest>(payload)
        }
        ("DeleteCertificate", Response) => {
            check::<delete_certificate::DeleteCertificateResponse>(payload)
        }
        ("SignCertificate", Request) => check::<sign_certificate::SignCertificateRequest>(payload),
        ("SignCertificate", Response) => {
            check::<sign_certificate::SignCertificateResponse>(payload)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_valid_v16_boot_notification() {
        let payload = json!({"chargePointVendor": "V", "chargePointModel": "M"});
        assert!(
            validate_payload(OcppVersion::V16, "BootNotification", Direction::Request, &payload)
                .is_ok()
        );
    }

    #[test]
    fn rejects_v16_boot_notification_missing_vendor() {
        let payload = json!({"chargePointModel": "M"});
        let err = validate_payload(
            OcppVersion::V16,
            "BootNotification",
            Direction::Request,
            &payload,
        )
        .unwrap_err();
        assert_eq!(err.code, crate::ocpp::OcppErrorCode::FormatViolation);
    }

    #[test]
    fn rejects_v201_reset_with_bad_type() {
        let payload = json!({"type": "Warm"});
        assert!(
            validate_payload(OcppVersion::V201, "Reset", Direction::Request, &payload).is_err()
        );
    }

    #[test]
    fn unknown_action_passes_through() {
        let payload = json!({"anything": true});
        assert!(
            validate_payload(OcppVersion::V16, "FutureAction", Direction::Request, &payload)
                .is_ok()
        );
    }
}
