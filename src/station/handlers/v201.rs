//! OCPP 2.0.1 server-initiated command handlers

use serde_json::Value;
use tracing::info;

use rust_ocpp::v2_0_1::messages::cancel_reservation::{
    CancelReservationRequest, CancelReservationResponse,
};
use rust_ocpp::v2_0_1::messages::certificate_signed::{
    CertificateSignedRequest, CertificateSignedResponse,
};
use rust_ocpp::v2_0_1::messages::change_availability::{
    ChangeAvailabilityRequest, ChangeAvailabilityResponse,
};
use rust_ocpp::v2_0_1::messages::clear_cache::ClearCacheResponse;
use rust_ocpp::v2_0_1::messages::delete_certificate::{
    DeleteCertificateRequest, DeleteCertificateResponse,
};
use rust_ocpp::v2_0_1::messages::get_local_list_version::GetLocalListVersionResponse;
use rust_ocpp::v2_0_1::messages::get_variables::{GetVariablesRequest, GetVariablesResponse};
use rust_ocpp::v2_0_1::messages::install_certificate::{
    InstallCertificateRequest, InstallCertificateResponse,
};
use rust_ocpp::v2_0_1::messages::request_start_transaction::{
    RequestStartTransactionRequest, RequestStartTransactionResponse,
};
use rust_ocpp::v2_0_1::messages::request_stop_transaction::{
    RequestStopTransactionRequest, RequestStopTransactionResponse,
};
use rust_ocpp::v2_0_1::messages::reserve_now::{ReserveNowRequest, ReserveNowResponse};
use rust_ocpp::v2_0_1::messages::reset::{ResetRequest, ResetResponse};
use rust_ocpp::v2_0_1::messages::send_local_list::{SendLocalListRequest, SendLocalListResponse};
use rust_ocpp::v2_0_1::messages::set_variables::{SetVariablesRequest, SetVariablesResponse};
use rust_ocpp::v2_0_1::messages::trigger_message::{
    TriggerMessageRequest, TriggerMessageResponse,
};
use rust_ocpp::v2_0_1::messages::unlock_connector::{
    UnlockConnectorRequest, UnlockConnectorResponse,
};

use rust_ocpp::v2_0_1::datatypes::status_info_type::StatusInfoType;
use rust_ocpp::v2_0_1::enumerations::cancel_reservation_status_enum_type::CancelReservationStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::certificate_signed_status_enum_type::CertificateSignedStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::certificate_signing_use_enum_type::CertificateSigningUseEnumType;
use rust_ocpp::v2_0_1::enumerations::change_availability_status_enum_type::ChangeAvailabilityStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::clear_cache_status_enum_type::ClearCacheStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::data_transfer_status_enum_type::DataTransferStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::delete_certificate_status_enum_type::DeleteCertificateStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::install_certificate_status_enum_type::InstallCertificateStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::message_trigger_enum_type::MessageTriggerEnumType;
use rust_ocpp::v2_0_1::enumerations::operational_status_enum_type::OperationalStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::request_start_stop_status_enum_type::RequestStartStopStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::reserve_now_status_enum_type::ReserveNowStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::reset_enum_type::ResetEnumType;
use rust_ocpp::v2_0_1::enumerations::reset_status_enum_type::ResetStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::send_local_list_status_enum_type::SendLocalListStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::trigger_message_status_enum_type::TriggerMessageStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::unlock_status_enum_type::UnlockStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::update_enum_type::UpdateEnumType;

use super::{FollowUp, HandlerResult};
use crate::auth::adapter::v201 as auth_adapter;
use crate::auth::LocalListEntry;
use crate::ocpp::{IncomingAction, OcppError};
use crate::station::certificates::{DeleteOutcome, InstallOutcome};
use crate::station::connector::{ConnectorStatus, Reservation};
use crate::station::{ChargingStation, ResetKind, StopReason};
use crate::vars::definition;

fn parse<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, OcppError> {
    serde_json::from_value(payload.clone()).map_err(|e| OcppError::format_violation(e.to_string()))
}

fn respond<T: serde::Serialize>(response: &T) -> Result<Value, OcppError> {
    serde_json::to_value(response).map_err(|e| OcppError::internal(e.to_string()))
}

fn status_info(reason_code: &str) -> Option<StatusInfoType> {
    Some(StatusInfoType {
        reason_code: reason_code.to_string(),
        additional_info: None,
    })
}

pub async fn handle(
    station: &mut ChargingStation,
    action: IncomingAction,
    payload: &Value,
) -> HandlerResult {
    match action {
        IncomingAction::Reset => handle_reset(station, payload),
        IncomingAction::UnlockConnector => handle_unlock_connector(station, payload),
        IncomingAction::RequestStartTransaction => handle_request_start(station, payload),
        IncomingAction::RequestStopTransaction => handle_request_stop(station, payload),
        IncomingAction::GetVariables => handle_get_variables(station, payload),
        IncomingAction::SetVariables => handle_set_variables(station, payload),
        IncomingAction::ChangeAvailability => handle_change_availability(station, payload),
        IncomingAction::TriggerMessage => handle_trigger_message(station, payload),
        IncomingAction::DataTransfer => handle_data_transfer(station, payload),
        IncomingAction::ReserveNow => handle_reserve_now(station, payload),
        IncomingAction::CancelReservation => handle_cancel_reservation(station, payload),
        IncomingAction::SendLocalList => handle_send_local_list(station, payload),
        IncomingAction::GetLocalListVersion => handle_get_local_list_version(station),
        IncomingAction::ClearCache => handle_clear_cache(station),
        IncomingAction::CertificateSigned => handle_certificate_signed(station, payload).await,
        IncomingAction::InstallCertificate => handle_install_certificate(station, payload).await,
        IncomingAction::DeleteCertificate => handle_delete_certificate(station, payload).await,
        // 1.6 vocabulary on a 2.0.1 socket.
        _ => Err(OcppError::not_implemented(action.as_str())),
    }
}

fn handle_reset(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: ResetRequest = parse(payload)?;

    // EVSE-targeted resets need an EVSE layout and a known EVSE.
    if let Some(evse_id) = request.evse_id {
        if station.evses.is_empty() {
            let response = respond(&ResetResponse {
                status: ResetStatusEnumType::Rejected,
                status_info: status_info("UnsupportedRequest"),
            })?;
            return Ok((response, None));
        }
        if !station.evses.contains_key(&(evse_id as u32)) {
            let response = respond(&ResetResponse {
                status: ResetStatusEnumType::Rejected,
                status_info: status_info("UnknownEvse"),
            })?;
            return Ok((response, None));
        }
    }

    let busy = station.has_active_transactions();
    match request.request_type {
        ResetEnumType::OnIdle if busy => {
            info!(
                station_id = station.info.station_id.as_str(),
                "Reset scheduled until transactions end"
            );
            station.pending_reset = Some(ResetKind::Soft);
            let response = respond(&ResetResponse {
                status: ResetStatusEnumType::Scheduled,
                status_info: None,
            })?;
            Ok((response, None))
        }
        ResetEnumType::OnIdle => {
            let response = respond(&ResetResponse {
                status: ResetStatusEnumType::Accepted,
                status_info: None,
            })?;
            Ok((response, Some(FollowUp::Reset { kind: ResetKind::Soft })))
        }
        ResetEnumType::Immediate => {
            let response = respond(&ResetResponse {
                status: ResetStatusEnumType::Accepted,
                status_info: status_info("NoError"),
            })?;
            Ok((response, Some(FollowUp::Reset { kind: ResetKind::Hard })))
        }
    }
}

fn handle_unlock_connector(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: UnlockConnectorRequest = parse(payload)?;

    let connector_id = station.evses.get(&(request.evse_id as u32)).and_then(|evse| {
        (request.connector_id as usize)
            .checked_sub(1)
            .and_then(|idx| evse.connector_ids.get(idx))
            .copied()
    });

    let (status, follow_up) = match connector_id {
        None => (UnlockStatusEnumType::UnknownConnector, None),
        Some(connector_id) => {
            let busy = station
                .connectors
                .get(&connector_id)
                .map(|c| c.has_transaction())
                .unwrap_or(false);
            if busy {
                (
                    UnlockStatusEnumType::Unlocked,
                    Some(FollowUp::StopTransaction {
                        connector_id,
                        reason: StopReason::UnlockCommand,
                    }),
                )
            } else {
                (UnlockStatusEnumType::Unlocked, None)
            }
        }
    };

    let response = respond(&UnlockConnectorResponse {
        status,
        status_info: None,
    })?;
    Ok((response, follow_up))
}

fn handle_request_start(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: RequestStartTransactionRequest = parse(payload)?;

    let connector_id = match request.evse_id {
        Some(evse_id) => station
            .evses
            .get(&(evse_id as u32))
            .and_then(|evse| {
                evse.connector_ids.iter().find(|id| {
                    station
                        .connectors
                        .get(id)
                        .map(|c| c.is_operative() && !c.has_transaction())
                        .unwrap_or(false)
                })
            })
            .copied(),
        None => station.first_idle_connector(),
    };

    let Some(connector_id) = connector_id else {
        let response = respond(&RequestStartTransactionResponse {
            status: RequestStartStopStatusEnumType::Rejected,
            status_info: None,
            transaction_id: None,
        })?;
        return Ok((response, None));
    };

    let authorize_first = station
        .variables
        .bool_of(definition::COMPONENT_AUTH_CTRLR, definition::VAR_AUTHORIZE_REMOTE_START)
        .unwrap_or(true);
    let identifier = auth_adapter::from_id_token(&request.id_token);

    let response = respond(&RequestStartTransactionResponse {
        status: RequestStartStopStatusEnumType::Accepted,
        status_info: None,
        transaction_id: None,
    })?;
    Ok((
        response,
        Some(FollowUp::StartTransaction {
            connector_id,
            identifier,
            remote_start_id: Some(request.remote_start_id),
            authorize_first,
        }),
    ))
}

fn handle_request_stop(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: RequestStopTransactionRequest = parse(payload)?;
    let transaction_id = request.transaction_id;

    // Malformed ids (empty or over the 36-char bound) and unknown ids are
    // rejected without emitting any transaction event.
    let connector_id = if transaction_id.is_empty() || transaction_id.len() > 36 {
        None
    } else {
        station.connector_of_transaction(&transaction_id)
    };

    let (status, follow_up) = match connector_id {
        Some(connector_id) => (
            RequestStartStopStatusEnumType::Accepted,
            Some(FollowUp::StopTransaction {
                connector_id,
                reason: StopReason::Remote,
            }),
        ),
        None => (RequestStartStopStatusEnumType::Rejected, None),
    };

    let response = respond(&RequestStopTransactionResponse {
        status,
        status_info: None,
    })?;
    Ok((response, follow_up))
}

fn handle_get_variables(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: GetVariablesRequest = parse(payload)?;
    let get_variable_result = station.variables.get_variables(&request.get_variable_data);
    let response = respond(&GetVariablesResponse {
        get_variable_result,
    })?;
    Ok((response, None))
}

fn handle_set_variables(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    use rust_ocpp::v2_0_1::enumerations::set_variable_status_enum_type::SetVariableStatusEnumType;

    let request: SetVariablesRequest = parse(payload)?;
    let set_variable_result = station.variables.set_variables(&request.set_variable_data);

    // Reactive variables: a successful write takes effect immediately.
    let mut follow_up = None;
    for (data, result) in request.set_variable_data.iter().zip(&set_variable_result) {
        if result.attribute_status != SetVariableStatusEnumType::Accepted {
            continue;
        }
        match (data.component.name.as_str(), data.variable.name.as_str()) {
            (definition::COMPONENT_CHARGING_STATION, definition::VAR_HEARTBEAT_INTERVAL) => {
                if let Ok(secs) = data.attribute_value.parse::<u64>() {
                    station.heartbeat_interval = Some(std::time::Duration::from_secs(secs.max(1)));
                    follow_up = Some(FollowUp::RestartHeartbeat);
                }
            }
            (definition::COMPONENT_TX_CTRLR, definition::VAR_TX_UPDATED_INTERVAL) => {
                follow_up = Some(FollowUp::RestartMeterTimer);
            }
            _ => {}
        }
    }

    station.persist();

    let response = respond(&SetVariablesResponse {
        set_variable_result,
    })?;
    Ok((response, follow_up))
}

fn handle_change_availability(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    use crate::station::connector::Availability;

    let request: ChangeAvailabilityRequest = parse(payload)?;
    let availability = match request.operational_status {
        OperationalStatusEnumType::Operative => Availability::Operative,
        OperationalStatusEnumType::Inoperative => Availability::Inoperative,
    };

    let targets: Vec<u32> = match &request.evse {
        None => station.connectors.keys().copied().collect(),
        Some(evse) => match station.evses.get(&(evse.id as u32)) {
            None => {
                let response = respond(&ChangeAvailabilityResponse {
                    status: ChangeAvailabilityStatusEnumType::Rejected,
                    status_info: status_info("UnknownEvse"),
                })?;
                return Ok((response, None));
            }
            Some(found) => match evse.connector_id {
                None => found.connector_ids.clone(),
                Some(local_id) => match (local_id as usize)
                    .checked_sub(1)
                    .and_then(|idx| found.connector_ids.get(idx))
                {
                    Some(id) => vec![*id],
                    None => {
                        let response = respond(&ChangeAvailabilityResponse {
                            status: ChangeAvailabilityStatusEnumType::Rejected,
                            status_info: status_info("UnknownConnector"),
                        })?;
                        return Ok((response, None));
                    }
                },
            },
        },
    };

    let busy = targets
        .iter()
        .any(|id| station.connectors.get(id).is_some_and(|c| c.has_transaction()));

    for id in &targets {
        if let Some(connector) = station.connectors.get_mut(id) {
            connector.availability = availability;
            if !busy {
                connector.status = if availability == Availability::Operative {
                    ConnectorStatus::Available
                } else {
                    ConnectorStatus::Unavailable
                };
            }
        }
    }

    let status = if busy {
        ChangeAvailabilityStatusEnumType::Scheduled
    } else {
        ChangeAvailabilityStatusEnumType::Accepted
    };
    let follow_up =
        (!busy).then_some(FollowUp::TriggerStatusNotification { connector_id: None });

    let response = respond(&ChangeAvailabilityResponse {
        status,
        status_info: None,
    })?;
    Ok((response, follow_up))
}

fn handle_trigger_message(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: TriggerMessageRequest = parse(payload)?;
    let connector_id = request.evse.as_ref().and_then(|evse| {
        station
            .evses
            .get(&(evse.id as u32))
            .and_then(|found| found.connector_ids.first())
            .copied()
    });

    let (status, follow_up) = match request.requested_message {
        MessageTriggerEnumType::BootNotification => (
            TriggerMessageStatusEnumType::Accepted,
            Some(FollowUp::TriggerBootNotification),
        ),
        MessageTriggerEnumType::Heartbeat => (
            TriggerMessageStatusEnumType::Accepted,
            Some(FollowUp::TriggerHeartbeat),
        ),
        MessageTriggerEnumType::MeterValues => (
            TriggerMessageStatusEnumType::Accepted,
            Some(FollowUp::TriggerMeterValues { connector_id }),
        ),
        MessageTriggerEnumType::StatusNotification => (
            TriggerMessageStatusEnumType::Accepted,
            Some(FollowUp::TriggerStatusNotification { connector_id }),
        ),
        MessageTriggerEnumType::SignChargingStationCertificate => (
            TriggerMessageStatusEnumType::Accepted,
            Some(FollowUp::TriggerSignCertificate),
        ),
        _ => (TriggerMessageStatusEnumType::NotImplemented, None),
    };

    let response = respond(&TriggerMessageResponse {
        status,
        status_info: None,
    })?;
    Ok((response, follow_up))
}

fn handle_data_transfer(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let vendor_id = payload
        .get("vendorId")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let status = match &station.options.data_transfer_vendor_id {
        Some(expected) if expected == vendor_id => DataTransferStatusEnumType::Accepted,
        Some(_) | None => DataTransferStatusEnumType::UnknownVendorId,
    };

    let response = respond(&rust_ocpp::v2_0_1::messages::datatransfer::DataTransferResponse {
        status,
        status_info: None,
        data: None,
    })?;
    Ok((response, None))
}

fn handle_reserve_now(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: ReserveNowRequest = parse(payload)?;

    let connector_id = match request.evse_id {
        Some(evse_id) => station
            .evses
            .get(&(evse_id as u32))
            .and_then(|evse| evse.connector_ids.first())
            .copied(),
        None => station.first_idle_connector(),
    };

    let status = match connector_id {
        None => ReserveNowStatusEnumType::Rejected,
        Some(connector_id) => match station.connectors.get_mut(&connector_id) {
            None => ReserveNowStatusEnumType::Rejected,
            Some(connector) => {
                if connector.status == ConnectorStatus::Faulted {
                    ReserveNowStatusEnumType::Faulted
                } else if connector.has_transaction() || connector.active_reservation().is_some() {
                    ReserveNowStatusEnumType::Occupied
                } else if !connector.is_operative() {
                    ReserveNowStatusEnumType::Unavailable
                } else {
                    connector.reservation = Some(Reservation {
                        id: request.id,
                        id_tag: request.id_token.id_token.clone(),
                        expiry: request.expiry_date_time,
                        parent_id_tag: request.group_id_token.as_ref().map(|t| t.id_token.clone()),
                    });
                    connector.status = ConnectorStatus::Reserved;
                    ReserveNowStatusEnumType::Accepted
                }
            }
        },
    };

    let follow_up = (status == ReserveNowStatusEnumType::Accepted)
        .then_some(FollowUp::TriggerStatusNotification { connector_id });

    let response = respond(&ReserveNowResponse {
        status,
        status_info: None,
    })?;
    Ok((response, follow_up))
}

fn handle_cancel_reservation(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: CancelReservationRequest = parse(payload)?;

    let mut cancelled_connector = None;
    for (id, connector) in station.connectors.iter_mut() {
        if connector
            .reservation
            .as_ref()
            .map(|r| r.id == request.reservation_id)
            .unwrap_or(false)
        {
            connector.reservation = None;
            connector.status = ConnectorStatus::Available;
            cancelled_connector = Some(*id);
            break;
        }
    }

    let status = if cancelled_connector.is_some() {
        CancelReservationStatusEnumType::Accepted
    } else {
        CancelReservationStatusEnumType::Rejected
    };
    let follow_up = cancelled_connector.map(|id| FollowUp::TriggerStatusNotification {
        connector_id: Some(id),
    });

    let response = respond(&CancelReservationResponse {
        status,
        status_info: None,
    })?;
    Ok((response, follow_up))
}

fn handle_send_local_list(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: SendLocalListRequest = parse(payload)?;

    if !station
        .variables
        .bool_of(definition::COMPONENT_LOCAL_AUTH_LIST_CTRLR, definition::VAR_ENABLED)
        .unwrap_or(false)
    {
        let response = respond(&SendLocalListResponse {
            status: SendLocalListStatusEnumType::Failed,
            status_info: status_info("NotEnabled"),
        })?;
        return Ok((response, None));
    }

    let list = station.auth.local_list();
    if request.version_number <= list.version()
        && request.update_type == UpdateEnumType::Differential
    {
        let response = respond(&SendLocalListResponse {
            status: SendLocalListStatusEnumType::VersionMismatch,
            status_info: None,
        })?;
        return Ok((response, None));
    }

    let entries = request.local_authorization_list.unwrap_or_default();
    match request.update_type {
        UpdateEnumType::Full => {
            let full: Vec<LocalListEntry> = entries
                .into_iter()
                .filter_map(|data| {
                    data.id_token_info.map(|info| LocalListEntry {
                        id_tag: data.id_token.id_token.clone(),
                        status: auth_adapter::status_to_unified(info.status),
                        expiry: info.cache_expiry_date_time,
                        parent: info.group_id_token.map(|t| t.id_token),
                    })
                })
                .collect();
            list.replace(request.version_number, full);
        }
        UpdateEnumType::Differential => {
            let updates = entries
                .into_iter()
                .map(|data| {
                    let id_tag = data.id_token.id_token.clone();
                    let entry = data.id_token_info.map(|info| LocalListEntry {
                        id_tag: id_tag.clone(),
                        status: auth_adapter::status_to_unified(info.status),
                        expiry: info.cache_expiry_date_time,
                        parent: info.group_id_token.map(|t| t.id_token),
                    });
                    (id_tag, entry)
                })
                .collect();
            list.apply_differential(request.version_number, updates);
        }
    }

    station.variables.set_internal(
        definition::COMPONENT_LOCAL_AUTH_LIST_CTRLR,
        "Entries",
        list.len().to_string(),
    );
    info!(
        station_id = station.info.station_id.as_str(),
        version = request.version_number,
        entries = list.len(),
        "Local authorization list updated"
    );

    let response = respond(&SendLocalListResponse {
        status: SendLocalListStatusEnumType::Accepted,
        status_info: None,
    })?;
    Ok((response, None))
}

fn handle_get_local_list_version(station: &mut ChargingStation) -> HandlerResult {
    let version_number = if station
        .variables
        .bool_of(definition::COMPONENT_LOCAL_AUTH_LIST_CTRLR, definition::VAR_ENABLED)
        .unwrap_or(false)
    {
        station.auth.local_list().version()
    } else {
        -1
    };
    let response = respond(&GetLocalListVersionResponse { version_number })?;
    Ok((response, None))
}

fn handle_clear_cache(station: &mut ChargingStation) -> HandlerResult {
    station.auth.clear_cache();
    let response = respond(&ClearCacheResponse {
        status: ClearCacheStatusEnumType::Accepted,
        status_info: None,
    })?;
    Ok((response, None))
}

async fn handle_certificate_signed(
    station: &mut ChargingStation,
    payload: &Value,
) -> HandlerResult {
    let request: CertificateSignedRequest = parse(payload)?;
    let accepted = station
        .certificates
        .certificate_signed(&request.certificate_chain, request.certificate_type.clone())
        .await;

    let is_station_certificate = matches!(
        request.certificate_type,
        None | Some(CertificateSigningUseEnumType::ChargingStationCertificate)
    );

    let status = if accepted {
        CertificateSignedStatusEnumType::Accepted
    } else {
        CertificateSignedStatusEnumType::Rejected
    };
    // A fresh station certificate only takes effect on a new TLS session.
    let follow_up = (accepted && is_station_certificate).then_some(FollowUp::Reconnect);

    let response = respond(&CertificateSignedResponse {
        status,
        status_info: None,
    })?;
    Ok((response, follow_up))
}

async fn handle_install_certificate(
    station: &mut ChargingStation,
    payload: &Value,
) -> HandlerResult {
    let request: InstallCertificateRequest = parse(payload)?;
    let outcome = station
        .certificates
        .install_certificate(&request.certificate, request.certificate_type)
        .await;

    let status = match outcome {
        InstallOutcome::Accepted => InstallCertificateStatusEnumType::Accepted,
        InstallOutcome::Failed => InstallCertificateStatusEnumType::Failed,
        InstallOutcome::Rejected => InstallCertificateStatusEnumType::Rejected,
    };

    let response = respond(&InstallCertificateResponse {
        status,
        status_info: None,
    })?;
    Ok((response, None))
}

async fn handle_delete_certificate(
    station: &mut ChargingStation,
    payload: &Value,
) -> HandlerResult {
    let request: DeleteCertificateRequest = parse(payload)?;
    let outcome = station
        .certificates
        .delete_certificate(&request.certificate_hash_data)
        .await;

    let status = match outcome {
        DeleteOutcome::Accepted => DeleteCertificateStatusEnumType::Accepted,
        DeleteOutcome::Failed => DeleteCertificateStatusEnumType::Failed,
        DeleteOutcome::NotFound => DeleteCertificateStatusEnumType::NotFound,
    };

    let response = respond(&DeleteCertificateResponse {
        status,
        status_info: None,
    })?;
    Ok((response, None))
}
