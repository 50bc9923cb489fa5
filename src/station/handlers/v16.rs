//! OCPP 1.6 server-initiated command handlers
//!
//! Payloads are deserialized into `rust_ocpp::v1_6` types; responses are
//! serialized back from them. Follow-up work (transaction starts/stops,
//! resets, triggered messages) runs after the response frame.

use serde_json::Value;
use tracing::info;

use rust_ocpp::v1_6::messages::cancel_reservation::{
    CancelReservationRequest, CancelReservationResponse,
};
use rust_ocpp::v1_6::messages::change_availability::{
    ChangeAvailabilityRequest, ChangeAvailabilityResponse,
};
use rust_ocpp::v1_6::messages::change_configuration::{
    ChangeConfigurationRequest, ChangeConfigurationResponse,
};
use rust_ocpp::v1_6::messages::clear_cache::ClearCacheResponse;
use rust_ocpp::v1_6::messages::get_configuration::{
    GetConfigurationRequest, GetConfigurationResponse,
};
use rust_ocpp::v1_6::messages::get_local_list_version::GetLocalListVersionResponse;
use rust_ocpp::v1_6::messages::remote_start_transaction::{
    RemoteStartTransactionRequest, RemoteStartTransactionResponse,
};
use rust_ocpp::v1_6::messages::remote_stop_transaction::{
    RemoteStopTransactionRequest, RemoteStopTransactionResponse,
};
use rust_ocpp::v1_6::messages::reserve_now::{ReserveNowRequest, ReserveNowResponse};
use rust_ocpp::v1_6::messages::reset::{ResetRequest, ResetResponse};
use rust_ocpp::v1_6::messages::send_local_list::{SendLocalListRequest, SendLocalListResponse};
use rust_ocpp::v1_6::messages::trigger_message::{TriggerMessageRequest, TriggerMessageResponse};
use rust_ocpp::v1_6::messages::unlock_connector::{
    UnlockConnectorRequest, UnlockConnectorResponse,
};
use rust_ocpp::v1_6::types::{
    AvailabilityStatus, AvailabilityType, CancelReservationStatus, ClearCacheStatus,
    ConfigurationStatus, DataTransferStatus, KeyValue, MessageTrigger, RemoteStartStopStatus,
    ReservationStatus, ResetRequestStatus, ResetResponseStatus, TriggerMessageStatus,
    UnlockStatus, UpdateStatus, UpdateType,
};

use super::{FollowUp, HandlerResult};
use crate::auth::adapter::v16 as auth_adapter;
use crate::auth::LocalListEntry;
use crate::ocpp::{IncomingAction, OcppError};
use crate::station::connector::{ConnectorStatus, Reservation};
use crate::station::{ChargingStation, ResetKind, StopReason};
use crate::vars::ChangeKeyOutcome;

fn parse<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, OcppError> {
    serde_json::from_value(payload.clone()).map_err(|e| OcppError::format_violation(e.to_string()))
}

fn respond<T: serde::Serialize>(response: &T) -> Result<Value, OcppError> {
    serde_json::to_value(response).map_err(|e| OcppError::internal(e.to_string()))
}

pub async fn handle(
    station: &mut ChargingStation,
    action: IncomingAction,
    payload: &Value,
) -> HandlerResult {
    match action {
        IncomingAction::Reset => handle_reset(station, payload),
        IncomingAction::UnlockConnector => handle_unlock_connector(station, payload),
        IncomingAction::RemoteStartTransaction => handle_remote_start(station, payload),
        IncomingAction::RemoteStopTransaction => handle_remote_stop(station, payload),
        IncomingAction::ChangeConfiguration => handle_change_configuration(station, payload),
        IncomingAction::GetConfiguration => handle_get_configuration(station, payload),
        IncomingAction::ChangeAvailability => handle_change_availability(station, payload),
        IncomingAction::TriggerMessage => handle_trigger_message(station, payload),
        IncomingAction::DataTransfer => handle_data_transfer(station, payload),
        IncomingAction::ReserveNow => handle_reserve_now(station, payload),
        IncomingAction::CancelReservation => handle_cancel_reservation(station, payload),
        IncomingAction::SendLocalList => handle_send_local_list(station, payload),
        IncomingAction::GetLocalListVersion => handle_get_local_list_version(station),
        IncomingAction::ClearCache => handle_clear_cache(station),
        // 2.0.1 vocabulary on a 1.6 socket.
        _ => Err(OcppError::not_implemented(action.as_str())),
    }
}

fn handle_reset(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: ResetRequest = parse(payload)?;
    let kind = match request.kind {
        ResetRequestStatus::Hard => ResetKind::Hard,
        ResetRequestStatus::Soft => ResetKind::Soft,
    };
    info!(
        station_id = station.info.station_id.as_str(),
        ?kind,
        "Reset requested"
    );
    let response = respond(&ResetResponse {
        status: ResetResponseStatus::Accepted,
    })?;
    Ok((response, Some(FollowUp::Reset { kind })))
}

fn handle_unlock_connector(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: UnlockConnectorRequest = parse(payload)?;
    let connector_id = request.connector_id;

    let (status, follow_up) = if connector_id == 0 {
        (UnlockStatus::NotSupported, None)
    } else {
        match station.connectors.get(&connector_id) {
            None => (UnlockStatus::UnlockFailed, None),
            Some(connector) if connector.has_transaction() => (
                UnlockStatus::Unlocked,
                Some(FollowUp::StopTransaction {
                    connector_id,
                    reason: StopReason::UnlockCommand,
                }),
            ),
            Some(_) => (UnlockStatus::Unlocked, None),
        }
    };

    let response = respond(&UnlockConnectorResponse { status })?;
    Ok((response, follow_up))
}

fn handle_remote_start(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: RemoteStartTransactionRequest = parse(payload)?;

    let connector_id = match request.connector_id {
        Some(id) => match station.connectors.get(&id) {
            Some(connector)
                if id > 0 && connector.is_operative() && !connector.has_transaction() =>
            {
                Some(id)
            }
            _ => None,
        },
        None => station.first_idle_connector(),
    };

    let Some(connector_id) = connector_id else {
        let response = respond(&RemoteStartTransactionResponse {
            status: RemoteStartStopStatus::Rejected,
        })?;
        return Ok((response, None));
    };

    let authorize_first = station
        .key_store
        .bool_value("AuthorizeRemoteTxRequests")
        .unwrap_or(true);
    let identifier = station.identifier_for(request.id_tag.clone());

    let response = respond(&RemoteStartTransactionResponse {
        status: RemoteStartStopStatus::Accepted,
    })?;
    Ok((
        response,
        Some(FollowUp::StartTransaction {
            connector_id,
            identifier,
            remote_start_id: None,
            authorize_first,
        }),
    ))
}

fn handle_remote_stop(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: RemoteStopTransactionRequest = parse(payload)?;
    let connector_id = station.connector_of_transaction(&request.transaction_id.to_string());

    let (status, follow_up) = match connector_id {
        Some(connector_id) => (
            RemoteStartStopStatus::Accepted,
            Some(FollowUp::StopTransaction {
                connector_id,
                reason: StopReason::Remote,
            }),
        ),
        None => (RemoteStartStopStatus::Rejected, None),
    };

    let response = respond(&RemoteStopTransactionResponse { status })?;
    Ok((response, follow_up))
}

fn handle_change_configuration(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: ChangeConfigurationRequest = parse(payload)?;
    let outcome = station.key_store.change(&request.key, &request.value);

    let status = match outcome {
        ChangeKeyOutcome::Accepted => ConfigurationStatus::Accepted,
        ChangeKeyOutcome::RebootRequired => ConfigurationStatus::RebootRequired,
        ChangeKeyOutcome::Rejected => ConfigurationStatus::Rejected,
        ChangeKeyOutcome::NotSupported => ConfigurationStatus::NotSupported,
    };
    info!(
        station_id = station.info.station_id.as_str(),
        key = request.key.as_str(),
        status = ?status,
        "ChangeConfiguration"
    );

    let follow_up = if outcome == ChangeKeyOutcome::Accepted {
        match request.key.as_str() {
            "HeartbeatInterval" | "HeartBeatInterval" => {
                if let Ok(secs) = request.value.parse::<u64>() {
                    station.heartbeat_interval = Some(std::time::Duration::from_secs(secs.max(1)));
                }
                Some(FollowUp::RestartHeartbeat)
            }
            "MeterValueSampleInterval" => Some(FollowUp::RestartMeterTimer),
            _ => None,
        }
    } else {
        None
    };

    if outcome == ChangeKeyOutcome::Accepted || outcome == ChangeKeyOutcome::RebootRequired {
        station.persist();
    }

    let response = respond(&ChangeConfigurationResponse { status })?;
    Ok((response, follow_up))
}

fn handle_get_configuration(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: GetConfigurationRequest = parse(payload)?;
    let (known, unknown) = station
        .key_store
        .configuration_view(request.key.as_deref());

    let configuration_key: Vec<KeyValue> = known
        .into_iter()
        .map(|key| KeyValue {
            key: key.key,
            readonly: key.readonly,
            value: key.value,
        })
        .collect();

    let response = respond(&GetConfigurationResponse {
        configuration_key: Some(configuration_key),
        unknown_key: (!unknown.is_empty()).then_some(unknown),
    })?;
    Ok((response, None))
}

fn handle_change_availability(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    use crate::station::connector::Availability;

    let request: ChangeAvailabilityRequest = parse(payload)?;
    let availability = match request.kind {
        AvailabilityType::Operative => Availability::Operative,
        AvailabilityType::Inoperative => Availability::Inoperative,
    };

    let targets: Vec<u32> = if request.connector_id == 0 {
        station.connectors.keys().copied().collect()
    } else if station.connectors.contains_key(&request.connector_id) {
        vec![request.connector_id]
    } else {
        let response = respond(&ChangeAvailabilityResponse {
            status: AvailabilityStatus::Rejected,
        })?;
        return Ok((response, None));
    };

    let busy = targets
        .iter()
        .any(|id| station.connectors.get(id).is_some_and(|c| c.has_transaction()));

    for id in &targets {
        if let Some(connector) = station.connectors.get_mut(id) {
            connector.availability = availability;
        }
    }

    let status = if busy {
        AvailabilityStatus::Scheduled
    } else {
        AvailabilityStatus::Accepted
    };
    let follow_up = (!busy).then_some(FollowUp::TriggerStatusNotification {
        connector_id: (request.connector_id != 0).then_some(request.connector_id),
    });

    // Status must reflect the new availability before it is re-announced.
    if !busy {
        for id in &targets {
            if let Some(connector) = station.connectors.get_mut(id) {
                connector.status = if availability == Availability::Operative {
                    ConnectorStatus::Available
                } else {
                    ConnectorStatus::Unavailable
                };
            }
        }
    }

    let response = respond(&ChangeAvailabilityResponse { status })?;
    Ok((response, follow_up))
}

fn handle_trigger_message(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: TriggerMessageRequest = parse(payload)?;

    let (status, follow_up) = match request.requested_message {
        MessageTrigger::BootNotification => (
            TriggerMessageStatus::Accepted,
            Some(FollowUp::TriggerBootNotification),
        ),
        MessageTrigger::Heartbeat => (
            TriggerMessageStatus::Accepted,
            Some(FollowUp::TriggerHeartbeat),
        ),
        MessageTrigger::MeterValues => (
            TriggerMessageStatus::Accepted,
            Some(FollowUp::TriggerMeterValues {
                connector_id: request.connector_id,
            }),
        ),
        MessageTrigger::StatusNotification => (
            TriggerMessageStatus::Accepted,
            Some(FollowUp::TriggerStatusNotification {
                connector_id: request.connector_id,
            }),
        ),
        MessageTrigger::DiagnosticsStatusNotification
        | MessageTrigger::FirmwareStatusNotification => (TriggerMessageStatus::NotImplemented, None),
    };

    let response = respond(&TriggerMessageResponse { status })?;
    Ok((response, follow_up))
}

fn handle_data_transfer(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    // Field names differ subtly across 1.6 implementations; read the vendor
    // id from the raw payload and answer with the typed response.
    let vendor_id = payload
        .get("vendorId")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let status = match &station.options.data_transfer_vendor_id {
        Some(expected) if expected == vendor_id => DataTransferStatus::Accepted,
        Some(_) | None => DataTransferStatus::UnknownVendorId,
    };

    let response = respond(
        &rust_ocpp::v1_6::messages::data_transfer::DataTransferResponse { status, data: None },
    )?;
    Ok((response, None))
}

fn handle_reserve_now(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: ReserveNowRequest = parse(payload)?;

    let status = if request.connector_id == 0 {
        ReservationStatus::Rejected
    } else {
        match station.connectors.get_mut(&request.connector_id) {
            None => ReservationStatus::Rejected,
            Some(connector) => {
                if connector.status == ConnectorStatus::Faulted {
                    ReservationStatus::Faulted
                } else if connector.has_transaction()
                    || connector.active_reservation().is_some()
                {
                    ReservationStatus::Occupied
                } else if !connector.is_operative() {
                    ReservationStatus::Unavailable
                } else {
                    connector.reservation = Some(Reservation {
                        id: request.reservation_id,
                        id_tag: request.id_tag.clone(),
                        expiry: request.expiry_date,
                        parent_id_tag: request.parent_id_tag.clone(),
                    });
                    ReservationStatus::Accepted
                }
            }
        }
    };

    let follow_up = (status == ReservationStatus::Accepted).then_some(
        FollowUp::TriggerStatusNotification {
            connector_id: Some(request.connector_id),
        },
    );
    if status == ReservationStatus::Accepted {
        if let Some(connector) = station.connectors.get_mut(&request.connector_id) {
            connector.status = ConnectorStatus::Reserved;
        }
    }

    let response = respond(&ReserveNowResponse { status })?;
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
        CancelReservationStatus::Accepted
    } else {
        CancelReservationStatus::Rejected
    };
    let follow_up = cancelled_connector.map(|id| FollowUp::TriggerStatusNotification {
        connector_id: Some(id),
    });

    let response = respond(&CancelReservationResponse { status })?;
    Ok((response, follow_up))
}

fn handle_send_local_list(station: &mut ChargingStation, payload: &Value) -> HandlerResult {
    let request: SendLocalListRequest = parse(payload)?;

    if !station
        .key_store
        .bool_value("LocalAuthListEnabled")
        .unwrap_or(false)
    {
        let response = respond(&SendLocalListResponse {
            status: UpdateStatus::NotSupported,
        })?;
        return Ok((response, None));
    }

    let list = station.auth.local_list();
    if request.list_version <= list.version() && request.update_type == UpdateType::Differential {
        let response = respond(&SendLocalListResponse {
            status: UpdateStatus::VersionMismatch,
        })?;
        return Ok((response, None));
    }

    let entries = request.local_authorization_list.unwrap_or_default();
    match request.update_type {
        UpdateType::Full => {
            let full: Vec<LocalListEntry> = entries
                .into_iter()
                .filter_map(|data| {
                    data.id_tag_info.map(|info| LocalListEntry {
                        id_tag: data.id_tag.clone(),
                        status: auth_adapter::status_to_unified(info.status),
                        expiry: info.expiry_date,
                        parent: info.parent_id_tag,
                    })
                })
                .collect();
            list.replace(request.list_version, full);
        }
        UpdateType::Differential => {
            let updates = entries
                .into_iter()
                .map(|data| {
                    let entry = data.id_tag_info.map(|info| LocalListEntry {
                        id_tag: data.id_tag.clone(),
                        status: auth_adapter::status_to_unified(info.status),
                        expiry: info.expiry_date,
                        parent: info.parent_id_tag,
                    });
                    (data.id_tag, entry)
                })
                .collect();
            list.apply_differential(request.list_version, updates);
        }
    }
    info!(
        station_id = station.info.station_id.as_str(),
        version = request.list_version,
        entries = list.len(),
        "Local authorization list updated"
    );

    let response = respond(&SendLocalListResponse {
        status: UpdateStatus::Accepted,
    })?;
    Ok((response, None))
}

fn handle_get_local_list_version(station: &mut ChargingStation) -> HandlerResult {
    let list_version = if station
        .key_store
        .bool_value("LocalAuthListEnabled")
        .unwrap_or(false)
    {
        station.auth.local_list().version()
    } else {
        -1
    };
    let response = respond(&GetLocalListVersionResponse { list_version })?;
    Ok((response, None))
}

fn handle_clear_cache(station: &mut ChargingStation) -> HandlerResult {
    station.auth.clear_cache();
    let response = respond(&ClearCacheResponse {
        status: ClearCacheStatus::Accepted,
    })?;
    Ok((response, None))
}
