//! Server-initiated command dispatch
//!
//! Incoming CALLs resolve through a typed action table; unknown actions get
//! a `NotImplemented` CALL_ERROR, template-disabled actions a `NotSupported`
//! one. Handlers return the response payload plus an optional follow-up that
//! runs after the CALL_RESULT left the station, so ordering on the wire
//! matches a real charge point (answer first, then act).

pub mod v16;
pub mod v201;

use serde_json::Value;
use tracing::{debug, warn};

use super::{ChargingStation, ResetKind, StopReason};
use crate::auth::UnifiedIdentifier;
use crate::ocpp::{validate_payload, Direction, IncomingAction, OcppError, OcppVersion};

/// Deferred work a handler wants done after its response is on the wire.
pub enum FollowUp {
    StartTransaction {
        connector_id: u32,
        identifier: UnifiedIdentifier,
        remote_start_id: Option<i32>,
        authorize_first: bool,
    },
    StopTransaction {
        connector_id: u32,
        reason: StopReason,
    },
    Reset {
        kind: ResetKind,
    },
    TriggerBootNotification,
    TriggerHeartbeat,
    TriggerMeterValues {
        connector_id: Option<u32>,
    },
    TriggerStatusNotification {
        connector_id: Option<u32>,
    },
    TriggerSignCertificate,
    /// Drop the socket so the next connect presents the new identity.
    Reconnect,
    RestartHeartbeat,
    RestartMeterTimer,
}

pub type HandlerResult = Result<(Value, Option<FollowUp>), OcppError>;

pub async fn dispatch_incoming(
    station: &mut ChargingStation,
    unique_id: String,
    action: String,
    payload: Value,
) {
    debug!(
        station_id = station.info.station_id.as_str(),
        action = action.as_str(),
        "Incoming CALL"
    );
    metrics::counter!("simulator_server_calls_total", "action" => action.clone()).increment(1);

    let parsed: Result<IncomingAction, _> = action.parse();
    let Ok(incoming) = parsed else {
        respond_error(station, &unique_id, &OcppError::not_implemented(&action));
        return;
    };

    if !station.options.supports_command(&action) {
        respond_error(station, &unique_id, &OcppError::not_supported(&action));
        return;
    }

    if station.options.ocpp_strict_compliance {
        if let Err(e) = validate_payload(
            station.info.ocpp_version,
            &action,
            Direction::Request,
            &payload,
        ) {
            warn!(
                station_id = station.info.station_id.as_str(),
                action = action.as_str(),
                error = %e,
                "Rejecting malformed request"
            );
            respond_error(station, &unique_id, &e);
            return;
        }
    }

    let outcome = match station.info.ocpp_version {
        OcppVersion::V16 => v16::handle(station, incoming, &payload).await,
        OcppVersion::V201 => v201::handle(station, incoming, &payload).await,
    };

    match outcome {
        Ok((response, follow_up)) => {
            if let Err(e) = station.session.respond(&unique_id, response) {
                warn!(
                    station_id = station.info.station_id.as_str(),
                    action = action.as_str(),
                    error = %e,
                    "Failed to send CALL_RESULT"
                );
                return;
            }
            if let Some(follow_up) = follow_up {
                run_follow_up(station, follow_up).await;
            }
        }
        Err(error) => {
            respond_error(station, &unique_id, &error);
        }
    }
}

fn respond_error(station: &ChargingStation, unique_id: &str, error: &OcppError) {
    if let Err(e) = station.session.respond_error(unique_id, error) {
        warn!(
            station_id = station.info.station_id.as_str(),
            error = %e,
            "Failed to send CALL_ERROR"
        );
    }
}

async fn run_follow_up(station: &mut ChargingStation, follow_up: FollowUp) {
    match follow_up {
        FollowUp::StartTransaction {
            connector_id,
            identifier,
            remote_start_id,
            authorize_first,
        } => {
            if let Err(e) = station
                .begin_transaction(connector_id, identifier, remote_start_id, authorize_first)
                .await
            {
                warn!(
                    station_id = station.info.station_id.as_str(),
                    connector_id,
                    error = e.as_str(),
                    "Remote-start follow-up failed"
                );
            }
        }
        FollowUp::StopTransaction {
            connector_id,
            reason,
        } => {
            if let Err(e) = station.end_transaction(connector_id, reason).await {
                warn!(
                    station_id = station.info.station_id.as_str(),
                    connector_id,
                    error = e.as_str(),
                    "Stop follow-up failed"
                );
            }
        }
        FollowUp::Reset { kind } => {
            station.perform_reset(kind).await;
        }
        FollowUp::TriggerBootNotification => {
            station.try_register().await;
        }
        FollowUp::TriggerHeartbeat => {
            let result = match station.info.ocpp_version {
                OcppVersion::V16 => super::outbound::v16::heartbeat(&station.session)
                    .await
                    .map(|_| ()),
                OcppVersion::V201 => super::outbound::v201::heartbeat(&station.session)
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = result {
                warn!(station_id = station.info.station_id.as_str(), error = %e, "Triggered heartbeat failed");
            }
        }
        FollowUp::TriggerMeterValues { connector_id } => {
            let interval = station.meter_interval();
            let targets: Vec<u32> = match connector_id {
                Some(id) => vec![id],
                None => station
                    .connectors
                    .iter()
                    .filter(|(_, c)| c.has_transaction())
                    .map(|(id, _)| *id)
                    .collect(),
            };
            for id in targets {
                if let Err(e) = station.sample_connector_for_trigger(id, interval).await {
                    warn!(
                        station_id = station.info.station_id.as_str(),
                        connector_id = id,
                        error = e.as_str(),
                        "Triggered meter values failed"
                    );
                }
            }
        }
        FollowUp::TriggerStatusNotification { connector_id } => {
            let targets: Vec<u32> = match connector_id {
                Some(id) => vec![id],
                None => station.connectors.keys().copied().collect(),
            };
            for id in targets {
                let status = station.connectors.get(&id).map(|c| c.status);
                if let Some(status) = status {
                    station.update_connector_status(id, status).await;
                }
            }
        }
        FollowUp::TriggerSignCertificate => {
            let csr = match station
                .certificates
                .generate_csr(&station.info.station_id)
                .await
            {
                Ok(csr) => csr,
                Err(e) => {
                    warn!(
                        station_id = station.info.station_id.as_str(),
                        error = e.as_str(),
                        "CSR generation failed"
                    );
                    return;
                }
            };
            if let Err(e) = super::outbound::v201::sign_certificate(&station.session, csr).await {
                warn!(station_id = station.info.station_id.as_str(), error = %e, "SignCertificate failed");
            }
        }
        FollowUp::Reconnect => {
            station.session.close();
            // Let the connection task observe the close before rearming it.
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            station.session.open();
        }
        FollowUp::RestartHeartbeat => {
            station.start_heartbeat();
        }
        FollowUp::RestartMeterTimer => {
            station.start_meter_timer();
        }
    }
}
