//! Charging-station actor
//!
//! One station is one tokio task: its mailbox serializes socket events,
//! control-plane commands and timer ticks, so connector/transaction state
//! needs no locking. Outbound traffic flows through the session engine;
//! inbound CSMS commands are dispatched to the per-version handler modules.

pub mod certificates;
pub mod connector;
pub mod evse;
pub mod handlers;
pub mod info;
pub mod meter;
pub mod outbound;
pub mod state;
pub mod transaction;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::atg::{AtgStatus, AutomaticTransactionGenerator, TransactionDriver};
use crate::auth::{
    AuthContext, AuthRequest, AuthorizationPipeline, AuthorizationResult, RemoteAuthorization,
    UnifiedIdentifier,
};
use crate::ocpp::OcppVersion;
use crate::persistence::{ChargingStationConfiguration, ConfigurationStore};
use crate::registry::events::{SharedEventBus, SimulatorEvent};
use crate::session::{OcppSession, SessionConfig, SessionEvent, SessionHandle};
use crate::shared::{SessionError, SimulatorError};
use crate::template::{StationTemplate, TemplateCache};
use crate::vars::{definition, ConfigurationKeyStore, VariableManager};

use certificates::CertificateManager;
use connector::{Availability, ConnectorState, ConnectorStatus, QueuedTransactionEvent};
use evse::Evse;
use info::{StationInfo, StationOptions};
use state::StationState;
use transaction::{Transaction, TransactionId};

/// Version-neutral transaction stop reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Local,
    Remote,
    DeAuthorized,
    EvDisconnected,
    HardReset,
    SoftReset,
    ImmediateReset,
    UnlockCommand,
    PowerLoss,
    Other,
}

impl StopReason {
    pub fn to_v16(self) -> rust_ocpp::v1_6::types::Reason {
        use rust_ocpp::v1_6::types::Reason;
        match self {
            Self::Local => Reason::Local,
            Self::Remote => Reason::Remote,
            Self::DeAuthorized => Reason::DeAuthorized,
            Self::EvDisconnected => Reason::EVDisconnected,
            Self::HardReset => Reason::HardReset,
            Self::SoftReset => Reason::SoftReset,
            Self::ImmediateReset => Reason::HardReset,
            Self::UnlockCommand => Reason::UnlockCommand,
            Self::PowerLoss => Reason::PowerLoss,
            Self::Other => Reason::Other,
        }
    }

    pub fn to_v201(self) -> rust_ocpp::v2_0_1::enumerations::reason_enum_type::ReasonEnumType {
        use rust_ocpp::v2_0_1::enumerations::reason_enum_type::ReasonEnumType;
        match self {
            Self::Local => ReasonEnumType::Local,
            Self::Remote => ReasonEnumType::Remote,
            Self::DeAuthorized => ReasonEnumType::DeAuthorized,
            Self::EvDisconnected => ReasonEnumType::EVDisconnected,
            // Remote-initiated resets report Remote on the wire.
            Self::HardReset | Self::ImmediateReset => ReasonEnumType::Remote,
            Self::SoftReset => ReasonEnumType::Reboot,
            Self::UnlockCommand => ReasonEnumType::UnlockCommand,
            Self::PowerLoss => ReasonEnumType::PowerLoss,
            Self::Other => ReasonEnumType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Soft,
    Hard,
}

/// Control-plane / ATG commands accepted by the actor.
pub enum StationCommand {
    OpenConnection,
    CloseConnection,
    Stop {
        respond: oneshot::Sender<()>,
    },
    StartTransaction {
        connector_id: Option<u32>,
        id_tag: Option<String>,
        respond: oneshot::Sender<Result<String, String>>,
    },
    StopTransaction {
        connector_id: Option<u32>,
        transaction_id: Option<String>,
        respond: oneshot::Sender<Result<(), String>>,
    },
    Authorize {
        id_tag: String,
        respond: oneshot::Sender<bool>,
    },
    StartAtg {
        respond: oneshot::Sender<Result<(), String>>,
    },
    StopAtg {
        respond: oneshot::Sender<Result<(), String>>,
    },
    Snapshot {
        respond: oneshot::Sender<StationSnapshot>,
    },
}

pub enum StationMessage {
    Session(SessionEvent),
    Command(StationCommand),
    HeartbeatTick,
    MeterTick,
    RegistrationRetry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorSnapshot {
    pub id: u32,
    pub status: ConnectorStatus,
    pub availability: Availability,
    pub transaction_id: Option<String>,
    pub energy_active_import_register_wh: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSnapshot {
    pub hash_id: String,
    pub station_id: String,
    pub state: StationState,
    pub online: bool,
    pub ocpp_version: OcppVersion,
    pub connectors: Vec<ConnectorSnapshot>,
    pub atg_running: bool,
    pub atg_statuses: Vec<AtgStatus>,
}

/// Cloneable address of a running station actor.
#[derive(Clone)]
pub struct StationHandle {
    pub hash_id: String,
    pub station_id: String,
    mailbox: mpsc::UnboundedSender<StationMessage>,
}

impl StationHandle {
    /// Whether the actor behind this handle still drains its mailbox.
    pub fn is_alive(&self) -> bool {
        !self.mailbox.is_closed()
    }

    fn send(&self, command: StationCommand) -> Result<(), SimulatorError> {
        self.mailbox
            .send(StationMessage::Command(command))
            .map_err(|_| SimulatorError::UnknownStation(self.hash_id.clone()))
    }

    pub fn open_connection(&self) -> Result<(), SimulatorError> {
        self.send(StationCommand::OpenConnection)
    }

    pub fn close_connection(&self) -> Result<(), SimulatorError> {
        self.send(StationCommand::CloseConnection)
    }

    pub async fn stop(&self) -> Result<(), SimulatorError> {
        let (respond, rx) = oneshot::channel();
        self.send(StationCommand::Stop { respond })?;
        let _ = rx.await;
        Ok(())
    }

    pub async fn start_transaction(
        &self,
        connector_id: Option<u32>,
        id_tag: Option<String>,
    ) -> Result<String, String> {
        let (respond, rx) = oneshot::channel();
        self.send(StationCommand::StartTransaction {
            connector_id,
            id_tag,
            respond,
        })
        .map_err(|e| e.to_string())?;
        rx.await.map_err(|_| "station gone".to_string())?
    }

    pub async fn stop_transaction(
        &self,
        connector_id: Option<u32>,
        transaction_id: Option<String>,
    ) -> Result<(), String> {
        let (respond, rx) = oneshot::channel();
        self.send(StationCommand::StopTransaction {
            connector_id,
            transaction_id,
            respond,
        })
        .map_err(|e| e.to_string())?;
        rx.await.map_err(|_| "station gone".to_string())?
    }

    pub async fn authorize(&self, id_tag: String) -> bool {
        let (respond, rx) = oneshot::channel();
        if self
            .send(StationCommand::Authorize { id_tag, respond })
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn start_atg(&self) -> Result<(), String> {
        let (respond, rx) = oneshot::channel();
        self.send(StationCommand::StartAtg { respond })
            .map_err(|e| e.to_string())?;
        rx.await.map_err(|_| "station gone".to_string())?
    }

    pub async fn stop_atg(&self) -> Result<(), String> {
        let (respond, rx) = oneshot::channel();
        self.send(StationCommand::StopAtg { respond })
            .map_err(|e| e.to_string())?;
        rx.await.map_err(|_| "station gone".to_string())?
    }

    pub async fn snapshot(&self) -> Option<StationSnapshot> {
        let (respond, rx) = oneshot::channel();
        self.send(StationCommand::Snapshot { respond }).ok()?;
        rx.await.ok()
    }
}

// ── ATG driver over the actor mailbox ──────────────────────────

struct MailboxDriver {
    handle: StationHandle,
    session: SessionHandle,
    accepted: Arc<AtomicBool>,
}

#[async_trait]
impl TransactionDriver for MailboxDriver {
    async fn authorize(&self, id_tag: &str) -> bool {
        self.handle.authorize(id_tag.to_string()).await
    }

    async fn start_transaction(
        &self,
        connector_id: u32,
        id_tag: Option<String>,
    ) -> Result<(), String> {
        self.handle
            .start_transaction(Some(connector_id), id_tag)
            .await
            .map(|_| ())
    }

    async fn stop_transaction(&self, connector_id: u32) -> Result<(), String> {
        self.handle.stop_transaction(Some(connector_id), None).await
    }

    fn connection_ok(&self) -> bool {
        self.session.is_online() && self.accepted.load(Ordering::SeqCst)
    }
}

// ── Remote authorization over the session ──────────────────────

struct SessionAuthorization {
    session: SessionHandle,
    version: OcppVersion,
}

#[async_trait]
impl RemoteAuthorization for SessionAuthorization {
    async fn authorize_remote(
        &self,
        identifier: &UnifiedIdentifier,
    ) -> Result<AuthorizationResult, SessionError> {
        match self.version {
            OcppVersion::V16 => {
                let response =
                    outbound::v16::authorize(&self.session, &crate::auth::adapter::v16::to_id_tag(identifier))
                        .await?;
                Ok(crate::auth::adapter::v16::result_from_id_tag_info(
                    response.id_tag_info,
                ))
            }
            OcppVersion::V201 => {
                let response = outbound::v201::authorize(&self.session, identifier).await?;
                Ok(crate::auth::adapter::v201::result_from_token_info(
                    response.id_token_info,
                ))
            }
        }
    }
}

// ── The actor ──────────────────────────────────────────────────

pub struct ChargingStation {
    pub(crate) info: StationInfo,
    pub(crate) options: StationOptions,
    pub(crate) state: StationState,
    pub(crate) session: SessionHandle,
    pub(crate) connectors: BTreeMap<u32, ConnectorState>,
    pub(crate) evses: BTreeMap<u32, Evse>,
    pub(crate) key_store: ConfigurationKeyStore,
    pub(crate) variables: Arc<VariableManager>,
    pub(crate) auth: AuthorizationPipeline,
    pub(crate) sampler: meter::MeterSampler,
    pub(crate) certificates: Arc<dyn CertificateManager>,
    pub(crate) store: Arc<dyn ConfigurationStore>,
    pub(crate) events: SharedEventBus,
    pub(crate) atg: Option<Arc<AutomaticTransactionGenerator>>,

    pub(crate) accepted_once: bool,
    pub(crate) accepted_flag: Arc<AtomicBool>,
    pub(crate) heartbeat_interval: Option<Duration>,
    pub(crate) pending_reset: Option<ResetKind>,
    pub(crate) next_offline_tx_id: i32,

    mailbox: mpsc::UnboundedReceiver<StationMessage>,
    self_sender: mpsc::UnboundedSender<StationMessage>,
    heartbeat_task: Option<JoinHandle<()>>,
    meter_task: Option<JoinHandle<()>>,
    registration_task: Option<JoinHandle<()>>,
}

impl ChargingStation {
    /// Build and start a station actor from a template instance.
    pub fn spawn(
        template: &StationTemplate,
        template_hash: &str,
        index: u32,
        store: Arc<dyn ConfigurationStore>,
        events: SharedEventBus,
        certificates: Arc<dyn CertificateManager>,
    ) -> Result<StationHandle, SimulatorError> {
        let info = StationInfo::from_template(template, template_hash, index);
        let options = StationOptions::from_template(template);

        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (session_tx, mut session_rx) = mpsc::unbounded_channel();

        // Forward session events into the actor mailbox.
        let forward = mailbox_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = session_rx.recv().await {
                if forward.send(StationMessage::Session(event)).is_err() {
                    break;
                }
            }
        });

        let key_store = ConfigurationKeyStore::with_defaults();
        key_store.upsert(crate::vars::ConfigurationKey::new(
            "NumberOfConnectors",
            template.connector_count().to_string(),
        ).read_only());
        let variables = Arc::new(VariableManager::new());

        let ping_interval_secs = match info.ocpp_version {
            OcppVersion::V16 => key_store.int_value("WebSocketPingInterval").unwrap_or(0) as u64,
            OcppVersion::V201 => variables
                .int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_WEBSOCKET_PING_INTERVAL)
                .unwrap_or(0) as u64,
        };

        let session = OcppSession::spawn(
            SessionConfig {
                station_id: info.station_id.clone(),
                supervision_url: info.supervision_url().to_string(),
                version: info.ocpp_version,
                basic_auth: info
                    .supervision_user
                    .clone()
                    .zip(info.supervision_password.clone()),
                message_timeout: Duration::from_secs(options.message_timeout_secs),
                reconnect: options.reconnect.clone(),
                ping_interval_secs,
                strict_compliance: options.ocpp_strict_compliance,
            },
            session_tx,
        );

        let (connectors, evses) = build_layout(template, info.ocpp_version);

        let sampler = meter::MeterSampler::new(
            info.maximum_power,
            info.voltage_out,
            info.number_of_phases,
            options.power_divider,
            &options.sampled_measurands,
        );

        let accepted_flag = Arc::new(AtomicBool::new(false));

        let handle = StationHandle {
            hash_id: info.hash_id.clone(),
            station_id: info.station_id.clone(),
            mailbox: mailbox_tx.clone(),
        };

        let atg = options.atg.as_ref().map(|config| {
            let eligible: Vec<u32> = connectors
                .keys()
                .copied()
                .filter(|id| *id > 0)
                .collect();
            Arc::new(AutomaticTransactionGenerator::new(
                config.clone(),
                eligible,
                Arc::new(MailboxDriver {
                    handle: handle.clone(),
                    session: session.clone(),
                    accepted: accepted_flag.clone(),
                }),
            ))
        });

        let mut station = ChargingStation {
            info,
            options,
            state: StationState::Stopped,
            session,
            connectors,
            evses,
            key_store,
            variables,
            auth: AuthorizationPipeline::new(None),
            sampler,
            certificates,
            store,
            events,
            atg,
            accepted_once: false,
            accepted_flag,
            heartbeat_interval: None,
            pending_reset: None,
            next_offline_tx_id: -1,
            mailbox: mailbox_rx,
            self_sender: mailbox_tx,
            heartbeat_task: None,
            meter_task: None,
            registration_task: None,
        };

        station.restore_persisted_state()?;

        tokio::spawn(async move {
            station.run().await;
        });

        Ok(handle)
    }

    fn restore_persisted_state(&mut self) -> Result<(), SimulatorError> {
        let configuration = match TemplateCache::global().get_configuration(&self.info.hash_id) {
            Some(cached) => Some((*cached).clone()),
            None => self.store.load(&self.info.hash_id)?,
        };
        let Some(configuration) = configuration else {
            return Ok(());
        };

        info!(
            station_id = self.info.station_id.as_str(),
            "Restoring persisted station configuration"
        );
        if let Some(keys) = configuration.configuration_key.clone() {
            self.key_store.load(keys);
        }
        if let Some(attributes) = configuration.variable_attributes.clone() {
            self.variables.load_persisted(attributes);
        }
        if let Some(connectors) = configuration.connectors_status.clone() {
            for persisted in connectors {
                if let Some(connector) = self.connectors.get_mut(&persisted.id) {
                    connector.energy_active_import_register_wh =
                        persisted.energy_active_import_register_wh;
                    connector.availability = persisted.availability;
                }
            }
        }
        TemplateCache::global()
            .put_configuration(self.info.hash_id.clone(), Arc::new(configuration));
        Ok(())
    }

    async fn run(mut self) {
        info!(
            station_id = self.info.station_id.as_str(),
            hash_id = self.info.hash_id.as_str(),
            version = %self.info.ocpp_version,
            "Station actor up"
        );
        self.state = StationState::Starting;
        self.publish(SimulatorEvent::Started {
            hash_id: self.info.hash_id.clone(),
            station_id: self.info.station_id.clone(),
        });
        self.session.open();

        while let Some(message) = self.mailbox.recv().await {
            match message {
                StationMessage::Session(event) => self.on_session_event(event).await,
                StationMessage::Command(command) => {
                    if self.on_command(command).await {
                        break;
                    }
                }
                StationMessage::HeartbeatTick => self.on_heartbeat_tick().await,
                StationMessage::MeterTick => self.on_meter_tick().await,
                StationMessage::RegistrationRetry => {
                    if self.state.may_register() && self.session.is_online() {
                        self.try_register().await;
                    }
                }
            }
        }

        info!(station_id = self.info.station_id.as_str(), "Station actor down");
    }

    // ── Session events ─────────────────────────────────────

    async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { reconnected } => {
                info!(
                    station_id = self.info.station_id.as_str(),
                    reconnected, "Connected to CSMS"
                );
                if self.state == StationState::Stopped {
                    return;
                }
                if self.accepted_once {
                    // Previously accepted: no new BootNotification, resume
                    // the heartbeat and flush what piled up offline.
                    self.state = StationState::Accepted;
                    self.accepted_flag.store(true, Ordering::SeqCst);
                    self.start_heartbeat();
                    self.drain_queues().await;
                } else {
                    self.try_register().await;
                }
            }
            SessionEvent::Disconnected { reason } => {
                warn!(
                    station_id = self.info.station_id.as_str(),
                    reason = reason.as_str(),
                    "Disconnected from CSMS"
                );
                self.stop_heartbeat();
                self.accepted_flag.store(false, Ordering::SeqCst);
                if let Some(atg) = &self.atg {
                    if atg.is_running()
                        && self
                            .options
                            .atg
                            .as_ref()
                            .map(|c| c.stop_on_connection_failure)
                            .unwrap_or(false)
                    {
                        atg.stop().await;
                    }
                }
            }
            SessionEvent::IncomingCall {
                unique_id,
                action,
                payload,
            } => {
                handlers::dispatch_incoming(self, unique_id, action, payload).await;
            }
            SessionEvent::ReconnectExhausted => {
                error!(
                    station_id = self.info.station_id.as_str(),
                    "Giving up on the CSMS connection"
                );
                self.enter_stopped(StopReason::PowerLoss).await;
            }
        }
    }

    // ── Commands ───────────────────────────────────────────

    /// Returns true when the actor should exit.
    async fn on_command(&mut self, command: StationCommand) -> bool {
        match command {
            StationCommand::OpenConnection => {
                self.session.open();
                false
            }
            StationCommand::CloseConnection => {
                self.session.close();
                false
            }
            StationCommand::Stop { respond } => {
                self.enter_stopped(StopReason::Local).await;
                let _ = respond.send(());
                true
            }
            StationCommand::StartTransaction {
                connector_id,
                id_tag,
                respond,
            } => {
                let connector_id = match connector_id.or_else(|| self.first_idle_connector()) {
                    Some(id) => id,
                    None => {
                        let _ = respond.send(Err("no available connector".into()));
                        return false;
                    }
                };
                let identifier = id_tag
                    .map(|tag| self.identifier_for(tag))
                    .unwrap_or_else(|| UnifiedIdentifier::new(
                        crate::auth::IdentifierType::NoAuthorization,
                        "",
                    ));
                let result = self
                    .begin_transaction(connector_id, identifier, None, false)
                    .await;
                let _ = respond.send(result);
                false
            }
            StationCommand::StopTransaction {
                connector_id,
                transaction_id,
                respond,
            } => {
                let target = match (connector_id, transaction_id) {
                    (Some(id), _) => Some(id),
                    (None, Some(tx_id)) => self.connector_of_transaction(&tx_id),
                    (None, None) => None,
                };
                let result = match target {
                    Some(id) => self.end_transaction(id, StopReason::Local).await,
                    None => Err("no matching transaction".into()),
                };
                let _ = respond.send(result);
                false
            }
            StationCommand::Authorize { id_tag, respond } => {
                let identifier = self.identifier_for(id_tag);
                let result = self.authorize_identifier(&identifier, None).await;
                let _ = respond.send(result.is_accepted());
                false
            }
            StationCommand::StartAtg { respond } => {
                let result = match &self.atg {
                    Some(atg) => {
                        atg.start();
                        Ok(())
                    }
                    None => Err("no transaction generator configured".to_string()),
                };
                let _ = respond.send(result);
                false
            }
            StationCommand::StopAtg { respond } => {
                let result = match &self.atg {
                    Some(atg) => {
                        atg.stop().await;
                        Ok(())
                    }
                    None => Err("no transaction generator configured".to_string()),
                };
                let _ = respond.send(result);
                false
            }
            StationCommand::Snapshot { respond } => {
                let _ = respond.send(self.snapshot());
                false
            }
        }
    }

    // ── Registration ───────────────────────────────────────

    pub(crate) async fn try_register(&mut self) {
        use rust_ocpp::v1_6::types::RegistrationStatus as V16Status;
        use rust_ocpp::v2_0_1::enumerations::registration_status_enum_type::RegistrationStatusEnumType as V201Status;

        self.state = StationState::Registering;
        self.publish(SimulatorEvent::Registered {
            hash_id: self.info.hash_id.clone(),
            station_id: self.info.station_id.clone(),
        });

        enum Verdict {
            Accepted { interval_secs: u64 },
            Pending { interval_secs: u64 },
            Rejected,
        }

        let verdict = match self.info.ocpp_version {
            OcppVersion::V16 => {
                match outbound::v16::boot_notification(&self.session, &self.info).await {
                    Ok(response) => match response.status {
                        V16Status::Accepted => Verdict::Accepted {
                            interval_secs: response.interval as u64,
                        },
                        V16Status::Pending => Verdict::Pending {
                            interval_secs: response.interval as u64,
                        },
                        V16Status::Rejected => Verdict::Rejected,
                    },
                    Err(e) => {
                        warn!(
                            station_id = self.info.station_id.as_str(),
                            error = %e,
                            "BootNotification failed"
                        );
                        return;
                    }
                }
            }
            OcppVersion::V201 => {
                match outbound::v201::boot_notification(&self.session, &self.info).await {
                    Ok(response) => match response.status {
                        V201Status::Accepted => Verdict::Accepted {
                            interval_secs: response.interval as u64,
                        },
                        V201Status::Pending => Verdict::Pending {
                            interval_secs: response.interval as u64,
                        },
                        V201Status::Rejected => Verdict::Rejected,
                    },
                    Err(e) => {
                        warn!(
                            station_id = self.info.station_id.as_str(),
                            error = %e,
                            "BootNotification failed"
                        );
                        return;
                    }
                }
            }
        };

        match verdict {
            Verdict::Accepted { interval_secs } => {
                info!(
                    station_id = self.info.station_id.as_str(),
                    interval_secs, "Registration accepted"
                );
                self.state = StationState::Accepted;
                self.accepted_once = true;
                self.accepted_flag.store(true, Ordering::SeqCst);
                // Only the accepted BootNotificationResponse sets the
                // heartbeat cadence.
                self.heartbeat_interval = Some(Duration::from_secs(interval_secs.max(1)));
                self.start_heartbeat();
                self.start_meter_timer();
                self.send_initial_status_notifications().await;
                self.drain_queues().await;
                self.publish(SimulatorEvent::Accepted {
                    hash_id: self.info.hash_id.clone(),
                    station_id: self.info.station_id.clone(),
                });
                self.persist();
                if let Some(atg) = &self.atg {
                    if self
                        .options
                        .atg
                        .as_ref()
                        .map(|c| c.enable)
                        .unwrap_or(false)
                        && !atg.is_running()
                    {
                        atg.start();
                    }
                }
            }
            Verdict::Pending { interval_secs } => {
                info!(
                    station_id = self.info.station_id.as_str(),
                    retry_in = interval_secs,
                    "Registration pending"
                );
                self.state = StationState::Pending;
                self.schedule_registration_retry(Duration::from_secs(interval_secs.max(1)));
            }
            Verdict::Rejected => {
                warn!(
                    station_id = self.info.station_id.as_str(),
                    "Registration rejected, closing connection"
                );
                self.state = StationState::Rejected;
                self.session.close();
            }
        }
    }

    fn schedule_registration_retry(&mut self, delay: Duration) {
        if let Some(task) = self.registration_task.take() {
            task.abort();
        }
        let sender = self.self_sender.clone();
        self.registration_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(StationMessage::RegistrationRetry);
        }));
    }

    // ── Timers ─────────────────────────────────────────────

    pub(crate) fn start_heartbeat(&mut self) {
        self.stop_heartbeat();
        let Some(interval) = self.heartbeat_interval else {
            return;
        };
        let sender = self.self_sender.clone();
        self.heartbeat_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // immediate first tick consumed
            loop {
                ticker.tick().await;
                if sender.send(StationMessage::HeartbeatTick).is_err() {
                    break;
                }
            }
        }));
    }

    pub(crate) fn stop_heartbeat(&mut self) {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
    }

    pub(crate) fn meter_interval(&self) -> Duration {
        let secs = match self.info.ocpp_version {
            OcppVersion::V16 => self
                .key_store
                .int_value("MeterValueSampleInterval")
                .unwrap_or(self.options.meter_value_sample_interval_secs as i64),
            OcppVersion::V201 => self
                .variables
                .int_of(definition::COMPONENT_TX_CTRLR, definition::VAR_TX_UPDATED_INTERVAL)
                .unwrap_or(30),
        };
        Duration::from_secs(secs.max(1) as u64)
    }

    pub(crate) fn start_meter_timer(&mut self) {
        if let Some(task) = self.meter_task.take() {
            task.abort();
        }
        let interval = self.meter_interval();
        let sender = self.self_sender.clone();
        self.meter_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if sender.send(StationMessage::MeterTick).is_err() {
                    break;
                }
            }
        }));
    }

    async fn on_heartbeat_tick(&mut self) {
        if !self.state.is_accepted() || !self.session.is_online() {
            return;
        }
        if self.options.heartbeat_only_when_idle {
            if let (Some(elapsed), Some(interval)) =
                (self.session.last_call_elapsed(), self.heartbeat_interval)
            {
                // One second of slack so the tick that lands exactly one
                // interval after registration still heartbeats.
                if elapsed + Duration::from_secs(1) < interval {
                    debug!(
                        station_id = self.info.station_id.as_str(),
                        "Heartbeat suppressed, traffic within the last interval"
                    );
                    return;
                }
            }
        }

        let result = match self.info.ocpp_version {
            OcppVersion::V16 => outbound::v16::heartbeat(&self.session)
                .await
                .map(|r| r.current_time),
            OcppVersion::V201 => outbound::v201::heartbeat(&self.session)
                .await
                .map(|r| r.current_time),
        };
        match result {
            Ok(current_time) => {
                debug!(
                    station_id = self.info.station_id.as_str(),
                    csms_time = %current_time,
                    "Heartbeat"
                );
                if self.info.ocpp_version == OcppVersion::V201 {
                    self.variables.set_internal(
                        definition::COMPONENT_CLOCK_CTRLR,
                        definition::VAR_DATE_TIME,
                        current_time.to_rfc3339(),
                    );
                }
            }
            Err(e) => {
                warn!(station_id = self.info.station_id.as_str(), error = %e, "Heartbeat failed");
            }
        }
    }

    async fn on_meter_tick(&mut self) {
        if !self.state.is_accepted() {
            return;
        }
        let interval = self.meter_interval();
        let connector_ids: Vec<u32> = self
            .connectors
            .iter()
            .filter(|(_, c)| c.has_transaction())
            .map(|(id, _)| *id)
            .collect();
        for connector_id in connector_ids {
            if let Err(e) = self.sample_connector(connector_id, interval).await {
                warn!(
                    station_id = self.info.station_id.as_str(),
                    connector_id,
                    error = %e,
                    "Meter sample failed"
                );
            }
        }
    }

    async fn sample_connector(
        &mut self,
        connector_id: u32,
        interval: Duration,
    ) -> Result<(), String> {
        let samples = {
            let connector = self
                .connectors
                .get_mut(&connector_id)
                .ok_or("unknown connector")?;
            self.sampler
                .sample(connector, interval)
                .map_err(|e| e.to_string())?
        };

        match self.info.ocpp_version {
            OcppVersion::V16 => {
                let meter_value = meter::to_v16_meter_value(&samples);
                let transaction_id = self
                    .connectors
                    .get(&connector_id)
                    .and_then(|c| c.transaction.as_ref())
                    .and_then(|t| t.id.as_integer());
                let payload = outbound::v16::meter_values_payload(
                    connector_id,
                    transaction_id,
                    vec![meter_value],
                )
                .map_err(|e| e.to_string())?;
                self.send_transactional(
                    connector_id,
                    crate::ocpp::OutgoingAction::MeterValues,
                    payload,
                    transaction_id,
                )
                .await
            }
            OcppVersion::V201 => {
                let meter_value = meter::to_v201_meter_value(&samples);
                let parts = {
                    let online = self.session.is_online();
                    let connector = self
                        .connectors
                        .get_mut(&connector_id)
                        .ok_or("unknown connector")?;
                    match connector.transaction.as_mut() {
                        Some(transaction) => {
                            let parts = outbound::v201::TransactionEventParts {
                                event_type: rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType::Updated,
                                trigger_reason: rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType::MeterValuePeriodic,
                                seq_no: transaction.next_seq_no(),
                                transaction_id: transaction.id.as_wire_string(),
                                charging_state: Some(rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType::Charging),
                                stopped_reason: None,
                                remote_start_id: None,
                                evse: None,
                                id_token: None,
                                meter_value: Some(vec![meter_value]),
                                offline: !online,
                            };
                            Some(parts)
                        }
                        None => None,
                    }
                };
                let Some(parts) = parts else {
                    return Ok(());
                };
                let payload = outbound::v201::transaction_event_payload(&parts)
                    .map_err(|e| e.to_string())?;
                self.send_transactional(
                    connector_id,
                    crate::ocpp::OutgoingAction::TransactionEvent,
                    payload,
                    None,
                )
                .await
            }
        }
    }

    /// TriggerMessage(MeterValues) path: sample outside the periodic tick.
    pub(crate) async fn sample_connector_for_trigger(
        &mut self,
        connector_id: u32,
        interval: Duration,
    ) -> Result<(), String> {
        self.sample_connector(connector_id, interval).await
    }

    /// Send a transaction-scoped CALL, or append it to the connector's
    /// offline queue when the socket is down and offline queueing is on.
    pub(crate) async fn send_transactional(
        &mut self,
        connector_id: u32,
        action: crate::ocpp::OutgoingAction,
        payload: serde_json::Value,
        local_tx_id: Option<i32>,
    ) -> Result<(), String> {
        if self.session.is_online() {
            let session = self.session.clone();
            match session.call(action.as_str(), payload.clone()).await {
                Ok(response) => {
                    self.process_transactional_response(connector_id, action, response);
                    Ok(())
                }
                Err(SessionError::Offline) if self.options.allow_offline_tx => {
                    // The socket went down mid-send; keep the event.
                    self.queue_offline(connector_id, action, payload, local_tx_id);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        } else if self.options.allow_offline_tx {
            self.queue_offline(connector_id, action, payload, local_tx_id);
            Ok(())
        } else {
            Err("offline".to_string())
        }
    }

    fn queue_offline(
        &mut self,
        connector_id: u32,
        action: crate::ocpp::OutgoingAction,
        payload: serde_json::Value,
        local_tx_id: Option<i32>,
    ) {
        if payload.is_null() {
            return;
        }
        if let Some(connector) = self.connectors.get_mut(&connector_id) {
            debug!(
                station_id = self.info.station_id.as_str(),
                connector_id,
                action = action.as_str(),
                queued = connector.offline_queue.len() + 1,
                "Buffering transaction event while offline"
            );
            connector.offline_queue.push_back(QueuedTransactionEvent {
                action,
                payload,
                local_tx_id,
            });
        }
    }

    /// Replay order on reconnect: generic send queue first, then each
    /// connector's offline transaction events, oldest first. A failed send
    /// stops the drain and preserves the remainder.
    pub(crate) async fn drain_queues(&mut self) {
        let session = self.session.clone();

        while let Some(queued) = session.peek_queued() {
            match session.call(&queued.action, queued.payload.clone()).await {
                Ok(_) => session.pop_queued(),
                Err(e) => {
                    warn!(
                        station_id = self.info.station_id.as_str(),
                        action = queued.action.as_str(),
                        error = %e,
                        "Send-queue drain interrupted"
                    );
                    return;
                }
            }
        }

        let connector_ids: Vec<u32> = self.connectors.keys().copied().collect();
        for connector_id in connector_ids {
            loop {
                let Some(front) = self
                    .connectors
                    .get(&connector_id)
                    .and_then(|c| c.offline_queue.front().cloned())
                else {
                    break;
                };
                match session.call(front.action.as_str(), front.payload.clone()).await {
                    Ok(response) => {
                        if let Some(connector) = self.connectors.get_mut(&connector_id) {
                            connector.offline_queue.pop_front();
                        }
                        if let Some(local_id) = front.local_tx_id {
                            self.adopt_csms_transaction_id(connector_id, local_id, &response);
                        }
                        self.process_transactional_response(connector_id, front.action, response);
                    }
                    Err(e) => {
                        warn!(
                            station_id = self.info.station_id.as_str(),
                            connector_id,
                            error = %e,
                            "Offline-queue drain interrupted"
                        );
                        return;
                    }
                }
            }
        }
    }

    /// A drained offline StartTransaction finally has its CSMS-assigned id;
    /// rewrite the placeholder everywhere it was used.
    fn adopt_csms_transaction_id(
        &mut self,
        connector_id: u32,
        local_id: i32,
        response: &serde_json::Value,
    ) {
        let Ok(parsed) = outbound::v16::parse_start_transaction_response(response.clone()) else {
            return;
        };
        let real_id = parsed.transaction_id;
        if let Some(connector) = self.connectors.get_mut(&connector_id) {
            if let Some(transaction) = connector.transaction.as_mut() {
                if transaction.id == TransactionId::Integer(local_id) {
                    transaction.id = TransactionId::Integer(real_id);
                }
            }
            for queued in connector.offline_queue.iter_mut() {
                if queued.local_tx_id == Some(local_id) {
                    if let Some(tx_field) = queued.payload.get_mut("transactionId") {
                        *tx_field = serde_json::json!(real_id);
                    }
                }
            }
        }
    }

    fn process_transactional_response(
        &mut self,
        connector_id: u32,
        action: crate::ocpp::OutgoingAction,
        response: serde_json::Value,
    ) {
        use crate::ocpp::OutgoingAction;
        match action {
            OutgoingAction::StopTransaction => {
                if let Ok(parsed) = outbound::v16::parse_stop_transaction_response(response) {
                    if let Some(info) = parsed.id_tag_info {
                        debug!(
                            station_id = self.info.station_id.as_str(),
                            connector_id,
                            status = ?info.status,
                            "StopTransaction acknowledged"
                        );
                    }
                }
            }
            OutgoingAction::TransactionEvent => {
                if let Ok(parsed) = outbound::v201::parse_transaction_event_response(response) {
                    if let Some(info) = parsed.id_token_info {
                        let status = crate::auth::adapter::v201::status_to_unified(info.status);
                        if !status.is_accepted() {
                            warn!(
                                station_id = self.info.station_id.as_str(),
                                connector_id,
                                status = ?status,
                                "CSMS deauthorized the running transaction"
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // ── Status notifications ───────────────────────────────

    pub(crate) async fn send_initial_status_notifications(&mut self) {
        let connector_ids: Vec<u32> = self.connectors.keys().copied().collect();
        for connector_id in connector_ids {
            let status = self
                .connectors
                .get(&connector_id)
                .map(|c| {
                    if c.is_operative() {
                        if c.has_transaction() {
                            ConnectorStatus::Charging
                        } else {
                            ConnectorStatus::Available
                        }
                    } else {
                        ConnectorStatus::Unavailable
                    }
                })
                .unwrap_or(ConnectorStatus::Available);
            self.update_connector_status(connector_id, status).await;
        }
    }

    /// Set the connector status, notify the CSMS (dropped while offline)
    /// and broadcast the change.
    pub(crate) async fn update_connector_status(
        &mut self,
        connector_id: u32,
        status: ConnectorStatus,
    ) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            return;
        };
        connector.status = status;
        let evse = connector.evse_id.zip(connector.evse_connector_id);

        let payload = match self.info.ocpp_version {
            OcppVersion::V16 => {
                outbound::v16::status_notification_payload(connector_id, status.to_v16())
            }
            OcppVersion::V201 => {
                let (evse_id, local_id) = evse.unwrap_or((connector_id, 1));
                outbound::v201::status_notification_payload(evse_id, local_id, status.to_v201())
            }
        };
        match payload {
            Ok(payload) => {
                // Queued in the session's send queue while offline; the
                // queue replays FIFO on reconnect.
                if let Err(e) = self
                    .session
                    .send_or_queue(crate::ocpp::OutgoingAction::StatusNotification, payload)
                    .await
                {
                    warn!(
                        station_id = self.info.station_id.as_str(),
                        connector_id,
                        error = %e,
                        "StatusNotification failed"
                    );
                }
            }
            Err(e) => {
                warn!(
                    station_id = self.info.station_id.as_str(),
                    connector_id,
                    error = %e,
                    "StatusNotification payload build failed"
                );
            }
        }

        if connector_id > 0 || self.info.ocpp_version == OcppVersion::V16 {
            self.publish(SimulatorEvent::ConnectorStatusChanged {
                hash_id: self.info.hash_id.clone(),
                station_id: self.info.station_id.clone(),
                connector_id,
                status: format!("{status:?}"),
            });
        }
        if self.info.ocpp_version == OcppVersion::V201 && connector_id == 1 {
            let wire_status = status.to_v201();
            self.variables.set_internal(
                definition::COMPONENT_CHARGING_STATION,
                definition::VAR_AVAILABILITY_STATE,
                format!("{wire_status:?}"),
            );
        }
    }

    // ── Authorization ──────────────────────────────────────

    pub(crate) fn identifier_for(&self, id_tag: String) -> UnifiedIdentifier {
        match self.info.ocpp_version {
            OcppVersion::V16 => UnifiedIdentifier::id_tag(id_tag),
            OcppVersion::V201 => UnifiedIdentifier::central(id_tag),
        }
        .with_version(self.info.ocpp_version)
    }

    pub(crate) async fn authorize_identifier(
        &self,
        identifier: &UnifiedIdentifier,
        connector_id: Option<u32>,
    ) -> AuthorizationResult {
        if !crate::auth::is_valid_identifier(identifier, self.info.ocpp_version) {
            return AuthorizationResult::new(
                crate::auth::AuthorizationStatus::Invalid,
                crate::auth::AuthorizationMethod::LocalList,
            );
        }

        let (local_list_enabled, cache_enabled, allow_offline) = match self.info.ocpp_version {
            OcppVersion::V16 => (
                self.key_store.bool_value("LocalAuthListEnabled").unwrap_or(false),
                self.key_store
                    .bool_value("AuthorizationCacheEnabled")
                    .unwrap_or(false),
                self.key_store
                    .bool_value("AllowOfflineTxForUnknownId")
                    .unwrap_or(false)
                    || self.options.allow_offline_tx,
            ),
            OcppVersion::V201 => (
                self.variables
                    .bool_of(definition::COMPONENT_LOCAL_AUTH_LIST_CTRLR, definition::VAR_ENABLED)
                    .unwrap_or(false),
                self.variables
                    .bool_of(definition::COMPONENT_AUTH_CACHE_CTRLR, definition::VAR_ENABLED)
                    .unwrap_or(false),
                self.variables
                    .bool_of(definition::COMPONENT_AUTH_CTRLR, definition::VAR_LOCAL_AUTHORIZE_OFFLINE)
                    .unwrap_or(false)
                    || self.options.allow_offline_tx,
            ),
        };

        let remote = SessionAuthorization {
            session: self.session.clone(),
            version: self.info.ocpp_version,
        };
        let ctx = AuthContext {
            version: self.info.ocpp_version,
            online: self.session.is_online(),
            accepted: self.state.is_accepted(),
            allow_offline,
            local_auth_list_enabled: local_list_enabled,
            auth_cache_enabled: cache_enabled,
            remote: &remote,
        };
        let mut request = AuthRequest::for_identifier(identifier.clone());
        request.connector_id = connector_id;
        self.auth.authorize(&request, &ctx).await
    }

    // ── Transactions ───────────────────────────────────────

    pub(crate) fn first_idle_connector(&self) -> Option<u32> {
        self.connectors
            .iter()
            .find(|(id, c)| {
                **id > 0 && c.is_operative() && !c.has_transaction() && c.active_reservation().is_none()
            })
            .map(|(id, _)| *id)
    }

    pub(crate) fn connector_of_transaction(&self, transaction_id: &str) -> Option<u32> {
        self.connectors
            .iter()
            .find(|(_, c)| {
                c.transaction
                    .as_ref()
                    .map(|t| t.id.as_wire_string() == transaction_id)
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
    }

    pub(crate) async fn begin_transaction(
        &mut self,
        connector_id: u32,
        identifier: UnifiedIdentifier,
        remote_start_id: Option<i32>,
        authorize_first: bool,
    ) -> Result<String, String> {
        if !self.state.is_accepted() {
            return Err("station is not accepted by the CSMS".into());
        }
        if connector_id == 0 {
            return Err("connector 0 cannot start transactions".into());
        }
        {
            let connector = self
                .connectors
                .get(&connector_id)
                .ok_or("unknown connector")?;
            if !connector.is_operative() {
                return Err("connector is inoperative".into());
            }
            if connector.has_transaction() {
                return Err("connector already has a transaction".into());
            }
            if let Some(reservation) = connector.active_reservation() {
                if reservation.id_tag != identifier.value {
                    return Err("connector is reserved for another identifier".into());
                }
            }
        }

        if authorize_first {
            let result = self.authorize_identifier(&identifier, Some(connector_id)).await;
            if !result.is_accepted() {
                return Err(format!("authorization failed: {:?}", result.status));
            }
        }

        let meter_start = self
            .connectors
            .get(&connector_id)
            .map(|c| c.energy_active_import_register_wh)
            .unwrap_or(0.0);
        let reservation_id = self
            .connectors
            .get(&connector_id)
            .and_then(|c| c.active_reservation())
            .map(|r| r.id);

        let transaction_id = match self.info.ocpp_version {
            OcppVersion::V16 => {
                self.begin_transaction_v16(
                    connector_id,
                    &identifier,
                    meter_start,
                    reservation_id,
                    remote_start_id,
                )
                .await?
            }
            OcppVersion::V201 => {
                self.begin_transaction_v201(connector_id, &identifier, meter_start, remote_start_id)
                    .await?
            }
        };

        self.update_connector_status(connector_id, ConnectorStatus::Charging).await;
        self.publish(SimulatorEvent::TransactionStarted {
            hash_id: self.info.hash_id.clone(),
            station_id: self.info.station_id.clone(),
            connector_id,
            transaction_id: transaction_id.clone(),
        });
        metrics::counter!("simulator_transactions_started_total").increment(1);
        Ok(transaction_id)
    }

    async fn begin_transaction_v16(
        &mut self,
        connector_id: u32,
        identifier: &UnifiedIdentifier,
        meter_start: f64,
        reservation_id: Option<i32>,
        remote_start_id: Option<i32>,
    ) -> Result<String, String> {
        use rust_ocpp::v1_6::types::AuthorizationStatus;

        let id_tag = crate::auth::adapter::v16::to_id_tag(identifier);
        let payload =
            outbound::v16::start_transaction_payload(connector_id, &id_tag, meter_start, reservation_id)
                .map_err(|e| e.to_string())?;

        let tx_id = if self.session.is_online() {
            let response = outbound::v16::start_transaction(&self.session, payload)
                .await
                .map_err(|e| e.to_string())?;
            if response.id_tag_info.status != AuthorizationStatus::Accepted {
                return Err(format!(
                    "CSMS rejected StartTransaction: {:?}",
                    response.id_tag_info.status
                ));
            }
            TransactionId::Integer(response.transaction_id)
        } else if self.options.allow_offline_tx {
            let local_id = self.next_offline_tx_id;
            self.next_offline_tx_id -= 1;
            self.queue_offline(
                connector_id,
                crate::ocpp::OutgoingAction::StartTransaction,
                payload,
                Some(local_id),
            );
            TransactionId::Integer(local_id)
        } else {
            return Err("offline".into());
        };

        let mut transaction = Transaction::new(
            tx_id.clone(),
            connector_id,
            None,
            identifier.clone(),
            meter_start,
        );
        transaction.remote_start_id = remote_start_id;
        transaction.started_event_sent = true;

        let connector = self
            .connectors
            .get_mut(&connector_id)
            .ok_or("unknown connector")?;
        connector.authorized_identifier = Some(identifier.clone());
        connector.remote_start_id = remote_start_id;
        connector.transaction = Some(transaction);
        Ok(tx_id.as_wire_string())
    }

    async fn begin_transaction_v201(
        &mut self,
        connector_id: u32,
        identifier: &UnifiedIdentifier,
        meter_start: f64,
        remote_start_id: Option<i32>,
    ) -> Result<String, String> {
        use rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType;
        use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
        use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;

        let evse = self
            .connectors
            .get(&connector_id)
            .and_then(|c| c.evse_id.zip(c.evse_connector_id))
            .ok_or("connector has no EVSE")?;

        let mut transaction = Transaction::new(
            TransactionId::new_uuid(),
            connector_id,
            Some(evse.0),
            identifier.clone(),
            meter_start,
        );
        transaction.remote_start_id = remote_start_id;

        let offline = !self.session.is_online();
        let parts = outbound::v201::TransactionEventParts {
            event_type: TransactionEventEnumType::Started,
            trigger_reason: if remote_start_id.is_some() {
                TriggerReasonEnumType::RemoteStart
            } else {
                TriggerReasonEnumType::Authorized
            },
            seq_no: transaction.next_seq_no(),
            transaction_id: transaction.id.as_wire_string(),
            charging_state: Some(ChargingStateEnumType::Charging),
            stopped_reason: None,
            remote_start_id,
            evse: Some(evse),
            id_token: (identifier.kind != crate::auth::IdentifierType::NoAuthorization)
                .then(|| identifier.clone()),
            meter_value: None,
            offline,
        };
        transaction.started_event_sent = true;
        let payload = outbound::v201::transaction_event_payload(&parts).map_err(|e| e.to_string())?;
        let tx_id = transaction.id.as_wire_string();

        {
            let connector = self
                .connectors
                .get_mut(&connector_id)
                .ok_or("unknown connector")?;
            connector.authorized_identifier = Some(identifier.clone());
            connector.remote_start_id = remote_start_id;
            connector.transaction = Some(transaction);
        }

        self.send_transactional(
            connector_id,
            crate::ocpp::OutgoingAction::TransactionEvent,
            payload,
            None,
        )
        .await?;
        Ok(tx_id)
    }

    pub(crate) async fn end_transaction(
        &mut self,
        connector_id: u32,
        reason: StopReason,
    ) -> Result<(), String> {
        let Some(transaction) = self
            .connectors
            .get(&connector_id)
            .and_then(|c| c.transaction.clone())
        else {
            return Err("no active transaction".into());
        };

        let register = self
            .connectors
            .get(&connector_id)
            .map(|c| c.energy_active_import_register_wh)
            .unwrap_or(0.0);

        match self.info.ocpp_version {
            OcppVersion::V16 => {
                let tx_id = transaction
                    .id
                    .as_integer()
                    .ok_or("1.6 transaction id must be an integer")?;
                let id_tag = crate::auth::adapter::v16::to_id_tag(&transaction.identifier);
                let payload = outbound::v16::stop_transaction_payload(
                    tx_id,
                    Some(&id_tag),
                    register,
                    Some(reason.to_v16()),
                )
                .map_err(|e| e.to_string())?;
                self.send_transactional(
                    connector_id,
                    crate::ocpp::OutgoingAction::StopTransaction,
                    payload,
                    Some(tx_id),
                )
                .await?;
            }
            OcppVersion::V201 => {
                use rust_ocpp::v2_0_1::enumerations::transaction_event_enum_type::TransactionEventEnumType;
                use rust_ocpp::v2_0_1::enumerations::trigger_reason_enum_type::TriggerReasonEnumType;

                let seq_no = {
                    let connector = self
                        .connectors
                        .get_mut(&connector_id)
                        .ok_or("unknown connector")?;
                    let tx = connector.transaction.as_mut().ok_or("no active transaction")?;
                    tx.next_seq_no()
                };
                let parts = outbound::v201::TransactionEventParts {
                    event_type: TransactionEventEnumType::Ended,
                    trigger_reason: match reason {
                        StopReason::Remote => TriggerReasonEnumType::RemoteStop,
                        StopReason::UnlockCommand => TriggerReasonEnumType::UnlockCommand,
                        StopReason::DeAuthorized => TriggerReasonEnumType::Deauthorized,
                        StopReason::HardReset | StopReason::SoftReset | StopReason::ImmediateReset => {
                            TriggerReasonEnumType::ResetCommand
                        }
                        _ => TriggerReasonEnumType::StopAuthorized,
                    },
                    seq_no,
                    transaction_id: transaction.id.as_wire_string(),
                    charging_state: Some(
                        rust_ocpp::v2_0_1::enumerations::charging_state_enum_type::ChargingStateEnumType::Idle,
                    ),
                    stopped_reason: Some(reason.to_v201()),
                    remote_start_id: None,
                    evse: None,
                    id_token: None,
                    meter_value: None,
                    offline: !self.session.is_online(),
                };
                let payload =
                    outbound::v201::transaction_event_payload(&parts).map_err(|e| e.to_string())?;
                self.send_transactional(
                    connector_id,
                    crate::ocpp::OutgoingAction::TransactionEvent,
                    payload,
                    None,
                )
                .await?;
            }
        }

        let next_status = match self.connectors.get_mut(&connector_id) {
            Some(connector) => {
                connector.finish_transaction();
                // A ChangeAvailability scheduled during the transaction
                // lands now.
                if connector.is_operative() {
                    ConnectorStatus::Available
                } else {
                    ConnectorStatus::Unavailable
                }
            }
            None => ConnectorStatus::Available,
        };
        self.update_connector_status(connector_id, next_status).await;
        self.publish(SimulatorEvent::TransactionStopped {
            hash_id: self.info.hash_id.clone(),
            station_id: self.info.station_id.clone(),
            connector_id,
            transaction_id: transaction.id.as_wire_string(),
        });
        metrics::counter!("simulator_transactions_stopped_total").increment(1);

        // A reset deferred to idle fires once the last transaction ends.
        if !self.has_active_transactions() {
            if let Some(kind) = self.pending_reset.take() {
                self.perform_reset(kind).await;
            }
        }
        Ok(())
    }

    pub(crate) fn has_active_transactions(&self) -> bool {
        self.connectors.values().any(|c| c.has_transaction())
    }

    // ── Reset / stop ───────────────────────────────────────

    pub(crate) async fn perform_reset(&mut self, kind: ResetKind) {
        info!(station_id = self.info.station_id.as_str(), ?kind, "Resetting station");
        let reason = match kind {
            ResetKind::Hard => StopReason::HardReset,
            ResetKind::Soft => StopReason::SoftReset,
        };

        let connector_ids: Vec<u32> = self
            .connectors
            .iter()
            .filter(|(_, c)| c.has_transaction())
            .map(|(id, _)| *id)
            .collect();
        for connector_id in connector_ids {
            if let Err(e) = Box::pin(self.end_transaction(connector_id, reason)).await {
                warn!(
                    station_id = self.info.station_id.as_str(),
                    connector_id,
                    error = e.as_str(),
                    "Stopping transaction for reset failed"
                );
            }
        }

        if let Some(atg) = &self.atg {
            if atg.is_running() {
                atg.stop().await;
            }
        }
        self.stop_heartbeat();
        if let Some(task) = self.meter_task.take() {
            task.abort();
        }

        // A reboot reverts runtime-only variable overrides and applies
        // reboot-gated ones (MessageTimeout).
        self.variables.reset_runtime_overrides();
        self.variables.clear_reboot_pending();
        if self.info.ocpp_version == OcppVersion::V201 {
            if let Some(secs) = self
                .variables
                .int_of(definition::COMPONENT_CHARGING_STATION, definition::VAR_MESSAGE_TIMEOUT)
            {
                self.session
                    .set_message_timeout(Duration::from_secs(secs.max(1) as u64));
            }
        }
        self.persist();

        self.accepted_once = false;
        self.accepted_flag.store(false, Ordering::SeqCst);
        self.state = StationState::Starting;
        self.session.close();
        // Let the connection task observe the close before rearming it.
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.session.open();
    }

    pub(crate) async fn enter_stopped(&mut self, reason: StopReason) {
        if self.state == StationState::Stopped {
            return;
        }
        info!(station_id = self.info.station_id.as_str(), "Stopping station");

        if let Some(atg) = &self.atg {
            if atg.is_running() {
                atg.stop().await;
            }
        }

        let connector_ids: Vec<u32> = self
            .connectors
            .iter()
            .filter(|(_, c)| c.has_transaction())
            .map(|(id, _)| *id)
            .collect();
        for connector_id in connector_ids {
            let _ = self.end_transaction(connector_id, reason).await;
        }

        let all_ids: Vec<u32> = self.connectors.keys().copied().collect();
        for connector_id in all_ids {
            self.update_connector_status(connector_id, ConnectorStatus::Unavailable).await;
        }

        self.stop_heartbeat();
        if let Some(task) = self.meter_task.take() {
            task.abort();
        }
        if let Some(task) = self.registration_task.take() {
            task.abort();
        }
        self.session.close();
        self.session.clear_queue();
        self.accepted_flag.store(false, Ordering::SeqCst);
        self.state = StationState::Stopped;
        self.persist();
        self.publish(SimulatorEvent::Stopped {
            hash_id: self.info.hash_id.clone(),
            station_id: self.info.station_id.clone(),
        });
    }

    // ── Snapshot & persistence ─────────────────────────────

    pub(crate) fn snapshot(&self) -> StationSnapshot {
        StationSnapshot {
            hash_id: self.info.hash_id.clone(),
            station_id: self.info.station_id.clone(),
            state: self.state,
            online: self.session.is_online(),
            ocpp_version: self.info.ocpp_version,
            connectors: self
                .connectors
                .values()
                .map(|c| ConnectorSnapshot {
                    id: c.id,
                    status: c.status,
                    availability: c.availability,
                    transaction_id: c.transaction.as_ref().map(|t| t.id.as_wire_string()),
                    energy_active_import_register_wh: c.energy_active_import_register_wh,
                })
                .collect(),
            atg_running: self.atg.as_ref().map(|a| a.is_running()).unwrap_or(false),
            atg_statuses: self
                .atg
                .as_ref()
                .map(|a| a.status_snapshot())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn persist(&mut self) {
        let mut configuration = ChargingStationConfiguration::new(self.info.clone());
        match self.info.ocpp_version {
            OcppVersion::V16 => {
                configuration.configuration_key = Some(self.key_store.snapshot());
            }
            OcppVersion::V201 => {
                configuration.variable_attributes = Some(self.variables.persisted_attributes());
            }
        }
        configuration.connectors_status = Some(self.connectors.values().cloned().collect());
        if !self.evses.is_empty() {
            configuration.evses_status = Some(self.evses.values().cloned().collect());
        }
        configuration.automatic_transaction_generator_statuses =
            self.atg.as_ref().map(|a| a.status_snapshot());

        if let Err(e) = self.store.save(&self.info.hash_id, &configuration) {
            warn!(
                station_id = self.info.station_id.as_str(),
                error = %e,
                "Persisting station configuration failed"
            );
        }
        TemplateCache::global()
            .put_configuration(self.info.hash_id.clone(), Arc::new(configuration));
        self.publish(SimulatorEvent::Updated {
            hash_id: self.info.hash_id.clone(),
            station_id: self.info.station_id.clone(),
        });
    }

    pub(crate) fn publish(&self, event: SimulatorEvent) {
        self.events.publish(event);
    }
}

fn build_layout(
    template: &StationTemplate,
    version: OcppVersion,
) -> (BTreeMap<u32, ConnectorState>, BTreeMap<u32, Evse>) {
    let mut connectors = BTreeMap::new();
    let mut evses = BTreeMap::new();

    match version {
        OcppVersion::V16 => {
            // Connector 0 is the station-wide pseudo connector.
            connectors.insert(0, ConnectorState::new(0));
            for id in 1..=template.number_of_connectors {
                connectors.insert(id, ConnectorState::new(id));
            }
        }
        OcppVersion::V201 => {
            let layout: Vec<u32> = template
                .evses
                .as_ref()
                .map(|evses| evses.iter().map(|e| e.connector_count).collect())
                .unwrap_or_else(|| vec![1; template.number_of_connectors as usize]);
            let mut next_connector = 1u32;
            for (evse_index, connector_count) in layout.iter().enumerate() {
                let evse_id = evse_index as u32 + 1;
                let mut owned = Vec::new();
                for local in 1..=*connector_count {
                    connectors.insert(
                        next_connector,
                        ConnectorState::for_evse(next_connector, evse_id, local),
                    );
                    owned.push(next_connector);
                    next_connector += 1;
                }
                evses.insert(evse_id, Evse::new(evse_id, owned));
            }
        }
    }

    (connectors, evses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(version: &str, connectors: u32) -> StationTemplate {
        serde_json::from_value(serde_json::json!({
            "baseName": "CS-ACTOR",
            "ocppVersion": version,
            "supervisionUrls": ["ws://localhost:9999/ocpp"],
            "chargePointModel": "M",
            "chargePointVendor": "V",
            "numberOfConnectors": connectors
        }))
        .unwrap()
    }

    #[test]
    fn v16_layout_reserves_connector_zero() {
        let (connectors, evses) = build_layout(&template("1.6", 2), OcppVersion::V16);
        assert_eq!(connectors.len(), 3);
        assert!(connectors.contains_key(&0));
        assert!(evses.is_empty());
    }

    #[test]
    fn v201_layout_has_no_connector_zero() {
        let mut t = template("2.0.1", 2);
        t.evses = Some(vec![
            crate::template::EvseTemplate { connector_count: 2 },
            crate::template::EvseTemplate { connector_count: 1 },
        ]);
        let (connectors, evses) = build_layout(&t, OcppVersion::V201);
        assert_eq!(connectors.len(), 3);
        assert!(!connectors.contains_key(&0));
        assert_eq!(evses.len(), 2);
        assert_eq!(evses[&1].connector_ids, vec![1, 2]);
        assert_eq!(evses[&2].connector_ids, vec![3]);
        assert_eq!(connectors[&3].evse_id, Some(2));
        assert_eq!(connectors[&3].evse_connector_id, Some(1));
    }

    #[test]
    fn stop_reason_wire_mappings() {
        assert_eq!(
            StopReason::ImmediateReset.to_v201(),
            rust_ocpp::v2_0_1::enumerations::reason_enum_type::ReasonEnumType::Remote
        );
        assert_eq!(
            StopReason::UnlockCommand.to_v16(),
            rust_ocpp::v1_6::types::Reason::UnlockCommand
        );
    }
}
