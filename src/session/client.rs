//! OCPP WebSocket session engine
//!
//! Owns the socket lifecycle for one station: connect with the version
//! subprotocol (and optional HTTP Basic credentials), correlate CALLs with
//! their CALL_RESULT/CALL_ERROR through the pending map, queue queueable
//! CALLs while offline, and reconnect with bounded or exponential backoff.
//!
//! The station actor consumes [`SessionEvent`]s from its mailbox; outbound
//! traffic goes through the cloneable [`SessionHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header, Uri};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::pending::PendingRequestMap;
use super::queue::{QueuedCall, SendQueue};
use crate::ocpp::{validate_payload, Direction, OcppErrorCode, OcppVersion, OutgoingAction};
use crate::shared::{DecodeError, OcppFrame, SessionError};
use crate::template::ReconnectTemplate;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const MAX_FRAME_SIZE: usize = 256 * 1024;

/// Connection-level configuration, fixed at station build time.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub station_id: String,
    pub supervision_url: String,
    pub version: OcppVersion,
    pub basic_auth: Option<(String, String)>,
    pub message_timeout: Duration,
    pub reconnect: ReconnectTemplate,
    /// WebSocket-level pings; 0 disables.
    pub ping_interval_secs: u64,
    pub strict_compliance: bool,
}

/// Events delivered to the owning station's mailbox.
#[derive(Debug)]
pub enum SessionEvent {
    Connected { reconnected: bool },
    Disconnected { reason: String },
    IncomingCall {
        unique_id: String,
        action: String,
        payload: Value,
    },
    ReconnectExhausted,
}

/// Outcome of a send that may queue while offline.
#[derive(Debug)]
pub enum SendOutcome {
    Sent(Value),
    Queued,
}

struct SessionShared {
    config: SessionConfig,
    pending: PendingRequestMap,
    queue: SendQueue,
    writer: RwLock<Option<mpsc::UnboundedSender<Message>>>,
    online: AtomicBool,
    message_timeout: Mutex<Duration>,
    last_call_at: Mutex<Option<Instant>>,
    desired: watch::Sender<bool>,
}

/// Cloneable handle the station (and its ATG) talks through.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

pub struct OcppSession;

impl OcppSession {
    /// Create the session engine and its background connection task.
    pub fn spawn(
        config: SessionConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionHandle {
        let (desired_tx, desired_rx) = watch::channel(false);
        let shared = Arc::new(SessionShared {
            message_timeout: Mutex::new(config.message_timeout),
            config,
            pending: PendingRequestMap::new(),
            queue: SendQueue::new(),
            writer: RwLock::new(None),
            online: AtomicBool::new(false),
            last_call_at: Mutex::new(None),
            desired: desired_tx,
        });

        let task_shared = shared.clone();
        tokio::spawn(async move {
            connection_task(task_shared, events, desired_rx).await;
        });

        SessionHandle { shared }
    }
}

impl SessionHandle {
    pub fn open(&self) {
        let _ = self.shared.desired.send(true);
    }

    pub fn close(&self) {
        let _ = self.shared.desired.send(false);
    }

    pub fn is_online(&self) -> bool {
        self.shared.online.load(Ordering::SeqCst)
    }

    pub fn station_id(&self) -> &str {
        &self.shared.config.station_id
    }

    /// Time since the last CALL went out, if any.
    pub fn last_call_elapsed(&self) -> Option<Duration> {
        self.shared.last_call_at.lock().map(|at| at.elapsed())
    }

    /// Applied to CALLs armed after the change.
    pub fn set_message_timeout(&self, timeout: Duration) {
        *self.shared.message_timeout.lock() = timeout;
    }

    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn peek_queued(&self) -> Option<QueuedCall> {
        self.shared.queue.front()
    }

    pub fn pop_queued(&self) {
        self.shared.queue.pop_front()
    }

    pub fn clear_queue(&self) {
        self.shared.queue.clear()
    }

    /// Send a CALL and await its CALL_RESULT. Fails fast with `Offline`
    /// when the socket is down.
    pub async fn call(&self, action: &str, payload: Value) -> Result<Value, SessionError> {
        let shared = &self.shared;

        if shared.config.strict_compliance {
            if let Err(e) =
                validate_payload(shared.config.version, action, Direction::Request, &payload)
            {
                // An invalid outbound payload is our own bug.
                error!(
                    station_id = shared.config.station_id.as_str(),
                    action,
                    error = %e,
                    "Outbound payload failed schema validation"
                );
                return Err(SessionError::InvalidPayload(e.to_string()));
            }
        }

        let message_id = Uuid::new_v4().to_string();
        let frame = OcppFrame::Call {
            unique_id: message_id.clone(),
            action: action.to_string(),
            payload,
        };
        let text = frame.encode();

        let receiver = shared.pending.insert(&message_id, action);

        let writer = shared.writer.read().clone();
        let sender = match writer {
            Some(sender) if self.is_online() => sender,
            _ => {
                shared.pending.forget(&message_id);
                return Err(SessionError::Offline);
            }
        };

        debug!(
            station_id = shared.config.station_id.as_str(),
            action,
            message_id = message_id.as_str(),
            "Sending CALL"
        );
        if sender.send(Message::Text(text)).is_err() {
            shared.pending.forget(&message_id);
            return Err(SessionError::SendFailed("socket writer gone".into()));
        }
        *shared.last_call_at.lock() = Some(Instant::now());
        metrics::counter!("simulator_calls_sent_total", "action" => action.to_string()).increment(1);

        let timeout = *shared.message_timeout.lock();
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(SessionError::ChannelClosed),
            Err(_) => {
                shared.pending.forget(&message_id);
                warn!(
                    station_id = shared.config.station_id.as_str(),
                    action,
                    message_id = message_id.as_str(),
                    "CALL timed out"
                );
                metrics::counter!("simulator_call_timeouts_total").increment(1);
                Err(SessionError::Timeout)
            }
        }
    }

    /// Send a CALL, or park it in the send queue when offline and the
    /// action is queueable. Non-queueable actions fail fast.
    pub async fn send_or_queue(
        &self,
        action: OutgoingAction,
        payload: Value,
    ) -> Result<SendOutcome, SessionError> {
        if self.is_online() {
            return self.call(action.as_str(), payload).await.map(SendOutcome::Sent);
        }

        if !action.is_queueable() {
            return Err(SessionError::Offline);
        }

        if self.shared.queue.push_deduplicated(action.as_str(), payload) {
            debug!(
                station_id = self.shared.config.station_id.as_str(),
                action = action.as_str(),
                queued = self.shared.queue.len(),
                "Socket down, CALL queued"
            );
        }
        Ok(SendOutcome::Queued)
    }

    /// Answer a server CALL with a CALL_RESULT.
    pub fn respond(&self, unique_id: &str, payload: Value) -> Result<(), SessionError> {
        self.send_frame(OcppFrame::CallResult {
            unique_id: unique_id.to_string(),
            payload,
        })
    }

    /// Answer a server CALL with a CALL_ERROR.
    pub fn respond_error(
        &self,
        unique_id: &str,
        error: &crate::ocpp::OcppError,
    ) -> Result<(), SessionError> {
        self.send_frame(OcppFrame::CallError {
            unique_id: unique_id.to_string(),
            error_code: error
                .code
                .as_wire_str(self.shared.config.version)
                .to_string(),
            error_description: error.description.clone(),
            error_details: error.details.clone(),
        })
    }

    fn send_frame(&self, frame: OcppFrame) -> Result<(), SessionError> {
        let writer = self.shared.writer.read().clone();
        match writer {
            Some(sender) => sender
                .send(Message::Text(frame.encode()))
                .map_err(|_| SessionError::SendFailed("socket writer gone".into())),
            None => Err(SessionError::Offline),
        }
    }
}

// ── Connection task ────────────────────────────────────────────

async fn connection_task(
    shared: Arc<SessionShared>,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut desired_rx: watch::Receiver<bool>,
) {
    let mut had_session = false;

    'outer: loop {
        while !*desired_rx.borrow() {
            if desired_rx.changed().await.is_err() {
                return;
            }
        }

        let mut attempts: u32 = 0;

        'session: loop {
            if !*desired_rx.borrow() {
                break 'session;
            }

            match connect(&shared.config).await {
                Ok(ws_stream) => {
                    attempts = 0;
                    let reconnected = had_session;
                    had_session = true;

                    let reason =
                        run_connection(&shared, ws_stream, &events, &mut desired_rx, reconnected)
                            .await;

                    shared.online.store(false, Ordering::SeqCst);
                    *shared.writer.write() = None;
                    shared.pending.reject_all(|| SessionError::Offline);
                    let _ = events.send(SessionEvent::Disconnected { reason });

                    if !*desired_rx.borrow() {
                        break 'session;
                    }
                }
                Err(e) => {
                    warn!(
                        station_id = shared.config.station_id.as_str(),
                        error = %e,
                        "WebSocket connect failed"
                    );
                }
            }

            attempts += 1;
            let policy = &shared.config.reconnect;
            if policy.max_retries >= 0 && attempts > policy.max_retries as u32 {
                error!(
                    station_id = shared.config.station_id.as_str(),
                    attempts, "Reconnect attempts exhausted"
                );
                let _ = events.send(SessionEvent::ReconnectExhausted);
                let _ = shared.desired.send(false);
                break 'session;
            }

            let delay = reconnect_delay(attempts, policy);
            info!(
                station_id = shared.config.station_id.as_str(),
                attempts,
                delay_secs = delay.as_secs(),
                "Reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = desired_rx.changed() => {
                    if changed.is_err() {
                        break 'outer;
                    }
                    if !*desired_rx.borrow() {
                        break 'session;
                    }
                }
            }
        }

        if desired_rx.has_changed().is_err() {
            break 'outer;
        }
    }
}

/// Delay before attempt number `attempts` (1-based).
pub fn reconnect_delay(attempts: u32, policy: &ReconnectTemplate) -> Duration {
    let base = Duration::from_secs(policy.base_delay_seconds.max(1));
    let max = Duration::from_secs(policy.max_delay_seconds.max(policy.base_delay_seconds.max(1)));
    if policy.exponential_backoff {
        let exponent = attempts.saturating_sub(1).min(16);
        std::cmp::min(base * 2u32.pow(exponent), max)
    } else {
        base
    }
}

async fn connect(
    config: &SessionConfig,
) -> Result<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>, SessionError> {
    let url = format!(
        "{}/{}",
        config.supervision_url.trim_end_matches('/'),
        config.station_id
    );
    let uri: Uri = url
        .parse()
        .map_err(|_| SessionError::SendFailed(format!("invalid supervision URL: {url}")))?;

    let mut builder = Request::builder()
        .uri(&url)
        .header(header::SEC_WEBSOCKET_PROTOCOL, config.version.subprotocol())
        .header(header::HOST, uri.host().unwrap_or("localhost"));

    if let Some((user, password)) = &config.basic_auth {
        let credentials = BASE64.encode(format!("{user}:{password}"));
        builder = builder.header(header::AUTHORIZATION, format!("Basic {credentials}"));
    }

    let request = builder
        .body(())
        .map_err(|e| SessionError::SendFailed(format!("handshake request: {e}")))?;

    let ws_config = WebSocketConfig {
        max_message_size: Some(MAX_MESSAGE_SIZE),
        max_frame_size: Some(MAX_FRAME_SIZE),
        ..Default::default()
    };

    let (ws_stream, response) = connect_async_with_config(request, Some(ws_config), false)
        .await
        .map_err(|e| SessionError::SendFailed(e.to_string()))?;

    let accepted = response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok());
    if accepted != Some(config.version.subprotocol()) {
        warn!(
            station_id = config.station_id.as_str(),
            requested = config.version.subprotocol(),
            accepted = ?accepted,
            "CSMS did not confirm the OCPP subprotocol"
        );
    }

    info!(
        station_id = config.station_id.as_str(),
        url = url.as_str(),
        "WebSocket connected"
    );
    Ok(ws_stream)
}

async fn run_connection(
    shared: &Arc<SessionShared>,
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    desired_rx: &mut watch::Receiver<bool>,
    reconnected: bool,
) -> String {
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    *shared.writer.write() = Some(out_tx.clone());
    shared.online.store(true, Ordering::SeqCst);
    let _ = events.send(SessionEvent::Connected { reconnected });

    // Writer half: drains outbound messages and keeps the socket alive.
    let ping_interval_secs = shared.config.ping_interval_secs;
    let station_id = shared.config.station_id.clone();
    let writer_task = tokio::spawn(async move {
        let mut ping = (ping_interval_secs > 0).then(|| {
            let mut interval =
                tokio::time::interval(Duration::from_secs(ping_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                message = out_rx.recv() => {
                    match message {
                        Some(message) => {
                            if let Err(e) = ws_tx.send(message).await {
                                error!(station_id = station_id.as_str(), error = %e, "Socket write failed");
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = async {
                    match ping.as_mut() {
                        Some(interval) => { interval.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let reason = loop {
        tokio::select! {
            message = ws_rx.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming_text(shared, events, &text);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        break format!("closed by server: {frame:?}");
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!(
                            station_id = shared.config.station_id.as_str(),
                            bytes = data.len(),
                            "Ignoring binary frame"
                        );
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        break format!("socket error: {e}");
                    }
                    None => {
                        break "stream ended".to_string();
                    }
                }
            }
            changed = desired_rx.changed() => {
                if changed.is_err() || !*desired_rx.borrow() {
                    let _ = out_tx.send(Message::Close(None));
                    break "closed by station".to_string();
                }
            }
        }
    };

    *shared.writer.write() = None;
    writer_task.abort();
    reason
}

fn handle_incoming_text(
    shared: &Arc<SessionShared>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    text: &str,
) {
    let frame = match OcppFrame::decode(text) {
        Ok(frame) => frame,
        Err(DecodeError::Malformed { unique_id, detail }) => {
            // The id survived, so the broken frame still gets an answer.
            warn!(
                station_id = shared.config.station_id.as_str(),
                unique_id = unique_id.as_str(),
                detail = detail.as_str(),
                "Malformed frame, answering CALL_ERROR"
            );
            let answer = OcppFrame::error_frame(
                unique_id,
                OcppErrorCode::FormatViolation.as_wire_str(shared.config.version),
                detail,
            );
            if let Some(writer) = shared.writer.read().clone() {
                let _ = writer.send(Message::Text(answer.encode()));
            }
            return;
        }
        Err(e) => {
            warn!(
                station_id = shared.config.station_id.as_str(),
                error = %e,
                "Dropping unusable OCPP frame"
            );
            return;
        }
    };

    match frame {
        OcppFrame::Call {
            unique_id,
            action,
            payload,
        } => {
            let _ = events.send(SessionEvent::IncomingCall {
                unique_id,
                action,
                payload,
            });
        }
        OcppFrame::CallResult { unique_id, payload } => {
            let outcome = if shared.config.strict_compliance {
                match shared.pending.action_of(&unique_id) {
                    Some(action) => validate_payload(
                        shared.config.version,
                        &action,
                        Direction::Response,
                        &payload,
                    )
                    .map(|_| payload)
                    .map_err(|e| SessionError::InvalidPayload(e.to_string())),
                    None => Ok(payload),
                }
            } else {
                Ok(payload)
            };
            shared.pending.complete(&unique_id, outcome);
        }
        OcppFrame::CallError {
            unique_id,
            error_code,
            error_description,
            error_details,
        } => {
            shared.pending.complete(
                &unique_id,
                Err(SessionError::CallError {
                    code: error_code,
                    description: error_description,
                    details: error_details,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> SessionConfig {
        SessionConfig {
            station_id: "CS-SESSION-000001".into(),
            supervision_url: "ws://localhost:9999/ocpp".into(),
            version: OcppVersion::V16,
            basic_auth: None,
            message_timeout: Duration::from_secs(30),
            reconnect: ReconnectTemplate::default(),
            ping_interval_secs: 0,
            strict_compliance: true,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = ReconnectTemplate {
            exponential_backoff: true,
            base_delay_seconds: 2,
            max_delay_seconds: 30,
            max_retries: -1,
        };
        assert_eq!(reconnect_delay(1, &policy), Duration::from_secs(2));
        assert_eq!(reconnect_delay(2, &policy), Duration::from_secs(4));
        assert_eq!(reconnect_delay(3, &policy), Duration::from_secs(8));
        assert_eq!(reconnect_delay(10, &policy), Duration::from_secs(30));
    }

    #[test]
    fn constant_backoff_ignores_attempts() {
        let policy = ReconnectTemplate {
            exponential_backoff: false,
            base_delay_seconds: 5,
            max_delay_seconds: 300,
            max_retries: 3,
        };
        assert_eq!(reconnect_delay(1, &policy), Duration::from_secs(5));
        assert_eq!(reconnect_delay(7, &policy), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn call_offline_fails_fast_and_leaves_no_pending() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let handle = OcppSession::spawn(config(), events_tx);

        let result = handle.call("Heartbeat", json!({})).await;
        assert!(matches!(result, Err(SessionError::Offline)));
        assert_eq!(handle.pending_len(), 0);
    }

    #[tokio::test]
    async fn queueable_actions_queue_offline_and_dedup() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let handle = OcppSession::spawn(config(), events_tx);

        let outcome = handle
            .send_or_queue(OutgoingAction::MeterValues, json!({"connectorId": 1}))
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::Queued));

        // Identical payload is deduplicated.
        handle
            .send_or_queue(OutgoingAction::MeterValues, json!({"connectorId": 1}))
            .await
            .unwrap();
        assert_eq!(handle.queue_len(), 1);

        // BootNotification never queues.
        let boot = handle
            .send_or_queue(OutgoingAction::BootNotification, json!({}))
            .await;
        assert!(matches!(boot, Err(SessionError::Offline)));
    }
}
