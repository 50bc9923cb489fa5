//! WebSocket control-plane server
//!
//! Accepts clients at `ws://<host>:<port>/` with subprotocol `ui0.0.1` or
//! `ui0.0.2`, answers procedure frames and pushes every simulator event to
//! all connected clients.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::protocol::{accepts_ui_subprotocol, encode_response, parse_request};
use super::{execute_procedure, UiServer};
use crate::registry::StationRegistry;
use crate::shared::{ShutdownSignal, SimulatorError};

pub struct UiWebSocketServer {
    address: String,
    registry: Arc<StationRegistry>,
    shutdown: ShutdownSignal,
}

impl UiWebSocketServer {
    pub fn new(
        address: impl Into<String>,
        registry: Arc<StationRegistry>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            address: address.into(),
            registry,
            shutdown,
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let registry = self.registry.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, registry, shutdown).await {
                error!(peer = %addr, error = %e, "UI connection error");
            }
        });
    }
}

#[async_trait]
impl UiServer for UiWebSocketServer {
    async fn serve(self: Arc<Self>) -> Result<(), SimulatorError> {
        let listener = TcpListener::bind(&self.address).await?;
        info!(address = self.address.as_str(), "🔌 UI WebSocket server started");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!(error = %e, "Failed to accept UI connection"),
                    }
                }
                _ = self.shutdown.notified().wait() => {
                    info!("🛑 UI WebSocket server received shutdown signal");
                    return Ok(());
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "ui-websocket"
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<StationRegistry>,
    shutdown: ShutdownSignal,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut negotiated: Option<&'static str> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, mut response: Response| {
            let offered = req
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            match accepts_ui_subprotocol(offered) {
                Some(protocol) => {
                    negotiated = Some(protocol);
                    response
                        .headers_mut()
                        .insert("Sec-WebSocket-Protocol", protocol.parse().unwrap());
                    Ok(response)
                }
                None => {
                    warn!(peer = %addr, offered, "UI client offered no known subprotocol");
                    Ok(response)
                }
            }
        },
    )
    .await?;

    info!(peer = %addr, subprotocol = ?negotiated, "UI client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    // Writer half.
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Event broadcast to this client.
    let mut subscriber = registry.events().subscribe();
    let event_out = out_tx.clone();
    let event_task = tokio::spawn(async move {
        while let Some(message) = subscriber.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if event_out.send(text).is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        debug!(peer = %addr, frame = text.as_str(), "UI request");
                        match parse_request(&text) {
                            Ok(request) => {
                                let result = execute_procedure(
                                    &registry,
                                    &request.procedure,
                                    &request.payload,
                                )
                                .await;
                                let _ = out_tx.send(encode_response(&request.id, result));
                            }
                            Err(e) => {
                                warn!(peer = %addr, error = e.as_str(), "Bad UI frame");
                                let _ = out_tx.send(encode_response(
                                    "unknown",
                                    serde_json::json!({"status": "failure", "error": e}),
                                ));
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(peer = %addr, error = %e, "UI socket error");
                        break;
                    }
                }
            }
            _ = shutdown.notified().wait() => {
                break;
            }
        }
    }

    event_task.abort();
    writer.abort();
    info!(peer = %addr, "UI client disconnected");
    Ok(())
}
