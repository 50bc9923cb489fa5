//! HTTP control-plane server
//!
//! `POST /ui/{procedure}` with the procedure payload as JSON body; the
//! response is the same aggregate result the WebSocket flavor returns.
//! Events are not streamed over plain HTTP; poll `statusNotification`
//! instead. Also exposes `/health` and, when metrics are enabled,
//! `/metrics` in Prometheus text format.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{execute_procedure, UiServer};
use crate::registry::StationRegistry;
use crate::shared::{ShutdownSignal, SimulatorError};

#[derive(Clone)]
struct HttpState {
    registry: Arc<StationRegistry>,
    prometheus: Option<PrometheusHandle>,
}

pub struct UiHttpServer {
    address: String,
    registry: Arc<StationRegistry>,
    shutdown: ShutdownSignal,
    prometheus: Option<PrometheusHandle>,
}

impl UiHttpServer {
    pub fn new(
        address: impl Into<String>,
        registry: Arc<StationRegistry>,
        shutdown: ShutdownSignal,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            address: address.into(),
            registry,
            shutdown,
            prometheus,
        }
    }

    fn router(&self) -> Router {
        let state = HttpState {
            registry: self.registry.clone(),
            prometheus: self.prometheus.clone(),
        };
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/ui/{procedure}", post(procedure))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

#[async_trait]
impl UiServer for UiHttpServer {
    async fn serve(self: Arc<Self>) -> Result<(), SimulatorError> {
        let listener = tokio::net::TcpListener::bind(&self.address).await?;
        info!(address = self.address.as_str(), "🌐 UI HTTP server started");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                info!("🛑 UI HTTP server received shutdown signal");
            })
            .await
            .map_err(SimulatorError::Io)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ui-http"
    }
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics(State(state): State<HttpState>) -> String {
    state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

async fn procedure(
    State(state): State<HttpState>,
    Path(procedure): Path<String>,
    body: Bytes,
) -> Json<Value> {
    // An absent or empty body means "no payload".
    let payload = if body.is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                return Json(serde_json::json!({
                    "status": "failure",
                    "error": format!("invalid JSON body: {e}"),
                }));
            }
        }
    };
    Json(execute_procedure(&state.registry, &procedure, &payload).await)
}
