//! Control-plane endpoint
//!
//! Two independent implementations of the same capability: a WebSocket
//! server speaking the `ui0.0.x` frame protocol (with event broadcast) and
//! an HTTP server exposing `POST /ui/{procedure}`.

pub mod http;
pub mod protocol;
pub mod ws;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::registry::StationRegistry;
use crate::shared::SimulatorError;
use protocol::{ProcedureName, StartTransactionPayload, StopTransactionPayload, TargetPayload};

/// Capability shared by the WebSocket and HTTP control-plane servers.
#[async_trait]
pub trait UiServer: Send + Sync {
    /// Bind and serve until shutdown.
    async fn serve(self: Arc<Self>) -> Result<(), SimulatorError>;

    fn name(&self) -> &'static str;
}

/// Execute one control-plane procedure against the registry.
pub async fn execute_procedure(
    registry: &StationRegistry,
    procedure: &str,
    payload: &Value,
) -> Value {
    let Ok(name) = ProcedureName::from_str(procedure) else {
        return serde_json::json!({
            "status": "failure",
            "error": format!("unknown procedure '{procedure}'"),
        });
    };
    debug!(procedure = name.as_str(), "Control-plane procedure");

    fn targets(payload: &Value) -> Option<Vec<String>> {
        serde_json::from_value::<TargetPayload>(payload.clone())
            .unwrap_or_default()
            .hash_ids
    }

    match name {
        ProcedureName::StartChargingStation => {
            let ids = targets(payload);
            to_value(registry.start_stations(ids.as_deref()).await)
        }
        ProcedureName::StopChargingStation => {
            let ids = targets(payload);
            to_value(registry.stop_stations(ids.as_deref()).await)
        }
        ProcedureName::OpenConnection => {
            let ids = targets(payload);
            to_value(registry.open_connections(ids.as_deref()).await)
        }
        ProcedureName::CloseConnection => {
            let ids = targets(payload);
            to_value(registry.close_connections(ids.as_deref()).await)
        }
        ProcedureName::StartTransaction => {
            let parsed: StartTransactionPayload =
                serde_json::from_value(payload.clone()).unwrap_or_default();
            to_value(
                registry
                    .start_transaction(
                        parsed.hash_ids.as_deref(),
                        parsed.connector_id,
                        parsed.id_tag,
                    )
                    .await,
            )
        }
        ProcedureName::StopTransaction => {
            let parsed: StopTransactionPayload =
                serde_json::from_value(payload.clone()).unwrap_or_default();
            let transaction_id = parsed.transaction_id_string();
            to_value(
                registry
                    .stop_transaction(parsed.hash_ids.as_deref(), transaction_id)
                    .await,
            )
        }
        ProcedureName::StartAutomaticTransactionGenerator => {
            let ids = targets(payload);
            to_value(registry.start_atg(ids.as_deref()).await)
        }
        ProcedureName::StopAutomaticTransactionGenerator => {
            let ids = targets(payload);
            to_value(registry.stop_atg(ids.as_deref()).await)
        }
        ProcedureName::StatusNotification => {
            let ids = targets(payload);
            let snapshots = registry.status(ids.as_deref()).await;
            serde_json::json!({
                "status": "success",
                "chargingStations": snapshots,
            })
        }
        ProcedureName::ListTemplates => {
            serde_json::json!({
                "status": "success",
                "templates": registry.template_names(),
            })
        }
    }
}

fn to_value<T: serde::Serialize>(outcome: T) -> Value {
    serde_json::to_value(outcome).unwrap_or_else(|_| {
        serde_json::json!({ "status": "failure", "error": "serialization" })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::NullConfigurationStore;
    use crate::registry::create_event_bus;
    use crate::station::certificates::InMemoryCertificateManager;

    fn registry() -> StationRegistry {
        StationRegistry::new(
            create_event_bus(),
            Arc::new(NullConfigurationStore),
            Arc::new(InMemoryCertificateManager::new()),
        )
    }

    #[tokio::test]
    async fn unknown_procedure_is_a_failure() {
        let registry = registry();
        let result =
            execute_procedure(&registry, "selfDestruct", &serde_json::json!({})).await;
        assert_eq!(result["status"], "failure");
    }

    #[tokio::test]
    async fn status_notification_lists_stations() {
        let registry = registry();
        let result =
            execute_procedure(&registry, "statusNotification", &serde_json::json!({})).await;
        assert_eq!(result["status"], "success");
        assert!(result["chargingStations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_station_with_unknown_target_fails() {
        let registry = registry();
        let result = execute_procedure(
            &registry,
            "stopChargingStation",
            &serde_json::json!({"hashIds": ["nope"]}),
        )
        .await;
        assert_eq!(result["status"], "failure");
        assert_eq!(result["hashIdsFailed"][0], "nope");
    }
}
