//!
//! OCPP charging-station simulator: stamps station fleets from JSON
//! templates and drives them against a CSMS. Reads configuration from a
//! JSON file (`SIM_CONFIG`, default `./config.json`).

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use texnouz_simulator::persistence::JsonFileConfigurationStore;
use texnouz_simulator::registry::create_event_bus;
use texnouz_simulator::station::certificates::InMemoryCertificateManager;
use texnouz_simulator::ui::http::UiHttpServer;
use texnouz_simulator::ui::ws::UiWebSocketServer;
use texnouz_simulator::ui::UiServer;
use texnouz_simulator::{ShutdownCoordinator, SimulatorConfig, StationRegistry, UiTransport};

#[tokio::main]
async fn main() -> ExitCode {
    // ── Load configuration ─────────────────────────────────────
    let config_path = SimulatorConfig::path_from_env();
    let config = match SimulatorConfig::load(&config_path) {
        Ok(config) => {
            init_logging(&config.log.level, config.log.json);
            info!("Configuration loaded from {}", config_path.display());
            config
        }
        Err(e) => {
            init_logging(SimulatorConfig::fallback_log_level(), false);
            error!("Failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };

    info!("Starting Texnouz OCPP station simulator...");

    // ── Prometheus metrics recorder (before any metrics calls) ─
    let prometheus_handle = if config.metrics.enabled {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("📊 Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                error!("Failed to install Prometheus recorder: {e}");
                None
            }
        }
    } else {
        None
    };

    // ── Registry & stations ────────────────────────────────────
    let event_bus = create_event_bus();
    let store = Arc::new(JsonFileConfigurationStore::new(&config.configuration_dir));
    let certificates = Arc::new(InMemoryCertificateManager::new());
    let registry = Arc::new(StationRegistry::new(event_bus, store, certificates));

    for entry in &config.station_template_urls {
        if let Err(e) = registry.provision_template(
            Path::new(&entry.file),
            entry.number_of_stations,
            entry.auto_start,
        ) {
            error!(template = entry.file.as_str(), "Template error: {e}");
            return ExitCode::from(1);
        }
    }
    info!(stations = registry.station_count(), "Fleet provisioned");

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownCoordinator::new(config.shutdown_timeout_seconds);
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    // ── Control-plane endpoint ─────────────────────────────────
    let ui_task = if config.ui_server.enabled {
        let task = match config.ui_server.transport {
            UiTransport::Ws => {
                let server = Arc::new(UiWebSocketServer::new(
                    config.ui_server.address(),
                    registry.clone(),
                    shutdown_signal.clone(),
                ));
                info!(kind = server.name(), "Control plane enabled");
                tokio::spawn(server.serve())
            }
            UiTransport::Http => {
                let server = Arc::new(UiHttpServer::new(
                    config.ui_server.address(),
                    registry.clone(),
                    shutdown_signal.clone(),
                    prometheus_handle,
                ));
                info!(kind = server.name(), "Control plane enabled");
                tokio::spawn(server.serve())
            }
        };
        Some(task)
    } else {
        None
    };

    info!("🚀 Simulator running. Press Ctrl+C to shutdown gracefully.");

    // ── Run until shutdown ─────────────────────────────────────
    let exit = if let Some(task) = ui_task {
        tokio::select! {
            result = task => {
                match result {
                    Ok(Ok(())) => {
                        info!("Control-plane server stopped");
                        ExitCode::SUCCESS
                    }
                    Ok(Err(e)) => {
                        error!("Control-plane server error: {e}");
                        ExitCode::from(2)
                    }
                    Err(e) => {
                        error!("Control-plane server task panicked: {e}");
                        ExitCode::from(2)
                    }
                }
            }
            _ = shutdown_signal.wait() => ExitCode::SUCCESS,
        }
    } else {
        shutdown_signal.wait().await;
        ExitCode::SUCCESS
    };

    // ── Fleet drain (bounded by the shutdown grace window) ─────
    info!("🧹 Stopping all stations...");
    shutdown_signal.trigger();
    let registry_drain = registry.clone();
    shutdown
        .drain(|| async move {
            registry_drain.stop_all().await;
        })
        .await;
    info!("👋 Simulator shutdown complete");
    exit
}

fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
