//! Simulator configuration
//!
//! One JSON file describes the whole simulator run: which templates to
//! stamp stations from, the control-plane endpoint, logging and metrics.
//! The path comes from `SIM_CONFIG` (default `./config.json`); `BUILD`
//! selects the development profile (more verbose fallback logging).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::SimulatorError;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub file: String,
    #[serde(default = "default_station_count")]
    pub number_of_stations: u32,
    /// Start the stations as soon as the simulator boots.
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

fn default_station_count() -> u32 {
    1
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiTransport {
    Ws,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "type", default = "default_ui_transport")]
    pub transport: UiTransport,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ui_port")]
    pub port: u16,
}

fn default_ui_transport() -> UiTransport {
    UiTransport::Ws
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_ui_port() -> u16 {
    8080
}

impl Default for UiServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transport: UiTransport::Ws,
            host: default_host(),
            port: default_ui_port(),
        }
    }
}

impl UiServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConfig {
    pub station_template_urls: Vec<TemplateEntry>,
    #[serde(default)]
    pub ui_server: UiServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Directory for persisted per-station configurations.
    #[serde(default = "default_configuration_dir")]
    pub configuration_dir: String,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

fn default_configuration_dir() -> String {
    "configurations".to_string()
}
fn default_shutdown_timeout() -> u64 {
    30
}

impl SimulatorConfig {
    pub fn load(path: &Path) -> Result<Self, SimulatorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SimulatorError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: SimulatorConfig = serde_json::from_str(&content).map_err(|e| {
            SimulatorError::Configuration(format!("invalid configuration {}: {e}", path.display()))
        })?;
        if config.station_template_urls.is_empty() {
            return Err(SimulatorError::Configuration(
                "stationTemplateUrls must list at least one template".to_string(),
            ));
        }
        Ok(config)
    }

    /// Resolve the configuration path from the environment.
    pub fn path_from_env() -> PathBuf {
        std::env::var("SIM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Development builds fall back to debug-level logging.
    pub fn fallback_log_level() -> &'static str {
        match std::env::var("BUILD").as_deref() {
            Ok("development") => "debug",
            _ => "info",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"{
                "stationTemplateUrls": [
                    { "file": "templates/station.json", "numberOfStations": 4 }
                ]
            }"#,
        )
        .unwrap();

        let config = SimulatorConfig::load(&path).unwrap();
        assert_eq!(config.station_template_urls.len(), 1);
        assert_eq!(config.station_template_urls[0].number_of_stations, 4);
        assert!(config.station_template_urls[0].auto_start);
        assert_eq!(config.ui_server.transport, UiTransport::Ws);
        assert_eq!(config.ui_server.address(), "0.0.0.0:8080");
        assert_eq!(config.configuration_dir, "configurations");
    }

    #[test]
    fn rejects_empty_template_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, br#"{ "stationTemplateUrls": [] }"#).unwrap();
        assert!(SimulatorConfig::load(&path).is_err());
    }
}
