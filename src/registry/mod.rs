//! Station registry / supervisor
//!
//! Owns every simulated station, keyed by hash id. Control-plane procedures
//! land here, fan out to the targeted stations and come back as aggregate
//! `{status, hashIdsSucceeded, hashIdsFailed, responsesFailed}` results.

pub mod events;

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::persistence::ConfigurationStore;
use crate::shared::SimulatorError;
use crate::station::certificates::CertificateManager;
use crate::station::{ChargingStation, StationHandle, StationSnapshot};
use crate::template::{JsonTemplateLoader, LoadedTemplate, StationTemplate, TemplateLoader};

pub use events::{create_event_bus, EventBus, EventMessage, SharedEventBus, SimulatorEvent};

/// Aggregate result of a control-plane procedure.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hash_ids_succeeded: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hash_ids_failed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub responses_failed: Vec<Value>,
}

impl CommandOutcome {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            ..Default::default()
        }
    }

    pub fn failure() -> Self {
        Self {
            status: "failure".to_string(),
            ..Default::default()
        }
    }

    fn ok(mut self, hash_id: &str) -> Self {
        self.hash_ids_succeeded.push(hash_id.to_string());
        self
    }

    fn fail(mut self, hash_id: &str, error: impl std::fmt::Display) -> Self {
        self.status = "failure".to_string();
        self.hash_ids_failed.push(hash_id.to_string());
        self.responses_failed
            .push(serde_json::json!({ "hashId": hash_id, "error": error.to_string() }));
        self
    }

    fn finish(mut self) -> Self {
        if self.status.is_empty() {
            self.status = "success".to_string();
        }
        self
    }
}

struct StationRecord {
    template: Arc<StationTemplate>,
    template_hash: String,
    index: u32,
    hash_id: String,
    station_id: String,
    handle: Mutex<Option<StationHandle>>,
}

impl StationRecord {
    fn running_handle(&self) -> Option<StationHandle> {
        let guard = self.handle.lock();
        guard.as_ref().filter(|h| h.is_alive()).cloned()
    }
}

pub struct StationRegistry {
    stations: DashMap<String, Arc<StationRecord>>,
    events: SharedEventBus,
    store: Arc<dyn ConfigurationStore>,
    certificates: Arc<dyn CertificateManager>,
    template_names: Mutex<Vec<String>>,
}

impl StationRegistry {
    pub fn new(
        events: SharedEventBus,
        store: Arc<dyn ConfigurationStore>,
        certificates: Arc<dyn CertificateManager>,
    ) -> Self {
        Self {
            stations: DashMap::new(),
            events,
            store,
            certificates,
            template_names: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// Load a template file and register `count` station instances.
    /// Stations start when `auto_start` is set (or later via the control
    /// plane).
    pub fn provision_template(
        &self,
        path: &Path,
        count: u32,
        auto_start: bool,
    ) -> Result<Vec<String>, SimulatorError> {
        let LoadedTemplate {
            template,
            content_hash,
        } = JsonTemplateLoader.load_template(path)?;

        self.template_names.lock().push(template.base_name.clone());

        let mut hash_ids = Vec::new();
        for index in 1..=count {
            let info = crate::station::info::StationInfo::from_template(
                &template,
                &content_hash,
                index,
            );
            hash_ids.push(info.hash_id.clone());
            // Re-provisioning the same template keeps existing records (and
            // their running stations) untouched.
            if self.stations.contains_key(&info.hash_id) {
                continue;
            }
            let record = Arc::new(StationRecord {
                template: template.clone(),
                template_hash: content_hash.clone(),
                index,
                hash_id: info.hash_id.clone(),
                station_id: info.station_id.clone(),
                handle: Mutex::new(None),
            });
            self.stations.insert(record.hash_id.clone(), record.clone());

            if auto_start {
                if let Err(e) = self.start_record(&record) {
                    error!(
                        station_id = record.station_id.as_str(),
                        error = %e,
                        "Failed to start station"
                    );
                }
            }
        }

        info!(
            template = template.base_name.as_str(),
            stations = count,
            auto_start,
            "Template provisioned"
        );
        Ok(hash_ids)
    }

    fn start_record(&self, record: &Arc<StationRecord>) -> Result<(), SimulatorError> {
        let mut guard = record.handle.lock();
        if guard.as_ref().is_some_and(|h| h.is_alive()) {
            return Err(SimulatorError::AlreadyRunning(record.station_id.clone()));
        }
        let handle = ChargingStation::spawn(
            &record.template,
            &record.template_hash,
            record.index,
            self.store.clone(),
            self.events.clone(),
            self.certificates.clone(),
        )?;
        *guard = Some(handle);
        Ok(())
    }

    fn targets(&self, hash_ids: Option<&[String]>) -> Vec<Arc<StationRecord>> {
        match hash_ids {
            None => self.stations.iter().map(|e| e.value().clone()).collect(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.stations.get(id).map(|e| e.value().clone()))
                .collect(),
        }
    }

    fn missing_targets(&self, hash_ids: Option<&[String]>) -> Vec<String> {
        match hash_ids {
            None => Vec::new(),
            Some(ids) => ids
                .iter()
                .filter(|id| !self.stations.contains_key(*id))
                .cloned()
                .collect(),
        }
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn template_names(&self) -> Vec<String> {
        self.template_names.lock().clone()
    }

    // ── Procedures ─────────────────────────────────────────

    pub async fn start_stations(&self, hash_ids: Option<&[String]>) -> CommandOutcome {
        let mut outcome = CommandOutcome::default();
        for missing in self.missing_targets(hash_ids) {
            outcome = outcome.fail(&missing, "unknown station");
        }
        for record in self.targets(hash_ids) {
            outcome = match self.start_record(&record) {
                Ok(()) => outcome.ok(&record.hash_id),
                Err(e) => outcome.fail(&record.hash_id, e),
            };
        }
        outcome.finish()
    }

    pub async fn stop_stations(&self, hash_ids: Option<&[String]>) -> CommandOutcome {
        let mut outcome = CommandOutcome::default();
        for missing in self.missing_targets(hash_ids) {
            outcome = outcome.fail(&missing, "unknown station");
        }
        for record in self.targets(hash_ids) {
            let handle = record.running_handle();
            outcome = match handle {
                Some(handle) => match handle.stop().await {
                    Ok(()) => {
                        *record.handle.lock() = None;
                        outcome.ok(&record.hash_id)
                    }
                    Err(e) => outcome.fail(&record.hash_id, e),
                },
                None => outcome.fail(&record.hash_id, "not running"),
            };
        }
        outcome.finish()
    }

    pub async fn open_connections(&self, hash_ids: Option<&[String]>) -> CommandOutcome {
        self.for_each_running(hash_ids, |handle| async move {
            handle.open_connection().map_err(|e| e.to_string())
        })
        .await
    }

    pub async fn close_connections(&self, hash_ids: Option<&[String]>) -> CommandOutcome {
        self.for_each_running(hash_ids, |handle| async move {
            handle.close_connection().map_err(|e| e.to_string())
        })
        .await
    }

    pub async fn start_transaction(
        &self,
        hash_ids: Option<&[String]>,
        connector_id: Option<u32>,
        id_tag: Option<String>,
    ) -> CommandOutcome {
        let id_tag_ref = id_tag;
        self.for_each_running(hash_ids, move |handle| {
            let id_tag = id_tag_ref.clone();
            async move {
                handle
                    .start_transaction(connector_id, id_tag)
                    .await
                    .map(|_| ())
            }
        })
        .await
    }

    pub async fn stop_transaction(
        &self,
        hash_ids: Option<&[String]>,
        transaction_id: Option<String>,
    ) -> CommandOutcome {
        self.for_each_running(hash_ids, move |handle| {
            let transaction_id = transaction_id.clone();
            async move { handle.stop_transaction(None, transaction_id).await }
        })
        .await
    }

    pub async fn start_atg(&self, hash_ids: Option<&[String]>) -> CommandOutcome {
        self.for_each_running(hash_ids, |handle| async move { handle.start_atg().await })
            .await
    }

    pub async fn stop_atg(&self, hash_ids: Option<&[String]>) -> CommandOutcome {
        self.for_each_running(hash_ids, |handle| async move { handle.stop_atg().await })
            .await
    }

    pub async fn status(&self, hash_ids: Option<&[String]>) -> Vec<StationSnapshot> {
        let mut snapshots = Vec::new();
        for record in self.targets(hash_ids) {
            if let Some(handle) = record.running_handle() {
                if let Some(snapshot) = handle.snapshot().await {
                    snapshots.push(snapshot);
                }
            }
        }
        snapshots.sort_by(|a, b| a.station_id.cmp(&b.station_id));
        snapshots
    }

    /// Stop everything (simulator shutdown).
    pub async fn stop_all(&self) {
        let records: Vec<Arc<StationRecord>> =
            self.stations.iter().map(|e| e.value().clone()).collect();
        for record in records {
            if let Some(handle) = record.running_handle() {
                if let Err(e) = handle.stop().await {
                    warn!(
                        station_id = record.station_id.as_str(),
                        error = %e,
                        "Stop on shutdown failed"
                    );
                }
            }
            *record.handle.lock() = None;
        }
    }

    async fn for_each_running<F, Fut>(
        &self,
        hash_ids: Option<&[String]>,
        operation: F,
    ) -> CommandOutcome
    where
        F: Fn(StationHandle) -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        let mut outcome = CommandOutcome::default();
        for missing in self.missing_targets(hash_ids) {
            outcome = outcome.fail(&missing, "unknown station");
        }
        for record in self.targets(hash_ids) {
            outcome = match record.running_handle() {
                Some(handle) => match operation(handle).await {
                    Ok(()) => outcome.ok(&record.hash_id),
                    Err(e) => outcome.fail(&record.hash_id, e),
                },
                None => outcome.fail(&record.hash_id, "not running"),
            };
        }
        outcome.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::NullConfigurationStore;
    use crate::station::certificates::InMemoryCertificateManager;
    use std::io::Write;

    fn write_template(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("template.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"{
                "baseName": "CS-REG",
                "supervisionUrls": ["ws://localhost:9999/ocpp"],
                "chargePointModel": "M",
                "chargePointVendor": "V",
                "numberOfConnectors": 2
            }"#,
        )
        .unwrap();
        path
    }

    fn registry() -> StationRegistry {
        StationRegistry::new(
            create_event_bus(),
            Arc::new(NullConfigurationStore),
            Arc::new(InMemoryCertificateManager::new()),
        )
    }

    #[tokio::test]
    async fn provision_registers_stable_hash_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(&dir);
        let registry = registry();

        let hash_ids = registry.provision_template(&path, 3, false).unwrap();
        assert_eq!(hash_ids.len(), 3);
        assert_eq!(registry.station_count(), 3);
        // Same template, same indexes: same identities.
        let again = registry.provision_template(&path, 3, false).unwrap();
        assert_eq!(hash_ids, again);
        assert_eq!(registry.station_count(), 3);
    }

    #[tokio::test]
    async fn unknown_targets_fail_in_aggregate() {
        let registry = registry();
        let outcome = registry
            .stop_stations(Some(&["does-not-exist".to_string()]))
            .await;
        assert_eq!(outcome.status, "failure");
        assert_eq!(outcome.hash_ids_failed, vec!["does-not-exist".to_string()]);
    }

    #[tokio::test]
    async fn stop_without_start_reports_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(&dir);
        let registry = registry();
        let hash_ids = registry.provision_template(&path, 1, false).unwrap();

        let outcome = registry.stop_stations(Some(&hash_ids)).await;
        assert_eq!(outcome.status, "failure");
        assert_eq!(outcome.hash_ids_failed, hash_ids);
    }
}
