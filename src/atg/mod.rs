//! Automatic transaction generator
//!
//! Per-station traffic driver: one worker loop per eligible connector draws
//! random inter-transaction delays, flips a start-probability coin, picks an
//! id tag per the configured distribution and drives start/stop through the
//! owning station. Counters only ever go up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::template::{AtgTemplate, IdTagDistribution};

/// Per-connector generator statistics; every counter is monotonic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtgStatus {
    pub connector_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_date: Option<DateTime<Utc>>,
    pub started: bool,
    pub started_transactions: u64,
    pub stopped_transactions: u64,
    pub skipped_transactions: u64,
    pub accepted_authorize_requests: u64,
    pub rejected_authorize_requests: u64,
}

/// What the generator needs from its station.
#[async_trait]
pub trait TransactionDriver: Send + Sync {
    /// Run the authorization pipeline for `id_tag`.
    async fn authorize(&self, id_tag: &str) -> bool;

    async fn start_transaction(
        &self,
        connector_id: u32,
        id_tag: Option<String>,
    ) -> Result<(), String>;

    async fn stop_transaction(&self, connector_id: u32) -> Result<(), String>;

    /// Socket up and registration accepted.
    fn connection_ok(&self) -> bool;
}

pub struct AutomaticTransactionGenerator {
    config: AtgTemplate,
    driver: Arc<dyn TransactionDriver>,
    connector_ids: Vec<u32>,
    statuses: Arc<Mutex<HashMap<u32, AtgStatus>>>,
    running: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    round_robin: Arc<AtomicUsize>,
    created_at: DateTime<Utc>,
}

impl AutomaticTransactionGenerator {
    pub fn new(
        config: AtgTemplate,
        connector_ids: Vec<u32>,
        driver: Arc<dyn TransactionDriver>,
    ) -> Self {
        let statuses = connector_ids
            .iter()
            .map(|id| {
                (
                    *id,
                    AtgStatus {
                        connector_id: *id,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let (running, _) = watch::channel(false);
        Self {
            config,
            driver,
            connector_ids,
            statuses: Arc::new(Mutex::new(statuses)),
            running,
            tasks: Mutex::new(Vec::new()),
            round_robin: Arc::new(AtomicUsize::new(0)),
            created_at: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn start(&self) {
        if self.is_running() {
            debug!("Transaction generator already running");
            return;
        }
        let _ = self.running.send(true);
        let run_started = Utc::now();

        let mut tasks = self.tasks.lock();
        for connector_id in &self.connector_ids {
            let connector_id = *connector_id;
            {
                let mut statuses = self.statuses.lock();
                if let Some(status) = statuses.get_mut(&connector_id) {
                    status.started = true;
                    status.start_date = Some(run_started);
                    status.stop_date = None;
                }
            }

            let worker = ConnectorWorker {
                config: self.config.clone(),
                driver: self.driver.clone(),
                statuses: self.statuses.clone(),
                running: self.running.subscribe(),
                round_robin: self.round_robin.clone(),
                connector_id,
                run_started,
                created_at: self.created_at,
            };
            tasks.push(tokio::spawn(worker.run()));
        }
        info!(connectors = self.connector_ids.len(), "Transaction generator started");
    }

    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }
        let _ = self.running.send(false);
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        let now = Utc::now();
        let mut statuses = self.statuses.lock();
        for status in statuses.values_mut() {
            if status.started {
                status.started = false;
                status.stop_date = Some(now);
            }
        }
        info!("Transaction generator stopped");
    }

    pub fn status_snapshot(&self) -> Vec<AtgStatus> {
        let mut statuses: Vec<AtgStatus> = self.statuses.lock().values().cloned().collect();
        statuses.sort_by_key(|s| s.connector_id);
        statuses
    }
}

struct ConnectorWorker {
    config: AtgTemplate,
    driver: Arc<dyn TransactionDriver>,
    statuses: Arc<Mutex<HashMap<u32, AtgStatus>>>,
    running: watch::Receiver<bool>,
    round_robin: Arc<AtomicUsize>,
    connector_id: u32,
    run_started: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl ConnectorWorker {
    async fn run(mut self) {
        let connector_id = self.connector_id;
        debug!(connector_id, "Generator worker up");

        loop {
            if !*self.running.borrow() {
                break;
            }
            if self.time_budget_exhausted() {
                info!(connector_id, "Generator time budget exhausted");
                break;
            }

            let delay_secs = {
                let mut rng = rand::thread_rng();
                rng.gen_range(
                    self.config.min_delay_between_two_transactions
                        ..=self
                            .config
                            .max_delay_between_two_transactions
                            .max(self.config.min_delay_between_two_transactions),
                )
            };
            if !self.sleep_unless_stopped(Duration::from_secs(delay_secs)).await {
                break;
            }

            let roll: f64 = rand::thread_rng().gen();
            if roll >= self.config.probability_of_start {
                self.with_status(|s| s.skipped_transactions += 1);
                continue;
            }

            let id_tag = self.pick_id_tag();

            if self.config.require_authorize {
                if let Some(tag) = id_tag.as_deref() {
                    if self.driver.authorize(tag).await {
                        self.with_status(|s| s.accepted_authorize_requests += 1);
                    } else {
                        self.with_status(|s| s.rejected_authorize_requests += 1);
                        continue;
                    }
                }
            }

            match self.driver.start_transaction(connector_id, id_tag).await {
                Ok(()) => {
                    self.with_status(|s| s.started_transactions += 1);
                }
                Err(e) => {
                    warn!(connector_id, error = e.as_str(), "Generator start failed");
                    self.check_connection_failure();
                    continue;
                }
            }

            let duration_secs = {
                let mut rng = rand::thread_rng();
                rng.gen_range(
                    self.config.min_duration..=self.config.max_duration.max(self.config.min_duration),
                )
            };
            self.sleep_unless_stopped(Duration::from_secs(duration_secs)).await;

            match self.driver.stop_transaction(connector_id).await {
                Ok(()) => {
                    self.with_status(|s| s.stopped_transactions += 1);
                }
                Err(e) => {
                    warn!(connector_id, error = e.as_str(), "Generator stop failed");
                }
            }

            if self.config.stop_on_connection_failure && !self.driver.connection_ok() {
                warn!(connector_id, "Connection lost, generator worker stopping");
                break;
            }
        }

        self.with_status(|s| {
            s.started = false;
            s.stop_date = Some(Utc::now());
        });
        debug!(connector_id, "Generator worker down");
    }

    fn time_budget_exhausted(&self) -> bool {
        if self.config.stop_after_hours <= 0.0 {
            return false;
        }
        let reference = if self.config.stop_absolute_duration {
            self.created_at
        } else {
            self.run_started
        };
        let budget = chrono::Duration::seconds((self.config.stop_after_hours * 3600.0) as i64);
        Utc::now() - reference >= budget
    }

    /// Returns false when the generator was stopped mid-sleep.
    async fn sleep_unless_stopped(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            changed = self.running.changed() => {
                changed.is_ok() && *self.running.borrow()
            }
        }
    }

    fn pick_id_tag(&self) -> Option<String> {
        let tags = &self.config.id_tags;
        if tags.is_empty() {
            return None;
        }
        let index = match self.config.id_tag_distribution {
            IdTagDistribution::Random => rand::thread_rng().gen_range(0..tags.len()),
            IdTagDistribution::RoundRobin => {
                self.round_robin.fetch_add(1, Ordering::SeqCst) % tags.len()
            }
            IdTagDistribution::ConnectorAffinity => {
                self.connector_id.saturating_sub(1) as usize % tags.len()
            }
        };
        Some(tags[index].clone())
    }

    fn with_status(&self, apply: impl FnOnce(&mut AtgStatus)) {
        let mut statuses = self.statuses.lock();
        if let Some(status) = statuses.get_mut(&self.connector_id) {
            apply(status);
        }
    }

    fn check_connection_failure(&self) {
        if self.config.stop_on_connection_failure && !self.driver.connection_ok() {
            warn!(connector_id = self.connector_id, "Connection down during generator cycle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct MockDriver {
        starts: AtomicU64,
        stops: AtomicU64,
        authorize_accepts: bool,
        connected: std::sync::atomic::AtomicBool,
    }

    impl MockDriver {
        fn new(authorize_accepts: bool) -> Self {
            Self {
                starts: AtomicU64::new(0),
                stops: AtomicU64::new(0),
                authorize_accepts,
                connected: std::sync::atomic::AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl TransactionDriver for MockDriver {
        async fn authorize(&self, _id_tag: &str) -> bool {
            self.authorize_accepts
        }

        async fn start_transaction(
            &self,
            _connector_id: u32,
            _id_tag: Option<String>,
        ) -> Result<(), String> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_transaction(&self, _connector_id: u32) -> Result<(), String> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn connection_ok(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    fn fast_config(probability: f64) -> AtgTemplate {
        AtgTemplate {
            enable: true,
            min_delay_between_two_transactions: 0,
            max_delay_between_two_transactions: 0,
            min_duration: 0,
            max_duration: 0,
            probability_of_start: probability,
            stop_after_hours: 0.0,
            stop_absolute_duration: false,
            stop_on_connection_failure: true,
            require_authorize: false,
            id_tag_distribution: IdTagDistribution::RoundRobin,
            id_tags: vec!["TAG-A".into(), "TAG-B".into()],
        }
    }

    #[tokio::test]
    async fn generates_and_counts_transactions() {
        let driver = Arc::new(MockDriver::new(true));
        let atg = AutomaticTransactionGenerator::new(
            fast_config(1.0),
            vec![1],
            driver.clone(),
        );

        atg.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        atg.stop().await;

        let status = &atg.status_snapshot()[0];
        assert!(status.started_transactions >= 1);
        assert!(status.stopped_transactions <= status.started_transactions);
        assert!(driver.starts.load(Ordering::SeqCst) >= 1);
        assert!(!status.started);
        assert!(status.stop_date.is_some());
    }

    #[tokio::test]
    async fn zero_probability_only_skips() {
        let driver = Arc::new(MockDriver::new(true));
        let atg =
            AutomaticTransactionGenerator::new(fast_config(0.0), vec![1], driver.clone());

        atg.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        atg.stop().await;

        let status = &atg.status_snapshot()[0];
        assert_eq!(status.started_transactions, 0);
        assert!(status.skipped_transactions >= 1);
        assert_eq!(driver.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_authorization_skips_the_start() {
        let driver = Arc::new(MockDriver::new(false));
        let mut config = fast_config(1.0);
        config.require_authorize = true;
        let atg = AutomaticTransactionGenerator::new(config, vec![1], driver.clone());

        atg.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        atg.stop().await;

        let status = &atg.status_snapshot()[0];
        assert!(status.rejected_authorize_requests >= 1);
        assert_eq!(status.started_transactions, 0);
        assert_eq!(driver.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn restart_keeps_counters_monotonic() {
        let driver = Arc::new(MockDriver::new(true));
        let atg = AutomaticTransactionGenerator::new(fast_config(1.0), vec![1], driver);

        atg.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        atg.stop().await;
        let first = atg.status_snapshot()[0].started_transactions;

        atg.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        atg.stop().await;
        let second = atg.status_snapshot()[0].started_transactions;

        assert!(second >= first);
    }
}
