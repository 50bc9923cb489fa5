//! Coordinated simulator shutdown
//!
//! One stop flag fans out to every long-lived task: the control-plane
//! accept loops select on it and the supervisor observes it to drain the
//! fleet. Draining is ordered work, not just task cancellation: transaction
//! generators stop first, running transactions end with a stop reason, then
//! the sockets close; the coordinator bounds all of that with a grace
//! window so a hung CSMS cannot stall process exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable stop flag; flips exactly once.
#[derive(Clone)]
pub struct ShutdownSignal {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }

    /// Idempotent; only the first call flips the flag.
    pub fn trigger(&self) {
        let flipped = self.flag.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });
        if flipped {
            info!("Shutdown requested, draining the fleet");
        }
    }

    /// Resolve once the flag flips; immediate when already stopped.
    pub async fn wait(&self) {
        let mut receiver = self.flag.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// A single-use future for `tokio::select!` arms.
    pub fn notified(&self) -> ShutdownNotified {
        ShutdownNotified {
            receiver: self.flag.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves when the owning signal is triggered.
pub struct ShutdownNotified {
    receiver: watch::Receiver<bool>,
}

impl ShutdownNotified {
    pub async fn wait(mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Flips the signal on OS signals and bounds the fleet drain.
pub struct ShutdownCoordinator {
    signal: ShutdownSignal,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_secs: u64) -> Self {
        Self {
            signal: ShutdownSignal::new(),
            grace: Duration::from_secs(grace_secs),
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    pub fn start_signal_listener(&self) {
        let signal = self.signal.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            signal.trigger();
        });
    }

    /// Wait for the trigger, then run `drain` with at most the grace
    /// window. The drain is where stations stop their generators, end
    /// running transactions and close their sockets; returns whether it
    /// finished in time.
    pub async fn drain<F, Fut>(&self, drain: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        self.signal.wait().await;
        match tokio::time::timeout(self.grace, drain()).await {
            Ok(()) => {
                info!("Fleet drained");
                true
            }
            Err(_) => {
                warn!(
                    grace_secs = self.grace.as_secs(),
                    "Fleet drain exceeded the grace window, exiting anyway"
                );
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(30)
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("SIGTERM received"),
                    _ = sigint.recv() => info!("SIGINT received"),
                }
            }
            _ => {
                // Handler installation failing leaves Ctrl+C as fallback.
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl+C received");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_is_idempotent_and_releases_waiters() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.wait().await });

        signal.trigger();
        signal.trigger();
        assert!(signal.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .expect("waiter released")
            .unwrap();
    }

    #[tokio::test]
    async fn late_subscribers_resolve_immediately() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(100), signal.notified().wait())
            .await
            .expect("already-stopped notified resolves");
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("already-stopped wait resolves");
    }

    #[tokio::test]
    async fn drain_reports_grace_window_overrun() {
        let coordinator = ShutdownCoordinator::new(0);
        coordinator.signal().trigger();
        let finished = coordinator
            .drain(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
            })
            .await;
        assert!(!finished);

        let coordinator = ShutdownCoordinator::new(5);
        coordinator.signal().trigger();
        assert!(coordinator.drain(|| async {}).await);
    }
}
