//! Station lifecycle state
//!
//! `Stopped → Starting → Registering → Accepted | Pending | Rejected`.
//! Only `Accepted` lets transactions, heartbeats, status notifications and
//! meter values flow.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationState {
    Stopped,
    Starting,
    Registering,
    Accepted,
    Pending,
    Rejected,
}

impl StationState {
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Whether a (re)registration attempt is still meaningful.
    pub fn may_register(&self) -> bool {
        matches!(self, Self::Starting | Self::Registering | Self::Pending)
    }
}

impl Default for StationState {
    fn default() -> Self {
        Self::Stopped
    }
}
