//! Per-connector runtime state

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::transaction::Transaction;
use crate::auth::UnifiedIdentifier;
use crate::ocpp::OutgoingAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Operative,
    Inoperative,
}

impl Default for Availability {
    fn default() -> Self {
        Self::Operative
    }
}

/// Unified connector status, superset of the 1.6 and 2.0.1 vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorStatus {
    Available,
    Preparing,
    Charging,
    SuspendedEv,
    SuspendedEvse,
    Finishing,
    Reserved,
    Occupied,
    Unavailable,
    Faulted,
}

impl ConnectorStatus {
    pub fn to_v16(self) -> rust_ocpp::v1_6::types::ChargePointStatus {
        use rust_ocpp::v1_6::types::ChargePointStatus as S;
        match self {
            Self::Available => S::Available,
            Self::Preparing => S::Preparing,
            Self::Charging => S::Charging,
            Self::SuspendedEv => S::SuspendedEV,
            Self::SuspendedEvse => S::SuspendedEVSE,
            Self::Finishing => S::Finishing,
            Self::Reserved => S::Reserved,
            // Occupied has no direct 1.6 state.
            Self::Occupied => S::Charging,
            Self::Unavailable => S::Unavailable,
            Self::Faulted => S::Faulted,
        }
    }

    pub fn to_v201(
        self,
    ) -> rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType {
        use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType as S;
        match self {
            Self::Available => S::Available,
            Self::Reserved => S::Reserved,
            Self::Unavailable => S::Unavailable,
            Self::Faulted => S::Faulted,
            // 2.0.1 collapses every in-use state to Occupied.
            Self::Preparing
            | Self::Charging
            | Self::SuspendedEv
            | Self::SuspendedEvse
            | Self::Finishing
            | Self::Occupied => S::Occupied,
        }
    }
}

impl Default for ConnectorStatus {
    fn default() -> Self {
        Self::Available
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i32,
    pub id_tag: String,
    pub expiry: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id_tag: Option<String>,
}

impl Reservation {
    pub fn is_expired(&self) -> bool {
        self.expiry <= Utc::now()
    }
}

/// A transaction event buffered while the socket was down, waiting for the
/// reconnect drain.
#[derive(Debug, Clone)]
pub struct QueuedTransactionEvent {
    pub action: OutgoingAction,
    pub payload: Value,
    /// 1.6 only: the placeholder id assigned while offline, replaced by the
    /// CSMS id when the queued StartTransaction is finally answered.
    pub local_tx_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorState {
    pub id: u32,
    /// Owning EVSE (2.0.1 layouts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_id: Option<u32>,
    /// Connector id local to its EVSE (2.0.1), 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_connector_id: Option<u32>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub status: ConnectorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Reservation>,
    /// Energy register (Wh), monotonic across transactions.
    #[serde(default)]
    pub energy_active_import_register_wh: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_identifier: Option<UnifiedIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_start_id: Option<i32>,
    /// FIFO of transaction events generated while offline.
    #[serde(skip)]
    pub offline_queue: VecDeque<QueuedTransactionEvent>,
}

impl ConnectorState {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            evse_id: None,
            evse_connector_id: None,
            availability: Availability::Operative,
            status: ConnectorStatus::Available,
            transaction: None,
            reservation: None,
            energy_active_import_register_wh: 0.0,
            authorized_identifier: None,
            remote_start_id: None,
            offline_queue: VecDeque::new(),
        }
    }

    pub fn for_evse(id: u32, evse_id: u32, evse_connector_id: u32) -> Self {
        let mut connector = Self::new(id);
        connector.evse_id = Some(evse_id);
        connector.evse_connector_id = Some(evse_connector_id);
        connector
    }

    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Active, non-expired reservation.
    pub fn active_reservation(&self) -> Option<&Reservation> {
        self.reservation.as_ref().filter(|r| !r.is_expired())
    }

    pub fn is_operative(&self) -> bool {
        self.availability == Availability::Operative
    }

    /// Clear transaction-scoped state after a stop.
    pub fn finish_transaction(&mut self) {
        self.transaction = None;
        self.authorized_identifier = None;
        self.remote_start_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v201_collapses_in_use_states_to_occupied() {
        use rust_ocpp::v2_0_1::enumerations::connector_status_enum_type::ConnectorStatusEnumType;
        for status in [
            ConnectorStatus::Preparing,
            ConnectorStatus::Charging,
            ConnectorStatus::Finishing,
        ] {
            assert_eq!(status.to_v201(), ConnectorStatusEnumType::Occupied);
        }
        assert_eq!(
            ConnectorStatus::Available.to_v201(),
            ConnectorStatusEnumType::Available
        );
    }

    #[test]
    fn expired_reservation_is_not_active() {
        let mut connector = ConnectorState::new(1);
        connector.reservation = Some(Reservation {
            id: 5,
            id_tag: "TAG".into(),
            expiry: Utc::now() - chrono::Duration::minutes(1),
            parent_id_tag: None,
        });
        assert!(connector.active_reservation().is_none());
        assert!(connector.reservation.is_some());
    }
}
