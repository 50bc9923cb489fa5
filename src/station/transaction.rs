//! Transaction records
//!
//! 1.6 transactions carry a CSMS-assigned integer id; 2.0.1 transactions a
//! station-generated UUID plus the per-event `seq_no` counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UnifiedIdentifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionId {
    /// OCPP 1.6: integer assigned by the CSMS in StartTransactionResponse.
    Integer(i32),
    /// OCPP 2.0.1: UUIDv4 string generated by the station.
    Uuid(String),
}

impl TransactionId {
    pub fn new_uuid() -> Self {
        Self::Uuid(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_wire_string(&self) -> String {
        match self {
            Self::Integer(id) => id.to_string(),
            Self::Uuid(id) => id.clone(),
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(id) => Some(*id),
            Self::Uuid(_) => None,
        }
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_wire_string())
    }
}

/// An active charging session on one connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub connector_id: u32,
    /// Owning EVSE (2.0.1 layouts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_id: Option<u32>,
    pub identifier: UnifiedIdentifier,
    pub started_at: DateTime<Utc>,
    /// Energy register at start (Wh).
    pub meter_start_wh: f64,
    /// Next 2.0.1 TransactionEvent sequence number; `Started` consumes 0.
    pub seq_no: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_start_id: Option<i32>,
    /// `evse` and `idToken` were already emitted in the Started event.
    pub started_event_sent: bool,
}

impl Transaction {
    pub fn new(
        id: TransactionId,
        connector_id: u32,
        evse_id: Option<u32>,
        identifier: UnifiedIdentifier,
        meter_start_wh: f64,
    ) -> Self {
        Self {
            id,
            connector_id,
            evse_id,
            identifier,
            started_at: Utc::now(),
            meter_start_wh,
            seq_no: 0,
            remote_start_id: None,
            started_event_sent: false,
        }
    }

    /// Claim the next sequence number (0 for `Started`, then 1, 2, …).
    pub fn next_seq_no(&mut self) -> u64 {
        let current = self.seq_no;
        self.seq_no += 1;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_no_counts_from_zero() {
        let mut tx = Transaction::new(
            TransactionId::new_uuid(),
            1,
            Some(1),
            UnifiedIdentifier::central("TAG"),
            0.0,
        );
        assert_eq!(tx.next_seq_no(), 0);
        assert_eq!(tx.next_seq_no(), 1);
        assert_eq!(tx.next_seq_no(), 2);
    }

    #[test]
    fn wire_string_formats() {
        assert_eq!(TransactionId::Integer(42).as_wire_string(), "42");
        let id = TransactionId::Uuid("abc".into());
        assert_eq!(id.as_wire_string(), "abc");
        assert_eq!(id.as_integer(), None);
    }
}
