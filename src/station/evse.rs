//! EVSE layout (OCPP 2.0.1)
//!
//! A 2.0.1 station contains EVSEs, each owning one or more connectors; the
//! flat 1.6 connector list (with its reserved connector 0) does not exist
//! there. Connectors keep globally unique ids across the station; the EVSE
//! records which global ids it owns.

use serde::{Deserialize, Serialize};

use super::connector::Availability;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evse {
    pub id: u32,
    #[serde(default)]
    pub availability: Availability,
    /// Global connector ids owned by this EVSE, in local order.
    pub connector_ids: Vec<u32>,
}

impl Evse {
    pub fn new(id: u32, connector_ids: Vec<u32>) -> Self {
        Self {
            id,
            availability: Availability::Operative,
            connector_ids,
        }
    }

    /// EVSE-local (1-based) id of a global connector.
    pub fn local_connector_id(&self, connector_id: u32) -> Option<u32> {
        self.connector_ids
            .iter()
            .position(|c| *c == connector_id)
            .map(|idx| idx as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_one_based_positions() {
        let evse = Evse::new(2, vec![3, 4]);
        assert_eq!(evse.local_connector_id(3), Some(1));
        assert_eq!(evse.local_connector_id(4), Some(2));
        assert_eq!(evse.local_connector_id(9), None);
    }
}
