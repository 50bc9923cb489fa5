//! Offline send queue
//!
//! Queueable CALLs issued while the socket is down wait here in FIFO order,
//! de-duplicated on (action, payload) equality. The replay pops an entry
//! only after its send succeeded, so a mid-drain failure preserves the rest.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCall {
    pub action: String,
    pub payload: Value,
}

#[derive(Default)]
pub struct SendQueue {
    inner: Mutex<VecDeque<QueuedCall>>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless an identical (action, payload) entry is already queued.
    /// Returns whether the entry was added.
    pub fn push_deduplicated(&self, action: impl Into<String>, payload: Value) -> bool {
        let entry = QueuedCall {
            action: action.into(),
            payload,
        };
        let mut queue = self.inner.lock();
        if queue.iter().any(|queued| *queued == entry) {
            return false;
        }
        queue.push_back(entry);
        true
    }

    pub fn front(&self) -> Option<QueuedCall> {
        self.inner.lock().front().cloned()
    }

    pub fn pop_front(&self) {
        self.inner.lock().pop_front();
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = SendQueue::new();
        queue.push_deduplicated("MeterValues", json!({"connectorId": 1}));
        queue.push_deduplicated("StopTransaction", json!({"transactionId": 7}));

        assert_eq!(queue.front().unwrap().action, "MeterValues");
        queue.pop_front();
        assert_eq!(queue.front().unwrap().action, "StopTransaction");
        queue.pop_front();
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicates_are_dropped() {
        let queue = SendQueue::new();
        assert!(queue.push_deduplicated("MeterValues", json!({"connectorId": 1})));
        assert!(!queue.push_deduplicated("MeterValues", json!({"connectorId": 1})));
        // Same action, different payload is a distinct entry.
        assert!(queue.push_deduplicated("MeterValues", json!({"connectorId": 2})));
        assert_eq!(queue.len(), 2);
    }
}
