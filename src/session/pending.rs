//! Pending-request correlation
//!
//! Every outbound CALL parks a oneshot continuation here under its message
//! id. Exactly one of {CALL_RESULT, CALL_ERROR, timeout, socket loss}
//! consumes the entry.

use std::time::Instant;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::shared::SessionError;

pub struct PendingRequest {
    pub action: String,
    pub sent_at: Instant,
    responder: oneshot::Sender<Result<Value, SessionError>>,
}

#[derive(Default)]
pub struct PendingRequestMap {
    inner: DashMap<String, PendingRequest>,
}

impl PendingRequestMap {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn insert(
        &self,
        message_id: impl Into<String>,
        action: impl Into<String>,
    ) -> oneshot::Receiver<Result<Value, SessionError>> {
        let (tx, rx) = oneshot::channel();
        self.inner.insert(
            message_id.into(),
            PendingRequest {
                action: action.into(),
                sent_at: Instant::now(),
                responder: tx,
            },
        );
        rx
    }

    /// Consume the entry for `message_id`; returns the action it was sent
    /// for, `None` for unknown ids.
    pub fn complete(
        &self,
        message_id: &str,
        outcome: Result<Value, SessionError>,
    ) -> Option<String> {
        match self.inner.remove(message_id) {
            Some((_, pending)) => {
                let action = pending.action.clone();
                let _ = pending.responder.send(outcome);
                Some(action)
            }
            None => {
                warn!(message_id, "Response for unknown request");
                None
            }
        }
    }

    /// Peek the action an id was registered for, without consuming it.
    pub fn action_of(&self, message_id: &str) -> Option<String> {
        self.inner.get(message_id).map(|p| p.action.clone())
    }

    /// Drop the entry without firing the continuation (timeout path, where
    /// the caller already gave up on the receiver).
    pub fn forget(&self, message_id: &str) {
        self.inner.remove(message_id);
    }

    /// Reject everything in flight (socket loss).
    pub fn reject_all(&self, make_error: impl Fn() -> SessionError) {
        let ids: Vec<String> = self.inner.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, pending)) = self.inner.remove(&id) {
                let _ = pending.responder.send(Err(make_error()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_fires_the_continuation_once() {
        let map = PendingRequestMap::new();
        let rx = map.insert("m1", "Heartbeat");

        let action = map.complete("m1", Ok(serde_json::json!({"currentTime": "t"})));
        assert_eq!(action.as_deref(), Some("Heartbeat"));
        assert!(map.is_empty());

        let outcome = rx.await.unwrap();
        assert!(outcome.is_ok());

        // Second completion is a no-op for unknown id.
        assert!(map.complete("m1", Ok(serde_json::json!({}))).is_none());
    }

    #[tokio::test]
    async fn reject_all_flushes_in_flight_requests() {
        let map = PendingRequestMap::new();
        let rx1 = map.insert("a", "StatusNotification");
        let rx2 = map.insert("b", "MeterValues");

        map.reject_all(|| SessionError::Offline);
        assert!(map.is_empty());
        assert!(matches!(rx1.await.unwrap(), Err(SessionError::Offline)));
        assert!(matches!(rx2.await.unwrap(), Err(SessionError::Offline)));
    }
}
