//! Authorization cache
//!
//! Keyed by identifier value; entries carry an absolute expiry computed from
//! the default TTL or the result's TTL override. Expiry is lazy (checked at
//! read time); `sweep()` exists for periodic cleanup.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::result::AuthorizationResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: AuthorizationResult,
    expires_at: DateTime<Utc>,
}

pub struct AuthorizationCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl AuthorizationCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Non-expired cache hit for `identifier_value`, if any.
    pub fn get(&self, identifier_value: &str) -> Option<AuthorizationResult> {
        let mut entries = self.entries.lock();
        match entries.get(identifier_value) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(identifier_value);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, identifier_value: impl Into<String>, result: AuthorizationResult) {
        let ttl = result.cache_ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            result,
            expires_at: Utc::now() + ttl,
        };
        self.entries.lock().insert(identifier_value.into(), entry);
    }

    /// Removes exactly one entry.
    pub fn invalidate(&self, identifier_value: &str) -> bool {
        self.entries.lock().remove(identifier_value).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry.
    pub fn sweep(&self) {
        let now = Utc::now();
        self.entries.lock().retain(|_, e| e.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::result::{AuthorizationMethod, AuthorizationStatus};

    fn accepted() -> AuthorizationResult {
        AuthorizationResult::accepted(AuthorizationMethod::Remote)
    }

    #[test]
    fn hit_miss_and_invalidate() {
        let cache = AuthorizationCache::new(Duration::minutes(10));
        cache.put("TAG1", accepted());

        assert!(cache.get("TAG1").is_some());
        assert!(cache.get("TAG2").is_none());

        assert!(cache.invalidate("TAG1"));
        assert!(!cache.invalidate("TAG1"));
        assert!(cache.get("TAG1").is_none());
    }

    #[test]
    fn expired_entry_is_dropped_on_read() {
        let cache = AuthorizationCache::new(Duration::minutes(-1));
        cache.put("TAG1", accepted());
        assert!(cache.get("TAG1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn ttl_override_wins() {
        let cache = AuthorizationCache::new(Duration::minutes(-1));
        let mut result = accepted();
        result.cache_ttl = Some(Duration::minutes(5));
        cache.put("TAG1", result);
        assert!(cache.get("TAG1").is_some());
    }

    #[test]
    fn clear_and_sweep() {
        let cache = AuthorizationCache::new(Duration::minutes(10));
        cache.put("A", accepted());
        let mut stale = accepted();
        stale.cache_ttl = Some(Duration::minutes(-5));
        cache.put("B", stale);

        cache.sweep();
        assert_eq!(cache.len(), 1);

        let mut result = AuthorizationResult::new(
            AuthorizationStatus::Blocked,
            AuthorizationMethod::Remote,
        );
        result.cache_ttl = None;
        cache.put("C", result);
        cache.clear();
        assert!(cache.is_empty());
    }
}
