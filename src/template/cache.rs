//! Process-wide template/configuration cache
//!
//! LRU keyed by content hash (templates) or station hash id (derived
//! configurations). Shared by every station in the process; mutation is
//! serialized behind a mutex.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::types::StationTemplate;
use crate::persistence::ChargingStationConfiguration;

const CACHE_CAPACITY: usize = 128;

#[derive(Clone)]
enum CacheValue {
    Template(Arc<StationTemplate>),
    Configuration(Arc<ChargingStationConfiguration>),
}

pub struct TemplateCache {
    entries: Mutex<LruCache<String, CacheValue>>,
}

impl TemplateCache {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("capacity must be non-zero"),
            )),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static TemplateCache {
        static GLOBAL: Lazy<TemplateCache> =
            Lazy::new(|| TemplateCache::with_capacity(CACHE_CAPACITY));
        &GLOBAL
    }

    pub fn get_template(&self, content_hash: &str) -> Option<Arc<StationTemplate>> {
        match self.entries.lock().get(content_hash) {
            Some(CacheValue::Template(t)) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn put_template(&self, content_hash: impl Into<String>, template: Arc<StationTemplate>) {
        self.entries
            .lock()
            .put(content_hash.into(), CacheValue::Template(template));
    }

    pub fn get_configuration(&self, hash_id: &str) -> Option<Arc<ChargingStationConfiguration>> {
        match self.entries.lock().get(hash_id) {
            Some(CacheValue::Configuration(c)) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn put_configuration(
        &self,
        hash_id: impl Into<String>,
        configuration: Arc<ChargingStationConfiguration>,
    ) {
        self.entries
            .lock()
            .put(hash_id.into(), CacheValue::Configuration(configuration));
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    /// Drop everything (tests and teardown).
    pub fn clear(&self) {
        self.entries.lock().clear();
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

    fn template() -> Arc<StationTemplate> {
        Arc::new(
            serde_json::from_value(serde_json::json!({
                "baseName": "CS-CACHE",
                "supervisionUrls": ["ws://localhost:8180/ocpp"],
                "chargePointModel": "M",
                "chargePointVendor": "V"
            }))
            .unwrap(),
        )
    }

    #[test]
    fn put_get_and_invalidate() {
        let cache = TemplateCache::with_capacity(4);
        cache.put_template("hash-a", template());
        assert!(cache.get_template("hash-a").is_some());
        assert!(cache.get_template("hash-b").is_none());

        cache.invalidate("hash-a");
        assert!(cache.get_template("hash-a").is_none());
    }

    #[test]
    fn lru_evicts_oldest() {
        let cache = TemplateCache::with_capacity(2);
        cache.put_template("one", template());
        cache.put_template("two", template());
        // Touch "one" so "two" is the eviction candidate.
        cache.get_template("one");
        cache.put_template("three", template());

        assert!(cache.get_template("one").is_some());
        assert!(cache.get_template("two").is_none());
        assert!(cache.get_template("three").is_some());
    }

    #[test]
    fn template_and_configuration_keys_are_disjoint_kinds() {
        let cache = TemplateCache::with_capacity(4);
        cache.put_template("key", template());
        // A template entry does not answer configuration lookups.
        assert!(cache.get_configuration("key").is_none());
    }
}
