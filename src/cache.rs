//! Two-tier query caching.
//!
//! A process-wide `QueryCache` (TTL bound, invalidated by tag after admin writes) sits behind a
//! per-request `RequestMemo` that deduplicates identical loads issued while building one response.
//! Values are stored as JSON so one cache can hold every query shape.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::sync::Cache;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ApiResult;

pub const TAG_DOMAINS: &str = "domains";
pub const TAG_CATEGORIES: &str = "categories";
pub const TAG_PAGES: &str = "pages";
pub const TAG_TABLES: &str = "tables";

/// QueryCache
///
/// Contract for the cross-request cache. Swappable for `NoopCache` in tests.
pub trait QueryCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn insert(&self, key: &str, tags: &[&str], value: Value);
    /// Drops every entry carrying `tag`.
    fn invalidate_tag(&self, tag: &str);
}

pub type CacheState = Arc<dyn QueryCache>;

#[derive(Clone)]
struct CachedEntry {
    value: Arc<Value>,
    tags: Arc<Vec<String>>,
}

/// MokaQueryCache
///
/// TTL-based in-memory cache with LRU eviction.
pub struct MokaQueryCache {
    entries: Cache<String, CachedEntry>,
}

impl MokaQueryCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }
}

impl QueryCache for MokaQueryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| (*entry.value).clone())
    }

    fn insert(&self, key: &str, tags: &[&str], value: Value) {
        let entry = CachedEntry {
            value: Arc::new(value),
            tags: Arc::new(tags.iter().map(|t| t.to_string()).collect()),
        };
        self.entries.insert(key.to_string(), entry);
    }

    fn invalidate_tag(&self, tag: &str) {
        let stale: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| t == tag))
            .map(|(key, _)| key)
            .collect();
        tracing::debug!(tag, count = stale.len(), "invalidating cached queries");
        for key in stale {
            self.entries.invalidate(key.as_str());
        }
    }
}

/// Cache that never stores anything.
#[derive(Clone, Default)]
pub struct NoopCache;

impl QueryCache for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn insert(&self, _key: &str, _tags: &[&str], _value: Value) {}

    fn invalidate_tag(&self, _tag: &str) {}
}

/// Invalidates several tags at once after a write.
pub fn invalidate(cache: &dyn QueryCache, tags: &[&str]) {
    for tag in tags {
        cache.invalidate_tag(tag);
    }
}

/// RequestMemo
///
/// Request-scoped layer in front of the shared cache. Created per request and dropped with it.
pub struct RequestMemo {
    shared: CacheState,
    local: Mutex<HashMap<String, Value>>,
}

impl RequestMemo {
    pub fn new(shared: CacheState) -> Self {
        Self {
            shared,
            local: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the memoized value for `key`, consulting the request memo, then the shared cache,
    /// then `load`. Fresh results are written to both tiers.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, tags: &[&str], load: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if let Some(hit) = self.local_get(key) {
            return Ok(serde_json::from_value(hit)?);
        }
        if let Some(hit) = self.shared.get(key) {
            self.local_put(key, hit.clone());
            return Ok(serde_json::from_value(hit)?);
        }

        let fresh = load().await?;
        let value = serde_json::to_value(&fresh)?;
        self.shared.insert(key, tags, value.clone());
        self.local_put(key, value);
        Ok(fresh)
    }

    fn local_get(&self, key: &str) -> Option<Value> {
        self.local
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    fn local_put(&self, key: &str, value: Value) {
        if let Ok(mut map) = self.local.lock() {
            map.insert(key.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn moka_cache_invalidates_by_tag() {
        let cache = MokaQueryCache::new(Duration::from_secs(60), 100);
        cache.insert("domains:IN", &[TAG_DOMAINS], json!([1, 2]));
        cache.insert("categories", &[TAG_CATEGORIES], json!(["a"]));
        assert_eq!(cache.get("domains:IN"), Some(json!([1, 2])));

        cache.invalidate_tag(TAG_DOMAINS);

        assert!(cache.get("domains:IN").is_none());
        assert_eq!(cache.get("categories"), Some(json!(["a"])));
    }

    #[test]
    fn noop_cache_stores_nothing() {
        let cache = NoopCache;
        cache.insert("k", &[], json!(1));
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn memo_deduplicates_within_a_request() {
        let memo = RequestMemo::new(Arc::new(NoopCache));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let got: Vec<i32> = memo
                .get_or_load("key", &[], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(got, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memo_reads_through_shared_cache_across_requests() {
        let shared: CacheState = Arc::new(MokaQueryCache::new(Duration::from_secs(60), 100));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let memo = RequestMemo::new(shared.clone());
            let _: String = memo
                .get_or_load("greeting", &[TAG_PAGES], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("hello".to_string())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        shared.invalidate_tag(TAG_PAGES);
        let memo = RequestMemo::new(shared.clone());
        let _: String = memo
            .get_or_load("greeting", &[TAG_PAGES], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("hello".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
