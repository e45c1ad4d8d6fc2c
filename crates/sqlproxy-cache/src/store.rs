use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use sqlproxy_core::Row;

use crate::entry::CacheEntry;

const DEFAULT_GLOBAL_MAX_BYTES: usize = 256 * 1024 * 1024;

#[derive(Default)]
struct EndpointMeta {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    bytes: AtomicUsize,
    soft_max_bytes: Option<usize>,
}

/// Process-wide result cache shared by every endpoint (spec §4.3).
///
/// Keys are namespaced as `"<endpoint>:<key>"` in the backing map; the
/// per-endpoint metadata table tracks byte usage and counters so eviction
/// under pressure only ever touches one endpoint's entries.
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    endpoints: DashMap<String, Arc<EndpointMeta>>,
    inflight: DashMap<String, Arc<AsyncMutex<Option<Result<Vec<Row>, String>>>>>,
    global_max_bytes: usize,
    global_bytes: AtomicUsize,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_GLOBAL_MAX_BYTES)
    }
}

impl ResultCache {
    pub fn new(global_max_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            endpoints: DashMap::new(),
            inflight: DashMap::new(),
            global_max_bytes,
            global_bytes: AtomicUsize::new(0),
        }
    }

    /// Declare an endpoint's own soft byte ceiling. Safe to call repeatedly;
    /// the endpoint is created lazily on first use otherwise.
    pub fn configure_endpoint(&self, endpoint: &str, soft_max_bytes: Option<usize>) {
        self.endpoints
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(EndpointMeta::default()))
            .soft_max_bytes = soft_max_bytes;
    }

    fn namespaced(endpoint: &str, key: &str) -> String {
        format!("{endpoint}:{key}")
    }

    fn meta(&self, endpoint: &str) -> Arc<EndpointMeta> {
        self.endpoints
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(EndpointMeta::default()))
            .clone()
    }

    /// `Get(endpoint, key) -> (rows, hit)`. Expired entries count as a miss.
    pub fn get(&self, endpoint: &str, key: &str) -> (Vec<Row>, bool) {
        let meta = self.meta(endpoint);
        let namespaced = Self::namespaced(endpoint, key);

        if let Some(entry) = self.entries.get(&namespaced) {
            if !entry.is_expired() {
                meta.hits.fetch_add(1, Ordering::Relaxed);
                return (entry.rows.clone(), true);
            }
        }
        // Either absent or expired; drop a stale entry so its bytes are reclaimed.
        if let Some((_, entry)) = self.entries.remove(&namespaced) {
            self.release_bytes(&meta, entry.size);
        }
        meta.misses.fetch_add(1, Ordering::Relaxed);
        (Vec::new(), false)
    }

    /// `Set(endpoint, key, rows, ttl) -> accepted`. `ttl=0` uses `default_ttl`.
    pub fn set(&self, endpoint: &str, key: &str, rows: Vec<Row>, ttl: Duration, default_ttl: Duration) -> bool {
        let ttl = if ttl.is_zero() { default_ttl } else { ttl };
        let entry = CacheEntry::new(rows, ttl);
        self.admit(endpoint, key, entry)
    }

    fn admit(&self, endpoint: &str, key: &str, entry: CacheEntry) -> bool {
        let meta = self.meta(endpoint);
        let namespaced = Self::namespaced(endpoint, key);
        let incoming_size = entry.size;

        if let Some(soft_max) = meta.soft_max_bytes {
            let current = meta.bytes.load(Ordering::Relaxed);
            if current + incoming_size > soft_max {
                let needed = current + incoming_size - soft_max;
                self.evict_endpoint_oldest(endpoint, &meta, needed);
            }
        }

        if self.global_bytes.load(Ordering::Relaxed) + incoming_size > self.global_max_bytes {
            let needed = self.global_bytes.load(Ordering::Relaxed) + incoming_size - self.global_max_bytes;
            self.evict_globally_oldest(needed);
        }

        if let Some(old) = self.entries.insert(namespaced, entry) {
            self.release_bytes(&meta, old.size);
        }
        meta.bytes.fetch_add(incoming_size, Ordering::Relaxed);
        self.global_bytes.fetch_add(incoming_size, Ordering::Relaxed);
        true
    }

    fn release_bytes(&self, meta: &EndpointMeta, size: usize) {
        meta.bytes.fetch_sub(size, Ordering::Relaxed);
        self.global_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    /// Evict this endpoint's own oldest-by-`cached_at` entries until at
    /// least `needed` bytes are freed (spec §4.3.2).
    fn evict_endpoint_oldest(&self, endpoint: &str, meta: &Arc<EndpointMeta>, needed: usize) {
        let prefix = format!("{endpoint}:");
        let mut candidates: Vec<(String, std::time::Instant, usize)> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| (e.key().clone(), e.value().cached_at, e.value().size))
            .collect();
        candidates.sort_by_key(|(_, cached_at, _)| *cached_at);

        let mut freed = 0usize;
        for (key, _, size) in candidates {
            if freed >= needed {
                break;
            }
            if self.entries.remove(&key).is_some() {
                self.release_bytes(meta, size);
                meta.evictions.fetch_add(1, Ordering::Relaxed);
                freed += size;
            }
        }
    }

    /// Evict globally-oldest entries (any endpoint) until `needed` bytes are freed.
    fn evict_globally_oldest(&self, needed: usize) {
        let mut candidates: Vec<(String, std::time::Instant, usize)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().cached_at, e.value().size))
            .collect();
        candidates.sort_by_key(|(_, cached_at, _)| *cached_at);

        let mut freed = 0usize;
        for (namespaced, _, size) in candidates {
            if freed >= needed {
                break;
            }
            let Some(endpoint) = namespaced.split(':').next() else { continue };
            let meta = self.meta(endpoint);
            if self.entries.remove(&namespaced).is_some() {
                self.release_bytes(&meta, size);
                meta.evictions.fetch_add(1, Ordering::Relaxed);
                freed += size;
            }
        }
    }

    /// `Delete(endpoint, key)`.
    pub fn delete(&self, endpoint: &str, key: &str) {
        let meta = self.meta(endpoint);
        if let Some((_, entry)) = self.entries.remove(&Self::namespaced(endpoint, key)) {
            self.release_bytes(&meta, entry.size);
            meta.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `Clear(endpoint)`.
    pub fn clear(&self, endpoint: &str) {
        let meta = self.meta(endpoint);
        let prefix = format!("{endpoint}:");
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect();
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                self.release_bytes(&meta, entry.size);
                meta.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// `ClearAll()`.
    pub fn clear_all(&self) {
        self.entries.clear();
        self.global_bytes.store(0, Ordering::Relaxed);
        for meta in self.endpoints.iter() {
            meta.value().bytes.store(0, Ordering::Relaxed);
        }
    }

    /// `GetTTLRemaining(endpoint, key)`; unknown keys yield zero.
    pub fn ttl_remaining(&self, endpoint: &str, key: &str) -> Duration {
        self.entries
            .get(&Self::namespaced(endpoint, key))
            .map(|e| e.ttl_remaining())
            .unwrap_or(Duration::ZERO)
    }

    /// `GetOrCompute(endpoint, key, ttl, compute)` (spec §4.3.1). At most
    /// one concurrent caller for a given `"<endpoint>:<key>"` runs `compute`;
    /// the rest block on its result.
    pub async fn get_or_compute<F, Fut>(
        &self,
        endpoint: &str,
        key: &str,
        ttl: Duration,
        default_ttl: Duration,
        compute: F,
    ) -> (Vec<Row>, bool, Option<String>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Row>, String>>,
    {
        let (rows, hit) = self.get(endpoint, key);
        if hit {
            return (rows, true, None);
        }

        let namespaced = Self::namespaced(endpoint, key);
        let cell = self
            .inflight
            .entry(namespaced.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone();

        let mut guard = cell.lock().await;
        if guard.is_none() {
            let result = compute().await;
            if let Ok(rows) = &result {
                self.set(endpoint, key, rows.clone(), ttl, default_ttl);
            }
            *guard = Some(result);
            self.inflight.remove(&namespaced);
        }
        let result = guard.clone().expect("leader always populates the cell before release");
        drop(guard);

        match result {
            Ok(rows) => (rows, false, None),
            Err(err) => (Vec::new(), false, Some(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlproxy_core::RowValue;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn row(id: i64) -> Row {
        let mut r = Row::new();
        r.insert("id".to_string(), RowValue::Int(id));
        r
    }

    #[test]
    fn miss_then_hit_after_set() {
        let cache = ResultCache::default();
        let (_, hit) = cache.get("users", "all");
        assert!(!hit);
        cache.set("users", "all", vec![row(1)], Duration::from_secs(60), Duration::from_secs(30));
        let (rows, hit) = cache.get("users", "all");
        assert!(hit);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn zero_ttl_falls_back_to_default() {
        let cache = ResultCache::default();
        cache.set("users", "all", vec![row(1)], Duration::ZERO, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        let (_, hit) = cache.get("users", "all");
        assert!(!hit, "entry should have expired using the default ttl");
    }

    #[test]
    fn delete_removes_entry_and_counts_eviction() {
        let cache = ResultCache::default();
        cache.set("users", "all", vec![row(1)], Duration::from_secs(60), Duration::from_secs(60));
        cache.delete("users", "all");
        let (_, hit) = cache.get("users", "all");
        assert!(!hit);
    }

    #[test]
    fn clear_removes_only_the_named_endpoint() {
        let cache = ResultCache::default();
        cache.set("users", "all", vec![row(1)], Duration::from_secs(60), Duration::from_secs(60));
        cache.set("orders", "all", vec![row(2)], Duration::from_secs(60), Duration::from_secs(60));
        cache.clear("users");
        assert!(!cache.get("users", "all").1);
        assert!(cache.get("orders", "all").1);
    }

    #[test]
    fn endpoint_over_soft_max_evicts_oldest_first() {
        let cache = ResultCache::default();
        cache.configure_endpoint("users", Some(1));
        cache.set("users", "a", vec![row(1)], Duration::from_secs(60), Duration::from_secs(60));
        cache.set("users", "b", vec![row(2)], Duration::from_secs(60), Duration::from_secs(60));
        // "a" was oldest; inserting "b" should have evicted it to stay under the tiny soft max.
        assert!(!cache.get("users", "a").1);
        assert!(cache.get("users", "b").1);
    }

    #[tokio::test]
    async fn get_or_compute_runs_exactly_once_for_concurrent_callers() {
        let cache = Arc::new(ResultCache::default());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("users", "all", Duration::from_secs(60), Duration::from_secs(60), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(vec![row(1)])
                    })
                    .await
            }));
        }
        for h in handles {
            let (rows, _, err) = h.await.unwrap();
            assert!(err.is_none());
            assert_eq!(rows.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_compute_propagates_error_to_every_waiter_without_caching() {
        let cache = ResultCache::default();
        let (rows, hit, err) = cache
            .get_or_compute("users", "all", Duration::from_secs(60), Duration::from_secs(60), || async move {
                Err("boom".to_string())
            })
            .await;
        assert!(rows.is_empty());
        assert!(!hit);
        assert_eq!(err.as_deref(), Some("boom"));
        assert!(!cache.get("users", "all").1);
    }
}
