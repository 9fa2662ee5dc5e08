//! Query caching: embedding cache and result cache with TTL, size caps,
//! two-phase eviction, and single-flight embedding computation.
//!
//! Both caches share one shape: a mutex-guarded map of timestamped entries,
//! a capacity whose working target is 80 %, and atomic hit/miss/eviction
//! counters. Eviction is a deliberate two-phase pass (expire everything
//! past TTL, then trim in map-iteration order) rather than per-insert LRU
//! bookkeeping; unordered traversal stands in for LRU under uniform traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use engram_core::QueryResult;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::backend::QueryFilter;
use crate::error::StoreError;

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub size: usize,
}

#[derive(Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    fn snapshot(&self, size: usize) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        CacheStatsSnapshot {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
            size,
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Shared TTL-map core for both caches.
struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    capacity: usize,
    ttl: Duration,
    stats: CacheStats,
}

impl<V: Clone> TtlCache<V> {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Working size target: 80 % of capacity, at least one slot.
    const fn threshold(&self) -> usize {
        let t = self.capacity * 8 / 10;
        if t == 0 { 1 } else { t }
    }

    fn get(&self, key: &str, count: bool) -> Option<V> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = map
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() <= self.ttl)
            .map(|entry| entry.value.clone());
        if hit.is_none() {
            // Drops the expired entry when there was one; never serve
            // past TTL.
            map.remove(key);
        }
        if count {
            if hit.is_some() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        hit
    }

    fn insert(&self, key: String, value: V) {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !map.contains_key(&key) && map.len() + 1 > self.threshold() {
            self.evict_locked(&mut map);
        }
        map.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Two-phase eviction under the held lock: expire all, then trim in
    /// map-iteration order until one slot below the working target.
    fn evict_locked(&self, map: &mut HashMap<String, Entry<V>>) {
        let before = map.len();
        map.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        let mut evicted = before - map.len();

        while map.len() >= self.threshold() {
            let Some(victim) = map.keys().next().cloned() else {
                break;
            };
            map.remove(&victim);
            evicted += 1;
        }
        if evicted > 0 {
            self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            trace!(evicted, remaining = map.len(), "cache eviction pass");
        }
    }

    fn sweep_expired(&self) -> usize {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        let expired = before - map.len();
        if expired > 0 {
            self.stats.evictions.fetch_add(expired as u64, Ordering::Relaxed);
        }
        expired
    }

    fn clear(&self) {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        map.clear();
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn snapshot(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.len())
    }
}

// ---------------------------------------------------------------------------
// Embedding cache
// ---------------------------------------------------------------------------

/// Query-text → embedding cache with single-flight miss coalescing.
pub struct EmbeddingCache {
    cache: TtlCache<Vec<f32>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(capacity, ttl),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn normalize_key(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Cached embedding for `text`, if fresh.
    #[must_use]
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.cache.get(&Self::normalize_key(text), true)
    }

    /// Cache-or-compute with single-flight deduplication: concurrent calls
    /// for the same text coalesce into one `compute` invocation. The
    /// double-checked pattern re-examines the cache after acquiring the
    /// per-key flight guard.
    ///
    /// # Errors
    ///
    /// Propagates the `compute` error; nothing is cached on failure.
    pub fn get_or_compute<F>(&self, text: &str, compute: F) -> Result<Vec<f32>, StoreError>
    where
        F: FnOnce() -> Result<Vec<f32>, StoreError>,
    {
        let key = Self::normalize_key(text);
        if let Some(vector) = self.cache.get(&key, true) {
            return Ok(vector);
        }

        let flight = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };
        let _guard = flight.lock().unwrap_or_else(PoisonError::into_inner);

        // A coalesced waiter finds the winner's value here.
        if let Some(vector) = self.cache.get(&key, false) {
            return Ok(vector);
        }

        let result = compute();
        if let Ok(vector) = &result {
            self.cache.insert(key.clone(), vector.clone());
        }
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            in_flight.remove(&key);
        }
        result
    }

    /// Insert without computing (used by warm-up paths).
    pub fn insert(&self, text: &str, vector: Vec<f32>) {
        self.cache.insert(Self::normalize_key(text), vector);
    }

    /// Remove expired entries; returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.cache.snapshot()
    }
}

// ---------------------------------------------------------------------------
// Result cache
// ---------------------------------------------------------------------------

/// (query, filter, k) → results cache. Values are defensive copies in both
/// directions; invalidated wholesale on every store write.
pub struct ResultCache {
    cache: TtlCache<Vec<QueryResult>>,
}

impl ResultCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(capacity, ttl),
        }
    }

    /// Structured cache key: `q:<text>:l:<k>[:dt:<doc_type>][:p:<project>]`.
    #[must_use]
    pub fn fingerprint(text: &str, k: usize, filter: &QueryFilter) -> String {
        use std::fmt::Write as _;
        let mut key = format!("q:{text}:l:{k}");
        if let Some(doc_type) = filter.doc_type {
            let _ = write!(key, ":dt:{doc_type}");
        }
        if let Some(project) = &filter.project {
            let _ = write!(key, ":p:{project}");
        }
        key
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<QueryResult>> {
        self.cache.get(key, true)
    }

    pub fn insert(&self, key: String, results: Vec<QueryResult>) {
        self.cache.insert(key, results);
    }

    /// Drop everything. Called on every write path so read-after-write
    /// never observes pre-write entries.
    pub fn invalidate(&self) {
        debug!("result cache invalidated");
        self.cache.clear();
    }

    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.cache.snapshot()
    }
}

/// Background cleaner: sweeps both caches on an interval until shutdown.
/// Sweep errors cannot occur; the task simply exits on signal.
pub fn spawn_cleaner(
    embedding: Arc<EmbeddingCache>,
    results: Arc<ResultCache>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = embedding.sweep_expired() + results.sweep_expired();
                    if expired > 0 {
                        debug!(expired, "cache cleaner sweep");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
