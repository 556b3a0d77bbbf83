//! Bounded fingerprint → payload map with TTL expiry and LRU eviction.
//!
//! The store is not synchronized on its own; [`super::ResponseCache`] keeps it
//! behind a mutex and passes `now` in on every call. Both the eviction scan
//! and the sweep are linear over the store, which is fine for the hundreds to
//! low thousands of entries this cache is sized for.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use super::key::Fingerprint;
use super::metrics::CacheMetrics;
use crate::error::{CacheError, Result};

/// Raw mood/energy a response was generated under. Diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceContext {
    pub mood: Option<String>,
    pub energy: Option<f64>,
}

/// A single cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub payload: V,
    /// Millis since epoch when the entry was stored.
    pub created_at: u64,
    /// Millis since epoch of the last hit (or of the store, if never hit).
    pub last_accessed_at: u64,
    /// Number of hits served from this entry.
    pub access_count: u64,
    /// Reporting weight; never used for eviction ranking.
    pub estimated_cost: u64,
    pub source_context: SourceContext,
    /// Store-wide sequence number of the last touch. Breaks LRU ties.
    touch_seq: u64,
}

/// Read-only view of an entry, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub fingerprint: String,
    pub created_at: u64,
    pub last_accessed_at: u64,
    pub access_count: u64,
    pub estimated_cost: u64,
    pub source_context: SourceContext,
    pub age_ms: u64,
    pub expired: bool,
}

/// Bounded entry store.
pub struct EntryStore<V> {
    entries: HashMap<Fingerprint, CacheEntry<V>>,
    ttl_ms: u64,
    max_size: usize,
    seq: u64,
    metrics: Arc<CacheMetrics>,
}

impl<V: Clone> EntryStore<V> {
    /// `max_size` is clamped to a minimum of 1.
    pub fn new(ttl_ms: u64, max_size: usize, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
            max_size: max_size.max(1),
            seq: 0,
            metrics,
        }
    }

    /// Look up a payload. Absent and expired keys are both misses; an expired
    /// entry is removed on the spot.
    pub fn get(&mut self, key: &Fingerprint, now: u64) -> Option<V> {
        let expired = self.entries.get(key).map(|e| self.is_expired(e, now));
        match expired {
            None => {
                debug!(key = %key.short(), "Cache miss");
                self.metrics.record_miss();
                None
            }
            Some(true) => {
                debug!(key = %key.short(), "Cache entry expired, removing");
                self.entries.remove(key);
                self.metrics.record_expirations(1);
                self.metrics.record_miss();
                None
            }
            Some(false) => {
                let seq = self.next_seq();
                let entry = self.entries.get_mut(key)?;
                entry.last_accessed_at = now;
                entry.access_count = entry.access_count.saturating_add(1);
                entry.touch_seq = seq;
                self.metrics.record_hit(entry.estimated_cost);
                debug!(
                    key = %key.short(),
                    age_ms = now.saturating_sub(entry.created_at),
                    access_count = entry.access_count,
                    "Cache hit"
                );
                Some(entry.payload.clone())
            }
        }
    }

    /// Store a payload, replacing any entry under the same key.
    ///
    /// A new key arriving at a full store evicts the least recently accessed
    /// entry first.
    pub fn set(
        &mut self,
        key: Fingerprint,
        payload: V,
        estimated_cost: u64,
        source_context: SourceContext,
        now: u64,
    ) -> Result<()> {
        let is_new = !self.entries.contains_key(&key);
        if is_new && self.entries.len() >= self.max_size {
            self.evict_lru();
        }
        if is_new && self.entries.len() >= self.max_size {
            error!(
                key = %key.short(),
                size = self.entries.len(),
                max_size = self.max_size,
                "Capacity invariant violated, rejecting insert"
            );
            return Err(CacheError::CapacityInvariant {
                size: self.entries.len() + 1,
                max_size: self.max_size,
            });
        }

        let touch_seq = self.next_seq();
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
                estimated_cost,
                source_context,
                touch_seq,
            },
        );
        debug!(
            key = %key.short(),
            size = self.entries.len(),
            max_size = self.max_size,
            estimated_cost,
            "Stored response"
        );
        Ok(())
    }

    /// Remove every expired entry and return how many went.
    pub fn sweep(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl_ms;
        self.entries.retain(|_, e| now.saturating_sub(e.created_at) < ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.metrics.record_expirations(removed as u64);
            info!(
                removed,
                remaining = self.entries.len(),
                "Swept expired cache entries"
            );
        }
        removed
    }

    /// Describe an entry without touching its recency or the counters.
    pub fn peek(&self, key: &Fingerprint, now: u64) -> Option<EntryInfo> {
        self.entries.get(key).map(|e| EntryInfo {
            fingerprint: key.to_hex(),
            created_at: e.created_at,
            last_accessed_at: e.last_accessed_at,
            access_count: e.access_count,
            estimated_cost: e.estimated_cost,
            source_context: e.source_context.clone(),
            age_ms: now.saturating_sub(e.created_at),
            expired: self.is_expired(e, now),
        })
    }

    /// Drop all entries. Counters are left alone.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        info!(removed, "Cleared cache entries");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    // -- private helpers ---------------------------------------------------

    fn is_expired(&self, entry: &CacheEntry<V>, now: u64) -> bool {
        now.saturating_sub(entry.created_at) >= self.ttl_ms
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Evict the entry with the oldest `last_accessed_at`, earliest touch first
    /// on ties.
    fn evict_lru(&mut self) {
        if let Some(lru_key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.last_accessed_at, e.touch_seq))
            .map(|(k, _)| *k)
        {
            debug!(key = %lru_key.short(), "Evicting LRU cache entry");
            self.entries.remove(&lru_key);
            self.metrics.record_eviction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: u8) -> Fingerprint {
        Fingerprint::from([n; 32])
    }

    fn test_store(ttl_ms: u64, max_size: usize) -> EntryStore<String> {
        EntryStore::new(ttl_ms, max_size, Arc::new(CacheMetrics::new()))
    }

    fn put(store: &mut EntryStore<String>, key: u8, value: &str, now: u64) {
        store
            .set(fp(key), value.into(), 10, SourceContext::default(), now)
            .unwrap();
    }

    fn stats(store: &EntryStore<String>) -> crate::cache::metrics::CacheStats {
        store.metrics.snapshot(store.len(), store.max_size())
    }

    #[test]
    fn test_hit_miss() {
        let mut store = test_store(1000, 5);
        assert!(store.get(&fp(1), 0).is_none());
        put(&mut store, 1, "response", 0);
        assert_eq!(store.get(&fp(1), 10), Some("response".into()));
        let s = stats(&store);
        assert_eq!((s.hits, s.misses), (1, 1));
        assert_eq!(s.estimated_cost_saved, 10);
    }

    #[test]
    fn test_hit_updates_recency() {
        let mut store = test_store(1000, 5);
        put(&mut store, 1, "r", 0);
        let _ = store.get(&fp(1), 40);
        let _ = store.get(&fp(1), 70);
        let entry = store.entries.get(&fp(1)).unwrap();
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, 70);
        assert_eq!(entry.created_at, 0);
    }

    #[test]
    fn test_freshness_boundary() {
        let mut store = test_store(1000, 5);
        put(&mut store, 1, "r", 0);
        assert!(store.get(&fp(1), 999).is_some());
        assert!(store.get(&fp(1), 1000).is_none());
    }

    #[test]
    fn test_lazy_expiry_removes_entry() {
        let mut store = test_store(1000, 5);
        put(&mut store, 1, "r", 0);
        assert!(store.get(&fp(1), 5000).is_none());
        assert!(store.is_empty());
        let s = stats(&store);
        assert_eq!(s.misses, 1);
        assert_eq!(s.expirations, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let mut store = test_store(10_000, 5);
        for i in 0..5 {
            put(&mut store, i, &format!("v{i}"), 0);
        }
        // k0 = 1000 (most recent), k1 = 100 (oldest), k2-k4 = 500
        store.entries.get_mut(&fp(0)).unwrap().last_accessed_at = 1000;
        store.entries.get_mut(&fp(1)).unwrap().last_accessed_at = 100;
        for i in 2..5 {
            store.entries.get_mut(&fp(i)).unwrap().last_accessed_at = 500;
        }
        put(&mut store, 5, "v5", 1100);
        assert!(
            store.entries.contains_key(&fp(0)),
            "k0 had most recent access, should survive LRU"
        );
        assert!(
            !store.entries.contains_key(&fp(1)),
            "k1 had oldest last_accessed_at, should be evicted"
        );
        assert_eq!(store.len(), 5, "should stay at max capacity");
        assert_eq!(stats(&store).evictions, 1);
    }

    #[test]
    fn test_lru_tie_breaks_on_earliest_touch() {
        let mut store = test_store(10_000, 3);
        put(&mut store, 1, "a", 0);
        put(&mut store, 2, "b", 0);
        put(&mut store, 3, "c", 0);
        put(&mut store, 4, "d", 0);
        assert!(!store.entries.contains_key(&fp(1)));
        put(&mut store, 5, "e", 0);
        assert!(!store.entries.contains_key(&fp(2)));
        assert!(store.entries.contains_key(&fp(3)));
    }

    #[test]
    fn test_overwrite_resets_entry_without_eviction() {
        let mut store = test_store(1000, 2);
        put(&mut store, 1, "old", 0);
        put(&mut store, 2, "other", 10);
        let _ = store.get(&fp(1), 20);
        put(&mut store, 1, "new", 500);

        assert_eq!(store.len(), 2);
        assert_eq!(stats(&store).evictions, 0);
        let entry = store.entries.get(&fp(1)).unwrap();
        assert_eq!(entry.payload, "new");
        assert_eq!(entry.created_at, 500);
        assert_eq!(entry.access_count, 0);
        // created_at was reset, so the entry outlives its first deadline
        assert_eq!(store.get(&fp(1), 1200), Some("new".into()));
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let mut store = test_store(1000, 3);
        for i in 0..50u8 {
            put(&mut store, i, "v", u64::from(i));
            assert!(store.len() <= 3);
        }
        assert_eq!(stats(&store).evictions, 47);
    }

    #[test]
    fn test_max_size_zero_clamped() {
        let mut store = test_store(1000, 0);
        assert_eq!(store.max_size(), 1);
        put(&mut store, 1, "a", 0);
        put(&mut store, 2, "b", 0);
        assert_eq!(store.len(), 1);
        assert!(store.entries.contains_key(&fp(2)));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let mut store = test_store(1000, 10);
        put(&mut store, 1, "old", 0);
        put(&mut store, 2, "older", 100);
        put(&mut store, 3, "fresh", 900);
        assert_eq!(store.sweep(1100), 2);
        assert_eq!(store.len(), 1);
        assert!(store.entries.contains_key(&fp(3)));
        assert_eq!(stats(&store).expirations, 2);
        assert_eq!(stats(&store).evictions, 0);
        assert_eq!(store.sweep(1100), 0);
    }

    #[test]
    fn test_sweep_ignores_recency() {
        let mut store = test_store(1000, 10);
        put(&mut store, 1, "r", 0);
        let _ = store.get(&fp(1), 990);
        // recently read but created too long ago
        assert_eq!(store.sweep(1000), 1);
    }

    #[test]
    fn test_peek_does_not_touch() {
        let mut store = test_store(1000, 5);
        store
            .set(
                fp(1),
                "r".into(),
                42,
                SourceContext {
                    mood: Some("happy".into()),
                    energy: Some(73.0),
                },
                100,
            )
            .unwrap();
        let info = store.peek(&fp(1), 400).unwrap();
        assert_eq!(info.age_ms, 300);
        assert_eq!(info.access_count, 0);
        assert_eq!(info.estimated_cost, 42);
        assert_eq!(info.source_context.energy, Some(73.0));
        assert!(!info.expired);
        assert!(store.peek(&fp(1), 1100).unwrap().expired);
        assert_eq!(stats(&store).hits + stats(&store).misses, 0);
        assert!(store.peek(&fp(2), 0).is_none());
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut store = test_store(1000, 5);
        put(&mut store, 1, "r", 0);
        let _ = store.get(&fp(1), 1);
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
        assert!(store.get(&fp(1), 2).is_none());
        let s = stats(&store);
        assert_eq!((s.hits, s.misses, s.size), (1, 1, 0));
    }
}
