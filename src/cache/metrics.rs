//! Lock-free hit/miss counters.
//!
//! Counters outlive store contents: `clear()` empties the store but the
//! counters keep reporting long-run effectiveness until [`CacheMetrics::reset`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

/// Running counters shared by the store and the sweeper.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    cost_saved: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a hit and the cost it saved.
    pub fn record_hit(&self, estimated_cost: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.cost_saved.fetch_add(estimated_cost, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Count entries dropped for age, lazily or by sweep.
    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.cost_saved.store(0, Ordering::Relaxed);
    }

    /// Combine the counters with the store's occupancy.
    pub fn snapshot(&self, size: usize, max_size: usize) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            estimated_cost_saved: self.cost_saved.load(Ordering::Relaxed),
            hit_rate: hit_rate(hits, misses),
            size,
            max_size,
        }
    }

    /// Emit current counters as a structured log line.
    pub fn emit_summary(&self, reason: &str, size: usize, max_size: usize) {
        let stats = self.snapshot(size, max_size);
        info!(
            event = "cache_summary",
            reason = reason,
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            expirations = stats.expirations,
            estimated_cost_saved = stats.estimated_cost_saved,
            hit_rate = stats.hit_rate,
            size = stats.size,
            max_size = stats.max_size,
            "Cache metrics"
        );
    }
}

/// Point-in-time view of cache effectiveness.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Entries removed for age, lazily on lookup or by sweep.
    pub expirations: u64,
    /// Sum of the estimated cost of every entry served as a hit.
    pub estimated_cost_saved: u64,
    /// `hits / (hits + misses)`, or `0.0` before any lookup.
    pub hit_rate: f64,
    pub size: usize,
    pub max_size: usize,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let stats = CacheMetrics::new().snapshot(0, 10);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.max_size, 10);
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = CacheMetrics::new();
        metrics.record_hit(100);
        metrics.record_hit(20);
        metrics.record_miss();
        metrics.record_eviction();
        metrics.record_expirations(3);

        let stats = metrics.snapshot(4, 10);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.estimated_cost_saved, 120);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.size, 4);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_hit(5);
        metrics.record_miss();
        metrics.reset();
        assert_eq!(metrics.snapshot(0, 1), CacheMetrics::new().snapshot(0, 1));
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(CacheMetrics::new().snapshot(1, 2)).unwrap();
        assert_eq!(json["hitRate"], 0.0);
        assert_eq!(json["maxSize"], 2);
        assert_eq!(json["estimatedCostSaved"], 0);
    }
}
