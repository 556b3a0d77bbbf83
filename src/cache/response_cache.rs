//! Public cache facade.
//!
//! [`ResponseCache`] ties key derivation, the bounded entry store and the
//! background sweeper together behind a message-level `get`/`set` contract.
//! Construct one explicitly and share it with `Arc`; every method takes
//! `&self` and is safe to call from concurrent requests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::key::{self, ContextDescriptor};
use super::metrics::{CacheMetrics, CacheStats};
use super::store::{EntryInfo, EntryStore, SourceContext};
use super::sweeper::{self, SweepTarget, SweeperHandle};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Approximate bytes per token for cost estimation.
const BYTES_PER_TOKEN: usize = 4;

/// Payloads the cache can hold.
///
/// `payload_len` feeds the default cost estimate when the caller does not
/// supply one.
pub trait CachePayload: Clone + Send + Sync + 'static {
    fn payload_len(&self) -> usize {
        0
    }
}

impl CachePayload for String {
    fn payload_len(&self) -> usize {
        self.len()
    }
}

impl CachePayload for serde_json::Value {
    fn payload_len(&self) -> usize {
        self.to_string().len()
    }
}

/// Optional extras for [`ResponseCache::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetMetadata {
    /// Caller-supplied cost of regenerating the response, e.g. tokens.
    pub estimated_cost: Option<u64>,
}

impl SetMetadata {
    pub fn with_cost(estimated_cost: u64) -> Self {
        Self {
            estimated_cost: Some(estimated_cost),
        }
    }
}

/// State shared between the facade and its sweep task.
struct Shared<V> {
    store: Mutex<EntryStore<V>>,
    metrics: Arc<CacheMetrics>,
    clock: Arc<dyn Clock>,
}

impl<V: CachePayload> Shared<V> {
    fn lock(&self) -> std::sync::MutexGuard<'_, EntryStore<V>> {
        self.store.lock().expect("cache store lock poisoned")
    }
}

impl<V: CachePayload> SweepTarget for Shared<V> {
    fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        self.lock().sweep(now)
    }

    fn emit_summary(&self, reason: &str) {
        let (size, max_size) = {
            let store = self.lock();
            (store.len(), store.max_size())
        };
        self.metrics.emit_summary(reason, size, max_size);
    }
}

/// Response cache keyed by normalized request fingerprints.
pub struct ResponseCache<V: CachePayload = String> {
    shared: Arc<Shared<V>>,
    sweeper: Mutex<Option<SweeperHandle>>,
    config: CacheConfig,
}

impl<V: CachePayload> ResponseCache<V> {
    /// Create a cache on the wall clock. The sweeper is not started.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(CacheMetrics::new());
        let store = EntryStore::new(config.ttl_ms, config.max_size, metrics.clone());
        info!(
            ttl_ms = config.ttl_ms,
            max_size = config.max_size,
            "Response cache initialized"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                store: Mutex::new(store),
                metrics,
                clock,
            }),
            sweeper: Mutex::new(None),
            config,
        })
    }

    /// Look up a cached response. `Ok(None)` is a miss.
    pub fn get(&self, message: &str, context: &ContextDescriptor) -> Result<Option<V>> {
        let key = key::derive(message, context)?;
        let now = self.shared.clock.now_ms();
        Ok(self.shared.lock().get(&key, now))
    }

    /// Cache `payload` as the response to `message` under `context`.
    ///
    /// Without an explicit cost the entry is weighted at roughly one token per
    /// four bytes of message plus payload.
    pub fn set(
        &self,
        message: &str,
        context: &ContextDescriptor,
        payload: V,
        metadata: SetMetadata,
    ) -> Result<()> {
        let key = key::derive(message, context)?;
        let estimated_cost = metadata
            .estimated_cost
            .unwrap_or_else(|| estimate_tokens(message.len() + payload.payload_len()));
        let source_context = SourceContext {
            mood: context.mood.clone(),
            energy: context.energy,
        };
        let now = self.shared.clock.now_ms();
        self.shared
            .lock()
            .set(key, payload, estimated_cost, source_context, now)
    }

    /// Inspect the entry for a request without counting a hit or miss.
    pub fn peek(&self, message: &str, context: &ContextDescriptor) -> Result<Option<EntryInfo>> {
        let key = key::derive(message, context)?;
        let now = self.shared.clock.now_ms();
        Ok(self.shared.lock().peek(&key, now))
    }

    /// Remove expired entries now rather than waiting for the sweeper.
    pub fn sweep(&self) -> usize {
        self.shared.sweep()
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.shared.lock();
        self.shared.metrics.snapshot(store.len(), store.max_size())
    }

    /// Drop every entry. Hit/miss counters keep running.
    pub fn clear(&self) {
        self.shared.lock().clear();
    }

    /// Zero the hit/miss/eviction counters.
    pub fn reset_stats(&self) {
        self.shared.metrics.reset();
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // -- sweeper lifecycle -------------------------------------------------

    /// Start the background sweep at the configured interval.
    pub fn start(&self) -> Result<()> {
        self.start_with_interval(self.config.sweep_interval())
    }

    /// Start the background sweep at `interval`.
    ///
    /// Requires a tokio runtime. Starting an already running sweeper is a
    /// no-op.
    pub fn start_with_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(CacheError::Validation(
                "sweep interval must be greater than zero".into(),
            ));
        }
        let mut slot = self.sweeper.lock().expect("sweeper lock poisoned");
        if slot.is_some() {
            warn!("Cache sweeper already running; ignoring start");
            return Ok(());
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CacheError::Runtime(
                "cache sweeper must be started inside a tokio runtime".into(),
            ));
        }
        let target: Arc<dyn SweepTarget> = self.shared.clone();
        *slot = Some(sweeper::spawn(target, interval));
        Ok(())
    }

    /// Stop the background sweep. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(handle) = self.sweeper.lock().expect("sweeper lock poisoned").take() {
            handle.signal_stop();
        }
    }

    /// Stop the background sweep and wait for its task to finish.
    pub async fn shutdown(&self) {
        let handle = self.sweeper.lock().expect("sweeper lock poisoned").take();
        if let Some(handle) = handle {
            handle.join().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.sweeper
            .lock()
            .expect("sweeper lock poisoned")
            .is_some()
    }
}

impl<V: CachePayload> Drop for ResponseCache<V> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.sweeper.lock() {
            if let Some(handle) = slot.take() {
                handle.signal_stop();
            }
        }
    }
}

fn estimate_tokens(bytes: usize) -> u64 {
    bytes.div_ceil(BYTES_PER_TOKEN) as u64
}
