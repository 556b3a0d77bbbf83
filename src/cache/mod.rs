//! Response caching with normalized fingerprints, TTL expiry and LRU eviction.

pub mod clock;
pub mod key;
pub mod metrics;
pub mod response_cache;
pub mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{derive, ContextDescriptor, Fingerprint, KeyFactors};
pub use metrics::{CacheMetrics, CacheStats};
pub use response_cache::{CachePayload, ResponseCache, SetMetadata};
pub use store::{EntryInfo, SourceContext};
