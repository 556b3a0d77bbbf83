//! Adaptive response cache.
//!
//! Stores previously generated conversational responses under a normalized
//! request fingerprint so that equivalent requests can be answered without
//! regenerating them. Entries expire after a fixed TTL and the store is bounded
//! by LRU eviction.
//!
//! ```rust
//! use adaptive_cache::cache::{ContextDescriptor, ResponseCache, SetMetadata};
//! use adaptive_cache::config::CacheConfig;
//!
//! let cache: ResponseCache<String> = ResponseCache::new(CacheConfig::default()).unwrap();
//! let ctx = ContextDescriptor::default().with_mood("happy");
//!
//! assert!(cache.get("Thanks!!", &ctx).unwrap().is_none());
//! cache
//!     .set("Thanks!!", &ctx, "you're welcome".to_string(), SetMetadata::default())
//!     .unwrap();
//! assert_eq!(
//!     cache.get("thanks", &ctx).unwrap().as_deref(),
//!     Some("you're welcome")
//! );
//! ```

pub mod cache;
pub mod config;
pub mod error;

pub use error::{CacheError, Result};
