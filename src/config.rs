//! Cache configuration.
//!
//! Defaults match a one hour TTL, a thousand entries and a five minute sweep.
//! Values can be loaded from a JSON file and overridden from the environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CacheError, Result};

pub const DEFAULT_TTL_MS: u64 = 3_600_000;
pub const DEFAULT_MAX_SIZE: usize = 1_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 300_000;

const ENV_TTL_MS: &str = "ADAPTIVE_CACHE_TTL_MS";
const ENV_MAX_SIZE: &str = "ADAPTIVE_CACHE_MAX_SIZE";
const ENV_SWEEP_INTERVAL_MS: &str = "ADAPTIVE_CACHE_SWEEP_INTERVAL_MS";

/// Construction-time configuration for [`crate::cache::ResponseCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum age of an entry in milliseconds before it stops being a hit.
    pub ttl_ms: u64,
    /// Maximum number of entries held at once.
    pub max_size: usize,
    /// Period of the background expiry sweep in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            max_size: DEFAULT_MAX_SIZE,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ADAPTIVE_CACHE_*` environment overrides.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_u64(ENV_TTL_MS) {
            self.ttl_ms = v;
        }
        if let Some(v) = env_u64(ENV_MAX_SIZE) {
            self.max_size = v as usize;
        }
        if let Some(v) = env_u64(ENV_SWEEP_INTERVAL_MS) {
            self.sweep_interval_ms = v;
        }
        self
    }

    /// Reject configurations the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_ms == 0 {
            return Err(CacheError::Config("ttlMs must be greater than zero".into()));
        }
        if self.max_size == 0 {
            return Err(CacheError::Config(
                "maxSize must be greater than zero".into(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(CacheError::Config(
                "sweepIntervalMs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var = name, value = %raw, error = %e, "Ignoring unparseable cache override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_config_defaults() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.ttl_ms, 3_600_000);
        assert_eq!(cfg.max_size, 1_000);
        assert_eq!(cfg.sweep_interval_ms, 300_000);
        assert_eq!(cfg.ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_cache_config_deserialize_partial() {
        let json = r#"{"maxSize": 2, "somethingElse": true}"#;
        let cfg: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.max_size, 2);
        assert_eq!(cfg.ttl_ms, DEFAULT_TTL_MS); // default
    }

    #[test]
    fn test_validate_rejects_zero() {
        for cfg in [
            CacheConfig {
                ttl_ms: 0,
                ..Default::default()
            },
            CacheConfig {
                max_size: 0,
                ..Default::default()
            },
            CacheConfig {
                sweep_interval_ms: 0,
                ..Default::default()
            },
        ] {
            assert!(matches!(cfg.validate(), Err(CacheError::Config(_))));
        }
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, r#"{"ttlMs": 1000, "maxSize": 2}"#).unwrap();
        let cfg = CacheConfig::load_from_path(&path).unwrap();
        assert_eq!(cfg.ttl_ms, 1000);
        assert_eq!(cfg.max_size, 2);
        assert_eq!(cfg.sweep_interval_ms, DEFAULT_SWEEP_INTERVAL_MS);
    }

    #[test]
    fn test_load_from_path_rejects_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, r#"{"maxSize": 0}"#).unwrap();
        assert!(matches!(
            CacheConfig::load_from_path(&path),
            Err(CacheError::Config(_))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            CacheConfig::load_from_path(&path),
            Err(CacheError::Json(_))
        ));
    }

    #[test]
    fn test_load_from_missing_path() {
        let tmp = TempDir::new().unwrap();
        let err = CacheConfig::load_from_path(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var(ENV_TTL_MS, "5000");
        std::env::set_var(ENV_MAX_SIZE, "not-a-number");
        let cfg = CacheConfig::default().with_env_overrides();
        std::env::remove_var(ENV_TTL_MS);
        std::env::remove_var(ENV_MAX_SIZE);
        assert_eq!(cfg.ttl_ms, 5000);
        assert_eq!(cfg.max_size, DEFAULT_MAX_SIZE);
    }
}
