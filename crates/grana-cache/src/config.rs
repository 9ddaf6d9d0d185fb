//! Buffer cache configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the cache and its loader thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Byte budget for ready entries (default: 512MB)
    pub max_cache_bytes: u64,
    /// Bounded loader queue length (default: 256)
    pub queue_capacity: usize,
    /// Loader thread name (default: "grana-loader")
    pub thread_name: String,
    /// Persist intermediate chain prefixes (default: true)
    pub cache_prefixes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_bytes: 512 * 1024 * 1024,
            queue_capacity: 256,
            thread_name: "grana-loader".to_string(),
            cache_prefixes: true,
        }
    }
}

impl CacheConfig {
    /// Config with a custom byte budget.
    pub fn with_max_cache_bytes(bytes: u64) -> Self {
        Self {
            max_cache_bytes: bytes,
            ..Default::default()
        }
    }

    /// Parse from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_cache_bytes == 0 {
            return Err(Error::InvalidConfig(
                "max_cache_bytes must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(Error::InvalidConfig("thread_name is empty".to_string()));
        }
        Ok(())
    }
}
