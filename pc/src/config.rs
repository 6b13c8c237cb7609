//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::{DEFAULT_TTL, PageCache};

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of cached pages in seconds
    #[serde(rename = "ttl-secs", default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    /// Get the time-to-live as a Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Build an empty cache using this configuration
    pub fn build<T: Clone>(&self) -> PageCache<T> {
        PageCache::with_ttl(self.ttl())
    }
}
