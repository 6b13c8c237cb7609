//! Simulated feed driven by configuration
//!
//! Stands in for a real provider client: it sleeps for a configurable
//! latency, can be told to rate limit, reject credentials or treat some
//! securities as misconfigured, and caches generated quotes in a
//! [`PageCache`] so that a second refresh within the TTL reports
//! `Unchanged`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pagecache::{CacheConfig, PageCache};
use rand::Rng;
use tracing::debug;

use super::{Feed, FeedError};
use crate::config::FeedConfig;
use crate::domain::{Security, TaskKind, UpdateStatus};

/// Feed answering from generated data
pub struct SimulatedFeed {
    config: FeedConfig,
    calls: AtomicU64,
    cache: PageCache<f64>,
}

impl SimulatedFeed {
    pub fn from_config(config: &FeedConfig, cache: &CacheConfig) -> Self {
        debug!(id = %config.id, "SimulatedFeed::from_config: called");
        Self {
            config: config.clone(),
            calls: AtomicU64::new(0),
            cache: cache.build(),
        }
    }

    /// Number of fetches attempted so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn latency(&self) -> Duration {
        let jitter = if self.config.jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.config.latency_ms + jitter)
    }

    fn cache_key(security: &Security, kind: TaskKind) -> String {
        format!("{}:{}", kind, security.id)
    }
}

#[async_trait]
impl Feed for SimulatedFeed {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn max_rate_limit_attempts(&self) -> i32 {
        self.config.max_rate_limit_attempts
    }

    async fn update(&self, security: &Security, kind: TaskKind) -> Result<UpdateStatus, FeedError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(feed = %self.config.id, security = %security.id, %kind, call, "SimulatedFeed::update: called");

        let key = Self::cache_key(security, kind);
        if self.cache.lookup(&key).is_some() {
            debug!(%key, "SimulatedFeed::update: cache hit");
            return Ok(UpdateStatus::Unchanged);
        }

        tokio::time::sleep(self.latency()).await;

        if self.config.auth_expired {
            return Err(FeedError::AuthenticationExpired);
        }

        if self.config.misconfigured.iter().any(|id| id == &security.id) {
            return Err(FeedError::Configuration(format!(
                "{}: no quotes available for '{}'",
                self.config.id, security.id
            )));
        }

        if self.config.rate_limit_every > 0 && call % self.config.rate_limit_every == 0 {
            return Err(FeedError::RateLimitExceeded {
                retry_after: Duration::from_millis(self.config.retry_after_ms),
            });
        }

        let quote = rand::rng().random_range(1.0..1000.0);
        self.cache.put(key, quote);
        Ok(UpdateStatus::Modified)
    }
}
