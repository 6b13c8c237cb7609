//! Feed trait definition

use async_trait::async_trait;

use super::FeedError;
use crate::domain::{Security, TaskKind, UpdateStatus};

/// Rate-limit retries granted to a group unless its feed says otherwise
pub const DEFAULT_MAX_RATE_LIMIT_ATTEMPTS: i32 = 3;

/// A market data provider able to refresh a security.
///
/// Implementations perform the actual fetch (HTTP, parsing, storing the
/// quotes on the security) and classify failures into [`FeedError`] so the
/// worker loop can decide whether to retry, skip the security, or abandon the
/// whole group.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Stable identifier of the provider
    fn id(&self) -> &str;

    /// How many rate-limit signals a group of this feed tolerates before failing
    fn max_rate_limit_attempts(&self) -> i32 {
        DEFAULT_MAX_RATE_LIMIT_ATTEMPTS
    }

    /// Key used to partition tasks into scheduler groups
    fn grouping_criterion(&self, _security: &Security) -> String {
        self.id().to_string()
    }

    /// Refresh `kind` data of `security`
    async fn update(&self, security: &Security, kind: TaskKind) -> Result<UpdateStatus, FeedError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing::debug;

    /// Mock feed for unit tests
    ///
    /// Returns scripted results per security id, falling back to `Modified`.
    pub struct MockFeed {
        id: String,
        max_attempts: i32,
        delay: Duration,
        results: Mutex<HashMap<String, VecDeque<Result<UpdateStatus, FeedError>>>>,
        calls: Mutex<Vec<String>>,
        panics_on: Vec<String>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl MockFeed {
        pub fn new(id: &str) -> Self {
            debug!(%id, "MockFeed::new: called");
            Self {
                id: id.to_string(),
                max_attempts: DEFAULT_MAX_RATE_LIMIT_ATTEMPTS,
                delay: Duration::ZERO,
                results: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                panics_on: Vec::new(),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
            self.max_attempts = max_attempts;
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Panic instead of answering for `security_id`
        pub fn with_panic(mut self, security_id: &str) -> Self {
            self.panics_on.push(security_id.to_string());
            self
        }

        /// Queue a result for the next call on `security_id`
        pub fn with_result(self, security_id: &str, result: Result<UpdateStatus, FeedError>) -> Self {
            self.results
                .lock()
                .unwrap()
                .entry(security_id.to_string())
                .or_default()
                .push_back(result);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Security ids in the order they were fetched
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn peak_in_flight(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Feed for MockFeed {
        fn id(&self) -> &str {
            &self.id
        }

        fn max_rate_limit_attempts(&self) -> i32 {
            self.max_attempts
        }

        async fn update(&self, security: &Security, _kind: TaskKind) -> Result<UpdateStatus, FeedError> {
            self.calls.lock().unwrap().push(security.id.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if self.panics_on.contains(&security.id) {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("mock feed crashed on {}", security.id);
            }

            let result = self
                .results
                .lock()
                .unwrap()
                .get_mut(&security.id)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(Ok(UpdateStatus::Modified));

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }
}
