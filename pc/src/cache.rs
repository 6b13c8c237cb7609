//! PageCache implementation

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Default time-to-live for cached pages
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct PageEntry<T> {
    inserted_at: Instant,
    value: T,
}

impl<T> PageEntry<T> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Entries plus their insertion order, oldest first
#[derive(Debug)]
struct Pages<T> {
    entries: HashMap<String, PageEntry<T>>,
    order: VecDeque<String>,
}

/// Thread-safe cache whose entries expire a fixed time after insertion.
///
/// Expired entries are never returned by [`PageCache::lookup`], but they are
/// only dropped opportunistically: each [`PageCache::put`] evicts the
/// least-recently-inserted entry if it has already expired. This keeps the
/// cache from growing under a steady stream of new keys without imposing a
/// hard size bound.
#[derive(Debug)]
pub struct PageCache<T> {
    ttl: Duration,
    pages: Mutex<Pages<T>>,
}

impl<T: Clone> PageCache<T> {
    /// Create a cache with the default five minute time-to-live
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache with a custom time-to-live
    pub fn with_ttl(ttl: Duration) -> Self {
        debug!(?ttl, "PageCache::with_ttl: called");
        Self {
            ttl,
            pages: Mutex::new(Pages {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Time-to-live applied to every entry
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key` if it is younger than the time-to-live
    pub fn lookup(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let pages = self.lock();
        match pages.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl, now) => Some(entry.value.clone()),
            Some(_) => {
                debug!(%key, "PageCache::lookup: expired");
                None
            }
            None => None,
        }
    }

    /// Insert `value` under `key` as the most recent entry
    pub fn put(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let now = Instant::now();
        let mut pages = self.lock();

        let replaced = pages
            .entries
            .insert(key.clone(), PageEntry { inserted_at: now, value })
            .is_some();
        if replaced {
            pages.order.retain(|k| k != &key);
        }
        pages.order.push_back(key);

        let eldest_expired = pages
            .order
            .front()
            .and_then(|eldest| pages.entries.get(eldest))
            .is_some_and(|entry| entry.is_expired(self.ttl, now));
        if eldest_expired {
            if let Some(eldest) = pages.order.pop_front() {
                debug!(key = %eldest, "PageCache::put: evicting expired eldest entry");
                pages.entries.remove(&eldest);
            }
        }
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Pages<T>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for PageCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
