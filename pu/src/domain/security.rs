//! Securities and their per-run ephemeral data

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Mutable bookkeeping attached to a security that is not part of its master data
#[derive(Debug, Default)]
pub struct EphemeralData {
    feed_last_update: Mutex<Option<DateTime<Utc>>>,
    has_permanent_error: AtomicBool,
}

impl EphemeralData {
    pub fn touch_feed_last_update(&self) {
        *self.feed_last_update.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    pub fn feed_last_update(&self) -> Option<DateTime<Utc>> {
        *self.feed_last_update.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_has_permanent_error(&self) {
        self.has_permanent_error.store(true, Ordering::SeqCst);
    }

    pub fn has_permanent_error(&self) -> bool {
        self.has_permanent_error.load(Ordering::SeqCst)
    }
}

/// A security whose quotes are refreshed from a feed
#[derive(Debug)]
pub struct Security {
    /// Identifier handed to the feed (ticker, ISIN, ...)
    pub id: String,

    /// Human-readable name used in status messages
    pub name: String,

    ephemeral: EphemeralData,
}

impl Security {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ephemeral: EphemeralData::default(),
        }
    }

    pub fn ephemeral(&self) -> &EphemeralData {
        &self.ephemeral
    }

    /// Record that a feed delivered data for this security
    pub fn touch_feed_last_update(&self) {
        self.ephemeral.touch_feed_last_update();
    }

    /// Flag the security as misconfigured so later runs can skip or highlight it
    pub fn set_has_permanent_error(&self) {
        self.ephemeral.set_has_permanent_error();
    }
}
