//! Refresh tasks

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Security, StatusSink, UpdateStatus};
use crate::feed::{Feed, FeedError};

const NOT_MEASURED: u64 = u64::MAX;

/// What a task refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Prices,
    Dividends,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prices => write!(f, "prices"),
            Self::Dividends => write!(f, "dividends"),
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prices" => Ok(Self::Prices),
            "dividends" => Ok(Self::Dividends),
            _ => Err(format!("Unknown task kind: {}", s)),
        }
    }
}

/// One unit of work: refresh one security from its feed.
///
/// A task belongs to exactly one scheduler group for its whole life, chosen by
/// its grouping criterion.
pub struct Task {
    pub security: Arc<Security>,
    pub feed: Arc<dyn Feed>,
    pub kind: TaskKind,
    pub grouping_criterion: String,
    pub status: Arc<dyn StatusSink>,
    duration_nanos: AtomicU64,
}

impl Task {
    /// Create a task grouped by whatever criterion the feed assigns to the security
    pub fn new(security: Arc<Security>, feed: Arc<dyn Feed>, kind: TaskKind, status: Arc<dyn StatusSink>) -> Self {
        let grouping_criterion = feed.grouping_criterion(&security);
        Self {
            security,
            feed,
            kind,
            grouping_criterion,
            status,
            duration_nanos: AtomicU64::new(NOT_MEASURED),
        }
    }

    /// Override the grouping criterion chosen by the feed
    pub fn with_grouping_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.grouping_criterion = criterion.into();
        self
    }

    /// Run the feed fetch for this task
    pub async fn update(&self) -> Result<UpdateStatus, FeedError> {
        self.feed.update(&self.security, self.kind).await
    }

    /// Duration of the last execution, absent until the task ran once
    pub fn duration(&self) -> Option<Duration> {
        match self.duration_nanos.load(Ordering::SeqCst) {
            NOT_MEASURED => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    pub fn record_duration(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(NOT_MEASURED - 1);
        self.duration_nanos.store(nanos.min(NOT_MEASURED - 1), Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("security", &self.security.id)
            .field("feed", &self.feed.id())
            .field("kind", &self.kind)
            .field("grouping_criterion", &self.grouping_criterion)
            .field("duration", &self.duration())
            .finish()
    }
}
