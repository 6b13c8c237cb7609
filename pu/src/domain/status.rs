//! Per-task update status and the sink it is reported to

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Outcome (or in-flight state) of a single refresh task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Not started yet, or the feed returned data identical to what we had
    #[default]
    Unchanged,
    /// The feed returned new data
    Modified,
    /// A worker is currently executing the task
    Loading,
    /// The task failed
    Error,
    /// Rate limited, waiting to retry
    Waiting,
}

impl UpdateStatus {
    /// True for states a task can end a run in
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Modified | Self::Error)
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Modified => write!(f, "modified"),
            Self::Loading => write!(f, "loading"),
            Self::Error => write!(f, "error"),
            Self::Waiting => write!(f, "waiting"),
        }
    }
}

/// Receives status changes of a task, typically to drive a progress view.
///
/// Implementations are owned by the caller and must be cheap: the scheduler
/// calls them while holding its lock when it abandons a whole group.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: UpdateStatus, message: Option<String>);
}

/// In-memory status sink remembering the latest status and message
#[derive(Debug, Default)]
pub struct TaskStatus {
    inner: Mutex<(UpdateStatus, Option<String>)>,
}

impl TaskStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> UpdateStatus {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    pub fn message(&self) -> Option<String> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).1.clone()
    }
}

impl StatusSink for TaskStatus {
    fn set_status(&self, status: UpdateStatus, message: Option<String>) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = (status, message);
    }
}
