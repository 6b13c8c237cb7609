//! Fair-share group of tasks sharing a grouping criterion

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::snapshot::GroupSnapshot;
use crate::domain::Task;

/// Tasks of one grouping criterion plus their concurrency bookkeeping.
///
/// Only the scheduler touches groups, always under its lock.
pub(crate) struct Group {
    pub(crate) id: String,
    all: Vec<Arc<Task>>,
    pub(crate) remaining: VecDeque<Arc<Task>>,

    /// Concurrency cap, shrinks under rate limiting
    pub(crate) max_worker: usize,

    /// Workers currently holding a claim on this group
    pub(crate) current_worker: usize,

    /// Rate-limit signals left before the group fails, may go negative
    pub(crate) max_attempts: i32,

    pub(crate) finished: usize,
    pub(crate) abandoned: usize,
}

impl Group {
    /// Build a group from a non-empty task list.
    ///
    /// The attempt budget comes from the feed of the first task; callers must
    /// not mix feeds with different budgets in one group.
    pub(crate) fn new(id: String, tasks: Vec<Arc<Task>>, max_parallel: usize) -> Self {
        let max_attempts = tasks
            .first()
            .map(|task| task.feed.max_rate_limit_attempts())
            .unwrap_or_default();
        Self {
            id,
            max_worker: max_parallel.min(tasks.len()),
            current_worker: 0,
            max_attempts,
            finished: 0,
            abandoned: 0,
            remaining: tasks.iter().cloned().collect(),
            all: tasks,
        }
    }

    pub(crate) fn on_task_finished(&mut self) {
        self.finished += 1;
    }

    pub(crate) fn total(&self) -> usize {
        self.all.len()
    }

    fn durations(&self) -> impl Iterator<Item = Duration> + '_ {
        self.all.iter().filter_map(|task| task.duration())
    }

    /// Longest measured execution, ignoring tasks that never ran
    pub(crate) fn max_duration(&self) -> Option<Duration> {
        self.durations().max()
    }

    /// Mean measured execution, ignoring tasks that never ran
    pub(crate) fn mean_duration(&self) -> Option<Duration> {
        let (count, sum) = self
            .durations()
            .fold((0u32, Duration::ZERO), |(count, sum), d| (count + 1, sum + d));
        (count > 0).then(|| sum / count)
    }

    pub(crate) fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            id: self.id.clone(),
            total: self.total(),
            remaining: self.remaining.len(),
            finished: self.finished,
            abandoned: self.abandoned,
            current_worker: self.current_worker,
            max_worker: self.max_worker,
            attempts_left: self.max_attempts,
            max_duration: self.max_duration(),
            mean_duration: self.mean_duration(),
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} tasks= {}/{}", self.id, self.remaining.len(), self.total())
    }
}
