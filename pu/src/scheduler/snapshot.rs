//! Reporting types for the scheduler

use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub id: String,
    pub total: usize,
    pub remaining: usize,
    pub finished: usize,
    pub abandoned: usize,
    pub current_worker: usize,
    pub max_worker: usize,
    pub attempts_left: i32,
    pub max_duration: Option<Duration>,
    pub mean_duration: Option<Duration>,
}

impl GroupSnapshot {
    /// Tasks handed out that have not been reported back yet
    pub fn in_progress(&self) -> usize {
        self.total.saturating_sub(self.remaining + self.finished + self.abandoned)
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_dispatched: u64,
    pub total_finished: u64,
    pub total_rate_limited: u64,
    pub total_abandoned: u64,
    pub drained_workers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress() {
        let snapshot = GroupSnapshot {
            id: "yahoo".to_string(),
            total: 10,
            remaining: 4,
            finished: 3,
            abandoned: 1,
            current_worker: 3,
            max_worker: 3,
            attempts_left: 3,
            max_duration: None,
            mean_duration: None,
        };
        assert_eq!(snapshot.in_progress(), 2);
    }
}
