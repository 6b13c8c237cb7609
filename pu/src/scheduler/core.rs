//! Scheduler implementation

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::config::ParallelismPolicy;
use super::error::SchedulerError;
use super::group::Group;
use super::snapshot::{GroupSnapshot, SchedulerStats};
use crate::domain::{Security, Task, UpdateStatus, WorkerId};

/// Full passes over the rotation list a single poll may make
const MAX_SWEEPS: usize = 2;

/// Internal state protected by mutex
struct SchedulerInner {
    /// All groups in order of first appearance, never removed
    groups: Vec<Group>,

    /// Indices of groups that still have queued tasks
    rotation: Vec<usize>,

    /// Position in `rotation` where the next scan starts
    cursor: usize,

    /// Reorder `rotation` before the next scan from the start
    resort: bool,

    /// Sticky group of every worker holding a claim
    assignments: HashMap<WorkerId, usize>,

    stats: SchedulerStats,
}

/// The Scheduler hands out refresh tasks to a pool of workers.
///
/// Tasks are partitioned into groups by grouping criterion (usually the
/// feed). Every group has a worker cap; a worker that claims a group sticks
/// to it until the group runs dry or rate limiting lowers the cap below the
/// number of claims. Idle workers pick the next group with spare capacity,
/// scanning the groups with the largest backlog first.
///
/// All operations serialize on one lock: the scheduler is a monitor.
pub struct Scheduler {
    capacity: usize,
    inner: Mutex<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler, grouping `tasks` in order of first appearance
    pub fn new(tasks: impl IntoIterator<Item = Arc<Task>>, policy: &dyn ParallelismPolicy) -> Self {
        let mut partitions: Vec<(String, Vec<Arc<Task>>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for task in tasks {
            let slot = *index.entry(task.grouping_criterion.clone()).or_insert_with(|| {
                partitions.push((task.grouping_criterion.clone(), Vec::new()));
                partitions.len() - 1
            });
            partitions[slot].1.push(task);
        }

        let groups: Vec<Group> = partitions
            .into_iter()
            .map(|(id, tasks)| {
                let max_parallel = policy.max_parallel(&id);
                Group::new(id, tasks, max_parallel)
            })
            .collect();

        let capacity = groups.iter().map(|group| group.max_worker).sum();
        debug!(groups = groups.len(), capacity, "Scheduler::new: called");

        Self {
            capacity,
            inner: Mutex::new(SchedulerInner {
                rotation: (0..groups.len()).collect(),
                groups,
                cursor: 0,
                resort: true,
                assignments: HashMap::new(),
                stats: SchedulerStats::default(),
            }),
        }
    }

    /// Sum of the group caps at construction.
    ///
    /// This is the number of workers worth starting; any more would never
    /// receive a task.
    pub fn total_capacity(&self) -> usize {
        self.capacity
    }

    /// Get the next task for `worker`, or `None` when the worker should stop.
    ///
    /// `previous` is the task the worker just completed, if any.
    pub async fn poll_task(&self, worker: WorkerId, previous: Option<&Task>) -> Option<Arc<Task>> {
        debug!(%worker, has_previous = previous.is_some(), "Scheduler::poll_task: called");
        let mut inner = self.inner.lock().await;
        let task = inner.poll(worker, previous.is_some());
        match &task {
            Some(task) => debug!(%worker, security = %task.security.id, group = %task.grouping_criterion, "Scheduler::poll_task: dispatched"),
            None => debug!(%worker, "Scheduler::poll_task: no task, worker should stop"),
        }
        task
    }

    /// Throttle the worker's group after the feed signalled a rate limit.
    ///
    /// Consumes one attempt and lowers the group cap to one below the current
    /// number of claims (never below one). Returns the attempts left; a
    /// negative value means the caller must not retry.
    pub async fn on_rate_limit_exceeded(&self, worker: WorkerId) -> Result<i32, SchedulerError> {
        debug!(%worker, "Scheduler::on_rate_limit_exceeded: called");
        let mut inner = self.inner.lock().await;
        let gi = inner.assigned_group(worker)?;
        inner.stats.total_rate_limited += 1;

        let group = &mut inner.groups[gi];
        group.max_attempts -= 1;
        if group.max_worker > 1 {
            group.max_worker = group.current_worker.saturating_sub(1).max(1);
        }
        warn!(
            %worker,
            group = %group.id,
            max_worker = group.max_worker,
            attempts_left = group.max_attempts,
            "Rate limit exceeded, throttling group"
        );
        Ok(group.max_attempts)
    }

    /// Fail every task still queued in the worker's group and drop the group.
    ///
    /// `message` builds the error text shown for each abandoned task. Returns
    /// the number of tasks abandoned.
    pub async fn report_group_failure<F>(&self, worker: WorkerId, message: F) -> Result<usize, SchedulerError>
    where
        F: Fn(&Security) -> String,
    {
        debug!(%worker, "Scheduler::report_group_failure: called");
        let mut inner = self.inner.lock().await;
        let gi = inner.assigned_group(worker)?;

        let abandoned: Vec<Arc<Task>> = inner.groups[gi].remaining.drain(..).collect();
        for task in &abandoned {
            task.status.set_status(UpdateStatus::Error, Some(message(&task.security)));
        }
        inner.groups[gi].abandoned += abandoned.len();
        inner.stats.total_abandoned += abandoned.len() as u64;
        inner.remove_from_rotation(gi);

        warn!(%worker, group = %inner.groups[gi].id, abandoned = abandoned.len(), "Abandoned group");
        Ok(abandoned.len())
    }

    /// Snapshot of every group in construction order
    pub async fn snapshot(&self) -> Vec<GroupSnapshot> {
        debug!("Scheduler::snapshot: called");
        let inner = self.inner.lock().await;
        inner.groups.iter().map(Group::snapshot).collect()
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        debug!("Scheduler::stats: called");
        self.inner.lock().await.stats.clone()
    }

    /// True once no group has queued work and no worker holds a claim
    pub async fn is_finished(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.rotation.is_empty() && inner.assignments.is_empty()
    }
}

impl SchedulerInner {
    fn assigned_group(&self, worker: WorkerId) -> Result<usize, SchedulerError> {
        self.assignments
            .get(&worker)
            .copied()
            .ok_or(SchedulerError::WorkerNotAssigned(worker))
    }

    fn poll(&mut self, worker: WorkerId, completed_previous: bool) -> Option<Arc<Task>> {
        if let Some(gi) = self.assignments.get(&worker).copied() {
            if completed_previous {
                self.groups[gi].on_task_finished();
                self.stats.total_finished += 1;
            }

            if self.groups[gi].current_worker > self.groups[gi].max_worker {
                // Cap shrank below the claims: this worker leaves the group
                debug!(%worker, group = %self.groups[gi], "SchedulerInner::poll: draining excess worker");
                self.release(worker, gi);
                self.stats.drained_workers += 1;
            } else if let Some(task) = self.pop_group_task(gi) {
                self.stats.total_dispatched += 1;
                return Some(task);
            } else {
                debug!(%worker, group = %self.groups[gi], "SchedulerInner::poll: sticky group exhausted");
                self.release(worker, gi);
            }
        }

        let task = self.claim_next_group(worker);
        match task {
            Some(_) => self.stats.total_dispatched += 1,
            None => {
                self.assignments.remove(&worker);
            }
        }
        task
    }

    /// Scan the rotation for a group with spare capacity and claim it.
    ///
    /// A group with room keeps the cursor, so consecutive idle workers fill it
    /// up to its cap before the scan moves on.
    fn claim_next_group(&mut self, worker: WorkerId) -> Option<Arc<Task>> {
        let mut sweeps = 0;
        while sweeps < MAX_SWEEPS && !self.rotation.is_empty() {
            if self.cursor >= self.rotation.len() {
                self.cursor = 0;
                self.resort = true;
            }
            if self.cursor == 0 && self.resort {
                self.prioritize();
            }

            let gi = self.rotation[self.cursor];
            let group = &mut self.groups[gi];
            if group.current_worker < group.max_worker {
                group.current_worker += 1;
                debug!(%worker, group = %group, current_worker = group.current_worker, "SchedulerInner::claim_next_group: claimed");
                self.assignments.insert(worker, gi);
                return self.pop_group_task(gi);
            }

            self.cursor += 1;
            if self.cursor >= self.rotation.len() {
                self.cursor = 0;
                self.resort = true;
                sweeps += 1;
            }
        }
        None
    }

    /// Order the rotation by descending backlog; ties keep their order
    fn prioritize(&mut self) {
        let groups = &self.groups;
        self.rotation.sort_by_key(|&gi| Reverse(groups[gi].remaining.len()));
        self.resort = false;
    }

    /// Pop the head of a group's queue, dropping the group from rotation with its last task
    fn pop_group_task(&mut self, gi: usize) -> Option<Arc<Task>> {
        match self.groups[gi].remaining.len() {
            0 => None,
            1 => {
                self.remove_from_rotation(gi);
                self.groups[gi].remaining.pop_front()
            }
            _ => self.groups[gi].remaining.pop_front(),
        }
    }

    fn remove_from_rotation(&mut self, gi: usize) {
        if let Some(idx) = self.rotation.iter().position(|&g| g == gi) {
            self.rotation.remove(idx);
            if self.cursor > idx {
                self.cursor -= 1;
            }
        }
    }

    fn release(&mut self, worker: WorkerId, gi: usize) {
        let group = &mut self.groups[gi];
        group.current_worker = group.current_worker.saturating_sub(1);
        self.assignments.remove(&worker);
    }
}
