//! Worker loop executing tasks handed out by the scheduler

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::domain::{Security, Task, UpdateRequest, UpdateStatus, WorkerId};
use crate::feed::FeedError;
use crate::scheduler::Scheduler;

/// Shown for the failed task and every task abandoned with it
pub const MSG_AUTHENTICATION_EXPIRED: &str = "Authentication expired";

/// Error message for a security whose group ran out of rate-limit attempts
pub fn rate_limit_exceeded_message(security: &Security) -> String {
    format!("Rate limit exceeded for {}", security.name)
}

fn rate_limit_retrying_message(security: &Security, attempts_left: i32) -> String {
    format!(
        "Rate limit exceeded for {}, retrying ({} attempts left)",
        security.name, attempts_left
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("Feed panicked: {detail}")
}

/// What one worker loop did during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub worker: WorkerId,
    /// Feed calls made, retries included
    pub executed: usize,
    pub retries: usize,
    pub failures: usize,
    /// Rate-limit signals received, whether retried or not
    pub rate_limited: usize,
}

impl WorkerReport {
    fn new(worker: WorkerId) -> Self {
        Self {
            worker,
            executed: 0,
            retries: 0,
            failures: 0,
            rate_limited: 0,
        }
    }
}

/// One worker of the pool.
///
/// Polls the scheduler until it returns no task. Feed failures never end the
/// loop, not even a panicking feed: they are recorded on the task (and
/// possibly its group) and the worker polls again.
pub struct TaskGroupWorker {
    id: WorkerId,
    scheduler: Arc<Scheduler>,
    request: Arc<UpdateRequest>,
}

impl TaskGroupWorker {
    pub fn new(id: WorkerId, scheduler: Arc<Scheduler>, request: Arc<UpdateRequest>) -> Self {
        Self { id, scheduler, request }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Run until the scheduler has nothing left for this worker
    pub async fn run(self) -> WorkerReport {
        debug!(worker = %self.id, "TaskGroupWorker::run: called");
        let mut report = WorkerReport::new(self.id);
        let mut task: Option<Arc<Task>> = None;
        let mut retry = false;

        loop {
            if retry {
                retry = false;
            } else {
                task = self.scheduler.poll_task(self.id, task.as_deref()).await;
            }

            let Some(current) = task.clone() else {
                break;
            };

            current.status.set_status(UpdateStatus::Loading, None);

            let started = Instant::now();
            let result = match AssertUnwindSafe(current.update()).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(FeedError::Other(panic_message(panic.as_ref()))),
            };
            current.record_duration(started.elapsed());
            report.executed += 1;

            match result {
                Ok(status) => {
                    debug!(worker = %self.id, security = %current.security.id, %status, "TaskGroupWorker::run: task done");
                    current.status.set_status(status, None);
                    current.security.touch_feed_last_update();
                    if status == UpdateStatus::Modified {
                        self.request.mark_dirty();
                    }
                }
                Err(err) => {
                    if err.is_rate_limit() {
                        report.rate_limited += 1;
                    }
                    retry = self.handle_failure(&current, err).await;
                    if retry {
                        report.retries += 1;
                    } else {
                        report.failures += 1;
                    }
                }
            }
        }

        info!(
            worker = %self.id,
            executed = report.executed,
            retries = report.retries,
            failures = report.failures,
            "Worker finished"
        );
        report
    }

    /// Record a failed execution; returns true if the same task should run again
    async fn handle_failure(&self, task: &Task, err: FeedError) -> bool {
        debug!(worker = %self.id, security = %task.security.id, %err, "TaskGroupWorker::handle_failure: called");
        if let Some(retry_after) = err.retry_after() {
            return self.handle_rate_limit(task, retry_after).await;
        }

        let message = err.task_message();
        match err {
            FeedError::AuthenticationExpired => {
                task.status.set_status(UpdateStatus::Error, Some(message));
                self.fail_group(|_| MSG_AUTHENTICATION_EXPIRED.to_string()).await;
            }
            FeedError::Configuration(_) => {
                task.security.set_has_permanent_error();
                error!(
                    worker = %self.id,
                    security = %task.security.name,
                    %message,
                    "Instrument has a configuration issue"
                );
                task.status.set_status(UpdateStatus::Error, Some(message));
            }
            _ => {
                error!(worker = %self.id, security = %task.security.name, %message, "Update failed");
                task.status.set_status(UpdateStatus::Error, Some(message));
            }
        }
        false
    }

    /// Throttle the group and either back off or give the group up
    async fn handle_rate_limit(&self, task: &Task, retry_after: Duration) -> bool {
        let attempts_left = match self.scheduler.on_rate_limit_exceeded(self.id).await {
            Ok(attempts_left) => attempts_left,
            Err(e) => {
                error!(worker = %self.id, error = %e, "Cannot throttle group");
                -1
            }
        };

        if attempts_left >= 0 && !retry_after.is_zero() {
            task.status.set_status(
                UpdateStatus::Waiting,
                Some(rate_limit_retrying_message(&task.security, attempts_left)),
            );
            debug!(worker = %self.id, ?retry_after, attempts_left, "TaskGroupWorker::handle_rate_limit: backing off");
            tokio::time::sleep(retry_after).await;
            true
        } else {
            task.status
                .set_status(UpdateStatus::Error, Some(rate_limit_exceeded_message(&task.security)));
            self.fail_group(rate_limit_exceeded_message).await;
            false
        }
    }

    async fn fail_group<F>(&self, message: F)
    where
        F: Fn(&Security) -> String,
    {
        if let Err(e) = self.scheduler.report_group_failure(self.id, message).await {
            error!(worker = %self.id, error = %e, "Cannot fail group");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskKind, TaskStatus};
    use crate::feed::mock::MockFeed;
    use crate::scheduler::FixedParallelism;
    use std::time::Duration;

    struct Fixture {
        scheduler: Arc<Scheduler>,
        request: Arc<UpdateRequest>,
        securities: Vec<Arc<Security>>,
        statuses: Vec<Arc<TaskStatus>>,
        tasks: Vec<Arc<Task>>,
    }

    fn fixture(feed: Arc<MockFeed>, ids: &[&str], max_parallel: usize) -> Fixture {
        let securities: Vec<Arc<Security>> = ids
            .iter()
            .map(|id| Arc::new(Security::new(*id, format!("{id} Inc"))))
            .collect();
        let statuses: Vec<Arc<TaskStatus>> = ids.iter().map(|_| Arc::new(TaskStatus::new())).collect();
        let tasks: Vec<Arc<Task>> = securities
            .iter()
            .zip(&statuses)
            .map(|(security, status)| {
                Arc::new(Task::new(
                    security.clone(),
                    feed.clone(),
                    TaskKind::Prices,
                    status.clone(),
                ))
            })
            .collect();
        Fixture {
            scheduler: Arc::new(Scheduler::new(tasks.clone(), &FixedParallelism(max_parallel))),
            request: Arc::new(UpdateRequest::new()),
            securities,
            statuses,
            tasks,
        }
    }

    fn worker(fixture: &Fixture, id: usize) -> TaskGroupWorker {
        TaskGroupWorker::new(WorkerId(id), fixture.scheduler.clone(), fixture.request.clone())
    }

    #[tokio::test]
    async fn test_runs_all_tasks() {
        let feed = Arc::new(
            MockFeed::new("yahoo")
                .with_result("A", Ok(UpdateStatus::Unchanged))
                .with_result("B", Ok(UpdateStatus::Modified)),
        );
        let f = fixture(feed.clone(), &["A", "B", "C"], 1);

        let report = worker(&f, 0).run().await;

        assert_eq!(report.executed, 3);
        assert_eq!(report.failures, 0);
        assert_eq!(feed.calls(), vec!["A", "B", "C"]);
        assert_eq!(f.statuses[0].status(), UpdateStatus::Unchanged);
        assert_eq!(f.statuses[1].status(), UpdateStatus::Modified);
        assert!(f.request.is_dirty());
        assert!(f.securities.iter().all(|s| s.ephemeral().feed_last_update().is_some()));
        assert!(f.tasks.iter().all(|t| t.duration().is_some()));
        assert!(f.scheduler.is_finished().await);
    }

    #[tokio::test]
    async fn test_unchanged_does_not_mark_dirty() {
        let feed = Arc::new(MockFeed::new("yahoo").with_result("A", Ok(UpdateStatus::Unchanged)));
        let f = fixture(feed, &["A"], 1);

        worker(&f, 0).run().await;

        assert!(!f.request.is_dirty());
    }

    #[tokio::test]
    async fn test_authentication_failure_abandons_group() {
        let feed = Arc::new(MockFeed::new("eodhd").with_result("A", Err(FeedError::AuthenticationExpired)));
        let f = fixture(feed.clone(), &["A", "B", "C"], 1);

        let report = worker(&f, 0).run().await;

        assert_eq!(report.executed, 1);
        assert_eq!(feed.call_count(), 1);
        for status in &f.statuses {
            assert_eq!(status.status(), UpdateStatus::Error);
            assert_eq!(status.message().as_deref(), Some(MSG_AUTHENTICATION_EXPIRED));
        }
    }

    #[tokio::test]
    async fn test_configuration_failure_only_hits_security() {
        let feed = Arc::new(
            MockFeed::new("yahoo").with_result("A", Err(FeedError::Configuration("unknown symbol".to_string()))),
        );
        let f = fixture(feed, &["A", "B"], 1);

        let report = worker(&f, 0).run().await;

        assert_eq!(report.failures, 1);
        assert!(f.securities[0].ephemeral().has_permanent_error());
        assert!(!f.securities[1].ephemeral().has_permanent_error());
        assert_eq!(f.statuses[0].status(), UpdateStatus::Error);
        assert_eq!(f.statuses[0].message().as_deref(), Some("unknown symbol"));
        assert_eq!(f.statuses[1].status(), UpdateStatus::Modified);
        // Failed executions are timed too
        assert!(f.tasks[0].duration().is_some());
    }

    #[tokio::test]
    async fn test_other_failure_continues() {
        let feed = Arc::new(MockFeed::new("yahoo").with_result("A", Err(FeedError::Other("HTTP 502".to_string()))));
        let f = fixture(feed, &["A", "B"], 1);

        worker(&f, 0).run().await;

        assert_eq!(f.statuses[0].status(), UpdateStatus::Error);
        assert_eq!(f.statuses[0].message().as_deref(), Some("HTTP 502"));
        assert!(!f.securities[0].ephemeral().has_permanent_error());
        assert_eq!(f.statuses[1].status(), UpdateStatus::Modified);
    }

    #[tokio::test]
    async fn test_panicking_feed_does_not_strand_group() {
        let feed = Arc::new(MockFeed::new("yahoo").with_panic("A"));
        let f = fixture(feed.clone(), &["A", "B", "C"], 1);

        let report = worker(&f, 0).run().await;

        assert_eq!(report.executed, 3);
        assert_eq!(report.failures, 1);
        assert_eq!(feed.calls(), vec!["A", "B", "C"]);
        assert_eq!(f.statuses[0].status(), UpdateStatus::Error);
        assert_eq!(
            f.statuses[0].message().as_deref(),
            Some("Feed panicked: mock feed crashed on A")
        );
        assert!(!f.securities[0].ephemeral().has_permanent_error());
        assert!(f.tasks[0].duration().is_some());
        assert_eq!(f.statuses[1].status(), UpdateStatus::Modified);
        assert_eq!(f.statuses[2].status(), UpdateStatus::Modified);
        assert!(f.scheduler.is_finished().await);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(boxed.as_ref()), "Feed panicked: static text");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("formatted 42"));
        assert_eq!(panic_message(boxed.as_ref()), "Feed panicked: formatted 42");

        let boxed: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(boxed.as_ref()), "Feed panicked: unknown cause");
    }

    #[tokio::test]
    async fn test_rate_limit_retries_same_task() {
        let feed = Arc::new(MockFeed::new("yahoo").with_result(
            "A",
            Err(FeedError::RateLimitExceeded {
                retry_after: Duration::from_millis(5),
            }),
        ));
        let f = fixture(feed.clone(), &["A", "B"], 1);

        let report = worker(&f, 0).run().await;

        assert_eq!(report.retries, 1);
        assert_eq!(report.rate_limited, 1);
        assert_eq!(report.executed, 3);
        assert_eq!(feed.calls(), vec!["A", "A", "B"]);
        assert_eq!(f.statuses[0].status(), UpdateStatus::Modified);

        let group = &f.scheduler.snapshot().await[0];
        assert_eq!(group.attempts_left, 2);
        // Retry did not count as a finished task
        assert_eq!(group.finished, 2);
    }

    #[tokio::test]
    async fn test_rate_limit_without_budget_fails_group() {
        let feed = Arc::new(MockFeed::new("yahoo").with_max_attempts(0).with_result(
            "A",
            Err(FeedError::RateLimitExceeded {
                retry_after: Duration::from_millis(5),
            }),
        ));
        let f = fixture(feed.clone(), &["A", "B", "C"], 1);

        let report = worker(&f, 0).run().await;

        assert_eq!(report.retries, 0);
        assert_eq!(feed.call_count(), 1);
        assert_eq!(f.statuses[0].message().as_deref(), Some("Rate limit exceeded for A Inc"));
        assert_eq!(f.statuses[2].status(), UpdateStatus::Error);
        assert_eq!(f.statuses[2].message().as_deref(), Some("Rate limit exceeded for C Inc"));
    }

    #[tokio::test]
    async fn test_rate_limit_without_retry_after_fails_group() {
        let feed = Arc::new(MockFeed::new("yahoo").with_result(
            "A",
            Err(FeedError::RateLimitExceeded {
                retry_after: Duration::ZERO,
            }),
        ));
        let f = fixture(feed.clone(), &["A", "B"], 1);

        worker(&f, 0).run().await;

        assert_eq!(feed.call_count(), 1);
        assert_eq!(f.statuses[1].status(), UpdateStatus::Error);
    }

    #[tokio::test]
    async fn test_waiting_status_while_backing_off() {
        let feed = Arc::new(MockFeed::new("yahoo").with_result(
            "A",
            Err(FeedError::RateLimitExceeded {
                retry_after: Duration::from_millis(200),
            }),
        ));
        let f = fixture(feed, &["A"], 1);
        let status = f.statuses[0].clone();

        let handle = tokio::spawn(worker(&f, 0).run());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(status.status(), UpdateStatus::Waiting);
        assert_eq!(
            status.message().as_deref(),
            Some("Rate limit exceeded for A Inc, retrying (2 attempts left)")
        );

        handle.await.unwrap();
        assert_eq!(status.status(), UpdateStatus::Modified);
    }
}
