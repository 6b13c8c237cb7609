//! Fixed-size worker pool driving one refresh

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use super::job::{TaskGroupWorker, WorkerReport};
use crate::domain::{UpdateRequest, WorkerId};
use crate::scheduler::{GroupSnapshot, Scheduler, SchedulerStats};

/// Outcome of a complete refresh
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub workers: Vec<WorkerReport>,
    pub groups: Vec<GroupSnapshot>,
    pub stats: SchedulerStats,
    pub dirty: bool,
    pub elapsed: Duration,
}

impl UpdateSummary {
    pub fn executed(&self) -> usize {
        self.workers.iter().map(|w| w.executed).sum()
    }

    pub fn failures(&self) -> usize {
        self.workers.iter().map(|w| w.failures).sum()
    }
}

/// Run every task of `scheduler` to completion.
///
/// Spawns exactly `total_capacity()` workers; more could never be handed a
/// task.
pub async fn run_update(scheduler: Arc<Scheduler>, request: Arc<UpdateRequest>) -> Result<UpdateSummary> {
    let capacity = scheduler.total_capacity();
    debug!(capacity, "run_update: called");
    info!(workers = capacity, "Starting refresh");

    let started = Instant::now();
    let handles: Vec<_> = (0..capacity)
        .map(|i| {
            let worker = TaskGroupWorker::new(WorkerId(i), scheduler.clone(), request.clone());
            debug!(worker = %worker.id(), "run_update: spawning worker");
            tokio::spawn(worker.run())
        })
        .collect();

    let mut workers = Vec::with_capacity(capacity);
    for joined in join_all(handles).await {
        workers.push(joined.context("Worker task failed")?);
    }
    let elapsed = started.elapsed();

    let summary = UpdateSummary {
        workers,
        groups: scheduler.snapshot().await,
        stats: scheduler.stats().await,
        dirty: request.is_dirty(),
        elapsed,
    };
    info!(
        executed = summary.executed(),
        failures = summary.failures(),
        dirty = summary.dirty,
        elapsed_ms = elapsed.as_millis(),
        "Refresh finished"
    );
    Ok(summary)
}
