//! Turning configuration into a set of refresh tasks

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::domain::{Security, Task, TaskStatus, UpdateStatus};
use crate::feed::SimulatedFeed;
use crate::scheduler::Scheduler;

/// One planned task together with the status it reports to
pub struct PlannedTask {
    pub task: Arc<Task>,
    pub status: Arc<TaskStatus>,
}

/// Final state of one task after a run
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub security: String,
    pub name: String,
    pub kind: String,
    pub group: String,
    pub status: UpdateStatus,
    pub message: Option<String>,
    pub duration: Option<Duration>,
}

/// Every task of a refresh in configuration order
pub struct UpdatePlan {
    config: Config,
    feeds: Vec<Arc<SimulatedFeed>>,
    tasks: Vec<PlannedTask>,
}

impl UpdatePlan {
    /// One task per (feed, security, kind)
    pub fn from_config(config: &Config) -> Self {
        debug!(feeds = config.feeds.len(), "UpdatePlan::from_config: called");
        let mut feeds = Vec::with_capacity(config.feeds.len());
        let mut tasks = Vec::new();

        for feed_config in &config.feeds {
            let feed = Arc::new(SimulatedFeed::from_config(feed_config, &config.cache));
            for security_config in &feed_config.securities {
                let security = Arc::new(Security::new(
                    security_config.id.clone(),
                    security_config.display_name(),
                ));
                for kind in &feed_config.kinds {
                    let status = Arc::new(TaskStatus::new());
                    let task = Arc::new(Task::new(security.clone(), feed.clone(), *kind, status.clone()));
                    tasks.push(PlannedTask { task, status });
                }
            }
            feeds.push(feed);
        }

        Self {
            config: config.clone(),
            feeds,
            tasks,
        }
    }

    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    pub fn feeds(&self) -> &[Arc<SimulatedFeed>] {
        &self.feeds
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Fresh scheduler over all tasks, capped by the configured policy
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.tasks.iter().map(|planned| planned.task.clone()), &self.config.scheduler)
    }

    pub fn outcomes(&self) -> Vec<TaskOutcome> {
        self.tasks
            .iter()
            .map(|planned| TaskOutcome {
                security: planned.task.security.id.clone(),
                name: planned.task.security.name.clone(),
                kind: planned.task.kind.to_string(),
                group: planned.task.grouping_criterion.clone(),
                status: planned.status.status(),
                message: planned.status.message(),
                duration: planned.task.duration(),
            })
            .collect()
    }
}
