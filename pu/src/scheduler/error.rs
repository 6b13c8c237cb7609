//! Scheduler error types

use thiserror::Error;

use crate::domain::WorkerId;

/// Errors returned when the scheduler is driven outside its protocol
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The worker holds no group, so there is nothing to throttle or fail
    #[error("{0} is not assigned to any group")]
    WorkerNotAssigned(WorkerId),
}
