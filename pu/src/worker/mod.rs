//! Worker loops and the pool that runs them

mod job;
mod pool;

pub use job::{MSG_AUTHENTICATION_EXPIRED, TaskGroupWorker, WorkerReport, rate_limit_exceeded_message};
pub use pool::{UpdateSummary, run_update};
