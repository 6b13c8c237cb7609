//! Scheduler for price update tasks
//!
//! Shares a fixed pool of workers fairly across feed groups, enforces
//! per-group concurrency caps and throttles groups that hit rate limits.

mod config;
mod core;
mod error;
mod group;
mod snapshot;

pub use config::{DEFAULT_MAX_PARALLEL, FixedParallelism, ParallelismPolicy, SchedulerConfig};
pub use self::core::Scheduler;
pub use error::SchedulerError;
pub use snapshot::{GroupSnapshot, SchedulerStats};
