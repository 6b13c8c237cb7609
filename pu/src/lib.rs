//! priceupdate - fair, rate-limit aware refresh of security prices
//!
//! A refresh is a set of [`Task`]s, one per security and data kind. Tasks are
//! grouped by their feed's grouping criterion; the [`Scheduler`] shares a
//! fixed pool of workers across the groups, caps how many workers serve one
//! group at a time and shrinks that cap when a feed signals a rate limit.
//! [`run_update`] drives a refresh to completion.

pub mod cli;
pub mod config;
pub mod domain;
pub mod feed;
pub mod plan;
pub mod scheduler;
pub mod worker;

pub use config::{Config, FeedConfig, SecurityConfig};
pub use domain::{Security, StatusSink, Task, TaskKind, TaskStatus, UpdateRequest, UpdateStatus, WorkerId};
pub use feed::{Feed, FeedError, SimulatedFeed};
pub use plan::{TaskOutcome, UpdatePlan};
pub use scheduler::{FixedParallelism, GroupSnapshot, ParallelismPolicy, Scheduler, SchedulerConfig, SchedulerError};
pub use worker::{TaskGroupWorker, UpdateSummary, WorkerReport, run_update};
