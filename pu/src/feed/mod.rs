//! Feed abstraction for market data providers
//!
//! The scheduler never talks to providers directly; it only needs the
//! [`Feed`] trait to seed rate-limit budgets and to execute tasks.

pub mod client;
mod error;
mod simulated;

pub use client::{DEFAULT_MAX_RATE_LIMIT_ATTEMPTS, Feed};
pub use error::FeedError;
pub use simulated::SimulatedFeed;

#[cfg(test)]
pub use client::mock;
