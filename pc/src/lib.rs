//! PageCache - time-bounded response cache
//!
//! Feed clients use this to avoid fetching the same page twice within a short
//! window. Entries are keyed by an opaque string (typically a URL or an ISIN)
//! and are considered absent once they are older than the configured
//! time-to-live, regardless of how often they were read.
//!
//! # Modules
//!
//! - [`cache`] - The cache itself
//! - [`config`] - Serde-friendly cache configuration

pub mod cache;
pub mod config;

pub use cache::{DEFAULT_TTL, PageCache};
pub use config::CacheConfig;
