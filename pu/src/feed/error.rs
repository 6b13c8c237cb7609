//! Feed error types

use std::time::Duration;
use thiserror::Error;

/// Errors a feed can report for a single refresh.
///
/// The variants are ordered by blast radius: authentication affects every
/// task sharing the credentials, configuration only the one security, rate
/// limiting throttles the group, anything else fails the task alone.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Authentication expired")]
    AuthenticationExpired,

    #[error("Feed configuration error: {0}")]
    Configuration(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    #[error("{0}")]
    Other(String),
}

impl FeedError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FeedError::RateLimitExceeded { .. })
    }

    /// Get the retry duration if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FeedError::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Message shown next to the failed task
    pub fn task_message(&self) -> String {
        match self {
            FeedError::Configuration(message) | FeedError::Other(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_rate_limit() {
        let err = FeedError::RateLimitExceeded {
            retry_after: Duration::from_secs(60),
        };
        assert!(err.is_rate_limit());
        assert!(!FeedError::AuthenticationExpired.is_rate_limit());
    }

    #[test]
    fn test_retry_after() {
        let err = FeedError::RateLimitExceeded {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(FeedError::Other("boom".to_string()).retry_after(), None);
    }

    #[test]
    fn test_task_message() {
        assert_eq!(
            FeedError::Configuration("unknown ticker XYZ".to_string()).task_message(),
            "unknown ticker XYZ"
        );
        assert_eq!(FeedError::Other("HTTP 500".to_string()).task_message(), "HTTP 500");
        assert_eq!(FeedError::AuthenticationExpired.task_message(), "Authentication expired");
    }
}
