//! Retry policy for the failover request path.
//!
//! # Responsibilities
//! - Decide whether a classified failure is worth another target
//! - Bound the number of targets tried per request
//! - Space attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - Connection, timeout and server errors move on to the next target
//! - Authentication, configuration and unknown errors surface immediately;
//!   another server would most likely fail the same way

use std::time::Duration;

use crate::config::RetryConfig;
use crate::diagnostics::ErrorKind;
use crate::resilience::backoff::calculate_backoff;

/// Whether a failure of this kind should be retried on another target.
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::Server)
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.base_delay_ms, self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(is_retryable(ErrorKind::Connection));
        assert!(is_retryable(ErrorKind::Timeout));
        assert!(is_retryable(ErrorKind::Server));
        assert!(!is_retryable(ErrorKind::Authentication));
        assert!(!is_retryable(ErrorKind::Configuration));
        assert!(!is_retryable(ErrorKind::Unknown));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::new(&RetryConfig {
            max_attempts: 0,
            base_delay_ms: 10,
            max_delay_ms: 100,
        });
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay(0), Duration::ZERO);
    }
}
