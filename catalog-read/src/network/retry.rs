//! Wire-level retry policy.
//!
//! Retries are applied by the transport only. The orchestration layer above
//! never retries.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use catalog_read::network::RetryPolicy;
//!
//! let policy = RetryPolicy::exponential(3);
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
//! assert_eq!(policy.delay_for_attempt(3), None);
//! ```

use std::time::Duration;

use crate::client::{ApiError, ErrorKind};

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// HTTP 429 Too Many Requests.
const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// How a request handles transient failures.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RetryPolicy {
    /// Fail on the first error.
    #[default]
    None,

    /// Constant delay between attempts.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay between attempts.
        delay: Duration,
    },

    /// Delay grows by `multiplier` after each failure, capped at `max_delay`.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay after the first failure.
        initial_delay: Duration,
        /// Upper bound for any delay.
        max_delay: Duration,
        /// Growth factor (typically 2.0).
        multiplier: f64,
    },
}

impl RetryPolicy {
    /// Exponential backoff with the default delays.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Constant delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` when the
    /// attempts are used up.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                let delay_ms = (initial_delay.as_millis() as f64 * factor)
                    .min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(delay_ms as u64).min(*max_delay))
            }
        }
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}

/// Returns true for failures worth another attempt: transport errors without
/// a status, 5xx responses and 429.
pub fn is_retryable(error: &ApiError) -> bool {
    if error.kind() != ErrorKind::NetworkError {
        return false;
    }
    match error.http_status() {
        None => true,
        Some(status) => status >= 500 || status == HTTP_TOO_MANY_REQUESTS,
    }
}
