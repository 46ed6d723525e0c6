//! Transport collaborator.
//!
//! Repositories reach the remote catalog service only through the [`Network`]
//! trait. A request is started under the caller's
//! [`CancellationContext`](crate::client::CancellationContext) so that
//! cancelling the owning task aborts an in-flight HTTP call.

mod http;
mod retry;

pub use http::ReqwestNetwork;
pub use retry::{
    is_retryable, RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS,
    DEFAULT_MAX_DELAY_SECS,
};

use std::time::Duration;

use bytes::Bytes;

use crate::client::{ApiResponse, CancellationContext};

/// Default service endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default attempts per request, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Blocking GET against the catalog service.
pub trait Network: Send + Sync {
    /// Fetches `path` (relative to the service base URL).
    ///
    /// Returns `NotFound` for a missing resource, `NetworkError` for other
    /// failures and `Cancelled` if `context` is cancelled first.
    fn get(&self, path: &str, context: &CancellationContext) -> ApiResponse<Bytes>;
}

/// Settings for [`ReqwestNetwork`].
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::exponential(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl NetworkSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
