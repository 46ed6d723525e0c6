//! HTTP transport using async reqwest.
//!
//! Requests run on a tokio runtime (owned, or borrowed through a
//! [`Handle`]). The calling worker thread blocks on a one-shot channel until
//! the spawned request finishes. The request's abort handle is attached to
//! the task's cancellation context, so cancelling the task aborts the HTTP
//! call and the worker wakes up with `Cancelled`.
//!
//! ```text
//! worker thread                      tokio runtime
//! ─────────────                      ─────────────
//! execute_or_cancelled ── spawn ───► send().await
//!   token = abort handle                 │
//! blocking_recv ◄──── oneshot ──────── result
//! ```

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::retry::{is_retryable, RetryPolicy};
use super::{Network, NetworkSettings};
use crate::client::{ApiError, ApiResponse, CancellationContext, CancellationToken};

/// Worker threads of an owned runtime.
const OWNED_RUNTIME_THREADS: usize = 2;

/// [`Network`] implementation backed by `reqwest`.
pub struct ReqwestNetwork {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    handle: Handle,
    /// Present when the runtime was created by this transport.
    runtime: Option<Runtime>,
}

impl ReqwestNetwork {
    /// Creates a transport with its own tokio runtime.
    pub fn new(settings: NetworkSettings) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(OWNED_RUNTIME_THREADS)
            .thread_name("catalog-read-net")
            .enable_all()
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create runtime: {}", e)))?;

        let handle = runtime.handle().clone();
        let mut network = Self::with_handle(settings, handle)?;
        network.runtime = Some(runtime);
        Ok(network)
    }

    /// Creates a transport that spawns requests on an existing runtime.
    pub fn with_handle(settings: NetworkSettings, handle: Handle) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            retry: settings.retry,
            handle,
            runtime: None,
        })
    }

    /// The service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send_once(&self, url: &str, context: &CancellationContext) -> ApiResponse<Bytes> {
        let (sender, receiver) = oneshot::channel();
        let client = self.client.clone();
        let request_url = url.to_string();

        let started = context.execute_or_cancelled(
            || {
                let task = self.handle.spawn(async move {
                    let result = fetch(client, request_url).await;
                    let _ = sender.send(result);
                });
                let abort = task.abort_handle();
                CancellationToken::new(move || abort.abort())
            },
            || trace!(url, "Request skipped, context already cancelled"),
        );
        if !started {
            return Err(ApiError::cancelled());
        }

        // An aborted task drops the sender without sending.
        receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(ApiError::cancelled()))
    }

    /// Sleeps for `delay` on the runtime; cancelling `context` ends the wait early.
    fn wait_before_retry(&self, delay: Duration, context: &CancellationContext) -> ApiResponse<()> {
        let (sender, receiver) = oneshot::channel();

        let started = context.execute_or_cancelled(
            || {
                let task = self.handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = sender.send(());
                });
                let abort = task.abort_handle();
                CancellationToken::new(move || abort.abort())
            },
            || trace!("Retry skipped, context already cancelled"),
        );
        if !started {
            return Err(ApiError::cancelled());
        }

        receiver.blocking_recv().map_err(|_| ApiError::cancelled())?;
        context.check()
    }
}

async fn fetch(client: reqwest::Client, url: String) -> ApiResponse<Bytes> {
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ApiError::network(format!("Request failed: {}", e)))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::not_found(format!("HTTP 404 from {}", url)).with_http_status(404));
    }
    if !status.is_success() {
        return Err(ApiError::network(format!("HTTP {} from {}", status, url))
            .with_http_status(status.as_u16()));
    }

    response
        .bytes()
        .await
        .map_err(|e| ApiError::network(format!("Failed to read response: {}", e)))
}

impl Network for ReqwestNetwork {
    fn get(&self, path: &str, context: &CancellationContext) -> ApiResponse<Bytes> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(&url, context) {
                Err(e) if is_retryable(&e) => match self.retry.delay_for_attempt(attempt) {
                    Some(delay) => {
                        debug!(url = %url, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Retrying request");
                        self.wait_before_retry(delay, context)?;
                    }
                    None => return Err(e),
                },
                result => return result,
            }
        }
    }
}

impl Drop for ReqwestNetwork {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for ReqwestNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestNetwork")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}
