//! Future-style wrapper around the callback API.
//!
//! Every callback operation of the client has a `*_future` sibling returning a
//! [`CancellableFuture`]. The future carries the same cancellation token the
//! callback form would return and resolves with the callback's result.
//!
//! The result can be obtained either by blocking with
//! [`CancellableFuture::wait`] or by `.await`ing the future inside an async
//! runtime.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::cancellation::CancellationToken;
use super::error::{ApiError, ApiResponse};

/// Callback handed to the callback form of an operation.
pub type ResponseCallback<T> = Box<dyn FnOnce(ApiResponse<T>) + Send + 'static>;

/// A pending result together with the token that cancels it.
#[derive(Debug)]
pub struct CancellableFuture<T> {
    token: CancellationToken,
    receiver: oneshot::Receiver<ApiResponse<T>>,
}

impl<T: Send + 'static> CancellableFuture<T> {
    /// Adapts a callback-form operation.
    ///
    /// `start` receives the callback to pass to the operation and returns the
    /// operation's token.
    pub fn from_callback<F>(start: F) -> Self
    where
        F: FnOnce(ResponseCallback<T>) -> CancellationToken,
    {
        let (sender, receiver) = oneshot::channel();
        let token = start(Box::new(move |response| {
            // The receiver may have been dropped; nobody is waiting then.
            let _ = sender.send(response);
        }));
        Self { token, receiver }
    }
}

impl<T> CancellableFuture<T> {
    /// Returns the token that cancels the underlying request.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels the underlying request.
    ///
    /// The future still resolves, normally with a `Cancelled` error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks the calling thread until the result is available.
    ///
    /// Must not be called from within an async runtime; `.await` the future
    /// there instead.
    pub fn wait(self) -> ApiResponse<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(ApiError::cancelled()))
    }
}

impl<T> Future for CancellableFuture<T> {
    type Output = ApiResponse<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(ApiError::cancelled())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ErrorKind;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_callback_result() {
        let future = CancellableFuture::from_callback(|callback| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                callback(Ok(11u32));
            });
            CancellationToken::empty()
        });

        assert_eq!(future.wait(), Ok(11));
    }

    #[test]
    fn test_dropped_callback_resolves_cancelled() {
        let future: CancellableFuture<u32> =
            CancellableFuture::from_callback(|_callback| CancellationToken::empty());

        let err = future.wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_cancel_reaches_operation_token() {
        let operation_token = CancellationToken::empty();
        let returned = operation_token.clone();
        let future: CancellableFuture<u32> = CancellableFuture::from_callback(move |callback| {
            callback(Err(ApiError::cancelled()));
            returned
        });

        future.cancel();

        assert!(operation_token.is_cancelled());
        assert!(future.wait().unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_future_can_be_awaited() {
        let future = CancellableFuture::<u32>::from_callback(|callback| {
            std::thread::spawn(move || callback(Err(ApiError::not_found("gone"))));
            CancellationToken::empty()
        });

        let err: ApiError = future.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
