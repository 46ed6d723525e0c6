//! Cooperative cancellation primitives.
//!
//! - [`CancellationToken`] - the caller-facing handle. Cloning shares the
//!   underlying flag; the attached cancel-action runs at most once.
//! - [`CancellationContext`] - carried into a unit of work. Nested steps are
//!   started through [`CancellationContext::execute_or_cancelled`], which
//!   links the step's own token to the context so that cancelling the
//!   context reaches the innermost in-flight step.
//!
//! # Example
//!
//! ```
//! use catalog_read::client::{CancellationContext, CancellationToken};
//!
//! let context = CancellationContext::new();
//! let started = context.execute_or_cancelled(
//!     || CancellationToken::new(|| println!("aborting request")),
//!     || println!("skipped"),
//! );
//! assert!(started);
//!
//! // Cancels the context and the attached request token.
//! context.cancel_operation();
//! assert!(context.is_cancelled());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{ApiError, ApiResponse};

type CancelAction = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle used to cancel an operation.
///
/// All clones observe the same flag. [`cancel`](Self::cancel) is idempotent:
/// only the first call runs the cancel-action, synchronously on the calling
/// thread.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    action: Mutex<Option<CancelAction>>,
}

impl CancellationToken {
    /// Creates a token that runs `action` the first time it is cancelled.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                action: Mutex::new(Some(Box::new(action))),
            }),
        }
    }

    /// Creates a token with no cancel-action.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Combines several tokens into one that cancels all of them.
    pub fn all(tokens: Vec<CancellationToken>) -> Self {
        Self::new(move || {
            for token in tokens {
                token.cancel();
            }
        })
    }

    /// Cancels the operation.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Take the action before running it so the lock is not held while
        // arbitrary code executes.
        let action = self.inner.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancellation state carried into a unit of work.
///
/// Once cancelled, a context stays cancelled. Clones share state.
#[derive(Clone, Default)]
pub struct CancellationContext {
    inner: Arc<ContextInner>,
}

#[derive(Default)]
struct ContextInner {
    cancelled: AtomicBool,
    /// Token of the nested step currently running under this context.
    ///
    /// The `cancelled` flag is only set while this lock is held, which is
    /// what makes attach-versus-cancel race free.
    sub_operation: Mutex<Option<CancellationToken>>,
}

impl CancellationContext {
    /// Creates a fresh, uncancelled context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking read of the cancellation flag.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(Cancelled)` if the context has been cancelled.
    ///
    /// Repositories call this between steps so that work started after
    /// cancellation short-circuits.
    pub fn check(&self) -> ApiResponse<()> {
        if self.is_cancelled() {
            Err(ApiError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Cancels the context and the currently attached nested step, if any.
    pub fn cancel_operation(&self) {
        let sub_operation = {
            let mut guard = self.inner.sub_operation.lock();
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            guard.take()
        };
        if let Some(token) = sub_operation {
            token.cancel();
        }
    }

    /// Starts a nested step unless the context is already cancelled.
    ///
    /// `execute` starts the step and returns the step's own token, which
    /// becomes the context's cancel-action. If the context is already
    /// cancelled, `on_cancelled` runs instead and `execute` is skipped. If
    /// cancellation arrives while `execute` is running, the returned token is
    /// cancelled as soon as it is attached.
    ///
    /// Returns true if `execute` ran.
    pub fn execute_or_cancelled<E, C>(&self, execute: E, on_cancelled: C) -> bool
    where
        E: FnOnce() -> CancellationToken,
        C: FnOnce(),
    {
        if self.is_cancelled() {
            on_cancelled();
            return false;
        }

        let token = execute();

        let mut guard = self.inner.sub_operation.lock();
        if self.inner.cancelled.load(Ordering::Acquire) {
            drop(guard);
            token.cancel();
        } else {
            *guard = Some(token);
        }
        true
    }

    /// Returns a token whose cancellation cancels this context.
    pub fn token(&self) -> CancellationToken {
        let context = self.clone();
        CancellationToken::new(move || context.cancel_operation())
    }
}

impl fmt::Debug for CancellationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationContext")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
