//! A cancellable unit of work bound to its result callback.
//!
//! A [`TaskContext`] couples an operation, a callback, and a
//! [`CancellationContext`]. The callback fires exactly once, whether the
//! task completes normally, is cancelled before it starts, or is cancelled
//! while running. The operation and the callback live in one slot behind
//! one lock; whichever caller moves the task out of `Created` takes both, so
//! a second delivery is impossible by construction.
//!
//! # State Machine
//!
//! ```text
//! Created --execute()--> Executing --> Completed
//!                                 \--> Cancelled   (cancel raced in)
//! Created --execute() after cancel--> Cancelled    (operation skipped)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::cancellation::{CancellationContext, CancellationToken};
use super::error::{ApiError, ApiResponse};

type TaskOperation<T> = Box<dyn FnOnce(CancellationContext) -> ApiResponse<T> + Send + 'static>;
type TaskCallback<T> = Box<dyn FnOnce(ApiResponse<T>) + Send + 'static>;

/// Lifecycle state of a [`TaskContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created but not yet executed.
    Created,
    /// The operation is running.
    Executing,
    /// The operation finished and its result was delivered.
    Completed,
    /// A cancellation result was delivered.
    Cancelled,
}

impl TaskState {
    /// Returns true for `Completed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

struct TaskSlot<T> {
    state: TaskState,
    operation: Option<TaskOperation<T>>,
    callback: Option<TaskCallback<T>>,
    /// Set after the callback has returned.
    delivered: bool,
}

struct TaskInner<T> {
    context: CancellationContext,
    slot: Mutex<TaskSlot<T>>,
    delivered: Condvar,
}

/// A cancellable operation plus the callback that receives its result.
///
/// Cheap to clone; clones refer to the same task.
pub struct TaskContext<T> {
    inner: Arc<TaskInner<T>>,
}

impl<T> Clone for TaskContext<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> TaskContext<T> {
    /// Creates a task in the `Created` state.
    ///
    /// # Arguments
    ///
    /// * `operation` - Produces the result; receives the task's cancellation context
    /// * `callback` - Receives the result (or a cancellation error) exactly once
    pub fn create<F, C>(operation: F, callback: C) -> Self
    where
        F: FnOnce(CancellationContext) -> ApiResponse<T> + Send + 'static,
        C: FnOnce(ApiResponse<T>) + Send + 'static,
    {
        Self {
            inner: Arc::new(TaskInner {
                context: CancellationContext::new(),
                slot: Mutex::new(TaskSlot {
                    state: TaskState::Created,
                    operation: Some(Box::new(operation)),
                    callback: Some(Box::new(callback)),
                    delivered: false,
                }),
                delivered: Condvar::new(),
            }),
        }
    }

    /// Runs the task on the calling thread.
    ///
    /// Only the first call does anything. If the task was cancelled before
    /// this call, the operation is skipped and the callback receives a
    /// cancellation error. If cancellation lands while the operation runs,
    /// the operation's result is discarded in favour of a cancellation error.
    pub fn execute(&self) {
        let context = &self.inner.context;

        let (operation, callback) = {
            let mut slot = self.inner.slot.lock();
            if slot.state != TaskState::Created {
                return;
            }
            slot.state = if context.is_cancelled() {
                TaskState::Cancelled
            } else {
                TaskState::Executing
            };
            (slot.operation.take(), slot.callback.take())
        };

        let response = match operation {
            Some(operation) if !context.is_cancelled() => {
                let response = operation(context.clone());
                if context.is_cancelled() {
                    Err(ApiError::cancelled())
                } else {
                    response
                }
            }
            _ => Err(ApiError::cancelled()),
        };

        {
            let mut slot = self.inner.slot.lock();
            slot.state = match &response {
                Err(e) if e.is_cancelled() && context.is_cancelled() => TaskState::Cancelled,
                _ => TaskState::Completed,
            };
            trace!(state = ?slot.state, "Task finished");
        }

        if let Some(callback) = callback {
            callback(response);
        }

        let mut slot = self.inner.slot.lock();
        slot.delivered = true;
        self.inner.delivered.notify_all();
    }
}

impl<T> TaskContext<T> {
    /// Returns a token bound to this task's cancellation context.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.context.token()
    }

    /// Cancels the task.
    pub fn cancel(&self) {
        self.inner.context.cancel_operation();
    }

    /// Returns true if the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.context.is_cancelled()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.inner.slot.lock().state
    }

    /// Cancels the task and waits until its callback has returned.
    ///
    /// Returns false if the callback did not fire within `timeout`, which
    /// happens when nobody ever executes the task.
    pub fn blocking_cancel(&self, timeout: Duration) -> bool {
        self.cancel();

        // Timeouts past the representable range wait without a bound.
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.inner.slot.lock();
        while !slot.delivered {
            match deadline {
                Some(deadline) => {
                    if self
                        .inner
                        .delivered
                        .wait_until(&mut slot, deadline)
                        .timed_out()
                    {
                        return slot.delivered;
                    }
                }
                None => self.inner.delivered.wait(&mut slot),
            }
        }
        true
    }
}

impl<T> fmt::Debug for TaskContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
