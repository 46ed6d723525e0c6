//! Request orchestration primitives.
//!
//! These types know nothing about catalogs, partitions or HTTP. They provide
//! the concurrency contract every client operation is built on:
//!
//! - [`CancellationToken`] / [`CancellationContext`] - cooperative cancellation
//! - [`TaskContext`] - an operation plus a callback that fires exactly once
//! - [`PendingRequests`] - registry used for guarded delivery and bulk cancel
//! - [`CancellableFuture`] - future-style adapter over callback operations
//! - [`ApiError`] / [`ApiResponse`] - the uniform result shape
//!
//! # Delivery Contract
//!
//! ```text
//!  caller ── fetch ──► key = PendingRequests::generate_placeholder()
//!                      TaskContext { operation, callback' }
//!                      PendingRequests::insert_with_key(key, task)
//!                      scheduler ── task.execute()
//!                                        │
//!                 callback' = if remove(key) { callback(result) }
//! ```
//!
//! Whoever wins `remove(key)` delivers; every other completion path for the
//! same key is silently dropped.

mod cancellation;
mod error;
mod future;
mod pending_requests;
mod task_context;

pub use cancellation::{CancellationContext, CancellationToken};
pub use error::{ApiError, ApiResponse, ErrorKind};
pub use future::{CancellableFuture, ResponseCallback};
pub use pending_requests::{PendingEntry, PendingRequests, PendingTask, RequestKey};
pub use task_context::{TaskContext, TaskState};
