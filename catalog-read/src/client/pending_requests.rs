//! Registry of in-flight requests.
//!
//! [`PendingRequests`] maps a [`RequestKey`] to the cancellation handle of an
//! outstanding request. It serves two purposes:
//!
//! 1. **Guarded delivery** - a result is forwarded to the caller only by the
//!    path that wins [`PendingRequests::remove`] (or
//!    [`PendingRequests::remove_and_deliver`]) for its key. This is the sole
//!    deduplication mechanism between racing completion and cancellation.
//! 2. **Bulk cancellation** - [`PendingRequests::cancel_all`] signals every
//!    entry; [`PendingRequests::cancel_all_and_wait`] additionally blocks until
//!    every entry has been removed and every guarded delivery has returned.
//!
//! # Key Policy
//!
//! - [`generate_placeholder`](PendingRequests::generate_placeholder) reserves a
//!   key immediately, so a completion that races ahead of `insert_with_key`
//!   still finds its entry and wins `remove`.
//! - Inserting under a reserved placeholder replaces it. If the placeholder
//!   was cancelled by `cancel_all` in the meantime, the new entry is
//!   cancelled as soon as it is stored.
//! - Inserting under a key that holds a live entry is rejected; the existing
//!   entry is kept.
//! - Inserting under a placeholder key that has already been removed is
//!   rejected: that request has finished.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::cancellation::CancellationToken;
use super::task_context::TaskContext;

/// Key of a registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// Generated by [`PendingRequests::generate_placeholder`].
    Placeholder(u64),
    /// Assigned by the caller.
    Caller(i64),
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::Placeholder(id) => write!(f, "placeholder-{}", id),
            RequestKey::Caller(id) => write!(f, "caller-{}", id),
        }
    }
}

/// A task handle that can be stored in the registry.
pub trait PendingTask: Send + Sync {
    /// Cancels the task.
    fn cancel(&self);
}

impl<T: Send + 'static> PendingTask for TaskContext<T> {
    fn cancel(&self) {
        TaskContext::cancel(self);
    }
}

/// A live registry entry.
#[derive(Clone)]
pub enum PendingEntry {
    /// A plain cancellation token.
    Token(CancellationToken),
    /// A task context.
    Task(Arc<dyn PendingTask>),
}

impl PendingEntry {
    fn cancel(&self) {
        match self {
            PendingEntry::Token(token) => token.cancel(),
            PendingEntry::Task(task) => task.cancel(),
        }
    }
}

impl From<CancellationToken> for PendingEntry {
    fn from(token: CancellationToken) -> Self {
        PendingEntry::Token(token)
    }
}

impl<T: Send + 'static> From<TaskContext<T>> for PendingEntry {
    fn from(task: TaskContext<T>) -> Self {
        PendingEntry::Task(Arc::new(task))
    }
}

impl fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingEntry::Token(token) => f.debug_tuple("Token").field(token).finish(),
            PendingEntry::Task(_) => f.write_str("Task"),
        }
    }
}

enum Slot {
    Placeholder { cancelled: bool },
    Live(PendingEntry),
}

#[derive(Default)]
struct Registry {
    entries: HashMap<RequestKey, Slot>,
    /// Guarded deliveries currently running.
    delivering: usize,
}

impl Registry {
    fn is_drained(&self) -> bool {
        self.entries.is_empty() && self.delivering == 0
    }
}

/// Thread-safe registry of outstanding requests.
///
/// Each instance has its own key space.
pub struct PendingRequests {
    next_placeholder: AtomicU64,
    registry: Mutex<Registry>,
    drained: Condvar,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_placeholder: AtomicU64::new(1),
            registry: Mutex::new(Registry::default()),
            drained: Condvar::new(),
        }
    }

    /// Reserves a fresh placeholder key.
    pub fn generate_placeholder(&self) -> RequestKey {
        let key = RequestKey::Placeholder(self.next_placeholder.fetch_add(1, Ordering::Relaxed));
        self.registry
            .lock()
            .entries
            .insert(key, Slot::Placeholder { cancelled: false });
        trace!(key = %key, "Placeholder reserved");
        key
    }

    /// Stores `entry` under a freshly generated placeholder key.
    pub fn insert(&self, entry: impl Into<PendingEntry>) -> RequestKey {
        let key = self.generate_placeholder();
        self.insert_with_key(key, entry);
        key
    }

    /// Stores `entry` under `key`.
    ///
    /// Returns false if the entry was rejected (see the module docs for the
    /// key policy).
    pub fn insert_with_key(&self, key: RequestKey, entry: impl Into<PendingEntry>) -> bool {
        let entry = entry.into();

        let cancel_now = {
            let mut registry = self.registry.lock();
            let cancel_now = match registry.entries.get(&key) {
                Some(Slot::Live(_)) => {
                    debug!(key = %key, "Rejected duplicate request key");
                    return false;
                }
                Some(Slot::Placeholder { cancelled }) => *cancelled,
                None => match key {
                    RequestKey::Placeholder(_) => {
                        trace!(key = %key, "Request already finished");
                        return false;
                    }
                    RequestKey::Caller(_) => false,
                },
            };
            registry.entries.insert(key, Slot::Live(entry.clone()));
            cancel_now
        };

        if cancel_now {
            entry.cancel();
        }
        true
    }

    /// Removes `key`, returning whether it was still present.
    pub fn remove(&self, key: RequestKey) -> bool {
        let mut registry = self.registry.lock();
        let removed = registry.entries.remove(&key).is_some();
        if removed && registry.is_drained() {
            self.drained.notify_all();
        }
        removed
    }

    /// Removes `key` and, only if it was present, runs `deliver`.
    ///
    /// The delivery counts as in flight until it returns, so
    /// [`cancel_all_and_wait`](Self::cancel_all_and_wait) never returns while a
    /// delivery is still running.
    pub fn remove_and_deliver<F>(&self, key: RequestKey, deliver: F) -> bool
    where
        F: FnOnce(),
    {
        {
            let mut registry = self.registry.lock();
            if registry.entries.remove(&key).is_none() {
                return false;
            }
            registry.delivering += 1;
        }

        let _guard = DeliveryGuard { requests: self };
        deliver();
        true
    }

    /// Cancels every registered entry without removing it.
    ///
    /// Returns the number of entries (including placeholders) signalled.
    pub fn cancel_all(&self) -> usize {
        let (live, total) = {
            let mut registry = self.registry.lock();
            let total = registry.entries.len();
            let mut live = Vec::with_capacity(total);
            for slot in registry.entries.values_mut() {
                match slot {
                    Slot::Placeholder { cancelled } => *cancelled = true,
                    Slot::Live(entry) => live.push(entry.clone()),
                }
            }
            (live, total)
        };

        debug!(pending = total, "Cancelling pending requests");
        // Cancel outside the lock: cancel-actions may re-enter the registry.
        for entry in &live {
            entry.cancel();
        }
        total
    }

    /// Cancels every entry and blocks until the registry is drained.
    pub fn cancel_all_and_wait(&self) {
        self.cancel_all();
        self.wait_drained(None);
    }

    /// Like [`cancel_all_and_wait`](Self::cancel_all_and_wait) but gives up
    /// after `timeout`. Returns true if the registry drained in time.
    pub fn cancel_all_and_wait_timeout(&self, timeout: Duration) -> bool {
        self.cancel_all();
        self.wait_drained(Instant::now().checked_add(timeout))
    }

    /// Blocks until every registered request has delivered, without
    /// cancelling anything. Returns true if the registry drained in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_drained(Instant::now().checked_add(timeout))
    }

    /// Waits for the registry to drain. `None` waits without a bound.
    fn wait_drained(&self, deadline: Option<Instant>) -> bool {
        let mut registry = self.registry.lock();
        while !registry.is_drained() {
            match deadline {
                Some(deadline) => {
                    if self.drained.wait_until(&mut registry, deadline).timed_out() {
                        return registry.is_drained();
                    }
                }
                None => self.drained.wait(&mut registry),
            }
        }
        true
    }

    /// Returns true if `key` is registered.
    pub fn contains(&self, key: RequestKey) -> bool {
        self.registry.lock().entries.contains_key(&key)
    }

    /// Number of registered entries, placeholders included.
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    /// Returns true if no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("PendingRequests")
            .field("entries", &registry.entries.len())
            .field("delivering", &registry.delivering)
            .finish()
    }
}

/// Marks a guarded delivery as finished, even if it panics.
struct DeliveryGuard<'a> {
    requests: &'a PendingRequests,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        let mut registry = self.requests.registry.lock();
        registry.delivering -= 1;
        if registry.is_drained() {
            self.requests.drained.notify_all();
        }
    }
}
