//! Cancellation context for XZ streams
//!
//! A [`CancelToken`] is passed to every writer/reader constructor and bounds
//! the lifetime of the whole stream: once the token is cancelled (or its
//! deadline passes), the backing subprocess is terminated and further pipe
//! operations fail. There is no per-call cancellation; the token governs the
//! stream as a unit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cloneable cancellation token. All clones share the same state, so a token
/// can be handed to several streams and cancel them together.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: Mutex<bool>,
    cond: Condvar,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires on its own; only [`cancel`](Self::cancel)
    /// trips it.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A token that fires automatically after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    /// A token that fires automatically at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    fn build(deadline: Option<Instant>) -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                cond: Condvar::new(),
                deadline,
            }),
        }
    }

    /// Flag the token as cancelled and wake every stream watching it.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.cond.notify_all();
    }

    /// Whether the token has been cancelled or its deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        if *self.inner.cancelled.lock() {
            return true;
        }
        matches!(self.inner.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Block until the token fires or `done` is set. Returns `true` if the
    /// token fired, `false` if the waiter was disarmed first. Used by the
    /// process watcher; `done` must be set before [`notify`](Self::notify)
    /// or the wakeup can be lost.
    pub(crate) fn wait(&self, done: &AtomicBool) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        loop {
            if *cancelled {
                return true;
            }
            if done.load(Ordering::Acquire) {
                return false;
            }
            match self.inner.deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return true;
                    }
                    self.inner.cond.wait_until(&mut cancelled, deadline);
                }
                None => self.inner.cond.wait(&mut cancelled),
            }
        }
    }

    /// Wake waiters so they can re-check their disarm flag.
    pub(crate) fn notify(&self) {
        let _guard = self.inner.cancelled.lock();
        self.inner.cond.notify_all();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}
