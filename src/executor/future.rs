//! Task Futures
//!
//! Join handles for work submitted to the worker pool. [`TaskFuture`] is
//! the move-only form returned by submission: `get` consumes it and yields
//! the task's result. [`SharedFuture`] is its cloneable form, used for
//! dependency fan-in where many downstream tasks wait on one upstream.
//!
//! Worker panics are caught at the task boundary and surface as
//! [`EmberError::TaskPanicked`]; a future whose task is dropped without
//! running (pool shutdown) resolves to [`EmberError::PoolShutDown`].

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::errors::{EmberError, Result};

struct FutureState<T> {
    value: Mutex<Option<Result<T>>>,
    ready: Condvar,
}

/// Fulfilling side of a future; held by the task wrapper on the worker.
///
/// Dropping an unfulfilled promise resolves the future with
/// [`EmberError::PoolShutDown`] so waiters never hang.
pub(crate) struct Promise<T> {
    state: Arc<FutureState<T>>,
    fulfilled: bool,
}

impl<T> Promise<T> {
    pub(crate) fn set(mut self, value: Result<T>) {
        *self.state.value.lock() = Some(value);
        self.fulfilled = true;
        self.state.ready.notify_all();
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.fulfilled {
            let mut guard = self.state.value.lock();
            if guard.is_none() {
                *guard = Some(Err(EmberError::PoolShutDown));
                self.state.ready.notify_all();
            }
        }
    }
}

/// Creates a connected promise/future pair.
pub(crate) fn task_future<T>() -> (Promise<T>, TaskFuture<T>) {
    let state = Arc::new(FutureState {
        value: Mutex::new(None),
        ready: Condvar::new(),
    });
    (
        Promise {
            state: Arc::clone(&state),
            fulfilled: false,
        },
        TaskFuture { state },
    )
}

// ============================================================================
// TaskFuture
// ============================================================================

/// Move-only join handle for a submitted task.
pub struct TaskFuture<T> {
    state: Arc<FutureState<T>>,
}

impl<T> TaskFuture<T> {
    /// A future that is already resolved with `value`. Used when a task
    /// runs synchronously (no scheduler bound).
    #[must_use]
    pub fn ready(value: Result<T>) -> Self {
        let (promise, future) = task_future();
        promise.set(value);
        future
    }

    /// Blocks until the task has completed.
    pub fn wait(&self) {
        let mut guard = self.state.value.lock();
        while guard.is_none() {
            self.state.ready.wait(&mut guard);
        }
    }

    /// Blocks until completion and consumes the future, yielding the
    /// task's result.
    pub fn get(self) -> Result<T> {
        let mut guard = self.state.value.lock();
        while guard.is_none() {
            self.state.ready.wait(&mut guard);
        }
        guard.take().expect("future resolved")
    }

    /// True iff the task has completed (successfully or not).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.value.lock().is_some()
    }

    /// Converts into the cloneable form for multi-dependency fan-in.
    #[must_use]
    pub fn share(self) -> SharedFuture<T> {
        SharedFuture { state: self.state }
    }
}

// ============================================================================
// SharedFuture
// ============================================================================

/// Cloneable join handle; many waiters may block on the same task.
pub struct SharedFuture<T> {
    state: Arc<FutureState<T>>,
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> SharedFuture<T> {
    /// Blocks until the task has completed.
    pub fn wait(&self) {
        let mut guard = self.state.value.lock();
        while guard.is_none() {
            self.state.ready.wait(&mut guard);
        }
    }

    /// True iff the task has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.value.lock().is_some()
    }
}

impl<T: Clone> SharedFuture<T> {
    /// Blocks until completion and clones out the result.
    pub fn get(&self) -> Result<T> {
        let mut guard = self.state.value.lock();
        while guard.is_none() {
            self.state.ready.wait(&mut guard);
        }
        guard.as_ref().expect("future resolved").clone()
    }
}

// ============================================================================
// Waitable
// ============================================================================

/// Type-erased completion handle, the dependency currency of the
/// scheduler: downstream tasks wait on upstream futures regardless of
/// their payload types.
pub trait Waitable: Send + Sync {
    /// Blocks until the underlying task has completed.
    fn wait(&self);
}

impl<T: Send> Waitable for SharedFuture<T> {
    fn wait(&self) {
        SharedFuture::wait(self);
    }
}

impl<T: Send + 'static> SharedFuture<T> {
    /// Erases the payload type for use in a dependency list.
    #[must_use]
    pub fn waitable(&self) -> Arc<dyn Waitable> {
        Arc::new(self.clone())
    }
}

/// Renders a payload from `catch_unwind` as a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
