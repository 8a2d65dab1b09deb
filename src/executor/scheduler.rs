//! Render Task Scheduler
//!
//! Façade over the [`WorkerPool`] providing the submission shapes the
//! rendering pipeline needs: plain task submission with futures,
//! dependency-chained submission, system updates, batch wait, and the
//! layered parallel command recording used by the render graph.
//!
//! Dependency waiting happens inside the submitted task itself, so the
//! pool only ever sees ready work. The scheduler also owns the two
//! cross-thread hand-off endpoints that bridge loader threads and the
//! frame loop: the resource-loaded MPSC channel and the double-buffered
//! visible-object list.

use std::any::TypeId;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::EmberError;

use super::channel::{MpscReceiver, MpscSender, mpsc_channel};
use super::frame_data::FrameData;
use super::future::{Promise, SharedFuture, TaskFuture, Waitable, panic_message, task_future};
use super::pool::WorkerPool;

/// Capacity of the resource-loaded event channel.
const RESOURCE_LOADED_CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// Cross-thread event types
// ============================================================================

/// Completion event pushed by loader tasks and drained on the main thread.
#[derive(Clone, Debug)]
pub struct ResourceLoadedEvent {
    /// Path the resource was loaded from.
    pub path: String,
    /// Raw id of the minted resource handle.
    pub handle_id: u64,
    /// Type of the loaded resource.
    pub type_id: TypeId,
}

/// Visible-object hand-off between culling (producer) and the render
/// pipeline (consumer). Entries are raw scene-entry ids.
#[derive(Default)]
pub struct VisibleObjectList {
    pub nodes: Vec<u64>,
}

/// A subsystem whose `update` can be scheduled behind dependencies.
///
/// Implementations synchronize their own interior state; `update` takes
/// `&self` because systems are shared with the pool.
pub trait System: Send + Sync {
    fn update(&self, delta_time: f32);
}

// ============================================================================
// TaskScheduler
// ============================================================================

/// Scheduler façade over a fixed worker pool.
pub struct TaskScheduler {
    pool: WorkerPool,
    pending: Mutex<Vec<SharedFuture<()>>>,
    resource_loaded_tx: MpscSender<ResourceLoadedEvent>,
    resource_loaded_rx: Mutex<MpscReceiver<ResourceLoadedEvent>>,
    visible_objects: Mutex<FrameData<VisibleObjectList>>,
}

impl TaskScheduler {
    /// Creates a scheduler with `num_threads` workers (machine core count
    /// when `None`).
    #[must_use]
    pub fn new(num_threads: Option<usize>) -> Self {
        let (tx, rx) = mpsc_channel(RESOURCE_LOADED_CHANNEL_CAPACITY);
        Self {
            pool: WorkerPool::new(num_threads, "ember-worker"),
            pending: Mutex::new(Vec::new()),
            resource_loaded_tx: tx,
            resource_loaded_rx: Mutex::new(rx),
            visible_objects: Mutex::new(FrameData::default()),
        }
    }

    /// The underlying worker pool.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    // ── Submission ─────────────────────────────────────────────────────────

    /// Runs `f` on any worker and returns a future for its result.
    pub fn submit<R, F>(&self, f: F) -> TaskFuture<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.submit_with_deps(f, Vec::new())
    }

    /// Runs `f` after every dependency future has completed. The wait is
    /// performed by the task itself on the worker.
    pub fn submit_with_deps<R, F>(&self, f: F, deps: Vec<Arc<dyn Waitable>>) -> TaskFuture<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (promise, future) = task_future::<R>();
        let done = self.track_completion();
        self.pool.execute(move || {
            for dep in &deps {
                dep.wait();
            }
            Self::run_into_promise(f, promise);
            done.set(Ok(()));
        });
        future
    }

    /// Runs a fallible `f` on any worker; the returned future resolves
    /// directly with `f`'s result (no nested `Result`).
    pub fn submit_result<R, F>(&self, f: F) -> TaskFuture<R>
    where
        R: Send + 'static,
        F: FnOnce() -> crate::errors::Result<R> + Send + 'static,
    {
        let (promise, future) = task_future::<R>();
        let done = self.track_completion();
        self.pool.execute(move || {
            match catch_unwind(AssertUnwindSafe(f)) {
                Ok(result) => promise.set(result),
                Err(payload) => {
                    promise.set(Err(EmberError::TaskPanicked(panic_message(payload.as_ref()))));
                }
            }
            done.set(Ok(()));
        });
        future
    }

    /// Schedules `system.update(delta_time)` behind `deps`.
    pub fn submit_system_update(
        &self,
        system: Arc<dyn System>,
        delta_time: f32,
        deps: Vec<Arc<dyn Waitable>>,
    ) {
        let done = self.track_completion();
        self.pool.execute(move || {
            for dep in &deps {
                dep.wait();
            }
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| system.update(delta_time))) {
                log::error!("system update panicked: {}", panic_message(payload.as_ref()));
            }
            done.set(Ok(()));
        });
    }

    /// Blocks until every task submitted through this façade and not yet
    /// reaped has completed, then drops the pending list.
    pub fn wait_all(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for future in pending {
            future.wait();
        }
    }

    // ── Scoped submission (internal) ───────────────────────────────────────

    /// Submits a borrowing closure behind `deps` and returns its
    /// completion future.
    ///
    /// The closure's lifetime is erased to hand it to the 'static pool;
    /// every caller must wait on the returned future (directly or through
    /// a later chunk barrier) before the borrowed data goes out of scope.
    pub(crate) fn submit_scoped(
        &self,
        f: Box<dyn FnOnce() + Send + '_>,
        deps: Vec<SharedFuture<()>>,
    ) -> SharedFuture<()> {
        // SAFETY: the submit_scoped contract above; all call sites are in
        // this crate and barrier on the future before their borrows end.
        let f: Box<dyn FnOnce() + Send + 'static> = unsafe { std::mem::transmute(f) };
        let (promise, future) = task_future::<()>();
        let shared = future.share();
        self.pending.lock().push(shared.clone());
        self.pool.execute(move || {
            for dep in &deps {
                dep.wait();
            }
            match catch_unwind(AssertUnwindSafe(f)) {
                Ok(()) => promise.set(Ok(())),
                Err(payload) => {
                    promise.set(Err(EmberError::TaskPanicked(panic_message(payload.as_ref()))));
                }
            }
        });
        shared
    }

    // ── Parallel command recording ─────────────────────────────────────────

    /// Records a set of functions with declared dependencies, grouped into
    /// layers: layer 0 holds all functions without dependencies, layer
    /// k+1 all functions whose dependencies live in earlier layers.
    /// Within a layer, functions run in chunks of `max_threads`; each
    /// receives a thread index in `[0, chunk len)`, stable for the
    /// duration of the call. A chunk starts only after every function of
    /// the previous chunk and layer has completed.
    ///
    /// If `j` is in `dependencies[i]`, function `j` completes before
    /// function `i` begins. No function observes a thread index >=
    /// `max_threads`.
    pub fn parallel_record(
        &self,
        record_fns: Vec<Box<dyn FnOnce(u32) + Send + '_>>,
        dependencies: &[Vec<usize>],
        max_threads: u32,
    ) {
        let n = record_fns.len();
        if n == 0 {
            return;
        }
        let max_threads = max_threads.max(1) as usize;

        let levels = layer_by_dependencies(n, dependencies);

        let mut fns: Vec<Option<Box<dyn FnOnce(u32) + Send + '_>>> =
            record_fns.into_iter().map(Some).collect();

        let mut prev_level_futures: Vec<SharedFuture<()>> = Vec::new();
        for level in levels {
            let mut level_futures = Vec::with_capacity(level.len());
            for chunk in level.chunks(max_threads) {
                let mut chunk_futures = Vec::with_capacity(chunk.len());
                for (k, &idx) in chunk.iter().enumerate() {
                    let Some(f) = fns[idx].take() else { continue };
                    let thread_index = k as u32;
                    let task: Box<dyn FnOnce() + Send + '_> = Box::new(move || f(thread_index));
                    chunk_futures.push(self.submit_scoped(task, prev_level_futures.clone()));
                }
                for future in &chunk_futures {
                    future.wait();
                }
                level_futures.append(&mut chunk_futures);
            }
            prev_level_futures = level_futures;
        }
    }

    // ── Cross-thread endpoints ─────────────────────────────────────────────

    /// Clones the producer side of the resource-loaded channel for use by
    /// loader tasks.
    #[must_use]
    pub fn resource_loaded_sender(&self) -> MpscSender<ResourceLoadedEvent> {
        self.resource_loaded_tx.clone()
    }

    /// Drains one resource-loaded event; called from the main thread each
    /// frame.
    pub fn poll_resource_loaded(&self) -> Option<ResourceLoadedEvent> {
        self.resource_loaded_rx.lock().try_recv()
    }

    /// The double-buffered visible-object list shared between culling and
    /// the render pipeline.
    #[must_use]
    pub fn visible_objects(&self) -> &Mutex<FrameData<VisibleObjectList>> {
        &self.visible_objects
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn track_completion(&self) -> Promise<()> {
        let (promise, future) = task_future::<()>();
        self.pending.lock().push(future.share());
        promise
    }

    fn run_into_promise<R, F>(f: F, promise: Promise<R>)
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => promise.set(Ok(value)),
            Err(payload) => {
                promise.set(Err(EmberError::TaskPanicked(panic_message(payload.as_ref()))));
            }
        }
    }
}

/// Groups function indices into dependency layers (layer 0: no deps;
/// layer k+1: deps all in layers 0..=k). Order within a layer is the
/// declaration order.
fn layer_by_dependencies(n: usize, dependencies: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let deps_of = |i: usize| dependencies.get(i).map_or(&[][..], Vec::as_slice);

    let mut in_degree = vec![0usize; n];
    for i in 0..n {
        in_degree[i] = deps_of(i).iter().filter(|&&j| j < n).count();
    }

    let mut level: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut levels = Vec::new();
    while !level.is_empty() {
        levels.push(level.clone());
        let mut next = Vec::new();
        for &done in &level {
            for j in 0..n {
                if deps_of(j).contains(&done) {
                    in_degree[j] -= 1;
                    if in_degree[j] == 0 {
                        next.push(j);
                    }
                }
            }
        }
        next.sort_unstable();
        level = next;
    }
    levels
}
