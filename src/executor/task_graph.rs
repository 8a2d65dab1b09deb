//! Task Graph
//!
//! DAG task submission: nodes are added with explicit dependency handles,
//! then submitted in one shot. Submission runs Kahn's algorithm, rejects
//! cycles, and enqueues every node onto the worker pool as a task that
//! first waits on its dependency futures and then runs the node function.
//! The pool therefore only ever sees ready work from its own perspective;
//! waiting happens inside the tasks.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::errors::{EmberError, Result};

use super::future::{SharedFuture, panic_message, task_future};
use super::pool::WorkerPool;

// ============================================================================
// Handles
// ============================================================================

/// 1-based handle to a task graph node; 0 is invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct TaskHandle(pub u32);

impl TaskHandle {
    /// The invalid handle.
    pub const INVALID: TaskHandle = TaskHandle(0);

    /// True iff this handle refers to a node.
    #[inline]
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize - 1
    }
}

/// Handle to a data slot in a [`TaskDataManager`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DataSlotHandle(pub u32);

// ============================================================================
// Task data slots
// ============================================================================

/// Indexed, type-erased data slots shared between graph tasks.
///
/// A task writes its output slot while it runs; downstream tasks read it
/// after their dependency wait, so the per-slot lock is uncontended in a
/// well-formed graph.
#[derive(Default)]
pub struct TaskDataManager {
    slots: Vec<RwLock<Box<dyn Any + Send + Sync>>>,
}

impl TaskDataManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a slot holding `value` and returns its handle.
    pub fn add_slot<T: Send + Sync + 'static>(&mut self, value: T) -> DataSlotHandle {
        self.slots.push(RwLock::new(Box::new(value)));
        DataSlotHandle(self.slots.len() as u32 - 1)
    }

    /// Read access to a slot; `None` on an out-of-range handle or a type
    /// mismatch.
    pub fn read_slot<T: 'static>(&self, handle: DataSlotHandle) -> Option<MappedRwLockReadGuard<'_, T>> {
        let slot = self.slots.get(handle.0 as usize)?;
        RwLockReadGuard::try_map(slot.read(), |b| b.downcast_ref::<T>()).ok()
    }

    /// Write access to a slot; `None` on an out-of-range handle or a type
    /// mismatch.
    pub fn write_slot<T: 'static>(&self, handle: DataSlotHandle) -> Option<MappedRwLockWriteGuard<'_, T>> {
        let slot = self.slots.get(handle.0 as usize)?;
        RwLockWriteGuard::try_map(slot.write(), |b| b.downcast_mut::<T>()).ok()
    }
}

/// Per-task execution context handed to every node function.
pub struct TaskContext {
    /// Handle of the running task.
    pub task_handle: TaskHandle,
    data: Option<Arc<TaskDataManager>>,
}

impl TaskContext {
    /// The shared data manager, if one was attached to the graph.
    #[must_use]
    pub fn data(&self) -> Option<&TaskDataManager> {
        self.data.as_deref()
    }

    /// Reads an input slot written by a dependency.
    pub fn input<T: 'static>(&self, handle: DataSlotHandle) -> Option<MappedRwLockReadGuard<'_, T>> {
        self.data.as_deref()?.read_slot(handle)
    }

    /// Writes this task's output slot.
    pub fn output<T: 'static>(&self, handle: DataSlotHandle) -> Option<MappedRwLockWriteGuard<'_, T>> {
        self.data.as_deref()?.write_slot(handle)
    }
}

// ============================================================================
// TaskGraph
// ============================================================================

type TaskFn = Arc<dyn Fn(&TaskContext) + Send + Sync>;

struct Node {
    func: TaskFn,
    dependencies: Vec<TaskHandle>,
}

/// DAG of tasks submitted as one unit to a [`WorkerPool`].
#[derive(Default)]
pub struct TaskGraph {
    nodes: Vec<Node>,
    data: Option<Arc<TaskDataManager>>,
    futures: Vec<Option<SharedFuture<()>>>,
    submitted: bool,
}

impl TaskGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a data manager; tasks access it through [`TaskContext`].
    pub fn set_data_manager(&mut self, data: Arc<TaskDataManager>) {
        self.data = Some(data);
    }

    /// Adds a task node. `dependencies` must complete before the node
    /// runs. Returns the node's 1-based handle for use in later
    /// dependency lists.
    pub fn add_task(
        &mut self,
        func: impl Fn(&TaskContext) + Send + Sync + 'static,
        dependencies: Vec<TaskHandle>,
    ) -> TaskHandle {
        self.nodes.push(Node {
            func: Arc::new(func),
            dependencies,
        });
        TaskHandle(self.nodes.len() as u32)
    }

    /// Adds a task node that both depends on `deps` and is depended upon
    /// by every handle in `dependents`: each dependent gains an edge back
    /// to the new node.
    pub fn add_task_with_data(
        &mut self,
        func: impl Fn(&TaskContext) + Send + Sync + 'static,
        deps: Vec<TaskHandle>,
        dependents: Vec<TaskHandle>,
    ) -> TaskHandle {
        let handle = self.add_task(func, deps);
        for dependent in dependents {
            if !dependent.is_valid() {
                continue;
            }
            let idx = dependent.index();
            if idx < self.nodes.len() {
                self.nodes[idx].dependencies.push(handle);
            }
        }
        handle
    }

    /// Number of nodes currently in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True iff `submit` ran and `wait` has not yet drained it.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Kahn topological order over the node indices; `None` iff the graph
    /// has a cycle.
    fn build_topological_order(&self) -> Option<Vec<usize>> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        for (i, node) in self.nodes.iter().enumerate() {
            for dep in &node.dependencies {
                if dep.is_valid() && dep.index() < n {
                    in_degree[i] += 1;
                }
            }
        }

        let mut queue: std::collections::VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(u) = queue.pop_front() {
            order.push(u);
            let handle = TaskHandle(u as u32 + 1);
            for (v, node) in self.nodes.iter().enumerate() {
                if v != u && node.dependencies.contains(&handle) {
                    in_degree[v] -= 1;
                    if in_degree[v] == 0 {
                        queue.push_back(v);
                    }
                }
            }
        }

        (order.len() == n).then_some(order)
    }

    /// Submits every node to the pool in topological order. Each task
    /// waits on its dependency futures before running its function, so
    /// the pool sees only ready work.
    ///
    /// # Errors
    ///
    /// [`EmberError::CycleDetected`] if the dependency edges contain a
    /// cycle; no task is dispatched in that case.
    pub fn submit(&mut self, pool: &WorkerPool) -> Result<()> {
        self.futures.clear();
        self.submitted = false;

        if self.nodes.is_empty() {
            return Ok(());
        }
        let order = self
            .build_topological_order()
            .ok_or_else(|| EmberError::CycleDetected("task graph".to_string()))?;

        self.futures.resize_with(self.nodes.len(), || None);

        for idx in order {
            let node = &self.nodes[idx];
            let dep_futures: Vec<SharedFuture<()>> = node
                .dependencies
                .iter()
                .filter(|d| d.is_valid() && d.index() < self.nodes.len())
                .filter_map(|d| self.futures[d.index()].clone())
                .collect();

            let func = Arc::clone(&node.func);
            let ctx = TaskContext {
                task_handle: TaskHandle(idx as u32 + 1),
                data: self.data.clone(),
            };

            let (promise, future) = task_future::<()>();
            self.futures[idx] = Some(future.share());

            pool.execute(move || {
                for dep in &dep_futures {
                    dep.wait();
                }
                match catch_unwind(AssertUnwindSafe(|| func(&ctx))) {
                    Ok(()) => promise.set(Ok(())),
                    Err(payload) => {
                        promise.set(Err(EmberError::TaskPanicked(panic_message(payload.as_ref()))));
                    }
                }
            });
        }

        self.submitted = true;
        Ok(())
    }

    /// Blocks on every node future from the last `submit`.
    pub fn wait(&mut self) {
        if !self.submitted {
            return;
        }
        for future in self.futures.iter().flatten() {
            future.wait();
        }
        self.submitted = false;
    }

    /// Resets all nodes and submission state so the graph can be reused.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.futures.clear();
        self.submitted = false;
    }
}
