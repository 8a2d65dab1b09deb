//! Worker Pool
//!
//! Fixed-size pool of named worker threads draining a shared job queue.
//! The pool knows nothing about dependencies or futures; the scheduler
//! façade layers those on top. Workers join on drop, so a pool owns the
//! full lifetime of its threads.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker thread pool.
pub struct WorkerPool {
    sender: Option<flume::Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    name: String,
}

impl WorkerPool {
    /// Spawns `num_threads` workers (defaults to the machine's logical
    /// core count when `None`). `name` labels the threads for debuggers
    /// and log output.
    #[must_use]
    pub fn new(num_threads: Option<usize>, name: &str) -> Self {
        let num_threads = num_threads.unwrap_or_else(num_cpus::get).max(1);
        let (sender, receiver) = flume::unbounded::<Job>();

        let handles = (0..num_threads)
            .map(|i| {
                let receiver = receiver.clone();
                let thread_name = format!("{name} [{i}]");
                std::thread::Builder::new()
                    .name(thread_name.clone())
                    .spawn(move || {
                        log::trace!("worker thread {thread_name} started");
                        while let Ok(job) = receiver.recv() {
                            // A panicking job must not take the worker down;
                            // the scheduler has already routed the panic into
                            // the task's future.
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                log::error!("worker thread {thread_name}: job panicked");
                            }
                        }
                        log::trace!("worker thread {thread_name} exiting");
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            handles,
            name: name.to_string(),
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Enqueues a job for execution on any worker.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            // Send only fails after shutdown began, which cannot happen
            // while `self` is alive and holding the sender.
            let _ = sender.send(Box::new(job));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets each worker finish its current job and
        // drain the backlog before exiting.
        self.sender.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("worker pool {}: thread panicked on join", self.name);
            }
        }
    }
}
