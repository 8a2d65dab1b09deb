//! Crate-wide error type.
//!
//! [`EmberError`] folds the engine's failure surface into one enum: bad
//! arguments and missing entities, device handle exhaustion, dependency
//! cycles caught during graph or task-graph compilation, loader routing
//! and parse/IO failures, and tasks that panicked or lost their worker
//! pool before running.
//!
//! Variants carry owned `String` context instead of wrapped source
//! errors so the enum stays `Clone`: a failed load resolves every clone
//! of the shared future waiting on it with the same error value.
//! Fallible compile-time and load-time paths return [`Result`];
//! per-frame recording problems are logged and the frame left
//! incomplete, never propagated.

use thiserror::Error;

/// Unified engine error.
///
/// Each variant names the failing subsystem and carries enough context
/// to diagnose the call site.
#[derive(Error, Debug, Clone)]
pub enum EmberError {
    // ========================================================================
    // Argument & State Errors
    // ========================================================================
    /// An argument was invalid (null device, zero size, mismatched handle).
    /// The operation was a no-op.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // Device & Graph Errors
    // ========================================================================
    /// A device `create_*` call returned an invalid handle.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A pass or task dependency graph contains a cycle.
    #[error("Dependency cycle detected: {0}")]
    CycleDetected(String),

    // ========================================================================
    // Resource Loading Errors
    // ========================================================================
    /// No registered loader supports the path and resource type.
    #[error("No loader registered for '{path}'")]
    LoaderNotFound {
        /// The resolved path that no loader claimed.
        path: String,
    },

    /// A loader failed to parse its input.
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error, flattened to a message so the error stays `Clone`.
    #[error("IO error: {0}")]
    Io(String),

    // ========================================================================
    // Scheduling Errors
    // ========================================================================
    /// A task panicked on a worker thread.
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// The worker pool shut down before the task could complete.
    #[error("Worker pool shut down")]
    PoolShutDown,
}

impl From<std::io::Error> for EmberError {
    fn from(err: std::io::Error) -> Self {
        EmberError::Io(err.to_string())
    }
}

/// Shorthand for results whose error is [`EmberError`].
pub type Result<T> = std::result::Result<T, EmberError>;
