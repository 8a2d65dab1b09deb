//! Task Execution Layer
//!
//! Worker pool, DAG task graph, scheduler façade, and the lock-free
//! channel / double-buffer primitives used to move work and events across
//! threads. The render graph drives parallel command recording through
//! [`TaskScheduler::parallel_record`]; resource loading reports back to
//! the main thread through the scheduler's event channel.

pub mod channel;
pub mod frame_data;
pub mod future;
pub mod pool;
pub mod scheduler;
pub mod task_graph;

pub use channel::{MpscReceiver, MpscSender, SpscReceiver, SpscSender, mpsc_channel, spsc_channel};
pub use frame_data::FrameData;
pub use future::{SharedFuture, TaskFuture, Waitable};
pub use pool::WorkerPool;
pub use scheduler::{ResourceLoadedEvent, System, TaskScheduler, VisibleObjectList};
pub use task_graph::{DataSlotHandle, TaskContext, TaskDataManager, TaskGraph, TaskHandle};
