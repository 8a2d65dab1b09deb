#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod device;
pub mod errors;
pub mod executor;
pub mod graph;
pub mod material;
pub mod resource;
pub mod shader;
pub mod staging;

pub use device::{CommandList, RenderDevice};
pub use errors::{EmberError, Result};
pub use executor::{FrameData, TaskGraph, TaskScheduler, WorkerPool};
pub use graph::{PassBuilder, PassContext, PassHandle, RenderGraph, RgResourceHandle};
pub use material::{Material, PassMask, Renderable, SubmittedDraw};
pub use resource::{Handle, ResourceCache, ResourceLoader, ResourceManager};
pub use shader::{PipelineReloadRegistry, ShaderManager};
pub use staging::{StagingAllocation, StagingMemoryManager};
