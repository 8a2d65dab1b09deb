//! Resource Layer
//!
//! Generational handles, the reference-counted cache, the loader
//! registry, and the streaming front-end (async loads, placeholders, hot
//! reload). Format parsers stay outside the crate and plug in through
//! [`ResourceLoader`].

pub mod cache;
pub mod handle;
pub mod loader;
pub mod manager;
pub mod types;

pub use cache::{ReleasedEntry, ResourceCache};
pub use handle::Handle;
pub use loader::{LoaderContext, ResourceLoader, has_extension, split_lod_suffix};
pub use manager::ResourceManager;
pub use types::{Bounds, MESH_VERTEX_STRIDE, Mesh, MeshVertex, Shader, SubMesh, Texture};
