//! Loader Registry Contract
//!
//! A loader claims paths (`supports`), names the type it produces, and
//! builds the resource from a resolved path. Concrete format parsers
//! (glTF, OBJ, PNG, KTX, DDS) live outside the crate and plug in through
//! this trait; the manager only routes.

use std::any::{Any, TypeId};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::RenderDevice;
use crate::errors::Result;
use crate::shader::ShaderManager;
use crate::staging::StagingMemoryManager;

use super::manager::ResourceManager;

/// Engine services available to a loader while it runs.
///
/// Loaders run on worker threads; everything here is either internally
/// synchronized or lock-guarded.
pub struct LoaderContext<'a> {
    /// Device for resource creation; `None` in headless tooling.
    pub device: Option<&'a Arc<dyn RenderDevice>>,
    /// Upload pool for device-local data (required by block-compressed
    /// textures).
    pub staging: Option<&'a Mutex<StagingMemoryManager>>,
    /// Shader compilation cache.
    pub shaders: Option<&'a Mutex<ShaderManager>>,
    /// The owning manager, for nested loads (a mesh pulling its
    /// materials).
    pub manager: &'a ResourceManager,
}

/// A registered resource loader.
pub trait ResourceLoader: Send + Sync {
    /// True iff this loader handles `path` (typically by extension).
    fn supports(&self, path: &str) -> bool;

    /// The concrete type this loader produces.
    fn resource_type(&self) -> TypeId;

    /// Loads the resource at the (already resolved) `path`. The returned
    /// box must downcast to [`resource_type`](Self::resource_type).
    fn load(&self, path: &str, ctx: &LoaderContext<'_>) -> Result<Box<dyn Any + Send + Sync>>;
}

/// Splits a `#lodN` suffix off a mesh path.
///
/// Returns the base path and the selected sub-mesh index, or `None` for
/// a malformed suffix. Mesh loaders fail with a descriptive error when
/// the index is out of range for the loaded file.
#[must_use]
pub fn split_lod_suffix(path: &str) -> (&str, Option<usize>) {
    let Some((base, suffix)) = path.rsplit_once("#lod") else {
        return (path, None);
    };
    match suffix.parse::<usize>() {
        Ok(index) => (base, Some(index)),
        Err(_) => (path, None),
    }
}

/// True iff `path` ends in one of `extensions` (case-insensitive,
/// ignoring any `#lodN` suffix).
#[must_use]
pub fn has_extension(path: &str, extensions: &[&str]) -> bool {
    let (base, _) = split_lod_suffix(path);
    let Some((_, ext)) = base.rsplit_once('.') else {
        return false;
    };
    extensions.iter().any(|e| ext.eq_ignore_ascii_case(e))
}
