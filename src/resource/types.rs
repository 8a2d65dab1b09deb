//! Resource Records
//!
//! CPU-side records for loaded resources. Loaders produce these; the
//! renderer consumes the device handles inside them. Parsing lives
//! outside the crate; these types are the loader contract.

use glam::Vec3;

use crate::device::{BufferHandle, Format, ShaderHandle, ShaderStage, TextureHandle};

/// Interleaved mesh vertex: position, normal, uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Byte stride of the interleaved vertex stream.
pub const MESH_VERTEX_STRIDE: usize = std::mem::size_of::<MeshVertex>();

/// One drawable range of a mesh's index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubMesh {
    /// First index of the range.
    pub index_offset: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Index into the mesh's `material_paths`.
    pub material_index: u32,
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

/// A mesh: GPU vertex/index buffers plus sub-mesh ranges.
///
/// Indices are `u32`. `material_paths` parallels the sub-mesh
/// `material_index` values so the application can bind real materials
/// once they stream in.
#[derive(Default)]
pub struct Mesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub vertex_count: u32,
    pub index_count: u32,
    pub sub_meshes: Vec<SubMesh>,
    pub bounds: Bounds,
    pub material_paths: Vec<String>,
}

/// A loaded texture and its device handle.
#[derive(Clone, Debug, Default)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub mip_levels: u32,
}

/// A compiled shader and the path/stage it came from.
#[derive(Clone, Debug, Default)]
pub struct Shader {
    pub handle: ShaderHandle,
    pub stage: ShaderStage,
    pub path: String,
}
