//! Device Description Types
//!
//! Plain-data descriptors consumed by the device's `create_*` calls.
//! Everything here is backend-agnostic; a backend maps these onto its
//! native formats and usage bits.

use bitflags::bitflags;

use super::handle::ShaderHandle;

// ============================================================================
// Formats
// ============================================================================

/// Texel formats the core declares. Block-compressed entries mirror the
/// formats the texture loaders emit (KTX1 / DDS fourCC mappings).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Format {
    #[default]
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24Stencil8,
    /// DXT1
    Bc1RgbaUnorm,
    /// DXT5
    Bc3RgbaUnorm,
    /// RGTC2
    Bc5RgUnorm,
    /// BPTC
    Bc7RgbaUnorm,
}

impl Format {
    /// True for block-compressed formats, which must be uploaded through
    /// the staging manager.
    #[must_use]
    pub fn is_block_compressed(self) -> bool {
        matches!(
            self,
            Format::Bc1RgbaUnorm | Format::Bc3RgbaUnorm | Format::Bc5RgUnorm | Format::Bc7RgbaUnorm
        )
    }

    /// True for depth (and depth-stencil) formats.
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Format::Depth32Float | Format::Depth24Stencil8)
    }
}

bitflags! {
    /// Buffer usage mask.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

bitflags! {
    /// Texture usage mask.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const DEPTH_ATTACHMENT = 1 << 2;
        const STORAGE = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

// ============================================================================
// Resource descriptors
// ============================================================================

/// Buffer creation descriptor.
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferDesc {
    pub size: usize,
    pub usage: BufferUsage,
    /// Host-visible, persistently mappable memory.
    pub cpu_visible: bool,
}

/// Texture creation descriptor. Zero width/height at render graph
/// declaration time inherit the graph's resolution.
#[derive(Clone, Copy, Debug)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: Format,
    pub usage: TextureUsage,
    pub is_cube: bool,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: Format::default(),
            usage: TextureUsage::SAMPLED,
            is_cube: false,
        }
    }
}

// ============================================================================
// Shaders & pipelines
// ============================================================================

/// Shader pipeline stage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ShaderStage {
    #[default]
    Vertex,
    Fragment,
    Compute,
}

/// Shader creation descriptor; `bytecode` is backend-defined (SPIR-V for
/// explicit backends).
#[derive(Clone, Debug, Default)]
pub struct ShaderDesc {
    pub stage: ShaderStage,
    pub bytecode: Vec<u8>,
    pub entry_point: String,
    /// Source path, kept for hot-reload bookkeeping and diagnostics.
    pub debug_path: String,
}

/// Descriptor binding slot type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DescriptorType {
    UniformBuffer,
    CombinedImageSampler,
    StorageBuffer,
}

/// One binding of a descriptor set layout.
#[derive(Clone, Copy, Debug)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub ty: DescriptorType,
    pub stage: ShaderStage,
    pub count: u32,
}

/// Descriptor set layout: an ordered list of bindings.
#[derive(Clone, Debug, Default)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
}

/// Pipeline creation descriptor. Layouts are hand-authored; set 0 is the
/// material set, set 1 the per-instance set.
#[derive(Clone, Debug, Default)]
pub struct PipelineDesc {
    pub vertex_shader: ShaderHandle,
    pub fragment_shader: ShaderHandle,
    pub color_formats: Vec<Format>,
    pub depth_format: Option<Format>,
    pub set_layouts: Vec<DescriptorSetLayoutDesc>,
    pub push_constant_size: u32,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Static device capabilities the core consults.
#[derive(Clone, Copy, Debug)]
pub struct DeviceCapabilities {
    /// Hard upper bound on concurrent recording threads; thread indices
    /// at or above this value must not be used.
    pub max_recording_threads: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_recording_threads: 1,
        }
    }
}

/// Maximum byte size of per-instance descriptor data.
pub const INSTANCE_DESCRIPTOR_DATA_SIZE: usize = 256;
