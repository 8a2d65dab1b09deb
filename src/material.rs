//! Materials & Submitted Draws
//!
//! A material bundles the pipeline and the two descriptor-set lifecycles
//! of the binding model:
//!
//! - **Material set (set 0)**: one per material, shared by every instance,
//!   carrying the texture bindings. Built lazily from the texture list and
//!   rebuilt whenever the set changes.
//! - **Instance set (set 1)**: one per draw per frame, carrying per-draw
//!   uniform data. Drawn from the device's bounded pool; every handle
//!   acquired during a frame is returned in `release_frame_resources`,
//!   and the pool reuses returned handles without new allocations.
//!
//! A push-constant-only material variant skips descriptor sets entirely
//! and pushes the instance data instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use glam::Mat4;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::device::{
    CommandList, DescriptorBinding, DescriptorSetHandle, DescriptorSetLayoutDesc, DescriptorType,
    PipelineHandle, RenderDevice, ShaderStage,
};
use crate::resource::Texture;

bitflags! {
    /// Pass categories a submitted draw participates in.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct PassMask: u32 {
        const OPAQUE = 1 << 0;
        const TRANSPARENT = 1 << 1;
        const SHADOW_CASTER = 1 << 2;
        const POST_PROCESS = 1 << 3;
    }
}

impl Default for PassMask {
    fn default() -> Self {
        PassMask::all()
    }
}

/// A drawable object submitted to the render graph.
///
/// Implementations record their own draw calls from pass execute
/// functions; the graph itself only needs the end-of-frame hook. The
/// device is passed into the release call rather than stored, so
/// renderables carry no device back-pointer.
pub trait Renderable: Send + Sync {
    /// Returns per-frame resources (instance descriptor sets) to the
    /// device pools. Called once per submitted draw at frame end.
    fn release_frame_resources(&self, device: &dyn RenderDevice);
}

/// One draw pushed into the graph for the current frame.
#[derive(Clone)]
pub struct SubmittedDraw {
    /// The drawable; the graph holds a shared reference, never ownership.
    pub renderable: Arc<dyn Renderable>,
    /// World transform of the draw.
    pub world_transform: Mat4,
    /// Pass categories including this draw.
    pub pass_mask: PassMask,
}

// ============================================================================
// Material
// ============================================================================

/// A material: pipeline, named textures and parameters, and the two
/// descriptor-set lifecycles.
///
/// Textures keep declaration order; the material set binds one combined
/// image sampler per texture in that order. Draw-time state (instance
/// set bump list) is interior-mutable because recording happens on
/// worker threads, one pass (and thus one thread) per material at a
/// time.
#[derive(Default)]
pub struct Material {
    /// Declaration-ordered texture bindings.
    textures: Vec<(String, Arc<Texture>)>,
    /// Named raw parameter blobs (floats, matrices) for UBO packing.
    parameters: FxHashMap<String, Vec<u8>>,
    /// Pipeline id; atomic so hot reload can swap it behind an `Arc`.
    pipeline: AtomicU64,
    /// Shared material set, rebuilt when the texture set changes.
    material_set: Mutex<DescriptorSetHandle>,
    /// Instance sets acquired this frame, returned at frame end.
    instances_in_use: Mutex<Vec<DescriptorSetHandle>>,
    /// When set, the material binds no descriptor sets and pushes the
    /// instance data as push constants instead.
    push_constant_only: bool,
}

impl Material {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A material variant that uses push constants instead of descriptor
    /// sets (simple debug/utility pipelines).
    #[must_use]
    pub fn push_constant_only() -> Self {
        Self {
            push_constant_only: true,
            ..Self::default()
        }
    }

    // ── Textures & parameters ──────────────────────────────────────────────

    /// Binds `texture` under `name`, replacing an existing binding of the
    /// same name and keeping declaration order otherwise.
    pub fn set_texture(&mut self, name: &str, texture: Arc<Texture>) {
        if name.is_empty() {
            return;
        }
        if let Some(slot) = self.textures.iter_mut().find(|(n, _)| n == name) {
            slot.1 = texture;
        } else {
            self.textures.push((name.to_string(), texture));
        }
    }

    /// Looks up a texture by name.
    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&Arc<Texture>> {
        self.textures.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Number of bound textures.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Stores a raw parameter blob under `name`. Empty names or data are
    /// ignored.
    pub fn set_parameter(&mut self, name: &str, data: &[u8]) {
        if name.is_empty() || data.is_empty() {
            return;
        }
        self.parameters.insert(name.to_string(), data.to_vec());
    }

    /// Looks up a parameter blob by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&[u8]> {
        self.parameters.get(name).map(Vec::as_slice)
    }

    // ── Pipeline ───────────────────────────────────────────────────────────

    /// Current pipeline handle.
    #[must_use]
    pub fn pipeline(&self) -> PipelineHandle {
        PipelineHandle::new(self.pipeline.load(Ordering::Acquire))
    }

    /// Installs a pipeline handle (initial creation or hot reload).
    pub fn set_pipeline(&self, pipeline: PipelineHandle) {
        self.pipeline.store(pipeline.id, Ordering::Release);
    }

    // ── Material descriptor set (set 0) ────────────────────────────────────

    /// The shared material set; invalid until
    /// [`ensure_material_descriptor_set`](Self::ensure_material_descriptor_set)
    /// runs with textures bound.
    #[must_use]
    pub fn material_descriptor_set(&self) -> DescriptorSetHandle {
        *self.material_set.lock()
    }

    /// Builds the material set from the current texture list: one
    /// combined image sampler binding per texture in declaration order.
    /// An existing set is destroyed and rebuilt. No-op without textures.
    pub fn ensure_material_descriptor_set(&self, device: &dyn RenderDevice) {
        if self.textures.is_empty() {
            return;
        }
        let mut set = self.material_set.lock();
        if set.is_valid() {
            device.destroy_descriptor_set(*set);
            *set = DescriptorSetHandle::INVALID;
        }

        let layout = DescriptorSetLayoutDesc {
            bindings: (0..self.textures.len() as u32)
                .map(|binding| DescriptorBinding {
                    binding,
                    ty: DescriptorType::CombinedImageSampler,
                    stage: ShaderStage::Fragment,
                    count: 1,
                })
                .collect(),
        };
        let new_set = device.create_descriptor_set(&layout);
        if !new_set.is_valid() {
            return;
        }
        for (binding, (_, texture)) in self.textures.iter().enumerate() {
            if texture.handle.is_valid() {
                device.write_descriptor_set_texture(new_set, binding as u32, texture.handle);
            }
        }
        *set = new_set;
    }

    // ── Instance descriptor sets (set 1) ───────────────────────────────────

    /// Takes a set from the device's instance pool, writes
    /// `instance_data` into its UBO binding, and records the handle for
    /// end-of-frame release.
    pub fn acquire_instance_descriptor_set(
        &self,
        device: &dyn RenderDevice,
        instance_data: &[u8],
    ) -> DescriptorSetHandle {
        let handle = device.acquire_instance_descriptor_set(instance_data);
        if handle.is_valid() {
            self.instances_in_use.lock().push(handle);
        }
        handle
    }

    /// Returns every instance set acquired this frame to the device pool.
    pub fn release_all_instance_descriptor_sets(&self, device: &dyn RenderDevice) {
        for handle in self.instances_in_use.lock().drain(..) {
            if handle.is_valid() {
                device.release_instance_descriptor_set(handle);
            }
        }
    }

    /// Number of instance sets currently recorded for this frame.
    #[must_use]
    pub fn instance_sets_in_use(&self) -> usize {
        self.instances_in_use.lock().len()
    }

    // ── Draw binding ───────────────────────────────────────────────────────

    /// Binds everything a draw needs: the pipeline, the material set when
    /// present, and either a freshly acquired instance set (set 1) or
    /// push constants for the push-constant-only variant.
    pub fn bind_for_draw(
        &self,
        cmd: &mut dyn CommandList,
        device: Option<&dyn RenderDevice>,
        instance_data: &[u8],
    ) {
        let pipeline = self.pipeline();
        if pipeline.is_valid() {
            cmd.bind_pipeline(pipeline);
        }
        let material_set = self.material_descriptor_set();
        if material_set.is_valid() {
            cmd.bind_descriptor_set(0, material_set);
        }
        if self.push_constant_only {
            if !instance_data.is_empty() {
                cmd.set_push_constants(instance_data, 0);
            }
            return;
        }
        if let Some(device) = device
            && !instance_data.is_empty()
        {
            let instance_set = self.acquire_instance_descriptor_set(device, instance_data);
            if instance_set.is_valid() {
                cmd.bind_descriptor_set(1, instance_set);
            }
        }
    }
}

impl Renderable for Material {
    fn release_frame_resources(&self, device: &dyn RenderDevice) {
        self.release_all_instance_descriptor_sets(device);
    }
}
