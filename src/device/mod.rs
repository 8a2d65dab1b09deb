//! Render Device Interface
//!
//! The contract the engine core consumes from a graphics backend: opaque
//! kind-tagged handles, plain-data descriptors, a command recording
//! surface, and frame/synchronization primitives. Concrete backends
//! (Vulkan, GL) live outside this crate; tests drive the core against a
//! mock implementation.
//!
//! # Threading
//!
//! A device is shared across recording workers, so the trait requires
//! `Send + Sync` and implementations synchronize internally. Command list
//! recording is the lock-free path: `begin_command_list(k)` hands out a
//! list backed by the pool for thread index `k`, and the caller guarantees
//! each `k` is used by at most one thread at a time (the render graph's
//! chunked thread-index assignment provides this).
//!
//! # Handle discipline
//!
//! Every handle returned by a `create_*` call is destroyed by exactly one
//! matching `destroy_*` call (or by device teardown after `wait_idle`).
//! Calls on invalid handles are error-reported no-ops, never undefined
//! behavior.

pub mod command;
pub mod handle;
pub mod types;

pub use command::CommandList;
pub use handle::{
    BufferHandle, CommandListId, DescriptorSetHandle, FenceHandle, PipelineHandle, SemaphoreHandle,
    ShaderHandle, TextureHandle,
};
pub use types::{
    BufferDesc, BufferUsage, DescriptorBinding, DescriptorSetLayoutDesc, DescriptorType,
    DeviceCapabilities, Format, INSTANCE_DESCRIPTOR_DATA_SIZE, PipelineDesc, ShaderDesc,
    ShaderStage, TextureDesc, TextureUsage,
};

/// The device contract.
///
/// Returned handles are invalid (id 0) on failure; no method panics on
/// bad input.
pub trait RenderDevice: Send + Sync {
    // ── Resource lifecycle ─────────────────────────────────────────────────

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> BufferHandle;
    fn create_texture(&self, desc: &TextureDesc, initial_data: Option<&[u8]>) -> TextureHandle;
    fn create_shader(&self, desc: &ShaderDesc) -> ShaderHandle;
    fn create_pipeline(&self, desc: &PipelineDesc) -> PipelineHandle;
    fn create_descriptor_set(&self, layout: &DescriptorSetLayoutDesc) -> DescriptorSetHandle;

    fn destroy_buffer(&self, handle: BufferHandle);
    fn destroy_texture(&self, handle: TextureHandle);
    fn destroy_shader(&self, handle: ShaderHandle);
    fn destroy_pipeline(&self, handle: PipelineHandle);
    fn destroy_descriptor_set(&self, handle: DescriptorSetHandle);

    /// Takes a set from the device's bounded per-instance pool and writes
    /// the UBO binding from `data`. Paired with
    /// [`release_instance_descriptor_set`](Self::release_instance_descriptor_set)
    /// during the same frame's resource release.
    fn acquire_instance_descriptor_set(&self, data: &[u8]) -> DescriptorSetHandle;
    fn release_instance_descriptor_set(&self, handle: DescriptorSetHandle);

    // ── Descriptor writes ──────────────────────────────────────────────────

    fn write_descriptor_set_texture(&self, set: DescriptorSetHandle, binding: u32, texture: TextureHandle);
    fn write_descriptor_set_buffer(
        &self,
        set: DescriptorSetHandle,
        binding: u32,
        buffer: BufferHandle,
        offset: usize,
        range: usize,
    );

    // ── Data transfer ──────────────────────────────────────────────────────

    fn update_buffer(&self, handle: BufferHandle, data: &[u8], offset: usize);
    /// Maps `size` bytes at `offset`; null on failure. The mapping stays
    /// valid until [`unmap_buffer`](Self::unmap_buffer).
    fn map_buffer(&self, handle: BufferHandle, offset: usize, size: usize) -> *mut u8;
    fn unmap_buffer(&self, handle: BufferHandle);
    fn update_texture(&self, handle: TextureHandle, data: &[u8], mip_level: u32);

    // ── Frame primitives ───────────────────────────────────────────────────

    /// Acquires the next swapchain image; `None` signals a recoverable
    /// failure (out-of-date swapchain) and the frame is skipped.
    fn acquire_next_image(&self) -> Option<u32>;
    fn present(&self);
    fn back_buffer(&self) -> TextureHandle;
    fn set_extent(&self, width: u32, height: u32);

    // ── Synchronization ────────────────────────────────────────────────────

    fn create_fence(&self, signaled: bool) -> FenceHandle;
    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64);
    fn reset_fence(&self, fence: FenceHandle);
    fn is_fence_signaled(&self, fence: FenceHandle) -> bool;
    fn destroy_fence(&self, fence: FenceHandle);
    fn create_semaphore(&self) -> SemaphoreHandle;

    // ── Command recording ──────────────────────────────────────────────────

    /// Begins a command list on the pool for `thread_index`. Each index in
    /// `[0, max_recording_threads)` may be in use by at most one thread.
    fn begin_command_list(&self, thread_index: u32) -> Option<Box<dyn CommandList>>;
    /// Ends recording and returns the id used to submit the list.
    fn end_command_list(&self, list: Box<dyn CommandList>) -> CommandListId;

    /// Submits recorded lists. Empty semaphore slices and an invalid
    /// `fence` instruct the device to substitute its per-frame
    /// image-available / render-finished semaphores and in-flight fence.
    /// Returns the fence actually used (the caller's, or the internal
    /// one).
    fn submit(
        &self,
        lists: &[CommandListId],
        wait_semaphores: &[SemaphoreHandle],
        signal_semaphores: &[SemaphoreHandle],
        fence: FenceHandle,
    ) -> FenceHandle;

    fn wait_idle(&self);

    // ── Capabilities ───────────────────────────────────────────────────────

    fn capabilities(&self) -> DeviceCapabilities;
}
