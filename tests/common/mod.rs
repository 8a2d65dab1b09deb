//! Shared mock device for integration tests.
//!
//! Implements the full `RenderDevice` contract against in-memory state:
//! handle minting with per-kind live tracking (for leak assertions),
//! host-backed buffer mapping, a reusing instance descriptor set pool,
//! CPU-side fences that signal on submit, and full command capture so
//! tests can assert on recorded op sequences.

#![allow(dead_code)]

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use ember::device::{
    BufferDesc, BufferHandle, CommandList, CommandListId, DescriptorSetHandle,
    DescriptorSetLayoutDesc, DeviceCapabilities, FenceHandle, PipelineDesc, PipelineHandle,
    RenderDevice, SemaphoreHandle, ShaderDesc, ShaderHandle, TextureDesc, TextureHandle,
};

/// Reserved id for the swapchain backbuffer texture.
pub const BACKBUFFER_ID: u64 = u64::MAX;

/// One captured command list operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    BeginRenderPass {
        colors: Vec<TextureHandle>,
        depth: Option<TextureHandle>,
    },
    EndRenderPass,
    BindPipeline(u64),
    BindDescriptorSet(u32, u64),
    BindVertexBuffer(u32, u64),
    BindIndexBuffer(u64),
    SetPushConstants(Vec<u8>),
    Draw(u32),
    DrawIndexed(u32),
    Dispatch(u32, u32, u32),
    CopyBufferToBuffer {
        src: u64,
        dst: u64,
        size: usize,
    },
    CopyBufferToTexture {
        src: u64,
        dst: u64,
        mip_level: u32,
        width: u32,
        height: u32,
        depth: u32,
    },
    CopyTextureToTexture,
    Barrier,
    ClearColor,
    ClearDepth,
    SetViewport,
    SetScissor,
}

pub struct MockCommandList {
    thread_index: u32,
    ops: Vec<Op>,
}

impl CommandList for MockCommandList {
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn begin_render_pass(
        &mut self,
        color_attachments: &[TextureHandle],
        depth_attachment: Option<TextureHandle>,
    ) {
        self.ops.push(Op::BeginRenderPass {
            colors: color_attachments.to_vec(),
            depth: depth_attachment,
        });
    }

    fn end_render_pass(&mut self) {
        self.ops.push(Op::EndRenderPass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.ops.push(Op::BindPipeline(pipeline.id));
    }

    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetHandle) {
        self.ops.push(Op::BindDescriptorSet(set_index, set.id));
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferHandle, _offset: usize) {
        self.ops.push(Op::BindVertexBuffer(binding, buffer.id));
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, _offset: usize, _is_16bit: bool) {
        self.ops.push(Op::BindIndexBuffer(buffer.id));
    }

    fn set_push_constants(&mut self, data: &[u8], _offset: u32) {
        self.ops.push(Op::SetPushConstants(data.to_vec()));
    }

    fn draw(&mut self, vertex_count: u32, _instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.ops.push(Op::Draw(vertex_count));
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        _instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.ops.push(Op::DrawIndexed(index_count));
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        self.ops.push(Op::Dispatch(group_count_x, group_count_y, group_count_z));
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: BufferHandle,
        _src_offset: usize,
        dst: BufferHandle,
        _dst_offset: usize,
        size: usize,
    ) {
        self.ops.push(Op::CopyBufferToBuffer {
            src: src.id,
            dst: dst.id,
            size,
        });
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: BufferHandle,
        _src_offset: usize,
        dst: TextureHandle,
        mip_level: u32,
        width: u32,
        height: u32,
        depth: u32,
    ) {
        self.ops.push(Op::CopyBufferToTexture {
            src: src.id,
            dst: dst.id,
            mip_level,
            width,
            height,
            depth,
        });
    }

    fn copy_texture_to_texture(&mut self, _src: TextureHandle, _dst: TextureHandle, _width: u32, _height: u32) {
        self.ops.push(Op::CopyTextureToTexture);
    }

    fn barrier(&mut self, _textures: &[TextureHandle]) {
        self.ops.push(Op::Barrier);
    }

    fn clear_color(&mut self, _texture: TextureHandle, _color: [f32; 4]) {
        self.ops.push(Op::ClearColor);
    }

    fn clear_depth(&mut self, _texture: TextureHandle, _depth: f32, _stencil: u8) {
        self.ops.push(Op::ClearDepth);
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, _width: f32, _height: f32, _min_depth: f32, _max_depth: f32) {
        self.ops.push(Op::SetViewport);
    }

    fn set_scissor(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {
        self.ops.push(Op::SetScissor);
    }
}

/// A command list captured at `end_command_list`.
#[derive(Clone, Debug)]
pub struct RecordedList {
    pub id: u64,
    pub thread_index: u32,
    pub ops: Vec<Op>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,

    live_buffers: HashSet<u64>,
    live_textures: HashSet<u64>,
    live_shaders: HashSet<u64>,
    live_pipelines: HashSet<u64>,
    live_sets: HashSet<u64>,
    live_fences: HashSet<u64>,

    created_buffers: usize,
    created_textures: usize,
    created_shaders: usize,
    created_pipelines: usize,
    created_sets: usize,
    destroyed_buffers: usize,
    destroyed_textures: usize,
    destroyed_shaders: usize,
    destroyed_pipelines: usize,
    destroyed_sets: usize,

    /// Fail texture creation once this many textures were created.
    texture_budget: Option<usize>,

    buffer_memory: HashMap<u64, Box<[u8]>>,
    fences_signaled: HashMap<u64, bool>,
    internal_fence: u64,

    descriptor_texture_writes: Vec<(u64, u32, u64)>,
    descriptor_buffer_writes: Vec<(u64, u32, u64)>,

    instance_pool_free: Vec<u64>,
    instance_sets_created: usize,
    instance_sets_outstanding: usize,

    recorded: Vec<RecordedList>,
    submits: Vec<(Vec<u64>, u64)>,
    wait_idle_calls: usize,

    acquire_calls: usize,
    fail_next_acquires: u32,
    present_calls: usize,
    extent: (u32, u32),
}

impl MockState {
    fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory `RenderDevice` for integration tests.
pub struct MockDevice {
    state: Mutex<MockState>,
    capabilities: DeviceCapabilities,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_max_recording_threads(4)
    }

    pub fn with_max_recording_threads(max_recording_threads: u32) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            capabilities: DeviceCapabilities {
                max_recording_threads,
            },
        }
    }

    pub fn into_arc(self) -> Arc<dyn RenderDevice> {
        Arc::new(self)
    }

    // ── Failure injection ──────────────────────────────────────────────────

    /// Makes texture creation fail after `n` more textures.
    pub fn fail_texture_creates_after(&self, n: usize) {
        let mut state = self.state.lock();
        let budget = state.created_textures + n;
        state.texture_budget = Some(budget);
    }

    pub fn clear_texture_budget(&self) {
        self.state.lock().texture_budget = None;
    }

    /// Makes the next `n` image acquires fail.
    pub fn fail_next_acquires(&self, n: u32) {
        self.state.lock().fail_next_acquires = n;
    }

    /// Marks a fence signaled (as if the GPU finished its work).
    pub fn signal_fence(&self, fence: FenceHandle) {
        self.state.lock().fences_signaled.insert(fence.id, true);
    }

    // ── Introspection ──────────────────────────────────────────────────────

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().live_buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.lock().live_textures.len()
    }

    pub fn live_fence_count(&self) -> usize {
        self.state.lock().live_fences.len()
    }

    pub fn created_texture_count(&self) -> usize {
        self.state.lock().created_textures
    }

    pub fn destroyed_texture_count(&self) -> usize {
        self.state.lock().destroyed_textures
    }

    pub fn created_buffer_count(&self) -> usize {
        self.state.lock().created_buffers
    }

    pub fn destroyed_pipeline_count(&self) -> usize {
        self.state.lock().destroyed_pipelines
    }

    pub fn destroyed_set_count(&self) -> usize {
        self.state.lock().destroyed_sets
    }

    pub fn destroyed_shader_count(&self) -> usize {
        self.state.lock().destroyed_shaders
    }

    pub fn acquire_count(&self) -> usize {
        self.state.lock().acquire_calls
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().submits.len()
    }

    pub fn submits(&self) -> Vec<(Vec<u64>, u64)> {
        self.state.lock().submits.clone()
    }

    pub fn wait_idle_count(&self) -> usize {
        self.state.lock().wait_idle_calls
    }

    pub fn present_count(&self) -> usize {
        self.state.lock().present_calls
    }

    /// All captured lists, in `end_command_list` order.
    pub fn recorded_lists(&self) -> Vec<RecordedList> {
        self.state.lock().recorded.clone()
    }

    /// The captured list with the given id.
    pub fn list(&self, id: CommandListId) -> Option<RecordedList> {
        self.state.lock().recorded.iter().find(|l| l.id == id.id).cloned()
    }

    pub fn instance_sets_created(&self) -> usize {
        self.state.lock().instance_sets_created
    }

    pub fn instance_sets_outstanding(&self) -> usize {
        self.state.lock().instance_sets_outstanding
    }

    pub fn descriptor_texture_writes(&self) -> Vec<(u64, u32, u64)> {
        self.state.lock().descriptor_texture_writes.clone()
    }

    pub fn descriptor_buffer_writes(&self) -> Vec<(u64, u32, u64)> {
        self.state.lock().descriptor_buffer_writes.clone()
    }

    /// Reads back host memory of a cpu-visible buffer.
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffer_memory
            .get(&handle.id)
            .map(|m| m.to_vec())
    }
}

impl RenderDevice for MockDevice {
    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> BufferHandle {
        let mut state = self.state.lock();
        let id = state.mint();
        state.live_buffers.insert(id);
        state.created_buffers += 1;
        let mut memory = vec![0u8; desc.size].into_boxed_slice();
        if let Some(data) = initial_data {
            let n = data.len().min(memory.len());
            memory[..n].copy_from_slice(&data[..n]);
        }
        state.buffer_memory.insert(id, memory);
        BufferHandle::new(id)
    }

    fn create_texture(&self, _desc: &TextureDesc, _initial_data: Option<&[u8]>) -> TextureHandle {
        let mut state = self.state.lock();
        if let Some(budget) = state.texture_budget
            && state.created_textures >= budget
        {
            return TextureHandle::INVALID;
        }
        let id = state.mint();
        state.live_textures.insert(id);
        state.created_textures += 1;
        TextureHandle::new(id)
    }

    fn create_shader(&self, _desc: &ShaderDesc) -> ShaderHandle {
        let mut state = self.state.lock();
        let id = state.mint();
        state.live_shaders.insert(id);
        state.created_shaders += 1;
        ShaderHandle::new(id)
    }

    fn create_pipeline(&self, _desc: &PipelineDesc) -> PipelineHandle {
        let mut state = self.state.lock();
        let id = state.mint();
        state.live_pipelines.insert(id);
        state.created_pipelines += 1;
        PipelineHandle::new(id)
    }

    fn create_descriptor_set(&self, _layout: &DescriptorSetLayoutDesc) -> DescriptorSetHandle {
        let mut state = self.state.lock();
        let id = state.mint();
        state.live_sets.insert(id);
        state.created_sets += 1;
        DescriptorSetHandle::new(id)
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        let mut state = self.state.lock();
        if state.live_buffers.remove(&handle.id) {
            state.destroyed_buffers += 1;
            state.buffer_memory.remove(&handle.id);
        }
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        let mut state = self.state.lock();
        if state.live_textures.remove(&handle.id) {
            state.destroyed_textures += 1;
        }
    }

    fn destroy_shader(&self, handle: ShaderHandle) {
        let mut state = self.state.lock();
        if state.live_shaders.remove(&handle.id) {
            state.destroyed_shaders += 1;
        }
    }

    fn destroy_pipeline(&self, handle: PipelineHandle) {
        let mut state = self.state.lock();
        if state.live_pipelines.remove(&handle.id) {
            state.destroyed_pipelines += 1;
        }
    }

    fn destroy_descriptor_set(&self, handle: DescriptorSetHandle) {
        let mut state = self.state.lock();
        if state.live_sets.remove(&handle.id) {
            state.destroyed_sets += 1;
        }
    }

    fn acquire_instance_descriptor_set(&self, _data: &[u8]) -> DescriptorSetHandle {
        let mut state = self.state.lock();
        let id = if let Some(id) = state.instance_pool_free.pop() {
            id
        } else {
            state.instance_sets_created += 1;
            state.mint()
        };
        state.instance_sets_outstanding += 1;
        DescriptorSetHandle::new(id)
    }

    fn release_instance_descriptor_set(&self, handle: DescriptorSetHandle) {
        if !handle.is_valid() {
            return;
        }
        let mut state = self.state.lock();
        state.instance_pool_free.push(handle.id);
        state.instance_sets_outstanding = state.instance_sets_outstanding.saturating_sub(1);
    }

    fn write_descriptor_set_texture(&self, set: DescriptorSetHandle, binding: u32, texture: TextureHandle) {
        self.state
            .lock()
            .descriptor_texture_writes
            .push((set.id, binding, texture.id));
    }

    fn write_descriptor_set_buffer(
        &self,
        set: DescriptorSetHandle,
        binding: u32,
        buffer: BufferHandle,
        _offset: usize,
        _range: usize,
    ) {
        self.state
            .lock()
            .descriptor_buffer_writes
            .push((set.id, binding, buffer.id));
    }

    fn update_buffer(&self, handle: BufferHandle, data: &[u8], offset: usize) {
        let mut state = self.state.lock();
        if let Some(memory) = state.buffer_memory.get_mut(&handle.id) {
            let end = (offset + data.len()).min(memory.len());
            if end > offset {
                memory[offset..end].copy_from_slice(&data[..end - offset]);
            }
        }
    }

    fn map_buffer(&self, handle: BufferHandle, offset: usize, size: usize) -> *mut u8 {
        let mut state = self.state.lock();
        match state.buffer_memory.get_mut(&handle.id) {
            Some(memory) if offset + size <= memory.len() => unsafe { memory.as_mut_ptr().add(offset) },
            _ => std::ptr::null_mut(),
        }
    }

    fn unmap_buffer(&self, _handle: BufferHandle) {}

    fn update_texture(&self, _handle: TextureHandle, _data: &[u8], _mip_level: u32) {}

    fn acquire_next_image(&self) -> Option<u32> {
        let mut state = self.state.lock();
        state.acquire_calls += 1;
        if state.fail_next_acquires > 0 {
            state.fail_next_acquires -= 1;
            return None;
        }
        Some((state.acquire_calls % 3) as u32)
    }

    fn present(&self) {
        self.state.lock().present_calls += 1;
    }

    fn back_buffer(&self) -> TextureHandle {
        TextureHandle::new(BACKBUFFER_ID)
    }

    fn set_extent(&self, width: u32, height: u32) {
        self.state.lock().extent = (width, height);
    }

    fn create_fence(&self, signaled: bool) -> FenceHandle {
        let mut state = self.state.lock();
        let id = state.mint();
        state.live_fences.insert(id);
        state.fences_signaled.insert(id, signaled);
        FenceHandle::new(id)
    }

    fn wait_for_fence(&self, fence: FenceHandle, _timeout_ns: u64) {
        // CPU mock: submitted work completes instantly, so waiting only
        // asserts the fence exists.
        let state = self.state.lock();
        debug_assert!(state.fences_signaled.contains_key(&fence.id));
    }

    fn reset_fence(&self, fence: FenceHandle) {
        self.state.lock().fences_signaled.insert(fence.id, false);
    }

    fn is_fence_signaled(&self, fence: FenceHandle) -> bool {
        *self
            .state
            .lock()
            .fences_signaled
            .get(&fence.id)
            .unwrap_or(&false)
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let mut state = self.state.lock();
        if state.live_fences.remove(&fence.id) {
            state.fences_signaled.remove(&fence.id);
        }
    }

    fn create_semaphore(&self) -> SemaphoreHandle {
        SemaphoreHandle::new(self.state.lock().mint())
    }

    fn begin_command_list(&self, thread_index: u32) -> Option<Box<dyn CommandList>> {
        if thread_index >= self.capabilities.max_recording_threads {
            return None;
        }
        Some(Box::new(MockCommandList {
            thread_index,
            ops: Vec::new(),
        }))
    }

    fn end_command_list(&self, list: Box<dyn CommandList>) -> CommandListId {
        let list = list
            .into_any()
            .downcast::<MockCommandList>()
            .expect("mock device only ends its own lists");
        let mut state = self.state.lock();
        let id = state.mint();
        state.recorded.push(RecordedList {
            id,
            thread_index: list.thread_index,
            ops: list.ops,
        });
        CommandListId::new(id)
    }

    fn submit(
        &self,
        lists: &[CommandListId],
        _wait_semaphores: &[SemaphoreHandle],
        _signal_semaphores: &[SemaphoreHandle],
        fence: FenceHandle,
    ) -> FenceHandle {
        let mut state = self.state.lock();
        let fence = if fence.is_valid() {
            fence
        } else {
            // Substitute the device's internal per-frame fence.
            if state.internal_fence == 0 {
                let id = state.mint();
                state.live_fences.insert(id);
                state.internal_fence = id;
            }
            FenceHandle::new(state.internal_fence)
        };
        // The CPU mock completes GPU work instantly.
        state.fences_signaled.insert(fence.id, true);
        state
            .submits
            .push((lists.iter().map(|l| l.id).collect(), fence.id));
        fence
    }

    fn wait_idle(&self) {
        self.state.lock().wait_idle_calls += 1;
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }
}
