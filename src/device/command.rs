//! Command List Recording
//!
//! The recording surface the core drives. A command list is obtained from
//! the device for one thread index, recorded on exactly one thread, and
//! handed back via `end_command_list`; the device owns the backing pools.

use std::any::Any;

use super::handle::{BufferHandle, DescriptorSetHandle, PipelineHandle, TextureHandle};

/// Recording interface for a single command list.
///
/// Lists are `Send` so a worker thread can record a list begun on its
/// behalf, but each list has exactly one recorder at a time; the device's
/// per-thread-index pools make this lock-free.
pub trait CommandList: Send {
    /// Recovers the concrete list type; a backend downcasts its own
    /// lists inside `end_command_list`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    // ── Render pass control ────────────────────────────────────────────────

    /// Begins a render pass targeting `color_attachments` and optionally
    /// `depth_attachment`.
    fn begin_render_pass(
        &mut self,
        color_attachments: &[TextureHandle],
        depth_attachment: Option<TextureHandle>,
    );
    fn end_render_pass(&mut self);

    // ── Binding ────────────────────────────────────────────────────────────

    fn bind_pipeline(&mut self, pipeline: PipelineHandle);
    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetHandle);
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferHandle, offset: usize);
    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: usize, is_16bit: bool);
    fn set_push_constants(&mut self, data: &[u8], offset: u32);

    // ── Draw & dispatch ────────────────────────────────────────────────────

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32);

    // ── Transfer ───────────────────────────────────────────────────────────

    fn copy_buffer_to_buffer(
        &mut self,
        src: BufferHandle,
        src_offset: usize,
        dst: BufferHandle,
        dst_offset: usize,
        size: usize,
    );
    fn copy_buffer_to_texture(
        &mut self,
        src: BufferHandle,
        src_offset: usize,
        dst: TextureHandle,
        mip_level: u32,
        width: u32,
        height: u32,
        depth: u32,
    );
    fn copy_texture_to_texture(&mut self, src: TextureHandle, dst: TextureHandle, width: u32, height: u32);

    // ── State & clears ─────────────────────────────────────────────────────

    fn barrier(&mut self, textures: &[TextureHandle]);
    fn clear_color(&mut self, texture: TextureHandle, color: [f32; 4]);
    fn clear_depth(&mut self, texture: TextureHandle, depth: f32, stencil: u8);
    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32);
    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32);
}
