//! Pass Context
//!
//! The read-only view a pass execute function gets at record time: the
//! frame's submitted draws, the device, compiled resource lookup, and the
//! frame's camera matrices.

use glam::Mat4;

use crate::device::{BufferHandle, RenderDevice, TextureHandle};
use crate::material::SubmittedDraw;

use super::RgResourceHandle;
use super::graph::RenderGraph;

/// Per-record context handed to pass execute functions.
pub struct PassContext<'a> {
    draws: &'a [SubmittedDraw],
    device: &'a dyn RenderDevice,
    graph: &'a RenderGraph,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(
        draws: &'a [SubmittedDraw],
        device: &'a dyn RenderDevice,
        graph: &'a RenderGraph,
    ) -> Self {
        Self {
            draws,
            device,
            graph,
        }
    }

    /// The frame's submitted draw list (read-only).
    #[must_use]
    pub fn submitted_draws(&self) -> &'a [SubmittedDraw] {
        self.draws
    }

    /// The device, for instance descriptor sets and staging uploads.
    #[must_use]
    pub fn device(&self) -> &'a dyn RenderDevice {
        self.device
    }

    /// Resolves a graph texture handle to its compiled device texture.
    #[must_use]
    pub fn compiled_texture(&self, handle: RgResourceHandle) -> TextureHandle {
        self.graph.compiled_texture(handle)
    }

    /// Resolves a graph buffer handle to its compiled device buffer.
    #[must_use]
    pub fn compiled_buffer(&self, handle: RgResourceHandle) -> BufferHandle {
        self.graph.compiled_buffer(handle)
    }

    /// The output-target override; invalid means swapchain-writing passes
    /// target the backbuffer.
    #[must_use]
    pub fn output_target(&self) -> TextureHandle {
        self.graph.output_target()
    }

    /// Current frame's view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.graph.view_matrix()
    }

    /// Current frame's projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.graph.projection_matrix()
    }

    /// The graph's resolution (viewport/scissor default).
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        self.graph.resolution()
    }
}
