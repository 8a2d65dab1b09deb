//! Pass Builder
//!
//! Handed to each pass's setup function during compile; records the
//! pass's declared reads and writes, from which the graph derives its
//! dependency edges.

use smallvec::SmallVec;

use super::RgResourceHandle;

/// Records one pass's read/write sets during compile.
#[derive(Default)]
pub struct PassBuilder {
    pub(crate) color_outputs: SmallVec<[(u32, RgResourceHandle); 4]>,
    pub(crate) depth_output: Option<RgResourceHandle>,
    pub(crate) read_textures: SmallVec<[RgResourceHandle; 8]>,
    pub(crate) writes_swapchain: bool,
    pub(crate) execute_without_render_pass: bool,
}

impl PassBuilder {
    /// Declares a color attachment write at `slot`.
    pub fn write_color(&mut self, slot: u32, handle: RgResourceHandle) -> &mut Self {
        if handle.is_valid() {
            self.color_outputs.push((slot, handle));
        }
        self
    }

    /// Declares the depth attachment write.
    pub fn write_depth(&mut self, handle: RgResourceHandle) -> &mut Self {
        if handle.is_valid() {
            self.depth_output = Some(handle);
        }
        self
    }

    /// Declares a sampled read of a graph texture.
    pub fn read_texture(&mut self, handle: RgResourceHandle) -> &mut Self {
        if handle.is_valid() {
            self.read_textures.push(handle);
        }
        self
    }

    /// Declares that the pass writes the backbuffer (or the graph's
    /// output-target override).
    pub fn write_swapchain(&mut self) -> &mut Self {
        self.writes_swapchain = true;
        self
    }

    /// Declares transfer/compute-only work: no render pass is begun or
    /// ended around the execute function.
    pub fn execute_without_render_pass(&mut self) -> &mut Self {
        self.execute_without_render_pass = true;
        self
    }
}
