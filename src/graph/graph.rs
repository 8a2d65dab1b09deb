//! Render Graph Core
//!
//! Declaration, compile, and per-frame execution.
//!
//! # Compile
//!
//! Each pass's setup function runs against a fresh [`PassBuilder`]; the
//! recorded read/write sets become dependency edges (`writer -> reader`
//! per shared resource, plus a deterministic chain over multiple writers
//! ordered by declaration index). Kahn's algorithm produces the
//! topological order; a cycle fails the compile and leaves no transient
//! resources allocated. Transient device resources are created last, with
//! full rollback if any creation fails.
//!
//! # Execute
//!
//! Frames pipeline through a ring of `MAX_FRAMES_IN_FLIGHT` fences
//! created signaled, so the first pass through each slot never blocks.
//! The fence wait polls with a short sleep so the quit callback stays
//! responsive. A failed image acquire skips the frame without consuming
//! the fence slot. Recording runs single-threaded without a scheduler,
//! or layer-by-layer across the worker pool with chunked thread indices
//! bounded by the device's `max_recording_threads`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use glam::Mat4;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::device::{
    BufferDesc, BufferHandle, CommandList, CommandListId, FenceHandle, RenderDevice, TextureDesc,
    TextureHandle,
};
use crate::executor::TaskScheduler;
use crate::material::{PassMask, Renderable, SubmittedDraw};

use super::builder::PassBuilder;
use super::context::PassContext;
use super::{PassHandle, RgResourceHandle};

/// Number of frames that may be in flight on the GPU.
pub const MAX_FRAMES_IN_FLIGHT: u32 = 3;

/// Sleep between fence polls; short enough to keep the quit callback
/// responsive.
const FENCE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pass setup callback: declares reads/writes on the builder.
pub type PassSetupFn = Box<dyn Fn(&mut PassBuilder) + Send + Sync>;
/// Pass execute callback: records commands at frame time.
pub type PassExecuteFn = Box<dyn Fn(&PassContext<'_>, &mut dyn CommandList) + Send + Sync>;

struct PassEntry {
    name: String,
    setup: PassSetupFn,
    execute: PassExecuteFn,
}

enum ResourceDesc {
    Texture(TextureDesc),
    Buffer(BufferDesc),
}

struct DeclaredResource {
    name: String,
    desc: ResourceDesc,
}

impl DeclaredResource {
    fn is_texture(&self) -> bool {
        matches!(self.desc, ResourceDesc::Texture(_))
    }
}

/// A pass's read/write sets as extracted from its setup function during
/// the last compile.
#[derive(Clone, Default)]
pub struct CompiledPassInfo {
    pub color_outputs: SmallVec<[(u32, RgResourceHandle); 4]>,
    pub depth_output: Option<RgResourceHandle>,
    pub read_textures: SmallVec<[RgResourceHandle; 8]>,
    pub writes_swapchain: bool,
    pub execute_without_render_pass: bool,
}

impl CompiledPassInfo {
    fn writes(&self, handle: RgResourceHandle) -> bool {
        self.depth_output == Some(handle) || self.color_outputs.iter().any(|&(_, h)| h == handle)
    }

    fn reads(&self, handle: RgResourceHandle) -> bool {
        self.read_textures.contains(&handle)
    }
}

// ============================================================================
// RenderGraph
// ============================================================================

/// Declarative render graph over transient resources.
pub struct RenderGraph {
    resolution: (u32, u32),
    resources: Vec<DeclaredResource>,
    name_to_handle: FxHashMap<String, RgResourceHandle>,
    passes: Vec<PassEntry>,

    /// Filled by the application before `execute`, cleared per frame by
    /// the application via `clear_submitted`.
    submitted_draws: Vec<SubmittedDraw>,
    view_matrix: Mat4,
    projection_matrix: Mat4,

    // Compile products.
    topological_order: Vec<PassHandle>,
    compiled_pass_info: Vec<CompiledPassInfo>,
    compiled_textures: Vec<TextureHandle>,
    compiled_buffers: Vec<BufferHandle>,
    last_error: String,

    // Frame pipeline.
    frame_fences: Vec<FenceHandle>,
    current_frame_index: u32,

    scheduler: Option<Arc<TaskScheduler>>,
    output_target: TextureHandle,
    quit_callback: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolution: (0, 0),
            resources: Vec::new(),
            name_to_handle: FxHashMap::default(),
            passes: Vec::new(),
            submitted_draws: Vec::new(),
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            topological_order: Vec::new(),
            compiled_pass_info: Vec::new(),
            compiled_textures: Vec::new(),
            compiled_buffers: Vec::new(),
            last_error: String::new(),
            frame_fences: Vec::new(),
            current_frame_index: 0,
            scheduler: None,
            output_target: TextureHandle::INVALID,
            quit_callback: None,
        }
    }

    // ── Configuration ──────────────────────────────────────────────────────

    /// Sets the scheduler; when present, `record_passes` records each
    /// topological layer in parallel.
    pub fn set_scheduler(&mut self, scheduler: Arc<TaskScheduler>) {
        self.scheduler = Some(scheduler);
    }

    /// Default size for texture declarations whose descriptor has zero
    /// width or height.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = (width, height);
    }

    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Sets the quit-check callback polled inside the frame-fence wait;
    /// returning `true` skips the frame and returns immediately.
    pub fn set_quit_callback(&mut self, cb: impl Fn() -> bool + Send + Sync + 'static) {
        self.quit_callback = Some(Box::new(cb));
    }

    /// Overrides the target of swapchain-writing passes (offscreen and
    /// multi-viewport rendering). An invalid handle restores the
    /// backbuffer.
    pub fn set_output_target(&mut self, target: TextureHandle) {
        self.output_target = target;
    }

    #[must_use]
    pub fn output_target(&self) -> TextureHandle {
        self.output_target
    }

    // ── Declaration ────────────────────────────────────────────────────────

    /// Declares a transient texture. A zero width or height inherits the
    /// graph resolution; redeclaring a name already declared as a texture
    /// returns the existing handle.
    pub fn declare_texture(&mut self, name: &str, mut desc: TextureDesc) -> RgResourceHandle {
        if let Some(&handle) = self.name_to_handle.get(name)
            && self.resources[handle.index()].is_texture()
        {
            return handle;
        }
        if desc.width == 0 {
            desc.width = self.resolution.0;
        }
        if desc.height == 0 {
            desc.height = self.resolution.1;
        }
        self.push_resource(name, ResourceDesc::Texture(desc))
    }

    /// Declares a transient buffer; redeclaring a name already declared
    /// as a buffer returns the existing handle.
    pub fn declare_buffer(&mut self, name: &str, desc: BufferDesc) -> RgResourceHandle {
        if let Some(&handle) = self.name_to_handle.get(name)
            && !self.resources[handle.index()].is_texture()
        {
            return handle;
        }
        self.push_resource(name, ResourceDesc::Buffer(desc))
    }

    fn push_resource(&mut self, name: &str, desc: ResourceDesc) -> RgResourceHandle {
        self.resources.push(DeclaredResource {
            name: name.to_string(),
            desc,
        });
        let handle = RgResourceHandle(self.resources.len() as u32);
        self.name_to_handle.insert(name.to_string(), handle);
        handle
    }

    /// Handle previously declared under `name`, or the invalid handle.
    #[must_use]
    pub fn handle_by_name(&self, name: &str) -> RgResourceHandle {
        self.name_to_handle
            .get(name)
            .copied()
            .unwrap_or(RgResourceHandle::INVALID)
    }

    /// Appends a pass. `setup` runs during compile to declare the pass's
    /// reads and writes; `execute` runs at record time.
    pub fn add_pass(
        &mut self,
        name: &str,
        setup: impl Fn(&mut PassBuilder) + Send + Sync + 'static,
        execute: impl Fn(&PassContext<'_>, &mut dyn CommandList) + Send + Sync + 'static,
    ) -> PassHandle {
        self.passes.push(PassEntry {
            name: name.to_string(),
            setup: Box::new(setup),
            execute: Box::new(execute),
        });
        (self.passes.len() - 1) as PassHandle
    }

    /// Number of declared passes.
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Name of a pass, for diagnostics.
    #[must_use]
    pub fn pass_name(&self, pass: PassHandle) -> Option<&str> {
        self.passes.get(pass as usize).map(|p| p.name.as_str())
    }

    // ── Frame inputs ───────────────────────────────────────────────────────

    /// Pushes one draw for the current frame. Called by the application
    /// after culling, before `execute`.
    pub fn submit_renderable(
        &mut self,
        renderable: Arc<dyn Renderable>,
        world_transform: Mat4,
        pass_mask: PassMask,
    ) {
        self.submitted_draws.push(SubmittedDraw {
            renderable,
            world_transform,
            pass_mask,
        });
    }

    /// Clears the frame's submitted draws; the application calls this at
    /// the start of each frame before resubmitting.
    pub fn clear_submitted(&mut self) {
        self.submitted_draws.clear();
    }

    /// The frame's submitted draws (read-only).
    #[must_use]
    pub fn submitted_draws(&self) -> &[SubmittedDraw] {
        &self.submitted_draws
    }

    /// Sets the frame's camera matrices, consumed by passes through the
    /// context.
    pub fn set_view_projection(&mut self, view: Mat4, projection: Mat4) {
        self.view_matrix = view;
        self.projection_matrix = projection;
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    // ── Compile ────────────────────────────────────────────────────────────

    /// Compiles the graph: runs every setup function, derives dependency
    /// edges, builds the topological order, allocates transient device
    /// resources, and (first time) creates the frame fence ring. Returns
    /// `false` with [`last_error`](Self::last_error) set on a dependency
    /// cycle or resource allocation failure; a failed compile leaves no
    /// transient resources allocated.
    pub fn compile(&mut self, device: &dyn RenderDevice) -> bool {
        self.last_error.clear();

        // Release the previous compile's transients before rebuilding.
        self.destroy_compiled_resources(device);
        self.topological_order.clear();
        self.compiled_pass_info.clear();

        // 1) Run every pass's setup to extract read/write sets.
        self.compiled_pass_info = self
            .passes
            .iter()
            .map(|pass| {
                let mut builder = PassBuilder::default();
                (pass.setup)(&mut builder);
                CompiledPassInfo {
                    color_outputs: builder.color_outputs,
                    depth_output: builder.depth_output,
                    read_textures: builder.read_textures,
                    writes_swapchain: builder.writes_swapchain,
                    execute_without_render_pass: builder.execute_without_render_pass,
                }
            })
            .collect();

        // 2) Dependency edges and topological order.
        match self.build_topological_order() {
            Some(order) => self.topological_order = order,
            None => {
                self.last_error = "compile: pass dependency cycle detected".to_string();
                log::warn!("{}", self.last_error);
                self.compiled_pass_info.clear();
                return false;
            }
        }

        // 3) Transient resource allocation with rollback on failure.
        let n = self.resources.len();
        self.compiled_textures = vec![TextureHandle::INVALID; n];
        self.compiled_buffers = vec![BufferHandle::INVALID; n];
        for i in 0..n {
            let created_ok = match &self.resources[i].desc {
                ResourceDesc::Texture(desc) => {
                    let handle = device.create_texture(desc, None);
                    self.compiled_textures[i] = handle;
                    handle.is_valid()
                }
                ResourceDesc::Buffer(desc) => {
                    let handle = device.create_buffer(desc, None);
                    self.compiled_buffers[i] = handle;
                    handle.is_valid()
                }
            };
            if !created_ok {
                self.last_error = format!(
                    "compile: transient allocation failed for resource '{}'",
                    self.resources[i].name
                );
                log::warn!("{}", self.last_error);
                self.destroy_compiled_resources(device);
                self.topological_order.clear();
                self.compiled_pass_info.clear();
                return false;
            }
        }

        // 4) Frame fence ring, created signaled so the first frame per
        //    slot does not block. Creation failure is non-fatal: execute
        //    then runs without frame-level waits.
        if self.frame_fences.len() != MAX_FRAMES_IN_FLIGHT as usize {
            self.destroy_fences(device);
            for _ in 0..MAX_FRAMES_IN_FLIGHT {
                let fence = device.create_fence(true);
                if !fence.is_valid() {
                    log::warn!("compile: frame fence creation failed, running unsynchronized");
                    self.destroy_fences(device);
                    return true;
                }
                self.frame_fences.push(fence);
            }
        }

        true
    }

    /// True iff the last compile succeeded and produced a schedule.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        !self.topological_order.is_empty()
    }

    /// Error message of the last failed compile; empty otherwise.
    #[must_use]
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// The compiled topological pass order.
    #[must_use]
    pub fn topological_order(&self) -> &[PassHandle] {
        &self.topological_order
    }

    /// Read/write sets extracted during the last compile, indexed by pass
    /// handle.
    #[must_use]
    pub fn compiled_pass_info(&self) -> &[CompiledPassInfo] {
        &self.compiled_pass_info
    }

    /// Resolves a graph texture handle to its compiled device texture;
    /// invalid for buffers, undeclared handles, or before compile.
    #[must_use]
    pub fn compiled_texture(&self, handle: RgResourceHandle) -> TextureHandle {
        if !handle.is_valid() || handle.index() >= self.resources.len() {
            return TextureHandle::INVALID;
        }
        if !self.resources[handle.index()].is_texture() {
            return TextureHandle::INVALID;
        }
        self.compiled_textures
            .get(handle.index())
            .copied()
            .unwrap_or(TextureHandle::INVALID)
    }

    /// Resolves a graph buffer handle to its compiled device buffer;
    /// invalid for textures, undeclared handles, or before compile.
    #[must_use]
    pub fn compiled_buffer(&self, handle: RgResourceHandle) -> BufferHandle {
        if !handle.is_valid() || handle.index() >= self.resources.len() {
            return BufferHandle::INVALID;
        }
        if self.resources[handle.index()].is_texture() {
            return BufferHandle::INVALID;
        }
        self.compiled_buffers
            .get(handle.index())
            .copied()
            .unwrap_or(BufferHandle::INVALID)
    }

    // ── Dependency derivation ──────────────────────────────────────────────

    /// Edges `writer -> reader` per shared resource, plus a deterministic
    /// chain over multiple writers ordered by pass declaration index.
    fn build_edges(&self) -> BTreeSet<(PassHandle, PassHandle)> {
        let mut edges = BTreeSet::new();
        for i in 0..self.resources.len() {
            let handle = RgResourceHandle(i as u32 + 1);
            let mut writers: Vec<PassHandle> = Vec::new();
            let mut readers: Vec<PassHandle> = Vec::new();
            for (pass, info) in self.compiled_pass_info.iter().enumerate() {
                if info.writes(handle) {
                    writers.push(pass as PassHandle);
                }
                if info.reads(handle) {
                    readers.push(pass as PassHandle);
                }
            }
            for &w in &writers {
                for &r in &readers {
                    if w != r {
                        edges.insert((w, r));
                    }
                }
            }
            // Multiple writers of one resource are ordered by declaration
            // index so the compile stays deterministic.
            if writers.len() > 1 {
                writers.sort_unstable();
                for pair in writers.windows(2) {
                    edges.insert((pair[0], pair[1]));
                }
            }
        }
        edges
    }

    /// Kahn's algorithm over the derived edges; `None` iff a cycle
    /// exists.
    fn build_topological_order(&self) -> Option<Vec<PassHandle>> {
        let n = self.passes.len();
        if n == 0 {
            return Some(Vec::new());
        }

        let edges = self.build_edges();
        let mut out_edges: Vec<Vec<PassHandle>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for &(from, to) in &edges {
            out_edges[from as usize].push(to);
            in_degree[to as usize] += 1;
        }

        let mut queue: std::collections::VecDeque<PassHandle> = (0..n as PassHandle)
            .filter(|&i| in_degree[i as usize] == 0)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(u) = queue.pop_front() {
            order.push(u);
            for &v in &out_edges[u as usize] {
                in_degree[v as usize] -= 1;
                if in_degree[v as usize] == 0 {
                    queue.push_back(v);
                }
            }
        }

        (order.len() == n).then_some(order)
    }

    /// Dependency layers: a pass's level is 0 without predecessors, else
    /// one past its deepest predecessor. Same-layer passes share no edges
    /// and may record concurrently. Empty before a successful compile.
    #[must_use]
    pub fn topological_groups(&self) -> Vec<Vec<PassHandle>> {
        if !self.is_compiled() {
            return Vec::new();
        }
        let n = self.passes.len();
        let edges = self.build_edges();
        let mut in_edges: Vec<Vec<PassHandle>> = vec![Vec::new(); n];
        for &(from, to) in &edges {
            in_edges[to as usize].push(from);
        }

        let mut level = vec![0usize; n];
        for &pass in &self.topological_order {
            let preds = &in_edges[pass as usize];
            level[pass as usize] = preds
                .iter()
                .map(|&p| level[p as usize] + 1)
                .max()
                .unwrap_or(0);
        }

        let depth = level.iter().max().map_or(0, |&m| m + 1);
        let mut groups = vec![Vec::new(); depth];
        for pass in 0..n {
            groups[level[pass]].push(pass as PassHandle);
        }
        groups
    }

    // ── Recording ──────────────────────────────────────────────────────────

    /// Records every pass in topological order and returns the command
    /// lists in that order. With a scheduler, recording is handed to
    /// [`TaskScheduler::parallel_record`]: same-layer passes record in
    /// parallel chunks bounded by the device's `max_recording_threads`.
    pub fn record_passes(&self, device: &dyn RenderDevice) -> Vec<CommandListId> {
        if self.topological_order.is_empty() {
            return Vec::new();
        }

        let Some(scheduler) = self.scheduler.as_deref() else {
            return self
                .topological_order
                .iter()
                .filter_map(|&pass| self.record_one_pass(device, pass, 0))
                .collect();
        };

        // Remap the pass edges into topological positions; position i of
        // the function list records pass topological_order[i].
        let pass_to_topo: FxHashMap<PassHandle, usize> = self
            .topological_order
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i))
            .collect();
        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); self.topological_order.len()];
        for (from, to) in self.build_edges() {
            dependencies[pass_to_topo[&to]].push(pass_to_topo[&from]);
        }

        let results: Mutex<Vec<Option<CommandListId>>> =
            Mutex::new(vec![None; self.topological_order.len()]);
        let record_fns: Vec<Box<dyn FnOnce(u32) + Send + '_>> = self
            .topological_order
            .iter()
            .enumerate()
            .map(|(topo_pos, &pass)| {
                let results = &results;
                let graph = &*self;
                Box::new(move |thread_index: u32| {
                    if let Some(id) = graph.record_one_pass(device, pass, thread_index) {
                        results.lock()[topo_pos] = Some(id);
                    }
                }) as Box<dyn FnOnce(u32) + Send + '_>
            })
            .collect();

        let max_threads = device.capabilities().max_recording_threads.max(1);
        scheduler.parallel_record(record_fns, &dependencies, max_threads);

        results.into_inner().into_iter().flatten().collect()
    }

    fn record_one_pass(
        &self,
        device: &dyn RenderDevice,
        pass: PassHandle,
        thread_index: u32,
    ) -> Option<CommandListId> {
        let entry = self.passes.get(pass as usize)?;
        let info = self.compiled_pass_info.get(pass as usize)?;

        let mut cmd = device.begin_command_list(thread_index)?;
        let ctx = PassContext::new(&self.submitted_draws, device, self);

        if info.execute_without_render_pass {
            (entry.execute)(&ctx, cmd.as_mut());
            return Some(device.end_command_list(cmd));
        }

        let mut colors: SmallVec<[TextureHandle; 4]> = SmallVec::new();
        let mut depth = None;
        if info.writes_swapchain {
            let target = if self.output_target.is_valid() {
                self.output_target
            } else {
                device.back_buffer()
            };
            colors.push(target);
        } else {
            let mut outputs = info.color_outputs.clone();
            outputs.sort_by_key(|&(slot, _)| slot);
            for (_, handle) in outputs {
                let texture = self.compiled_texture(handle);
                if texture.is_valid() {
                    colors.push(texture);
                }
            }
            depth = info
                .depth_output
                .map(|h| self.compiled_texture(h))
                .filter(|t| t.is_valid());
        }

        if colors.is_empty() && depth.is_none() {
            (entry.execute)(&ctx, cmd.as_mut());
        } else {
            cmd.begin_render_pass(&colors, depth);
            let (width, height) = self.resolution;
            if width > 0 && height > 0 {
                cmd.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
                cmd.set_scissor(0, 0, width, height);
            }
            (entry.execute)(&ctx, cmd.as_mut());
            cmd.end_render_pass();
        }

        Some(device.end_command_list(cmd))
    }

    // ── Execute ────────────────────────────────────────────────────────────

    /// Runs one frame: waits on the slot's fence, acquires the next swap
    /// image, records all passes, submits, and releases per-frame
    /// resources. The frame index only advances when commands were
    /// actually submitted; a failed acquire skips the frame without
    /// consuming the fence slot.
    pub fn execute(&mut self, device: &dyn RenderDevice) {
        if !self.is_compiled() {
            return;
        }

        let slot = (self.current_frame_index % MAX_FRAMES_IN_FLIGHT) as usize;
        if let Some(&fence) = self.frame_fences.get(slot)
            && fence.is_valid()
        {
            while !device.is_fence_signaled(fence) {
                if let Some(quit) = &self.quit_callback
                    && quit()
                {
                    return;
                }
                std::thread::sleep(FENCE_POLL_INTERVAL);
            }
            device.reset_fence(fence);
        }

        if device.acquire_next_image().is_none() {
            return;
        }

        self.build_frame_draw_list();
        let lists = self.record_passes(device);

        let frame_fence = self
            .frame_fences
            .get(slot)
            .copied()
            .unwrap_or(FenceHandle::INVALID);
        if !lists.is_empty() {
            device.submit(&lists, &[], &[], frame_fence);
        }

        self.release_frame_resources(device);

        if !lists.is_empty() {
            self.current_frame_index = (self.current_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
        }
    }

    /// Runs one frame into `output_target` instead of the swapchain,
    /// restoring the previous override afterwards. An invalid target is
    /// equivalent to [`execute`](Self::execute).
    pub fn execute_with_target(&mut self, device: &dyn RenderDevice, output_target: TextureHandle) {
        let previous = self.output_target;
        if output_target.is_valid() {
            self.output_target = output_target;
        }
        self.execute(device);
        self.output_target = previous;
    }

    /// Current slot in the frame ring, for tests and diagnostics.
    #[must_use]
    pub fn current_frame_index(&self) -> u32 {
        self.current_frame_index
    }

    /// Returns per-frame resources held by this frame's submitted draws
    /// (instance descriptor sets back to the device pool).
    pub fn release_frame_resources(&self, device: &dyn RenderDevice) {
        for draw in &self.submitted_draws {
            draw.renderable.release_frame_resources(device);
        }
    }

    /// Identity for now; reserved for sorting/grouping the frame's draw
    /// list before recording.
    fn build_frame_draw_list(&mut self) {}

    // ── Teardown ───────────────────────────────────────────────────────────

    /// Destroys the fence ring and every compiled transient resource.
    /// Call before dropping the device.
    pub fn destroy(&mut self, device: &dyn RenderDevice) {
        self.destroy_fences(device);
        self.destroy_compiled_resources(device);
        self.topological_order.clear();
        self.compiled_pass_info.clear();
    }

    fn destroy_fences(&mut self, device: &dyn RenderDevice) {
        for fence in self.frame_fences.drain(..) {
            if fence.is_valid() {
                device.destroy_fence(fence);
            }
        }
    }

    fn destroy_compiled_resources(&mut self, device: &dyn RenderDevice) {
        for handle in self.compiled_textures.drain(..) {
            if handle.is_valid() {
                device.destroy_texture(handle);
            }
        }
        for handle in self.compiled_buffers.drain(..) {
            if handle.is_valid() {
                device.destroy_buffer(handle);
            }
        }
    }
}
