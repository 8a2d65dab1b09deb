//! Shader Manager & Pipeline Hot Reload
//!
//! Caches compiled shaders by `(path, stage)`, polls tracked files for
//! modification-time changes, and rebuilds registered material pipelines
//! when a shader they use reloads. Polling is main-thread and idempotent
//! between changes; mtime resolution is filesystem-dependent (as coarse
//! as one second), which is acceptable for an interactive edit loop.

use std::sync::Arc;
use std::time::SystemTime;

use rustc_hash::FxHashMap;

use crate::device::{PipelineDesc, RenderDevice, ShaderHandle, ShaderStage};
use crate::errors::Result;
use crate::material::Material;

/// Compiles a shader source file into a device shader module.
///
/// The concrete compiler (GLSL→SPIR-V etc.) is backend territory; the
/// manager only drives it.
pub trait ShaderCompiler: Send + Sync {
    fn compile(&self, path: &str, stage: ShaderStage, device: &dyn RenderDevice)
    -> Result<ShaderHandle>;
}

/// Derives the pipeline stage from a path's extension. `.spv` alone
/// defaults to vertex; `stage_override` wins when provided.
#[must_use]
pub fn stage_from_path(path: &str, stage_override: Option<ShaderStage>) -> ShaderStage {
    if let Some(stage) = stage_override {
        return stage;
    }
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("frag") => ShaderStage::Fragment,
        Some("comp") => ShaderStage::Compute,
        _ => ShaderStage::Vertex,
    }
}

struct ShaderEntry {
    path: String,
    stage: ShaderStage,
    handle: ShaderHandle,
}

// ============================================================================
// ShaderManager
// ============================================================================

/// Shader compilation cache with mtime-polling hot reload.
pub struct ShaderManager {
    device: Option<Arc<dyn RenderDevice>>,
    compiler: Option<Box<dyn ShaderCompiler>>,
    entries: FxHashMap<(String, ShaderStage), ShaderEntry>,
    mtimes: FxHashMap<String, SystemTime>,
    reload_callbacks: Vec<Box<dyn Fn(&str) + Send + Sync>>,
    hot_reload_enabled: bool,
    last_error: String,
}

impl Default for ShaderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            device: None,
            compiler: None,
            entries: FxHashMap::default(),
            mtimes: FxHashMap::default(),
            reload_callbacks: Vec::new(),
            hot_reload_enabled: false,
            last_error: String::new(),
        }
    }

    pub fn set_device(&mut self, device: Arc<dyn RenderDevice>) {
        self.device = Some(device);
    }

    pub fn set_compiler(&mut self, compiler: Box<dyn ShaderCompiler>) {
        self.compiler = Some(compiler);
    }

    /// Enables or disables hot-reload polling; a disabled manager's
    /// [`process_hot_reload`](Self::process_hot_reload) is a no-op.
    pub fn set_hot_reload_enabled(&mut self, enabled: bool) {
        self.hot_reload_enabled = enabled;
    }

    /// Error message of the last failed operation; empty when the last
    /// operation succeeded.
    #[must_use]
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Registers a callback invoked with the path of every reloaded
    /// shader.
    pub fn register_reload_callback(&mut self, cb: impl Fn(&str) + Send + Sync + 'static) {
        self.reload_callbacks.push(Box::new(cb));
    }

    // ── Loading ────────────────────────────────────────────────────────────

    /// Compiles `path` for `stage`, or returns the cached handle. An
    /// unset compiler or device produces an invalid handle and an error
    /// message.
    pub fn load_shader(&mut self, path: &str, stage: ShaderStage) -> ShaderHandle {
        let key = (path.to_string(), stage);
        if let Some(entry) = self.entries.get(&key) {
            return entry.handle;
        }
        let Some(compiler) = self.compiler.as_deref() else {
            self.last_error = format!("load_shader('{path}'): no shader compiler set");
            return ShaderHandle::INVALID;
        };
        let Some(device) = self.device.clone() else {
            self.last_error = format!("load_shader('{path}'): no device set");
            return ShaderHandle::INVALID;
        };

        match compiler.compile(path, stage, device.as_ref()) {
            Ok(handle) => {
                self.entries.insert(
                    key,
                    ShaderEntry {
                        path: path.to_string(),
                        stage,
                        handle,
                    },
                );
                self.record_mtime(path);
                self.last_error.clear();
                handle
            }
            Err(err) => {
                self.last_error = format!("load_shader('{path}'): {err}");
                log::warn!("{}", self.last_error);
                ShaderHandle::INVALID
            }
        }
    }

    /// Cached handle for `(path, stage)`, if any.
    #[must_use]
    pub fn shader(&self, path: &str, stage: ShaderStage) -> ShaderHandle {
        self.entries
            .get(&(path.to_string(), stage))
            .map_or(ShaderHandle::INVALID, |e| e.handle)
    }

    /// Number of cached shader modules.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.entries.len()
    }

    // ── Reload ─────────────────────────────────────────────────────────────

    /// Recompiles every cache entry whose path equals `path`, destroying
    /// the old module and replacing the stored handle.
    pub fn reload_shader(&mut self, path: &str) {
        let Some(compiler) = self.compiler.as_deref() else {
            self.last_error = format!("reload_shader('{path}'): no shader compiler set");
            return;
        };
        let Some(device) = self.device.clone() else {
            self.last_error = format!("reload_shader('{path}'): no device set");
            return;
        };

        let stages: Vec<ShaderStage> = self
            .entries
            .values()
            .filter(|e| e.path == path)
            .map(|e| e.stage)
            .collect();

        for stage in stages {
            let key = (path.to_string(), stage);
            let old = self.entries[&key].handle;
            match compiler.compile(path, stage, device.as_ref()) {
                Ok(handle) => {
                    if old.is_valid() {
                        device.destroy_shader(old);
                    }
                    if let Some(entry) = self.entries.get_mut(&key) {
                        entry.handle = handle;
                    }
                    log::debug!("reloaded shader '{path}' ({stage:?})");
                }
                Err(err) => {
                    self.last_error = format!("reload_shader('{path}'): {err}");
                    log::warn!("{}", self.last_error);
                }
            }
        }
    }

    /// Polls tracked paths and reloads every shader whose file changed
    /// since the last record, then invokes the reload callbacks with the
    /// path. No-op while hot reload is disabled.
    pub fn process_hot_reload(&mut self) {
        if !self.hot_reload_enabled {
            return;
        }
        let mut changed = Vec::new();
        for (path, recorded) in &self.mtimes {
            if let Ok(meta) = std::fs::metadata(path)
                && let Ok(modified) = meta.modified()
                && modified != *recorded
            {
                changed.push((path.clone(), modified));
            }
        }
        for (path, modified) in &changed {
            self.mtimes.insert(path.clone(), *modified);
            self.reload_shader(path);
        }
        for (path, _) in &changed {
            for cb in &self.reload_callbacks {
                cb(path);
            }
        }
    }

    fn record_mtime(&mut self, path: &str) {
        if let Ok(meta) = std::fs::metadata(path)
            && let Ok(modified) = meta.modified()
        {
            self.mtimes.insert(path.to_string(), modified);
        }
    }
}

// ============================================================================
// Pipeline reload registry
// ============================================================================

struct MaterialReloadRecord {
    material: Arc<Material>,
    vert_path: String,
    frag_path: String,
    desc: PipelineDesc,
}

/// Rebuilds material pipelines when one of their shaders reloads.
///
/// Registration remembers the pipeline descriptor used at creation; on
/// reload the descriptor's shader handles are refreshed from the shader
/// manager's current cache entries, a new pipeline is created, the old
/// one destroyed, and the new handle installed on the material.
#[derive(Default)]
pub struct PipelineReloadRegistry {
    records: Vec<MaterialReloadRecord>,
}

impl PipelineReloadRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers `material` together with its shader paths and the
    /// descriptor its pipeline was created from.
    pub fn register_material(
        &mut self,
        material: Arc<Material>,
        vert_path: &str,
        frag_path: &str,
        desc: PipelineDesc,
    ) {
        self.records.push(MaterialReloadRecord {
            material,
            vert_path: vert_path.to_string(),
            frag_path: frag_path.to_string(),
            desc,
        });
    }

    /// Drops the record for `material`.
    pub fn unregister_material(&mut self, material: &Arc<Material>) {
        self.records
            .retain(|r| !Arc::ptr_eq(&r.material, material));
    }

    /// Number of registered materials.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.records.len()
    }

    /// Rebuilds the pipeline of every material using `path` as its vertex
    /// or fragment shader.
    pub fn on_shader_reloaded(
        &self,
        path: &str,
        shaders: &ShaderManager,
        device: &dyn RenderDevice,
    ) {
        for record in self
            .records
            .iter()
            .filter(|r| r.vert_path == path || r.frag_path == path)
        {
            let mut desc = record.desc.clone();
            desc.vertex_shader = shaders.shader(&record.vert_path, ShaderStage::Vertex);
            desc.fragment_shader = shaders.shader(&record.frag_path, ShaderStage::Fragment);

            let new_pipeline = device.create_pipeline(&desc);
            if !new_pipeline.is_valid() {
                log::warn!("pipeline rebuild failed for material using '{path}'");
                continue;
            }
            let old = record.material.pipeline();
            if old.is_valid() {
                device.destroy_pipeline(old);
            }
            record.material.set_pipeline(new_pipeline);
        }
    }
}
