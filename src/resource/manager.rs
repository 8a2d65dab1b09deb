//! Resource Manager
//!
//! Routes load requests to registered loaders, caches results behind
//! generational handles, and keeps draws alive while real assets stream
//! in:
//!
//! - **Path resolution**: an asset-root prefix for relative paths plus
//!   whole-segment aliases (`"characters/hero.gltf"` with alias
//!   `characters -> packs/dlc1/characters`).
//! - **Sync and async loading**: the async path runs the loader on the
//!   scheduler and reports completion through the loaded-callback queue
//!   and the scheduler's event channel; without a scheduler it degrades
//!   to a synchronous load behind an already-resolved future.
//! - **Placeholders**: a triangle mesh, a 1x1 gray texture, and an empty
//!   material let draw paths fall back without crashing.
//! - **Hot reload**: mtime polling over tracked paths invokes registered
//!   callbacks with `(path, type_id)`; the owner re-issues loads.
//!
//! Loaded callbacks run on the main thread from
//! [`ResourceManager::process_loaded_callbacks`], never from workers.

use std::any::TypeId;
use std::sync::Arc;
use std::time::SystemTime;

use bytemuck::cast_slice;
use glam::Vec3;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::device::{BufferDesc, BufferUsage, Format, RenderDevice, TextureDesc, TextureUsage};
use crate::errors::{EmberError, Result};
use crate::executor::{ResourceLoadedEvent, TaskFuture, TaskScheduler};
use crate::material::Material;
use crate::shader::ShaderManager;
use crate::staging::StagingMemoryManager;

use super::cache::{ReleasedEntry, ResourceCache};
use super::handle::Handle;
use super::loader::{LoaderContext, ResourceLoader};
use super::types::{Bounds, Mesh, MeshVertex, SubMesh, Texture};

type LoadedCallback = Arc<dyn Fn(u64, &str) + Send + Sync>;
type HotReloadCallback = Arc<dyn Fn(&str, TypeId) + Send + Sync>;

#[derive(Default)]
struct HotReloadState {
    tracked: FxHashMap<String, SystemTime>,
    callbacks: Vec<HotReloadCallback>,
}

/// Loader registry, resource cache, and streaming front-end.
pub struct ResourceManager {
    cache: ResourceCache,
    loaders: RwLock<Vec<Arc<dyn ResourceLoader>>>,
    scheduler: Option<Arc<TaskScheduler>>,
    device: Option<Arc<dyn RenderDevice>>,
    staging: Option<Arc<Mutex<StagingMemoryManager>>>,
    shaders: Option<Arc<Mutex<ShaderManager>>>,

    asset_path: RwLock<String>,
    aliases: RwLock<Vec<(String, String)>>,
    last_error: Mutex<String>,

    loaded_callbacks: Mutex<Vec<LoadedCallback>>,
    pending_loaded: Mutex<Vec<(u64, String)>>,

    placeholders: RwLock<FxHashMap<TypeId, Arc<dyn std::any::Any + Send + Sync>>>,
    hot_reload: Mutex<HotReloadState>,
}

impl ResourceManager {
    /// Creates a manager. Any collaborator may be absent: loads then run
    /// synchronously (no scheduler), skip GPU uploads (no device), or
    /// reject staging-dependent formats (no staging manager).
    #[must_use]
    pub fn new(
        scheduler: Option<Arc<TaskScheduler>>,
        device: Option<Arc<dyn RenderDevice>>,
        staging: Option<Arc<Mutex<StagingMemoryManager>>>,
    ) -> Self {
        Self {
            cache: ResourceCache::new(),
            loaders: RwLock::new(Vec::new()),
            scheduler,
            device,
            staging,
            shaders: None,
            asset_path: RwLock::new(String::new()),
            aliases: RwLock::new(Vec::new()),
            last_error: Mutex::new(String::new()),
            loaded_callbacks: Mutex::new(Vec::new()),
            pending_loaded: Mutex::new(Vec::new()),
            placeholders: RwLock::new(FxHashMap::default()),
            hot_reload: Mutex::new(HotReloadState::default()),
        }
    }

    /// Attaches the shader manager exposed to loaders.
    pub fn set_shader_manager(&mut self, shaders: Arc<Mutex<ShaderManager>>) {
        self.shaders = Some(shaders);
    }

    /// The underlying cache (handles, ref counts, pending releases).
    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    // ── Loader registry ────────────────────────────────────────────────────

    /// Registers a loader; later registrations are consulted after
    /// earlier ones.
    pub fn register_loader(&self, loader: Arc<dyn ResourceLoader>) {
        self.loaders.write().push(loader);
    }

    fn find_loader(&self, path: &str, type_id: TypeId) -> Option<Arc<dyn ResourceLoader>> {
        self.loaders
            .read()
            .iter()
            .find(|l| l.supports(path) && l.resource_type() == type_id)
            .cloned()
    }

    // ── Path resolution ────────────────────────────────────────────────────

    /// Sets the asset-root prefix applied to relative paths.
    pub fn set_asset_path(&self, path: &str) {
        *self.asset_path.write() = ensure_trailing_slash(path);
    }

    /// Adds an alias: paths equal to `alias` or starting with `alias/`
    /// are rewritten onto `target`.
    pub fn add_path_alias(&self, alias: &str, target: &str) {
        if alias.is_empty() {
            return;
        }
        self.aliases.write().push((alias.to_string(), target.to_string()));
    }

    /// Resolves `path` through aliases and the asset root. An empty path
    /// resolves to the asset root.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> String {
        let asset_path = self.asset_path.read().clone();
        if path.is_empty() {
            return asset_path;
        }

        let mut current = path.to_string();
        for (alias, target) in self.aliases.read().iter() {
            let is_match = current == *alias
                || (current.len() > alias.len()
                    && current.starts_with(alias.as_str())
                    && current.as_bytes()[alias.len()] == b'/');
            if is_match {
                let skip = if current.len() > alias.len() {
                    alias.len() + 1
                } else {
                    alias.len()
                };
                current = format!("{}{}", ensure_trailing_slash(target), &current[skip..]);
                break;
            }
        }

        if is_absolute_path(&current) {
            current
        } else {
            format!("{asset_path}{current}")
        }
    }

    // ── Error channel ──────────────────────────────────────────────────────

    /// Message of the last failed load; empty when the last load
    /// succeeded.
    #[must_use]
    pub fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    pub fn set_last_error(&self, message: &str) {
        *self.last_error.lock() = message.to_string();
    }

    // ── Synchronous loading ────────────────────────────────────────────────

    /// Loads `path` as a `T`. A cached entry of matching type returns the
    /// existing handle; otherwise the first supporting loader runs and
    /// its result is registered ready.
    pub fn load<T: Send + Sync + 'static>(&self, path: &str) -> Result<Handle<T>> {
        let resolved = self.resolve_path(path);
        let existing = self.cache.find::<T>(&resolved);
        if let Some(handle) = existing
            && self.cache.is_ready(handle)
        {
            return Ok(handle);
        }

        let Some(loader) = self.find_loader(&resolved, TypeId::of::<T>()) else {
            let err = EmberError::LoaderNotFound {
                path: resolved.clone(),
            };
            self.set_last_error(&err.to_string());
            return Err(err);
        };

        let ctx = LoaderContext {
            device: self.device.as_ref(),
            staging: self.staging.as_deref(),
            shaders: self.shaders.as_deref(),
            manager: self,
        };
        let boxed = loader.load(&resolved, &ctx).inspect_err(|err| {
            self.set_last_error(&err.to_string());
            log::warn!("load('{resolved}') failed: {err}");
        })?;
        let value = boxed.downcast::<T>().map_err(|_| {
            let err = EmberError::Parse(format!("loader for '{resolved}' returned the wrong type"));
            self.set_last_error(&err.to_string());
            err
        })?;

        let handle = if let Some(handle) = existing {
            // A not-ready placeholder was minted for this path; fill it in.
            self.cache.fulfill(handle, *value);
            handle
        } else {
            self.cache.register(Some(&resolved), *value, true)
        };
        self.track_for_hot_reload(&resolved);
        self.set_last_error("");
        Ok(handle)
    }

    /// Loads each path for its side effects only; failures are logged and
    /// skipped.
    pub fn preload<T: Send + Sync + 'static>(&self, paths: &[&str]) {
        for path in paths {
            if let Err(err) = self.load::<T>(path) {
                log::warn!("preload('{path}') failed: {err}");
            }
        }
    }

    // ── Asynchronous loading ───────────────────────────────────────────────

    /// Loads `path` on the scheduler, resolving the future with the
    /// handle. Completion marks the entry ready and enqueues a loaded
    /// callback. Without a scheduler the load runs synchronously and the
    /// returned future is already resolved.
    pub fn load_async<T: Send + Sync + 'static>(self: &Arc<Self>, path: &str) -> TaskFuture<Handle<T>> {
        match &self.scheduler {
            Some(scheduler) => {
                let manager = Arc::clone(self);
                let sender = scheduler.resource_loaded_sender();
                let path = path.to_string();
                scheduler.submit_result(move || {
                    let handle = manager.load::<T>(&path)?;
                    let resolved = manager.resolve_path(&path);
                    manager.enqueue_loaded(handle.id(), &resolved);
                    let _ = sender.try_send(ResourceLoadedEvent {
                        path: resolved,
                        handle_id: handle.id(),
                        type_id: TypeId::of::<T>(),
                    });
                    Ok(handle)
                })
            }
            None => {
                let result = self.load::<T>(path);
                if let Ok(handle) = &result {
                    self.enqueue_loaded(handle.id(), &self.resolve_path(path));
                }
                TaskFuture::ready(result)
            }
        }
    }

    /// One future per input path; paths with no loader resolve to an
    /// error.
    pub fn load_async_batch<T: Send + Sync + 'static>(
        self: &Arc<Self>,
        paths: &[&str],
    ) -> Vec<TaskFuture<Handle<T>>> {
        paths.iter().map(|p| self.load_async::<T>(p)).collect()
    }

    // ── Loaded callbacks ───────────────────────────────────────────────────

    /// Registers a callback invoked (on the main thread) with
    /// `(handle id, path)` for every completed async load.
    pub fn register_loaded_callback(&self, cb: impl Fn(u64, &str) + Send + Sync + 'static) {
        self.loaded_callbacks.lock().push(Arc::new(cb));
    }

    /// Drains completion events and invokes the registered callbacks.
    /// Main thread only.
    pub fn process_loaded_callbacks(&self) {
        let drained = std::mem::take(&mut *self.pending_loaded.lock());
        // Snapshot so a callback may register further callbacks.
        let callbacks = self.loaded_callbacks.lock().clone();
        for (id, path) in &drained {
            for cb in &callbacks {
                cb(*id, path);
            }
        }
    }

    fn enqueue_loaded(&self, id: u64, path: &str) {
        self.pending_loaded.lock().push((id, path.to_string()));
    }

    // ── Resolution & placeholders ──────────────────────────────────────────

    /// Resolves a handle: a ready entry yields its value, a live but
    /// not-ready entry falls back to the type's placeholder, and a stale
    /// handle yields `None`.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, handle: Handle<T>) -> Option<Arc<T>> {
        if let Some(value) = self.cache.get(handle) {
            return Some(value);
        }
        if self.cache.contains(handle) {
            return self.placeholder::<T>();
        }
        None
    }

    /// True iff the entry exists, matches generation and type, and has
    /// finished loading.
    #[must_use]
    pub fn is_ready<T: 'static>(&self, handle: Handle<T>) -> bool {
        self.cache.is_ready(handle)
    }

    /// Returns the existing handle for `path`, or registers a not-ready
    /// entry that resolves to the type's placeholder until a real load
    /// fulfills it. The flag reports whether a new entry was created.
    pub fn get_or_create_placeholder<T: Send + Sync + 'static>(
        &self,
        path: &str,
    ) -> (Handle<T>, bool) {
        let resolved = self.resolve_path(path);
        if let Some(handle) = self.cache.find::<T>(&resolved) {
            return (handle, false);
        }
        (self.cache.register_empty::<T>(Some(&resolved)), true)
    }

    /// Installs `value` as the placeholder for `T`.
    pub fn set_placeholder<T: Send + Sync + 'static>(&self, value: T) {
        self.placeholders
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// The placeholder value for `T`, if one was created.
    #[must_use]
    pub fn placeholder<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let placeholders = self.placeholders.read();
        let value = placeholders.get(&TypeId::of::<T>())?.clone();
        Arc::downcast::<T>(value).ok()
    }

    /// Builds the default placeholder set: a single-triangle mesh, a 1x1
    /// gray texture, and an empty material. No-op without a device.
    pub fn create_placeholders(&self) {
        let Some(device) = self.device.as_deref() else {
            return;
        };

        // Mesh: one triangle, same vertex layout the mesh loaders emit.
        let vertices = [
            MeshVertex {
                position: [0.0, 1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [0.5, 0.0],
            },
            MeshVertex {
                position: [-1.0, -1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [0.0, 1.0],
            },
            MeshVertex {
                position: [1.0, -1.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [1.0, 1.0],
            },
        ];
        let indices: [u32; 3] = [0, 1, 2];

        let vertex_buffer = device.create_buffer(
            &BufferDesc {
                size: std::mem::size_of_val(&vertices),
                usage: BufferUsage::VERTEX,
                cpu_visible: false,
            },
            Some(cast_slice(&vertices)),
        );
        if !vertex_buffer.is_valid() {
            return;
        }
        let index_buffer = device.create_buffer(
            &BufferDesc {
                size: std::mem::size_of_val(&indices),
                usage: BufferUsage::INDEX,
                cpu_visible: false,
            },
            Some(cast_slice(&indices)),
        );
        if !index_buffer.is_valid() {
            device.destroy_buffer(vertex_buffer);
            return;
        }

        self.set_placeholder(Mesh {
            vertex_buffer,
            index_buffer,
            vertex_count: 3,
            index_count: 3,
            sub_meshes: vec![SubMesh {
                index_offset: 0,
                index_count: 3,
                material_index: 0,
            }],
            bounds: Bounds {
                min: Vec3::new(-1.0, -1.0, 0.0),
                max: Vec3::new(1.0, 1.0, 0.0),
            },
            material_paths: Vec::new(),
        });

        // Texture: 1x1 mid-gray RGBA8.
        let pixel = [128u8, 128, 128, 255];
        let texture = device.create_texture(
            &TextureDesc {
                width: 1,
                height: 1,
                format: Format::Rgba8Unorm,
                usage: TextureUsage::SAMPLED,
                ..TextureDesc::default()
            },
            Some(&pixel),
        );
        if texture.is_valid() {
            self.set_placeholder(Texture {
                handle: texture,
                width: 1,
                height: 1,
                format: Format::Rgba8Unorm,
                mip_levels: 1,
            });
        }

        self.set_placeholder(Material::new());
    }

    // ── Pending releases ───────────────────────────────────────────────────

    /// Drains cache entries whose reference count hit zero, handing each
    /// to `cb` so GPU handles inside can be destroyed. Main thread only.
    pub fn process_pending_releases(&self, cb: impl FnMut(&ReleasedEntry)) {
        self.cache.process_pending_releases(cb);
    }

    // ── Hot reload ─────────────────────────────────────────────────────────

    /// Registers a callback invoked with `(path, type_id)` when a tracked
    /// file changes on disk.
    pub fn register_hot_reload_callback(&self, cb: impl Fn(&str, TypeId) + Send + Sync + 'static) {
        self.hot_reload.lock().callbacks.push(Arc::new(cb));
    }

    /// Starts tracking a resolved path's mtime. Called automatically by
    /// successful loads of on-disk files.
    pub fn track_for_hot_reload(&self, resolved_path: &str) {
        if let Ok(meta) = std::fs::metadata(resolved_path)
            && let Ok(modified) = meta.modified()
        {
            self.hot_reload
                .lock()
                .tracked
                .insert(resolved_path.to_string(), modified);
        }
    }

    /// Polls tracked files; any mtime change triggers the registered
    /// callbacks with the path and the cached entry's type. Main thread,
    /// idempotent between changes.
    pub fn process_hot_reload(&self) {
        let mut changed = Vec::new();
        {
            let state = self.hot_reload.lock();
            for (path, recorded) in &state.tracked {
                if let Ok(meta) = std::fs::metadata(path)
                    && let Ok(modified) = meta.modified()
                    && modified != *recorded
                {
                    changed.push((path.clone(), modified));
                }
            }
        }
        if changed.is_empty() {
            return;
        }
        let callbacks = {
            let mut state = self.hot_reload.lock();
            for (path, modified) in &changed {
                state.tracked.insert(path.clone(), *modified);
            }
            state.callbacks.clone()
        };
        for (path, _) in &changed {
            let Some(type_id) = self.cache.type_of_path(path) else {
                continue;
            };
            log::debug!("hot reload: '{path}' changed");
            for cb in &callbacks {
                cb(path, type_id);
            }
        }
    }
}

fn is_absolute_path(path: &str) -> bool {
    if path.starts_with('/') {
        return true;
    }
    // Windows drive letter.
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn ensure_trailing_slash(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
