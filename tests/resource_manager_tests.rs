//! Resource manager tests.
//!
//! Covers loader routing, load deduplication by path, path resolution
//! with aliases, placeholders, async loading through the scheduler with
//! main-thread completion callbacks, pending-release draining, and the
//! mtime-polling hot reload loop.

mod common;

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::MockDevice;
use ember::errors::{EmberError, Result};
use ember::executor::TaskScheduler;
use ember::resource::{
    LoaderContext, Mesh, ResourceLoader, ResourceManager, Texture,
};

/// Toy text resource for routing tests.
#[derive(Debug, PartialEq)]
struct TextAsset(String);

struct TextLoader {
    loads: AtomicUsize,
}

impl TextLoader {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
        })
    }
}

impl ResourceLoader for TextLoader {
    fn supports(&self, path: &str) -> bool {
        path.ends_with(".txt")
    }

    fn resource_type(&self) -> TypeId {
        TypeId::of::<TextAsset>()
    }

    fn load(&self, path: &str, _ctx: &LoaderContext<'_>) -> Result<Box<dyn Any + Send + Sync>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(TextAsset(format!("contents of {path}"))))
    }
}

/// Loader that always fails, for error propagation tests.
struct BrokenLoader;

impl ResourceLoader for BrokenLoader {
    fn supports(&self, path: &str) -> bool {
        path.ends_with(".bad")
    }

    fn resource_type(&self) -> TypeId {
        TypeId::of::<TextAsset>()
    }

    fn load(&self, path: &str, _ctx: &LoaderContext<'_>) -> Result<Box<dyn Any + Send + Sync>> {
        Err(EmberError::Parse(format!("malformed file '{path}'")))
    }
}

fn bare_manager() -> ResourceManager {
    ResourceManager::new(None, None, None)
}

#[test]
fn repeat_loads_return_the_same_handle() {
    let manager = bare_manager();
    let loader = TextLoader::new();
    manager.register_loader(loader.clone());

    let a = manager.load::<TextAsset>("notes/readme.txt").unwrap();
    let b = manager.load::<TextAsset>("notes/readme.txt").unwrap();
    assert_eq!(a.id(), b.id());
    assert_eq!(loader.loads.load(Ordering::Relaxed), 1, "second load is a cache hit");

    let value = manager.get(a).unwrap();
    assert!(value.0.ends_with("notes/readme.txt"));
    assert!(manager.is_ready(a));
}

#[test]
fn missing_loader_reports_not_found() {
    let manager = bare_manager();
    let err = manager.load::<TextAsset>("mesh.obj").unwrap_err();
    assert!(matches!(err, EmberError::LoaderNotFound { .. }));
    assert!(manager.last_error().contains("mesh.obj"));
}

#[test]
fn loader_failure_propagates_and_caches_nothing() {
    let manager = bare_manager();
    manager.register_loader(Arc::new(BrokenLoader));

    let err = manager.load::<TextAsset>("broken.bad").unwrap_err();
    assert!(matches!(err, EmberError::Parse(_)));
    assert!(manager.cache().find::<TextAsset>("broken.bad").is_none());
}

#[test]
fn path_resolution_applies_aliases_and_asset_root() {
    let manager = bare_manager();
    manager.set_asset_path("assets");
    manager.add_path_alias("characters", "packs/dlc1/characters");

    assert_eq!(
        manager.resolve_path("characters/hero.gltf"),
        "assets/packs/dlc1/characters/hero.gltf"
    );
    assert_eq!(manager.resolve_path("tex/rock.png"), "assets/tex/rock.png");
    assert_eq!(manager.resolve_path("/abs/thing.txt"), "/abs/thing.txt");
    assert_eq!(manager.resolve_path(""), "assets/");
    // A partial segment is not an alias match.
    assert_eq!(
        manager.resolve_path("charactersheet.txt"),
        "assets/charactersheet.txt"
    );
}

#[test]
fn placeholders_cover_not_ready_entries() {
    let manager = bare_manager();
    manager.register_loader(TextLoader::new());
    manager.set_placeholder(TextAsset("placeholder".to_string()));

    let (handle, created) = manager.get_or_create_placeholder::<TextAsset>("later.txt");
    assert!(created);
    assert!(!manager.is_ready(handle));
    assert_eq!(manager.get(handle).unwrap().0, "placeholder");

    let (again, created_again) = manager.get_or_create_placeholder::<TextAsset>("later.txt");
    assert!(!created_again);
    assert_eq!(handle, again);

    // A real load fulfills the same entry.
    let loaded = manager.load::<TextAsset>("later.txt").unwrap();
    assert_eq!(loaded.id(), handle.id());
    assert!(manager.is_ready(handle));
    assert!(manager.get(handle).unwrap().0.contains("later.txt"));
}

#[test]
fn create_placeholders_builds_default_artifacts() {
    let device = Arc::new(MockDevice::new());
    let manager =
        ResourceManager::new(None, Some(device.clone() as Arc<dyn ember::RenderDevice>), None);
    manager.create_placeholders();

    let mesh = manager.placeholder::<Mesh>().unwrap();
    assert_eq!(mesh.vertex_count, 3);
    assert_eq!(mesh.index_count, 3);
    assert_eq!(mesh.sub_meshes.len(), 1);
    assert_eq!(mesh.sub_meshes[0].index_count, 3);
    assert!(mesh.vertex_buffer.is_valid());
    assert!(mesh.index_buffer.is_valid());

    let texture = manager.placeholder::<Texture>().unwrap();
    assert_eq!((texture.width, texture.height), (1, 1));
    assert!(texture.handle.is_valid());

    assert!(manager.placeholder::<ember::material::Material>().is_some());
}

#[test]
fn async_load_resolves_and_reports_on_main_thread() {
    let scheduler = Arc::new(TaskScheduler::new(Some(2)));
    let manager = Arc::new(ResourceManager::new(Some(scheduler.clone()), None, None));
    manager.register_loader(TextLoader::new());

    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    manager.register_loaded_callback(move |_id, path| {
        assert!(path.ends_with("async.txt"));
        seen.fetch_add(1, Ordering::Relaxed);
    });

    let future = manager.load_async::<TextAsset>("async.txt");
    let handle = future.get().unwrap();
    assert!(manager.is_ready(handle));

    // The loader thread pushed a completion event for the main thread.
    let event = scheduler.poll_resource_loaded().unwrap();
    assert_eq!(event.handle_id, handle.id());
    assert_eq!(event.type_id, TypeId::of::<TextAsset>());

    manager.process_loaded_callbacks();
    assert_eq!(notified.load(Ordering::Relaxed), 1);
}

#[test]
fn async_load_without_scheduler_completes_immediately() {
    let manager = Arc::new(bare_manager());
    manager.register_loader(TextLoader::new());

    let future = manager.load_async::<TextAsset>("sync.txt");
    assert!(future.is_ready());
    let handle = future.get().unwrap();
    assert!(manager.is_ready(handle));
}

#[test]
fn async_batch_mixes_successes_and_failures() {
    let scheduler = Arc::new(TaskScheduler::new(Some(2)));
    let manager = Arc::new(ResourceManager::new(Some(scheduler), None, None));
    manager.register_loader(TextLoader::new());

    let futures = manager.load_async_batch::<TextAsset>(&["one.txt", "two.bin"]);
    assert_eq!(futures.len(), 2);
    let mut results = futures.into_iter().map(ember::executor::TaskFuture::get);
    assert!(results.next().unwrap().is_ok());
    assert!(matches!(
        results.next().unwrap(),
        Err(EmberError::LoaderNotFound { .. })
    ));
}

#[test]
fn preload_fans_out_for_side_effects() {
    let manager = bare_manager();
    let loader = TextLoader::new();
    manager.register_loader(loader.clone());

    manager.preload::<TextAsset>(&["a.txt", "b.txt", "unsupported.bin"]);
    assert_eq!(loader.loads.load(Ordering::Relaxed), 2);
    assert!(manager.cache().find::<TextAsset>("a.txt").is_some());
    assert!(manager.cache().find::<TextAsset>("b.txt").is_some());
}

#[test]
fn release_drains_through_pending_list() {
    let manager = bare_manager();
    manager.register_loader(TextLoader::new());

    let handle = manager.load::<TextAsset>("short_lived.txt").unwrap();
    manager.cache().release(handle);

    let mut drained = Vec::new();
    manager.process_pending_releases(|entry| {
        drained.push((entry.id, entry.type_id));
    });
    assert_eq!(drained, vec![(handle.id(), TypeId::of::<TextAsset>())]);
    assert!(manager.get(handle).is_none());
}

#[test]
fn hot_reload_fires_callbacks_on_mtime_change() {
    let dir = std::env::temp_dir().join(format!("ember_hot_reload_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("tracked.txt");
    std::fs::write(&file, "v1").unwrap();
    let path = file.to_str().unwrap().to_string();

    let manager = bare_manager();
    manager.register_loader(TextLoader::new());
    let handle = manager.load::<TextAsset>(&path).unwrap();
    assert!(manager.is_ready(handle));

    let fired = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&fired);
    let expected = path.clone();
    manager.register_hot_reload_callback(move |changed, type_id| {
        assert_eq!(changed, expected);
        assert_eq!(type_id, TypeId::of::<TextAsset>());
        seen.fetch_add(1, Ordering::Relaxed);
    });

    // Unchanged file: idempotent, no callback.
    manager.process_hot_reload();
    assert_eq!(fired.load(Ordering::Relaxed), 0);

    // Rewrite with a clearly newer mtime (filesystem resolution can be
    // coarse).
    std::thread::sleep(std::time::Duration::from_millis(1100));
    std::fs::write(&file, "v2").unwrap();
    manager.process_hot_reload();
    assert_eq!(fired.load(Ordering::Relaxed), 1);

    // Idempotent again until the next change.
    manager.process_hot_reload();
    assert_eq!(fired.load(Ordering::Relaxed), 1);

    std::fs::remove_dir_all(&dir).ok();
}
