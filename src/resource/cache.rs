//! Resource Cache
//!
//! Process-scoped cache behind the resource manager: slot-recycled
//! generational handles, a path index so repeat loads of one path return
//! one handle, per-entry reference counts, and a pending-release list
//! drained on the main thread so GPU-side teardown happens at a known
//! point.
//!
//! Values are stored type-erased behind `Arc<dyn Any>`; `get` hands out a
//! cheap `Arc<T>` clone only when both the handle's generation and the
//! entry's type tag match, so stale or mistyped handles resolve to `None`
//! instead of aliasing another resource.

use std::any::TypeId;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::handle::Handle;

type ErasedValue = Arc<dyn std::any::Any + Send + Sync>;

struct Entry {
    path: Option<String>,
    type_id: TypeId,
    value: Option<ErasedValue>,
    ref_count: u32,
    ready: bool,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// An entry whose reference count hit zero, waiting for the main-thread
/// drain to drop its GPU resources.
pub struct ReleasedEntry {
    /// Raw id of the released handle.
    pub id: u64,
    /// Generation the entry lived at.
    pub generation: u32,
    /// Type of the released resource.
    pub type_id: TypeId,
    /// Path the resource was registered under, if any.
    pub path: Option<String>,
    /// The erased value; downcast to destroy device handles.
    pub value: Option<ErasedValue>,
}

#[derive(Default)]
struct CacheInner {
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_path: FxHashMap<String, u64>,
    pending_release: Vec<ReleasedEntry>,
}

/// Slot-recycled, reference-counted resource cache.
///
/// All operations lock an internal mutex and are safe to call
/// concurrently; [`ResourceCache::process_pending_releases`] is a
/// main-thread drain by contract.
#[derive(Default)]
pub struct ResourceCache {
    inner: Mutex<CacheInner>,
}

impl ResourceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ───────────────────────────────────────────────────────

    /// Registers `value` under `path` and returns its handle, minting a
    /// fresh slot or updating the existing entry for the path. The new
    /// entry starts with one reference.
    pub fn register<T: Send + Sync + 'static>(
        &self,
        path: Option<&str>,
        value: T,
        ready: bool,
    ) -> Handle<T> {
        self.register_erased(path, TypeId::of::<T>(), Some(Arc::new(value)), ready)
            .typed()
    }

    /// Registers a not-ready entry with no value (a placeholder slot that
    /// an async load fills in later).
    pub fn register_empty<T: Send + Sync + 'static>(&self, path: Option<&str>) -> Handle<T> {
        self.register_erased(path, TypeId::of::<T>(), None, false).typed()
    }

    fn register_erased(
        &self,
        path: Option<&str>,
        type_id: TypeId,
        value: Option<ErasedValue>,
        ready: bool,
    ) -> RawHandle {
        let mut inner = self.inner.lock();

        if let Some(path) = path
            && let Some(&id) = inner.by_path.get(path)
        {
            let idx = (id - 1) as usize;
            let generation = inner.slots[idx].generation;
            if let Some(entry) = inner.slots[idx].entry.as_mut() {
                // Same path, same slot: refresh the stored value in place.
                entry.type_id = type_id;
                entry.value = value;
                entry.ready = ready;
                return RawHandle { id, generation };
            }
        }

        let entry = Entry {
            path: path.map(str::to_string),
            type_id,
            value,
            ref_count: 1,
            ready,
        };

        let idx = if let Some(idx) = inner.free.pop() {
            inner.slots[idx].entry = Some(entry);
            idx
        } else {
            inner.slots.push(Slot {
                generation: 1,
                entry: Some(entry),
            });
            inner.slots.len() - 1
        };

        let id = idx as u64 + 1;
        if let Some(path) = path {
            inner.by_path.insert(path.to_string(), id);
        }
        RawHandle {
            id,
            generation: inner.slots[idx].generation,
        }
    }

    // ── Resolution ─────────────────────────────────────────────────────────

    /// Resolves a handle to its value. `None` on stale generation, type
    /// mismatch, or an entry without a value.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, handle: Handle<T>) -> Option<Arc<T>> {
        let inner = self.inner.lock();
        let entry = live_entry(&inner, handle.id(), handle.generation())?;
        if entry.type_id != TypeId::of::<T>() {
            return None;
        }
        let value = entry.value.clone()?;
        Arc::downcast::<T>(value).ok()
    }

    /// True iff the handle resolves to a live entry of type `T`
    /// (regardless of readiness).
    #[must_use]
    pub fn contains<T: 'static>(&self, handle: Handle<T>) -> bool {
        let inner = self.inner.lock();
        live_entry(&inner, handle.id(), handle.generation())
            .is_some_and(|e| e.type_id == TypeId::of::<T>())
    }

    /// True iff the entry exists, matches generation and type, and has
    /// completed loading.
    #[must_use]
    pub fn is_ready<T: 'static>(&self, handle: Handle<T>) -> bool {
        let inner = self.inner.lock();
        live_entry(&inner, handle.id(), handle.generation())
            .is_some_and(|e| e.type_id == TypeId::of::<T>() && e.ready)
    }

    /// Installs a value into an existing (typically placeholder) entry
    /// and marks it ready.
    pub fn fulfill<T: Send + Sync + 'static>(&self, handle: Handle<T>, value: T) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = live_entry_mut(&mut inner, handle.id(), handle.generation()) else {
            return false;
        };
        if entry.type_id != TypeId::of::<T>() {
            return false;
        }
        entry.value = Some(Arc::new(value));
        entry.ready = true;
        true
    }

    /// Looks up the handle registered for `path`, checking the type.
    #[must_use]
    pub fn find<T: 'static>(&self, path: &str) -> Option<Handle<T>> {
        let inner = self.inner.lock();
        let &id = inner.by_path.get(path)?;
        let idx = (id - 1) as usize;
        let slot = &inner.slots[idx];
        let entry = slot.entry.as_ref()?;
        (entry.type_id == TypeId::of::<T>())
            .then(|| Handle::from_raw(id, slot.generation))
    }

    /// Type of the entry registered for `path`, if any.
    #[must_use]
    pub fn type_of_path(&self, path: &str) -> Option<TypeId> {
        let inner = self.inner.lock();
        let &id = inner.by_path.get(path)?;
        inner.slots[(id - 1) as usize]
            .entry
            .as_ref()
            .map(|e| e.type_id)
    }

    // ── Reference counting ─────────────────────────────────────────────────

    /// Increments the entry's reference count.
    pub fn retain<T: 'static>(&self, handle: Handle<T>) {
        let mut inner = self.inner.lock();
        if let Some(entry) = live_entry_mut(&mut inner, handle.id(), handle.generation()) {
            entry.ref_count += 1;
        }
    }

    /// Decrements the reference count; at zero the entry moves to the
    /// pending-release list, the slot's generation is bumped (stale
    /// handles stop resolving), and the slot returns to the free list.
    pub fn release<T: 'static>(&self, handle: Handle<T>) {
        let mut inner = self.inner.lock();
        let idx = (handle.id().wrapping_sub(1)) as usize;
        if !handle.is_valid() || idx >= inner.slots.len() {
            return;
        }
        if inner.slots[idx].generation != handle.generation() {
            return;
        }
        let Some(entry) = inner.slots[idx].entry.as_mut() else {
            return;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count > 0 {
            return;
        }

        let entry = inner.slots[idx].entry.take().expect("entry checked above");
        let generation = inner.slots[idx].generation;
        inner.slots[idx].generation = generation.wrapping_add(1);
        inner.free.push(idx);
        if let Some(path) = &entry.path {
            inner.by_path.remove(path);
        }
        inner.pending_release.push(ReleasedEntry {
            id: handle.id(),
            generation,
            type_id: entry.type_id,
            path: entry.path,
            value: entry.value,
        });
    }

    /// Current reference count, for diagnostics and tests.
    #[must_use]
    pub fn ref_count<T: 'static>(&self, handle: Handle<T>) -> Option<u32> {
        let inner = self.inner.lock();
        live_entry(&inner, handle.id(), handle.generation()).map(|e| e.ref_count)
    }

    /// Drains the pending-release list, invoking `cb` for each entry so
    /// the caller can drop underlying GPU resources. Main thread only.
    pub fn process_pending_releases(&self, mut cb: impl FnMut(&ReleasedEntry)) {
        let pending = std::mem::take(&mut self.inner.lock().pending_release);
        for released in &pending {
            cb(released);
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Untyped handle parts used internally before the type is applied.
#[derive(Clone, Copy)]
struct RawHandle {
    id: u64,
    generation: u32,
}

impl RawHandle {
    fn typed<T>(self) -> Handle<T> {
        Handle::from_raw(self.id, self.generation)
    }
}

fn live_entry<'a>(inner: &'a CacheInner, id: u64, generation: u32) -> Option<&'a Entry> {
    if id == 0 {
        return None;
    }
    let slot = inner.slots.get((id - 1) as usize)?;
    if slot.generation != generation {
        return None;
    }
    slot.entry.as_ref()
}

fn live_entry_mut<'a>(inner: &'a mut CacheInner, id: u64, generation: u32) -> Option<&'a mut Entry> {
    if id == 0 {
        return None;
    }
    let slot = inner.slots.get_mut((id - 1) as usize)?;
    if slot.generation != generation {
        return None;
    }
    slot.entry.as_mut()
}
