//! Generational Resource Handles
//!
//! Typed handles into the resource cache. The generation detects stale
//! references after a slot recycles: a handle only resolves while its
//! generation matches the slot's current one. A handle with id 0 is
//! invalid.

use std::marker::PhantomData;

/// Typed generational handle to a cached resource of type `T`.
pub struct Handle<T> {
    id: u64,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The invalid handle (id 0).
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            id: 0,
            generation: 0,
            _marker: PhantomData,
        }
    }

    /// Mints a handle from raw parts. Reserved for the cache.
    #[must_use]
    pub(crate) const fn from_raw(id: u64, generation: u32) -> Self {
        Self {
            id,
            generation,
            _marker: PhantomData,
        }
    }

    /// True iff the handle was minted by a cache (id non-zero). A valid
    /// handle may still be stale; resolution checks the generation.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != 0
    }

    /// Raw id; equal ids mean the same cache slot.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.id
    }

    /// Slot generation this handle was minted against.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

// Manual impls: derives would bound `T`, but the handle is just an id.

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.generation.hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::invalid()
    }
}
