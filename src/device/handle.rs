//! Device Handles
//!
//! Opaque, kind-tagged ids for every object the device owns. A handle
//! with id 0 is invalid; handles are minted and retired only by the
//! device, and callers never inspect the id bits.

/// Defines an id-only handle type for one kind of device object.
macro_rules! define_device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
        pub struct $name {
            pub id: u64,
        }

        impl $name {
            /// The invalid handle (id 0).
            pub const INVALID: $name = $name { id: 0 };

            /// Creates a handle from a raw id. Reserved for device
            /// implementations.
            #[inline]
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self { id }
            }

            /// True iff the handle refers to a live device object.
            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.id != 0
            }
        }
    };
}

define_device_handle!(
    /// GPU buffer (vertex, index, uniform, staging).
    BufferHandle
);
define_device_handle!(
    /// GPU texture or render target.
    TextureHandle
);
define_device_handle!(
    /// Compiled shader module.
    ShaderHandle
);
define_device_handle!(
    /// Graphics or compute pipeline.
    PipelineHandle
);
define_device_handle!(
    /// Descriptor set (resource binding table).
    DescriptorSetHandle
);
define_device_handle!(
    /// CPU-GPU synchronization fence.
    FenceHandle
);
define_device_handle!(
    /// GPU-GPU synchronization semaphore.
    SemaphoreHandle
);

/// Identifier of a recorded command list, returned by
/// [`end_command_list`](super::RenderDevice::end_command_list) and
/// consumed by [`submit`](super::RenderDevice::submit).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct CommandListId {
    pub id: u64,
}

impl CommandListId {
    /// The invalid id.
    pub const INVALID: CommandListId = CommandListId { id: 0 };

    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_invalid() {
        assert!(!BufferHandle::default().is_valid());
        assert!(!FenceHandle::INVALID.is_valid());
        assert!(TextureHandle::new(1).is_valid());
    }

    #[test]
    fn handle_kinds_are_distinct_types() {
        // Compile-time property; mixing kinds is a type error. Here we
        // only check ids do not leak across constructors.
        let b = BufferHandle::new(7);
        let t = TextureHandle::new(7);
        assert_eq!(b.id, t.id);
    }
}
