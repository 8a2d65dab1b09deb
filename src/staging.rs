//! Staging Memory Manager
//!
//! Serves host-visible upload blocks without per-request device
//! allocations and defers recycling until the GPU is done with each
//! block.
//!
//! # Design
//!
//! - The pool is a free list of size-tagged backing buffers, each created
//!   host-visible and persistently mapped.
//! - [`StagingMemoryManager::free_deferred`] parks a block behind a fence;
//!   the block only returns to the free list once
//!   [`reclaim_completed`](StagingMemoryManager::reclaim_completed)
//!   observes the fence signaled. `allocate` probes completion first, so
//!   reclaim latency stays low without a dedicated tick.
//! - Uploads recorded without a command list queue up;
//!   [`flush_uploads`](StagingMemoryManager::flush_uploads) drains the
//!   queue into one submission and hands back the device's fence, which
//!   callers typically wait on or pass back as the deferred-free fence of
//!   the blocks involved.
//!
//! Allocation failure is reported through invalid allocations; the
//! manager never aborts the process.

use std::sync::Arc;

use crate::device::{
    BufferDesc, BufferHandle, BufferUsage, CommandList, FenceHandle, RenderDevice, TextureHandle,
};

/// Default backing buffer size when the caller does not configure one.
pub const DEFAULT_STAGING_POOL_SIZE: usize = 64 * 1024;

// ============================================================================
// Allocation
// ============================================================================

/// A host-visible upload block handed out by the pool.
///
/// Invalid allocations (no backing buffer) are returned for zero-size
/// requests or when the manager has no device; they are safe to pass back
/// to `free`, which ignores them.
pub struct StagingAllocation {
    /// Backing device buffer.
    pub buffer: BufferHandle,
    /// Byte offset of this block inside the backing buffer.
    pub offset: usize,
    /// Requested size in bytes.
    pub size: usize,
    /// Full size of the backing buffer (free-list tag).
    block_size: usize,
    ptr: *mut u8,
}

// The pointer targets persistently mapped host memory owned by the
// device; moving the allocation between threads does not move the
// mapping.
unsafe impl Send for StagingAllocation {}

impl StagingAllocation {
    /// The invalid allocation.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            buffer: BufferHandle::INVALID,
            offset: 0,
            size: 0,
            block_size: 0,
            ptr: std::ptr::null_mut(),
        }
    }

    /// True iff the allocation is backed by a mapped device buffer.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.buffer.is_valid() && !self.ptr.is_null() && self.size > 0
    }

    /// The live host pointer to the block's memory.
    #[must_use]
    pub fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Copies `data` into the block at `offset`. Out-of-bounds writes are
    /// clipped and logged rather than performed.
    pub fn write(&self, data: &[u8], offset: usize) {
        if !self.is_valid() {
            return;
        }
        let Some(available) = self.size.checked_sub(offset) else {
            log::warn!("staging write offset {offset} past block size {}", self.size);
            return;
        };
        let count = data.len().min(available);
        if count < data.len() {
            log::warn!(
                "staging write of {} bytes clipped to {count} (block size {})",
                data.len(),
                self.size
            );
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(offset), count);
        }
    }
}

// ============================================================================
// Pool internals
// ============================================================================

struct StagingBlock {
    buffer: BufferHandle,
    size: usize,
    ptr: *mut u8,
}

unsafe impl Send for StagingBlock {}

/// A queued upload waiting for `flush_uploads`.
enum PendingUpload {
    BufferToBuffer {
        src: BufferHandle,
        src_offset: usize,
        size: usize,
        dst: BufferHandle,
        dst_offset: usize,
    },
    BufferToTexture {
        src: BufferHandle,
        src_offset: usize,
        dst: TextureHandle,
        mip_level: u32,
        width: u32,
        height: u32,
        depth: u32,
    },
}

// ============================================================================
// Manager
// ============================================================================

/// Pooled host-visible upload memory with fence-deferred recycling.
pub struct StagingMemoryManager {
    device: Option<Arc<dyn RenderDevice>>,
    pool_size: usize,
    free_blocks: Vec<StagingBlock>,
    pending_free: Vec<(StagingBlock, FenceHandle)>,
    pending_uploads: Vec<PendingUpload>,
}

unsafe impl Send for StagingMemoryManager {}

impl StagingMemoryManager {
    /// Creates a manager. Without a device every allocation is invalid,
    /// matching the null-device boundary of the upload contract.
    #[must_use]
    pub fn new(device: Option<Arc<dyn RenderDevice>>, pool_size: usize) -> Self {
        Self {
            device,
            pool_size: pool_size.max(1),
            free_blocks: Vec::new(),
            pending_free: Vec::new(),
            pending_uploads: Vec::new(),
        }
    }

    /// Returns a block of at least `size` bytes with a live host pointer,
    /// or an invalid allocation when `size` is zero or no device is
    /// bound. Probes fence completion first so recently retired blocks
    /// are eligible.
    pub fn allocate(&mut self, size: usize) -> StagingAllocation {
        if size == 0 || self.device.is_none() {
            return StagingAllocation::invalid();
        }
        self.reclaim_completed();

        if let Some(pos) = self.free_blocks.iter().position(|b| b.size >= size) {
            let block = self.free_blocks.swap_remove(pos);
            return StagingAllocation {
                buffer: block.buffer,
                offset: 0,
                size,
                block_size: block.size,
                ptr: block.ptr,
            };
        }

        self.grow(size)
    }

    /// Immediately returns the block to the free list.
    pub fn free(&mut self, alloc: StagingAllocation) {
        if !alloc.is_valid() {
            return;
        }
        self.free_blocks.push(StagingBlock {
            buffer: alloc.buffer,
            size: alloc.block_size,
            ptr: alloc.ptr,
        });
    }

    /// Returns the block to the free list once `fence` is observed
    /// signaled. An invalid fence frees immediately.
    pub fn free_deferred(&mut self, alloc: StagingAllocation, fence: FenceHandle) {
        if !alloc.is_valid() {
            return;
        }
        if !fence.is_valid() {
            self.free(alloc);
            return;
        }
        self.pending_free.push((
            StagingBlock {
                buffer: alloc.buffer,
                size: alloc.block_size,
                ptr: alloc.ptr,
            },
            fence,
        ));
    }

    /// Moves every pending block whose fence has signaled back to the
    /// free list.
    pub fn reclaim_completed(&mut self) {
        let Some(device) = self.device.clone() else {
            return;
        };
        let mut still_pending = Vec::with_capacity(self.pending_free.len());
        for (block, fence) in self.pending_free.drain(..) {
            if device.is_fence_signaled(fence) {
                self.free_blocks.push(block);
            } else {
                still_pending.push((block, fence));
            }
        }
        self.pending_free = still_pending;
    }

    /// Records a buffer upload on `cmd` when present, otherwise queues it
    /// for the next [`flush_uploads`](Self::flush_uploads). Invalid
    /// source or destination handles make this a no-op.
    pub fn submit_upload_to_buffer(
        &mut self,
        cmd: Option<&mut dyn CommandList>,
        src: &StagingAllocation,
        dst: BufferHandle,
        dst_offset: usize,
    ) {
        if !src.is_valid() || !dst.is_valid() {
            return;
        }
        match cmd {
            Some(cmd) => {
                cmd.copy_buffer_to_buffer(src.buffer, src.offset, dst, dst_offset, src.size);
            }
            None => self.pending_uploads.push(PendingUpload::BufferToBuffer {
                src: src.buffer,
                src_offset: src.offset,
                size: src.size,
                dst,
                dst_offset,
            }),
        }
    }

    /// Texture variant of
    /// [`submit_upload_to_buffer`](Self::submit_upload_to_buffer).
    pub fn submit_upload_to_texture(
        &mut self,
        cmd: Option<&mut dyn CommandList>,
        src: &StagingAllocation,
        dst: TextureHandle,
        mip_level: u32,
        width: u32,
        height: u32,
        depth: u32,
    ) {
        if !src.is_valid() || !dst.is_valid() {
            return;
        }
        match cmd {
            Some(cmd) => {
                cmd.copy_buffer_to_texture(src.buffer, src.offset, dst, mip_level, width, height, depth);
            }
            None => self.pending_uploads.push(PendingUpload::BufferToTexture {
                src: src.buffer,
                src_offset: src.offset,
                dst,
                mip_level,
                width,
                height,
                depth,
            }),
        }
    }

    /// Number of uploads waiting for the next flush.
    #[must_use]
    pub fn pending_upload_count(&self) -> usize {
        self.pending_uploads.len()
    }

    /// Submits every pending upload in one command list and returns the
    /// fence that signals their completion (the device's internal fence).
    /// Returns an invalid fence when the queue is empty or no device is
    /// bound; an empty-queue or deviceless call leaves the queue
    /// untouched.
    pub fn flush_uploads(&mut self) -> FenceHandle {
        let Some(device) = self.device.clone() else {
            return FenceHandle::INVALID;
        };
        if self.pending_uploads.is_empty() {
            return FenceHandle::INVALID;
        }
        let Some(mut cmd) = device.begin_command_list(0) else {
            log::warn!("flush_uploads: begin_command_list failed, uploads retained");
            return FenceHandle::INVALID;
        };

        for upload in self.pending_uploads.drain(..) {
            match upload {
                PendingUpload::BufferToBuffer {
                    src,
                    src_offset,
                    size,
                    dst,
                    dst_offset,
                } => cmd.copy_buffer_to_buffer(src, src_offset, dst, dst_offset, size),
                PendingUpload::BufferToTexture {
                    src,
                    src_offset,
                    dst,
                    mip_level,
                    width,
                    height,
                    depth,
                } => cmd.copy_buffer_to_texture(src, src_offset, dst, mip_level, width, height, depth),
            }
        }

        let list = device.end_command_list(cmd);
        device.submit(&[list], &[], &[], FenceHandle::INVALID)
    }

    /// Unmaps and destroys every pooled buffer. Blocks still held by
    /// callers are their responsibility; blocks parked behind fences are
    /// released regardless, so call this only after the device is idle.
    pub fn destroy(&mut self) {
        let Some(device) = self.device.clone() else {
            return;
        };
        for block in self.free_blocks.drain(..) {
            device.unmap_buffer(block.buffer);
            device.destroy_buffer(block.buffer);
        }
        for (block, _fence) in self.pending_free.drain(..) {
            device.unmap_buffer(block.buffer);
            device.destroy_buffer(block.buffer);
        }
        self.pending_uploads.clear();
    }

    fn grow(&mut self, size: usize) -> StagingAllocation {
        let device = self.device.as_ref().expect("checked by allocate");
        let block_size = size.max(self.pool_size);
        let desc = BufferDesc {
            size: block_size,
            usage: BufferUsage::TRANSFER_SRC,
            cpu_visible: true,
        };
        let buffer = device.create_buffer(&desc, None);
        if !buffer.is_valid() {
            log::warn!("staging pool expansion failed for {block_size} bytes");
            return StagingAllocation::invalid();
        }
        let ptr = device.map_buffer(buffer, 0, block_size);
        if ptr.is_null() {
            device.destroy_buffer(buffer);
            return StagingAllocation::invalid();
        }
        StagingAllocation {
            buffer,
            offset: 0,
            size,
            block_size,
            ptr,
        }
    }
}

impl Drop for StagingMemoryManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
