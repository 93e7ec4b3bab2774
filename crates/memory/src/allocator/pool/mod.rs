//! Fixed-size block pool allocator
//!
//! A pool carves one region into `block_count` equal blocks and threads an
//! intrusive free list through the free ones. Allocation pops the list head,
//! deallocation pushes the block back, both in O(1).
//!
//! Links are stored as block indices rather than addresses; pointers are only
//! materialized at the API boundary as `base + index * block_size`.
//!
//! ## Invariants
//!
//! - `block_size >= size_of::<usize>()` and is a multiple of `block_align`
//! - Every free-list link is a valid block index or the `NIL` marker
//! - `free_count` equals the number of blocks reachable from `free_head`
//! - Each block is either on the free list or handed out, never both

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

mod config;

pub use config::PoolConfig;

#[cfg(feature = "logging")]
use tracing::{debug, error, trace};

use super::{AllocError, AllocResult, Allocator};
use crate::core::types::alignment::DEFAULT_ALIGN;
use crate::core::{MemoryUsage, RawRegion, Resettable};
use crate::utils::{is_aligned_ptr, is_power_of_two};

/// End-of-list marker for free-list links
const NIL: usize = usize::MAX;

/// Size and alignment of the link written into every free block
const LINK_SIZE: usize = size_of::<usize>();
const LINK_ALIGN: usize = align_of::<usize>();

/// Fixed-size block allocator
///
/// # Thread Safety
/// `Send` but not `Sync`: the free list lives in [`Cell`]s. Wrap the pool in
/// [`LockedAllocator`](super::LockedAllocator) to share it between threads.
///
/// # Examples
/// ```rust
/// use core::alloc::Layout;
/// use dakt_memory::allocator::{Allocator, PoolAllocator};
///
/// let pool = PoolAllocator::new(16, 4)?;
/// let layout = Layout::from_size_align(16, 1).unwrap();
///
/// let blocks: Vec<_> = (0..4).map(|_| pool.allocate(layout)).collect::<Result<_, _>>()?;
/// assert!(pool.allocate(layout).is_err());
///
/// unsafe { pool.deallocate(blocks[2].cast(), layout) };
/// assert_eq!(pool.allocate(layout)?.cast::<u8>(), blocks[2].cast::<u8>());
/// # Ok::<(), dakt_memory::MemoryError>(())
/// ```
pub struct PoolAllocator {
    region: RawRegion,
    block_size: usize,
    block_align: usize,
    block_count: usize,
    free_head: Cell<usize>,
    free_count: Cell<usize>,
    config: PoolConfig,
}

impl PoolAllocator {
    /// Creates a new pool allocator with custom configuration
    ///
    /// # Parameters
    /// - `block_size`: requested size of each block; raised to hold a free-list
    ///   link and rounded up to the effective alignment
    /// - `block_align`: minimum alignment of every block (must be power of 2)
    /// - `block_count`: number of blocks (must be non-zero)
    /// - `config`: configuration for the allocator
    ///
    /// # Errors
    /// - `block_align` is not a power of 2
    /// - `block_count` is zero
    /// - the region size overflows or cannot be allocated
    pub fn with_config(
        block_size: usize,
        block_align: usize,
        block_count: usize,
        config: PoolConfig,
    ) -> AllocResult<Self> {
        if !is_power_of_two(block_align) {
            return Err(AllocError::invalid_alignment(block_align));
        }

        if block_count == 0 {
            return Err(AllocError::invalid_pool_config("block count must be non-zero"));
        }

        let link_align = block_align.max(LINK_ALIGN);
        let block_size = block_size
            .max(LINK_SIZE)
            .checked_next_multiple_of(link_align)
            .ok_or_else(|| AllocError::size_overflow("block size rounding"))?;
        let total_size = block_size
            .checked_mul(block_count)
            .ok_or_else(|| AllocError::size_overflow("block size calculation"))?;

        let region_align = block_align.max(DEFAULT_ALIGN);
        let region = RawRegion::new(total_size, region_align)?;

        // Every block start is base + i * block_size, so blocks inherit the
        // largest power of two dividing block_size, capped by the region.
        let block_align = region.align().min(1 << block_size.trailing_zeros());

        #[cfg(feature = "logging")]
        debug!(block_size, block_align, block_count, "pool allocator created");

        let pool = Self {
            region,
            block_size,
            block_align,
            block_count,
            free_head: Cell::new(NIL),
            free_count: Cell::new(0),
            config,
        };
        pool.initialize_free_list();

        Ok(pool)
    }

    /// Creates a pool with pointer-sized block alignment
    pub fn new(block_size: usize, block_count: usize) -> AllocResult<Self> {
        Self::with_config(block_size, LINK_ALIGN, block_count, PoolConfig::default())
    }

    /// Creates a pool whose blocks are aligned to at least `block_align`
    pub fn with_align(block_size: usize, block_align: usize, block_count: usize) -> AllocResult<Self> {
        Self::with_config(block_size, block_align, block_count, PoolConfig::default())
    }

    /// Creates a pool allocator sized for values of `T`
    pub fn for_type<T>(block_count: usize) -> AllocResult<Self> {
        Self::with_align(size_of::<T>(), align_of::<T>(), block_count)
    }

    /// Effective block size in bytes
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Guaranteed alignment of every block
    #[inline]
    pub fn block_align(&self) -> usize {
        self.block_align
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Number of blocks currently on the free list
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_count.get()
    }

    /// Number of blocks currently handed out
    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.block_count - self.free_count.get()
    }

    /// Total size of the pool region in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.block_size * self.block_count
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.free_count.get() == 0
    }

    /// Checks whether `ptr` points into this pool's region
    pub fn owns(&self, ptr: *const u8) -> bool {
        let start = self.region.as_non_null().as_ptr().addr();
        let addr = ptr.addr();
        addr >= start && addr - start < self.capacity()
    }

    /// Links every block, block 0 at the head
    fn initialize_free_list(&self) {
        for index in 0..self.block_count {
            let next = if index + 1 < self.block_count { index + 1 } else { NIL };
            // SAFETY: index < block_count, and no block is handed out while
            // the list is being (re)built.
            unsafe { self.write_link(index, next) };
        }
        self.free_head.set(0);
        self.free_count.set(self.block_count);
    }

    #[inline]
    fn block_ptr(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index < self.block_count);
        // SAFETY: index < block_count, so the offset is inside the region.
        unsafe { self.region.as_non_null().add(index * self.block_size) }
    }

    /// Maps a pointer back to its block index
    ///
    /// `None` if the pointer is outside the region or not at a block start.
    fn block_index(&self, ptr: NonNull<u8>) -> Option<usize> {
        if !self.owns(ptr.as_ptr()) {
            return None;
        }
        let offset = ptr.as_ptr().addr() - self.region.as_non_null().as_ptr().addr();
        offset
            .is_multiple_of(self.block_size)
            .then(|| offset / self.block_size)
    }

    /// # Safety
    /// Block `index` must be free.
    #[inline]
    unsafe fn read_link(&self, index: usize) -> usize {
        // SAFETY: free blocks hold an initialized, aligned link in their
        // first LINK_SIZE bytes.
        unsafe { self.block_ptr(index).cast::<usize>().read() }
    }

    /// # Safety
    /// Block `index` must not be handed out.
    #[inline]
    unsafe fn write_link(&self, index: usize, next: usize) {
        // SAFETY: blocks are at least LINK_SIZE bytes and LINK_ALIGN aligned.
        unsafe { self.block_ptr(index).cast::<usize>().write(next) };
    }

    /// Walks the free list looking for `index`
    fn is_free(&self, index: usize) -> bool {
        let mut cursor = self.free_head.get();
        let mut steps = 0;
        while cursor != NIL && steps < self.block_count {
            if cursor == index {
                return true;
            }
            // SAFETY: cursor came from the free list, so the block is free.
            cursor = unsafe { self.read_link(cursor) };
            steps += 1;
        }
        false
    }

    fn reject_free(&self, ptr: NonNull<u8>, reason: &'static str) {
        #[cfg(feature = "logging")]
        error!(
            address = ptr.as_ptr().addr(),
            block_size = self.block_size,
            reason,
            "invalid pool deallocation"
        );
        debug_assert!(false, "invalid pool deallocation at {ptr:p}: {reason}");
    }

    fn reset_internal(&self) {
        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the whole region is reclaimed; nothing is handed out.
            unsafe {
                core::ptr::write_bytes(self.region.as_non_null().as_ptr(), pattern, self.capacity());
            }
        }
        self.initialize_free_list();

        #[cfg(feature = "logging")]
        trace!(block_count = self.block_count, "pool reset");
    }

    /// Returns every block to the free list
    ///
    /// Blocks handed out earlier dangle afterwards; `&mut self` proves no
    /// guard borrowed from the pool is alive.
    pub fn reset(&mut self) {
        self.reset_internal();
    }
}

// SAFETY: blocks are disjoint, in-bounds and aligned to block_align; a block
// is handed out only after it is popped off the free list.
unsafe impl Allocator for PoolAllocator {
    /// Pops a block; zero-sized requests still consume one
    fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() > self.block_size {
            return Err(AllocError::allocation_too_large(layout.size(), self.block_size));
        }
        if layout.align() > self.block_align {
            return Err(AllocError::invalid_alignment(layout.align()));
        }

        let index = self.free_head.get();
        if index == NIL {
            return Err(AllocError::pool_exhausted(self.block_size, self.block_count));
        }

        // SAFETY: index is the free-list head, so the block is free.
        let next = unsafe { self.read_link(index) };
        self.free_head.set(next);
        self.free_count.set(self.free_count.get() - 1);

        let ptr = self.block_ptr(index);
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: the block was just popped and spans block_size bytes.
            unsafe { core::ptr::write_bytes(ptr.as_ptr(), pattern, self.block_size) };
        }

        Ok(NonNull::slice_from_raw_parts(ptr, self.block_size))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        let Some(index) = self.block_index(ptr) else {
            self.reject_free(ptr, "pointer is not a block of this pool");
            return;
        };

        if self.config.validate_frees && self.is_free(index) {
            self.reject_free(ptr, "block is already free (double free)");
            return;
        }

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the block is handed out and owned by the caller until now.
            unsafe { core::ptr::write_bytes(ptr.as_ptr(), pattern, self.block_size) };
        }

        // SAFETY: the block is being returned, so nothing else uses it.
        unsafe { self.write_link(index, self.free_head.get()) };
        self.free_head.set(index);
        self.free_count.set(self.free_count.get() + 1);
    }

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        _old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if new_layout.size() > self.block_size {
            return Err(AllocError::allocation_too_large(new_layout.size(), self.block_size));
        }
        if !is_aligned_ptr(ptr.as_ptr(), new_layout.align()) {
            return Err(AllocError::invalid_alignment(new_layout.align()));
        }
        Ok(NonNull::slice_from_raw_parts(ptr, self.block_size))
    }
}

impl MemoryUsage for PoolAllocator {
    fn used_memory(&self) -> usize {
        self.allocated_count() * self.block_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.free_count() * self.block_size)
    }
}

impl Resettable for PoolAllocator {
    fn reset(&mut self) {
        self.reset_internal();
    }
}

impl core::fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("block_size", &self.block_size)
            .field("block_align", &self.block_align)
            .field("block_count", &self.block_count)
            .field("free_count", &self.free_count())
            .field("config", &self.config)
            .finish()
    }
}

// SAFETY: the pool exclusively owns its region; moving it moves that
// ownership. Cell keeps it !Sync.
unsafe impl Send for PoolAllocator {}
