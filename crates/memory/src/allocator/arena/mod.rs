//! Bump-pointer arena allocator
//!
//! An arena hands out memory by advancing an offset through one contiguous
//! region. Individual frees are no-ops; everything is reclaimed at once by
//! [`ArenaAllocator::reset`] or by dropping the arena.
//!
//! ## Invariants
//!
//! - `0 <= used() <= capacity()`
//! - Every returned pointer lies in `[base, base + capacity)` and satisfies
//!   the requested alignment (the absolute address is aligned, so borrowed
//!   buffers with any starting alignment work)
//! - Live allocations never overlap: the offset only moves forward between
//!   resets
//! - A failed allocation leaves the offset unchanged

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::NonNull;

mod config;

pub use config::ArenaConfig;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use super::{AllocError, AllocResult, Allocator};
use crate::core::types::alignment::DEFAULT_ALIGN;
use crate::core::{MemoryUsage, RawRegion, Resettable};
use crate::utils::{checked_align_up, is_aligned_ptr};

/// Bump-pointer allocator over a fixed region
///
/// The region is either owned (allocated by [`ArenaAllocator::new`]) or a
/// caller buffer borrowed for `'buf` ([`ArenaAllocator::from_buffer`]).
///
/// # Thread Safety
/// `Send` but not `Sync`: the offset lives in a [`Cell`]. Wrap the arena in
/// [`LockedAllocator`](super::LockedAllocator) to share it between threads.
///
/// # Examples
/// ```rust
/// use core::alloc::Layout;
/// use dakt_memory::allocator::{Allocator, ArenaAllocator};
///
/// let mut arena = ArenaAllocator::new(64)?;
/// arena.allocate(Layout::from_size_align(10, 8).unwrap())?;
/// assert!(arena.allocate(Layout::from_size_align(60, 8).unwrap()).is_err());
/// assert_eq!(arena.used(), 10);
///
/// arena.reset();
/// arena.allocate(Layout::from_size_align(64, 8).unwrap())?;
/// assert_eq!(arena.remaining(), 0);
/// # Ok::<(), dakt_memory::MemoryError>(())
/// ```
pub struct ArenaAllocator<'buf> {
    base: NonNull<u8>,
    capacity: usize,
    offset: Cell<usize>,
    peak: Cell<usize>,
    config: ArenaConfig,
    /// Keeps an owned region alive; `None` for borrowed buffers
    owned: Option<RawRegion>,
    _buffer: PhantomData<&'buf mut [u8]>,
}

impl ArenaAllocator<'static> {
    /// Creates an arena owning `capacity` bytes
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, ArenaConfig::default())
    }

    /// Creates an arena owning `capacity` bytes with custom configuration
    pub fn with_config(capacity: usize, config: ArenaConfig) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::invalid_arena_config("capacity must be non-zero"));
        }

        let region = RawRegion::new(capacity, DEFAULT_ALIGN)?;

        #[cfg(feature = "logging")]
        debug!(capacity, owned = true, "arena allocator created");

        Ok(Self {
            base: region.as_non_null(),
            capacity,
            offset: Cell::new(0),
            peak: Cell::new(0),
            config,
            owned: Some(region),
            _buffer: PhantomData,
        })
    }
}

impl<'buf> ArenaAllocator<'buf> {
    /// Creates an arena over a caller-provided buffer
    pub fn from_buffer(buffer: &'buf mut [u8]) -> AllocResult<Self> {
        Self::from_buffer_with_config(buffer, ArenaConfig::default())
    }

    /// Creates an arena over a caller-provided buffer with custom configuration
    pub fn from_buffer_with_config(buffer: &'buf mut [u8], config: ArenaConfig) -> AllocResult<Self> {
        let capacity = buffer.len();
        if capacity == 0 {
            return Err(AllocError::invalid_arena_config("buffer must be non-empty"));
        }

        #[cfg(feature = "logging")]
        debug!(capacity, owned = false, "arena allocator created");

        Ok(Self {
            // Non-empty slice, so the pointer is non-null.
            base: NonNull::from(buffer).cast::<u8>(),
            capacity,
            offset: Cell::new(0),
            peak: Cell::new(0),
            config,
            owned: None,
            _buffer: PhantomData,
        })
    }

    /// Total region size in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes consumed since the last reset, including alignment padding
    #[inline]
    pub fn used(&self) -> usize {
        self.offset.get()
    }

    /// Bytes left before the end of the region
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.offset.get()
    }

    /// Highest `used()` ever observed
    #[inline]
    pub fn peak_usage(&self) -> usize {
        self.peak.get()
    }

    /// Whether the arena allocated its own region
    #[inline]
    pub fn is_owned_buffer(&self) -> bool {
        self.owned.is_some()
    }

    /// Checks whether `ptr` points into this arena's region
    pub fn owns(&self, ptr: *const u8) -> bool {
        let start = self.base.as_ptr().addr();
        let addr = ptr.addr();
        addr >= start && addr - start < self.capacity
    }

    /// Reclaims every allocation at once
    ///
    /// Pointers handed out earlier dangle afterwards; `&mut self` proves no
    /// guard borrowed from the arena is alive.
    pub fn reset(&mut self) {
        self.reset_internal();
    }

    fn reset_internal(&self) {
        let used = self.offset.get();
        if let Some(pattern) = self.config.reset_pattern {
            // SAFETY: [base, base + used) lies inside the region.
            unsafe { core::ptr::write_bytes(self.base.as_ptr(), pattern, used) };
        }
        self.offset.set(0);

        #[cfg(feature = "logging")]
        trace!(reclaimed = used, capacity = self.capacity, "arena reset");
    }

    /// Reserves `layout` and returns the start of the block
    ///
    /// Returns `None` without touching the offset if the request does not fit.
    fn try_bump(&self, layout: Layout) -> Option<NonNull<u8>> {
        let offset = self.offset.get();
        let start_addr = self.base.as_ptr().addr();

        let current = start_addr.checked_add(offset)?;
        let aligned = checked_align_up(current, layout.align())?;
        let start = aligned - start_addr;
        let end = start.checked_add(layout.size())?;

        if end > self.capacity {
            return None;
        }

        self.offset.set(end);
        if end > self.peak.get() {
            self.peak.set(end);
        }

        // SAFETY: start < end <= capacity, so the result stays in the region
        // and keeps the region's provenance.
        Some(unsafe { self.base.add(start) })
    }
}

// SAFETY: try_bump only hands out disjoint, in-bounds, aligned ranges; ranges
// are reused only after a reset, which the caller has to justify.
unsafe impl Allocator for ArenaAllocator<'_> {
    fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Err(AllocError::zero_sized());
        }

        let ptr = self
            .try_bump(layout)
            .ok_or_else(|| AllocError::arena_exhausted(layout.size(), self.remaining()))?;

        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: the block [ptr, ptr + size) was just reserved.
            unsafe { core::ptr::write_bytes(ptr.as_ptr(), pattern, layout.size()) };
        }

        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    /// No-op: memory is reclaimed by `reset` or drop
    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if new_layout.size() <= old_layout.size() && is_aligned_ptr(ptr.as_ptr(), new_layout.align()) {
            return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
        }

        let new_ptr = self.allocate(new_layout)?;
        // SAFETY: ptr is valid for old_layout.size() bytes (caller contract),
        // new_ptr is a fresh block of new_layout.size() bytes, and the two do
        // not overlap because the offset only moves forward.
        unsafe {
            core::ptr::copy_nonoverlapping(
                ptr.as_ptr(),
                new_ptr.cast::<u8>().as_ptr(),
                old_layout.size().min(new_layout.size()),
            );
        }
        Ok(new_ptr)
    }
}

impl MemoryUsage for ArenaAllocator<'_> {
    fn used_memory(&self) -> usize {
        self.used()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.remaining())
    }
}

impl Resettable for ArenaAllocator<'_> {
    fn reset(&mut self) {
        self.reset_internal();
    }
}

impl core::fmt::Debug for ArenaAllocator<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("capacity", &self.capacity)
            .field("used", &self.used())
            .field("peak", &self.peak_usage())
            .field("owned", &self.is_owned_buffer())
            .field("config", &self.config)
            .finish()
    }
}

// SAFETY: the arena is the only handle to its region (owned, or borrowed
// mutably for 'buf); moving it moves that exclusive access. Cell keeps it !Sync.
unsafe impl Send for ArenaAllocator<'_> {}
