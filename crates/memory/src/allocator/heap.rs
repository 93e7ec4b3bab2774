//! General-purpose heap allocator
//!
//! [`HeapAllocator`] forwards to the platform allocator ([`System`]) and can
//! optionally count every operation into a [`MemoryStats`] block and keep a
//! side table of live allocations for catching bad frees.
//!
//! [`System`] is used instead of the global allocator so that a
//! `HeapAllocator` can itself sit behind `#[global_allocator]` (through
//! [`AllocatorAdapter`](super::AllocatorAdapter)) without recursing.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use std::alloc::System;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

#[cfg(feature = "logging")]
use tracing::{debug, error};

#[cfg(feature = "stats")]
use super::stats::global_stats;
use super::stats::MemoryStats;
use super::{AllocError, AllocResult, Allocator};
use crate::core::traits::MemoryUsage;

/// Runtime options for [`HeapAllocator::with_config`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapConfig {
    /// Count allocations into a private [`MemoryStats`] block
    pub collect_stats: bool,
    /// Remember the layout of every live allocation and check it on free
    pub track_allocations: bool,
}

impl HeapConfig {
    /// Statistics and free checking on
    pub fn debug() -> Self {
        Self {
            collect_stats: true,
            track_allocations: true,
        }
    }

    /// Plain forwarding to the system allocator
    pub fn production() -> Self {
        Self::default()
    }
}

/// Heap allocator backed by the platform allocator
///
/// # Thread Safety
/// `Send + Sync`: the system allocator is thread-safe, statistics are
/// atomics and the tracking table is a sharded concurrent map.
///
/// # Reallocation
/// Resizing always allocates the new block, copies `min(old, new)` bytes and
/// only then frees the old block. If the new allocation fails the old block
/// is left intact.
///
/// # Examples
/// ```rust
/// use core::alloc::Layout;
/// use dakt_memory::allocator::{Allocator, HeapAllocator};
///
/// let heap = HeapAllocator::new();
/// let layout = Layout::from_size_align(64, 16).unwrap();
/// let block = heap.allocate(layout)?;
/// assert_eq!(block.len(), 64);
/// unsafe { heap.deallocate(block.cast(), layout) };
/// # Ok::<(), dakt_memory::MemoryError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeapAllocator {
    stats: Option<Arc<MemoryStats>>,
    tracker: Option<Arc<DashMap<usize, Layout>>>,
}

impl HeapAllocator {
    /// Creates an uninstrumented heap allocator
    ///
    /// `const`, so it can back a `static`.
    #[inline]
    pub const fn new() -> Self {
        Self {
            stats: None,
            tracker: None,
        }
    }

    /// Creates a heap allocator that reports into `stats`
    pub fn with_stats(stats: Arc<MemoryStats>) -> Self {
        Self {
            stats: Some(stats),
            tracker: None,
        }
    }

    /// Creates a heap allocator from a [`HeapConfig`]
    pub fn with_config(config: HeapConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            collect_stats = config.collect_stats,
            track_allocations = config.track_allocations,
            "heap allocator created"
        );

        Self {
            stats: config
                .collect_stats
                .then(|| Arc::new(MemoryStats::new())),
            tracker: config
                .track_allocations
                .then(|| Arc::new(DashMap::new())),
        }
    }

    /// Statistics block this allocator reports into, if any
    pub fn stats(&self) -> Option<&Arc<MemoryStats>> {
        self.stats.as_ref()
    }

    /// Number of tracked live allocations
    ///
    /// `None` unless allocation tracking is enabled.
    pub fn live_allocations(&self) -> Option<usize> {
        self.tracker.as_ref().map(|tracker| tracker.len())
    }

    fn record_failure(&self) {
        if let Some(stats) = &self.stats {
            stats.record_failure();
        }
    }

    /// Checks `ptr` against the tracking table.
    ///
    /// Returns the layout to free with, or `None` if the free must be skipped.
    fn checked_layout(&self, ptr: NonNull<u8>, layout: Layout) -> Option<Layout> {
        let Some(tracker) = &self.tracker else {
            return Some(layout);
        };

        let address = ptr.as_ptr().addr();
        match tracker.remove(&address) {
            None => {
                #[cfg(feature = "logging")]
                error!(
                    address,
                    size = layout.size(),
                    "deallocation of unknown pointer (double free or foreign pointer)"
                );
                debug_assert!(
                    false,
                    "deallocation of unknown pointer {address:#x} (double free or foreign pointer)"
                );
                None
            }
            Some((_, recorded)) if recorded != layout => {
                #[cfg(feature = "logging")]
                error!(
                    address,
                    size = layout.size(),
                    align = layout.align(),
                    recorded_size = recorded.size(),
                    recorded_align = recorded.align(),
                    "deallocation layout does not match allocation"
                );
                debug_assert!(
                    false,
                    "deallocation layout mismatch at {address:#x}: freed with {layout:?}, allocated with {recorded:?}"
                );
                Some(recorded)
            }
            Some(_) => Some(layout),
        }
    }
}

// SAFETY: every block comes from System.alloc with the requested layout and
// is unique until returned; System is thread-safe.
unsafe impl Allocator for HeapAllocator {
    fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            self.record_failure();
            return Err(AllocError::zero_sized());
        }

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { System.alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            self.record_failure();
            return Err(AllocError::allocation_failed_with_layout(layout));
        };

        if let Some(stats) = &self.stats {
            stats.record_allocation(layout.size());
        }
        if let Some(tracker) = &self.tracker {
            tracker.insert(ptr.as_ptr().addr(), layout);
        }

        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            // allocate never hands out zero-sized blocks
            return;
        }

        let Some(layout) = self.checked_layout(ptr, layout) else {
            return;
        };

        if let Some(stats) = &self.stats {
            stats.record_deallocation(layout.size());
        }

        // SAFETY: ptr came from System.alloc with this layout (caller contract,
        // or the recorded layout when tracking is on).
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
    }
}

impl MemoryUsage for HeapAllocator {
    fn used_memory(&self) -> usize {
        self.stats
            .as_ref()
            .map_or(0, |stats| stats.snapshot().current_bytes_allocated)
    }

    fn available_memory(&self) -> Option<usize> {
        // Bounded only by the system
        None
    }
}

/// The process-wide default heap allocator
///
/// With the `stats` feature it reports into
/// [`global_stats`](super::global_stats).
pub fn default_allocator() -> &'static HeapAllocator {
    static DEFAULT: OnceLock<HeapAllocator> = OnceLock::new();

    DEFAULT.get_or_init(|| {
        #[cfg(feature = "stats")]
        let heap = HeapAllocator::with_stats(Arc::clone(global_stats()));
        #[cfg(not(feature = "stats"))]
        let heap = HeapAllocator::new();

        #[cfg(feature = "logging")]
        debug!(stats = cfg!(feature = "stats"), "default heap allocator initialized");

        heap
    })
}
