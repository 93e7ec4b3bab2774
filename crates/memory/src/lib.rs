//! # dakt-memory
//!
//! Explicit memory management building blocks.
//!
//! This crate provides:
//! - A uniform [`Allocator`](allocator::Allocator) capability with typed helpers
//! - [`HeapAllocator`](allocator::HeapAllocator): the platform allocator, optionally instrumented
//! - [`ArenaAllocator`](allocator::ArenaAllocator): bump allocation with bulk reset
//! - [`PoolAllocator`](allocator::PoolAllocator): O(1) fixed-size blocks on a free list
//! - Intrusive reference counting via [`RefCounted`](refcount::RefCounted) and [`Ref`](refcount::Ref)
//!
//! ## Quick Start
//!
//! ```rust
//! use dakt_memory::prelude::*;
//!
//! // Short-lived scratch data: allocate freely, reclaim all at once
//! let mut arena = ArenaAllocator::new(4096)?;
//! let point = arena.create((1.0f32, 2.0f32))?;
//! arena.reset();
//!
//! // Many objects of one shape: O(1) allocate and free
//! let pool = PoolAllocator::for_type::<[u64; 4]>(128)?;
//! let block = pool.create_owned([0u64; 4])?;
//! assert_eq!(pool.allocated_count(), 1);
//! # drop(block);
//! # let _ = point;
//! # Ok::<(), MemoryError>(())
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured `tracing` events from allocators and errors
//! - `stats` (default): the default heap allocator reports into
//!   [`global_stats`](allocator::global_stats)
//!
//! ## Thread safety
//!
//! The heap allocator and reference counts are thread-safe. Arena and pool are
//! `Send` but not `Sync`; share them through
//! [`LockedAllocator`](allocator::LockedAllocator).

#![cfg_attr(docsrs, feature(doc_cfg))]
// Allocators are raw memory management; unsafe is reviewed per block
#![allow(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(unsafe_op_in_unsafe_fn)]
// Pointer casts to link words inside pool blocks are aligned by construction
#![allow(clippy::cast_ptr_alignment)]
// Explicit lifetimes are clearer in arena code even when elidable
#![allow(clippy::elidable_lifetime_names)]
// #[must_use] on fns returning Result documents intent even if type is already must_use
#![allow(clippy::double_must_use)]

// Error types
pub mod error;

// Core modules
pub mod allocator;
pub mod core;
mod macros;
pub mod refcount;
pub mod utils;

pub use crate::error::{MemoryError, MemoryResult, Result};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Core traits
    pub use crate::core::traits::{MemoryUsage, Resettable};

    // Error types
    pub use crate::error::{MemoryError, MemoryResult};

    // Allocator types
    pub use crate::allocator::{
        AllocError, AllocResult, Allocator, AllocatorAdapter, ArenaAllocator, ArenaConfig,
        HeapAllocator, HeapConfig, LockedAllocator, PoolAllocator, PoolConfig, TypedAllocator,
        default_allocator,
    };

    // Reference counting
    pub use crate::impl_ref_counted;
    pub use crate::refcount::{Ref, RefCount, RefCounted, make_ref};
}

// Re-export allocator types at crate root for convenience
pub use crate::allocator::{AllocError, AllocResult};

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// Initialize the process-wide default heap allocator.
///
/// Calling it is optional; [`allocator::default_allocator`] initializes
/// lazily on first use. Calling it at startup moves that cost out of the
/// first allocation and returns the allocator for explicit passing.
///
/// # Examples
///
/// ```rust
/// use dakt_memory::allocator::Allocator;
///
/// fn main() -> dakt_memory::MemoryResult<()> {
///     let heap = dakt_memory::init()?;
///     let block = heap.allocate(core::alloc::Layout::new::<u128>())?;
///     unsafe { heap.deallocate(block.cast(), core::alloc::Layout::new::<u128>()) };
///     Ok(())
/// }
/// ```
pub fn init() -> MemoryResult<&'static allocator::HeapAllocator> {
    #[cfg(feature = "logging")]
    debug!("Initializing dakt-memory");

    let heap = allocator::default_allocator();

    #[cfg(feature = "logging")]
    info!(stats = heap.stats().is_some(), "dakt-memory initialized");

    Ok(heap)
}
