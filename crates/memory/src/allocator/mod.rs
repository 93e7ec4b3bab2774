//! Memory allocators
//!
//! - [`HeapAllocator`]: general purpose, backed by the platform allocator
//! - [`ArenaAllocator`]: bump pointer over a fixed region, bulk reset
//! - [`PoolAllocator`]: fixed-size blocks on an intrusive free list
//!
//! All three implement [`Allocator`]; typed helpers come from
//! [`TypedAllocator`]. [`LockedAllocator`] shares the `!Sync` arena and pool
//! between threads, and [`AllocatorAdapter`] exposes any allocator as a
//! `GlobalAlloc`.

pub mod adapter;
pub mod arena;
pub mod heap;
pub mod locked;
pub mod pool;
pub mod stats;
pub mod traits;

pub use adapter::AllocatorAdapter;
pub use arena::{ArenaAllocator, ArenaConfig};
pub use heap::{HeapAllocator, HeapConfig, default_allocator};
pub use locked::{LockedAllocator, LockedGuard};
pub use pool::{PoolAllocator, PoolConfig};
pub use stats::{MemoryStats, MemoryStatsSnapshot, global_stats};
pub use traits::{AllocatedValue, Allocator, TypedAllocator};

pub use crate::core::traits::{BasicMemoryUsage, MemoryUsage, Resettable};
pub use crate::error::{AllocError, AllocResult};
