//! Allocator errors
//!
//! Every fallible operation in the crate returns [`MemoryError`]. Named
//! constructors are the preferred way to build one: exhaustion and hard
//! allocation failures are logged at the point they are created.

use core::alloc::Layout;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{debug, error, warn};

/// Failure of an allocator or of a layout computation
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The platform allocator returned null
    #[error("allocation of {size} bytes (align {align}) failed")]
    AllocationFailed { size: usize, align: usize },

    #[error("invalid layout: {reason}")]
    InvalidLayout { reason: String },

    /// Size arithmetic overflowed `usize` or `isize::MAX`
    #[error("size overflow in {operation}")]
    SizeOverflow { operation: String },

    /// Alignment is not a power of two, or stricter than the allocator serves
    #[error("unsupported alignment {alignment}")]
    InvalidAlignment { alignment: usize },

    #[error("request of {size} bytes exceeds the {max_size} byte limit")]
    ExceedsMaxSize { size: usize, max_size: usize },

    /// Every block of a pool is handed out
    #[error("pool exhausted: {block_count} blocks of {block_size} bytes all in use")]
    PoolExhausted {
        block_size: usize,
        block_count: usize,
    },

    /// The request does not fit in what is left of an arena
    #[error("arena exhausted: {requested} bytes requested, {available} remaining")]
    ArenaExhausted { requested: usize, available: usize },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl MemoryError {
    /// Whether the same request can succeed later
    ///
    /// True for pool and arena exhaustion: a free or a reset by the owner
    /// makes room again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. } | Self::ArenaExhausted { .. })
    }

    #[must_use]
    pub fn is_invalid_alignment(&self) -> bool {
        matches!(self, Self::InvalidAlignment { .. })
    }

    /// Stable category code, `MEM:<area>:<kind>`
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::InvalidLayout { .. } => "MEM:ALLOC:LAYOUT",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::InvalidAlignment { .. } => "MEM:ALLOC:ALIGN",
            Self::ExceedsMaxSize { .. } => "MEM:ALLOC:MAX",
            Self::PoolExhausted { .. } => "MEM:POOL:EXHAUSTED",
            Self::ArenaExhausted { .. } => "MEM:ARENA:EXHAUSTED",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
        }
    }

    // ------------------------------------------------------------------------
    // Layout and allocation
    // ------------------------------------------------------------------------

    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, "platform allocation failed");

        Self::AllocationFailed { size, align }
    }

    pub fn allocation_failed_with_layout(layout: Layout) -> Self {
        Self::allocation_failed(layout.size(), layout.align())
    }

    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout {
            reason: reason.into(),
        }
    }

    /// Zero-sized request to an allocator that has nothing to hand out for it
    pub fn zero_sized() -> Self {
        Self::invalid_layout("zero-sized allocation")
    }

    pub fn size_overflow(operation: impl Into<String>) -> Self {
        Self::SizeOverflow {
            operation: operation.into(),
        }
    }

    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::InvalidAlignment { alignment }
    }

    pub fn allocation_too_large(size: usize, max_size: usize) -> Self {
        Self::ExceedsMaxSize { size, max_size }
    }

    // ------------------------------------------------------------------------
    // Exhaustion
    // ------------------------------------------------------------------------

    pub fn pool_exhausted(block_size: usize, block_count: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(block_size, block_count, "pool exhausted");

        Self::PoolExhausted {
            block_size,
            block_count,
        }
    }

    /// Arena exhaustion is routine for scratch arenas, so it logs at debug
    pub fn arena_exhausted(requested: usize, available: usize) -> Self {
        #[cfg(feature = "logging")]
        debug!(requested, available, "arena exhausted");

        Self::ArenaExhausted {
            requested,
            available,
        }
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn invalid_pool_config(reason: &str) -> Self {
        Self::invalid_config(format!("pool: {reason}"))
    }

    pub fn invalid_arena_config(reason: &str) -> Self {
        Self::invalid_config(format!("arena: {reason}"))
    }
}

/// Result of any fallible memory operation
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

pub type Result<T> = MemoryResult<T>;

/// Names used throughout [`crate::allocator`]
pub type AllocError = MemoryError;
pub type AllocResult<T> = MemoryResult<T>;
