//! Pool allocator configuration

const ALLOC_PATTERN: u8 = 0xBB;
const DEALLOC_PATTERN: u8 = 0xDD;

/// Debug aids for [`PoolAllocator`](super::PoolAllocator)
///
/// `Default` fills blocks with patterns in debug builds and nothing in
/// release builds. The O(n) double-free walk is never on by default; ask for
/// it with [`PoolConfig::debug`] or `validate_frees`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Byte written over every block handed out
    pub alloc_pattern: Option<u8>,
    /// Byte written over every block returned, and over the region on reset
    pub dealloc_pattern: Option<u8>,
    /// Walk the free list on every free to catch double frees (O(n))
    pub validate_frees: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self {
                validate_frees: false,
                ..Self::debug()
            }
        } else {
            Self::production()
        }
    }
}

impl PoolConfig {
    /// No fill patterns, no free validation
    #[must_use]
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
            validate_frees: false,
        }
    }

    /// Poison fresh and returned blocks, reject double frees
    #[must_use]
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(ALLOC_PATTERN),
            dealloc_pattern: Some(DEALLOC_PATTERN),
            validate_frees: true,
        }
    }
}
