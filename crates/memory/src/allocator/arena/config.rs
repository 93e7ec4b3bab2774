//! Arena allocator configuration

const ALLOC_PATTERN: u8 = 0xAA;
const RESET_PATTERN: u8 = 0xDD;

/// Debug aids for [`ArenaAllocator`](super::ArenaAllocator)
///
/// `Default` poisons memory in debug builds only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Byte written over every fresh allocation
    pub alloc_pattern: Option<u8>,
    /// Byte written over the used prefix on reset
    pub reset_pattern: Option<u8>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::debug()
        } else {
            Self::production()
        }
    }
}

impl ArenaConfig {
    #[must_use]
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            reset_pattern: None,
        }
    }

    #[must_use]
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(ALLOC_PATTERN),
            reset_pattern: Some(RESET_PATTERN),
        }
    }
}
