//! Owned, aligned backing memory for arena and pool allocators.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use std::alloc::System;

use super::types::alignment::MIN_ALIGN;
use crate::error::{MemoryError, MemoryResult};

/// A block of raw bytes obtained from the system allocator and released on drop.
///
/// Regions are requested from [`System`] directly rather than the global
/// allocator, so an allocator of this crate can itself be installed as the
/// global allocator without recursing into itself.
#[derive(Debug)]
pub(crate) struct RawRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RawRegion {
    /// Allocates `size` bytes aligned to at least `align`.
    pub(crate) fn new(size: usize, align: usize) -> MemoryResult<Self> {
        if size == 0 {
            return Err(MemoryError::invalid_config("region size must be non-zero"));
        }
        if !align.is_power_of_two() {
            return Err(MemoryError::invalid_alignment(align));
        }

        let layout = Layout::from_size_align(size, align.max(MIN_ALIGN))
            .map_err(|_| MemoryError::size_overflow("region layout"))?;

        // SAFETY: layout has a non-zero size (checked above).
        let raw = unsafe { System.alloc(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| MemoryError::allocation_failed_with_layout(layout))?;

        Ok(Self { ptr, layout })
    }

    #[inline]
    pub(crate) const fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub(crate) const fn align(&self) -> usize {
        self.layout.align()
    }
}

impl Drop for RawRegion {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by System.alloc with exactly this layout and
        // is released once, here.
        unsafe { System.dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

// SAFETY: RawRegion exclusively owns its allocation; moving the owner to
// another thread moves the only handle to it.
unsafe impl Send for RawRegion {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_is_aligned() {
        let region = RawRegion::new(100, 64).unwrap();
        assert_eq!(region.len(), 100);
        assert_eq!(region.align(), 64);
        assert_eq!(region.as_non_null().as_ptr() as usize % 64, 0);
    }

    #[test]
    fn region_rejects_bad_parameters() {
        assert!(RawRegion::new(0, 16).is_err());
        assert!(RawRegion::new(16, 3).unwrap_err().is_invalid_alignment());
    }
}
