//! Utility functions used throughout the crate
//!
//! - Power-of-two alignment helpers for addresses and pointers
//! - Checked `Layout` construction from a `(size, alignment)` pair
//! - Raw memory operations (copy, fill, compare)

use core::alloc::Layout;
use core::cmp::Ordering;
use core::ptr;

use crate::error::{AllocError, AllocResult};

// ============================================================================
// Alignment
// ============================================================================

/// Checks whether `value` is a power of two. Zero is not.
///
/// # Examples
/// ```
/// use dakt_memory::utils::is_power_of_two;
///
/// assert!(is_power_of_two(16));
/// assert!(!is_power_of_two(0));
/// assert!(!is_power_of_two(12));
/// ```
#[inline(always)]
pub const fn is_power_of_two(value: usize) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use dakt_memory::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    (value + alignment - 1) & !(alignment - 1)
}

/// Like [`align_up`], but returns `None` instead of wrapping near `usize::MAX`.
#[inline]
pub const fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(is_power_of_two(alignment));
    match value.checked_add(alignment - 1) {
        Some(bumped) => Some(bumped & !(alignment - 1)),
        None => None,
    }
}

/// Aligns a value down to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use dakt_memory::utils::align_down;
///
/// assert_eq!(align_down(7, 8), 0);
/// assert_eq!(align_down(8, 8), 8);
/// assert_eq!(align_down(9, 8), 8);
/// ```
#[inline(always)]
pub const fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    value & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(is_power_of_two(alignment));
    value & (alignment - 1) == 0
}

/// Calculates padding needed to align a value
#[inline(always)]
pub const fn padding_needed(value: usize, alignment: usize) -> usize {
    align_up(value, alignment) - value
}

/// Checks if a pointer's address is aligned to `alignment`
#[inline]
pub fn is_aligned_ptr<T: ?Sized>(ptr: *const T, alignment: usize) -> bool {
    is_aligned(ptr.cast::<u8>().addr(), alignment)
}

/// Rounds a pointer up to the next `alignment` boundary.
///
/// The result keeps the provenance of `ptr`; it is only dereferenceable if
/// the aligned address still lies inside the original allocation.
#[inline]
pub fn align_ptr<T>(ptr: *mut T, alignment: usize) -> *mut T {
    ptr.map_addr(|addr| align_up(addr, alignment))
}

/// Builds a `Layout` from a raw `(size, alignment)` request.
///
/// # Examples
/// ```
/// use dakt_memory::utils::layout_for;
///
/// let layout = layout_for(10, 4).unwrap();
/// assert_eq!((layout.size(), layout.align()), (10, 4));
/// assert!(layout_for(10, 3).is_err());
/// ```
pub fn layout_for(size: usize, alignment: usize) -> AllocResult<Layout> {
    if !is_power_of_two(alignment) {
        return Err(AllocError::invalid_alignment(alignment));
    }
    Layout::from_size_align(size, alignment)
        .map_err(|_| AllocError::size_overflow("layout size rounded up to alignment"))
}

// ============================================================================
// Memory Operations
// ============================================================================

/// Copies `len` bytes from `src` to `dest`; the regions may overlap.
///
/// # Safety
/// `src` must be valid for reads and `dest` valid for writes of `len` bytes.
#[inline]
pub unsafe fn copy(dest: *mut u8, src: *const u8, len: usize) {
    // SAFETY: validity of both ranges is the caller's contract; ptr::copy
    // handles overlap.
    unsafe { ptr::copy(src, dest, len) }
}

/// Copies `len` bytes from `src` to `dest`.
///
/// # Safety
/// As [`copy`], and the two regions must not overlap.
#[inline]
pub unsafe fn copy_nonoverlapping(dest: *mut u8, src: *const u8, len: usize) {
    // SAFETY: forwarded caller contract (valid, disjoint ranges).
    unsafe { ptr::copy_nonoverlapping(src, dest, len) }
}

/// Fills `len` bytes at `dest` with `value`.
///
/// # Safety
/// `dest` must be valid for writes of `len` bytes.
#[inline]
pub unsafe fn set(dest: *mut u8, value: u8, len: usize) {
    // SAFETY: forwarded caller contract.
    unsafe { ptr::write_bytes(dest, value, len) }
}

/// Zeroes `len` bytes at `dest`.
///
/// # Safety
/// `dest` must be valid for writes of `len` bytes.
#[inline]
pub unsafe fn zero(dest: *mut u8, len: usize) {
    // SAFETY: forwarded caller contract.
    unsafe { set(dest, 0, len) }
}

/// Lexicographically compares `len` bytes at `a` and `b`.
///
/// # Safety
/// Both pointers must be valid for reads of `len` bytes and the memory must
/// be initialized.
#[inline]
pub unsafe fn compare(a: *const u8, b: *const u8, len: usize) -> Ordering {
    if len == 0 {
        return Ordering::Equal;
    }
    // SAFETY: len > 0 so both pointers are non-null by contract; ranges are
    // valid and initialized per the caller.
    let (lhs, rhs) = unsafe {
        (
            core::slice::from_raw_parts(a, len),
            core::slice::from_raw_parts(b, len),
        )
    };
    lhs.cmp(rhs)
}

/// Checks `len` bytes at `a` and `b` for equality.
///
/// # Safety
/// Same as [`compare`].
#[inline]
pub unsafe fn equal(a: *const u8, b: *const u8, len: usize) -> bool {
    // SAFETY: forwarded caller contract.
    unsafe { compare(a, b, len) }.is_eq()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 8, 0)]
    #[case(1, 8, 8)]
    #[case(15, 16, 16)]
    #[case(17, 16, 32)]
    #[case(4095, 4096, 4096)]
    fn align_up_cases(#[case] value: usize, #[case] align: usize, #[case] expected: usize) {
        assert_eq!(align_up(value, align), expected);
        assert_eq!(checked_align_up(value, align), Some(expected));
        assert!(is_aligned(expected, align));
        assert_eq!(padding_needed(value, align), expected - value);
    }

    #[test]
    fn checked_align_up_detects_overflow() {
        assert_eq!(checked_align_up(usize::MAX, 16), None);
        assert_eq!(checked_align_up(usize::MAX - 15, 16), Some(usize::MAX - 15));
    }

    #[test]
    fn align_down_rounds_toward_zero() {
        assert_eq!(align_down(31, 16), 16);
        assert_eq!(align_down(32, 16), 32);
    }

    #[test]
    fn power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(1 << 40));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(6));
    }

    #[test]
    fn align_ptr_stays_in_buffer() {
        let mut buf = [0u8; 64];
        let base = buf.as_mut_ptr();
        let unaligned = base.wrapping_add(1);
        let aligned = align_ptr(unaligned, 16);
        assert!(is_aligned_ptr(aligned, 16));
        assert!(aligned.addr() >= unaligned.addr());
        assert!(aligned.addr() - unaligned.addr() < 16);
    }

    #[test]
    fn layout_for_validates_alignment() {
        assert!(layout_for(8, 0).unwrap_err().is_invalid_alignment());
        assert!(layout_for(8, 24).unwrap_err().is_invalid_alignment());
        assert!(layout_for(usize::MAX, 8).is_err());
        assert_eq!(layout_for(0, 1).unwrap().size(), 0);
    }

    #[test]
    fn memory_ops() {
        let mut a = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let b = [0u8; 8];
        unsafe {
            // Overlapping move: shift left by two.
            copy(a.as_mut_ptr(), a.as_ptr().add(2), 6);
            assert_eq!(a, [3, 4, 5, 6, 7, 8, 7, 8]);

            set(a.as_mut_ptr(), 0xAB, 4);
            assert_eq!(&a[..4], &[0xAB; 4]);

            zero(a.as_mut_ptr(), a.len());
            assert!(equal(a.as_ptr(), b.as_ptr(), 8));

            let mut c = [0u8; 8];
            copy_nonoverlapping(c.as_mut_ptr(), [9u8; 8].as_ptr(), 8);
            assert_eq!(compare(b.as_ptr(), c.as_ptr(), 8), Ordering::Less);
            assert_eq!(compare(c.as_ptr(), b.as_ptr(), 0), Ordering::Equal);
        }
    }
}
