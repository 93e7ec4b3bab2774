//! `GlobalAlloc` bridge for crate allocators
//!
//! [`AllocatorAdapter`] lets any [`Allocator`] back APIs that expect the
//! standard `GlobalAlloc` interface, including `#[global_allocator]` when the
//! wrapped allocator is a `static` [`HeapAllocator`](super::HeapAllocator).

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

use super::Allocator;

/// Borrowing `GlobalAlloc` view of an [`Allocator`]
///
/// Two adapters compare equal when they wrap the same allocator instance,
/// i.e. when memory from one may be released through the other.
///
/// # Examples
/// ```rust
/// use dakt_memory::allocator::{AllocatorAdapter, HeapAllocator};
///
/// static HEAP: HeapAllocator = HeapAllocator::new();
/// static ADAPTER: AllocatorAdapter<'static, HeapAllocator> = AllocatorAdapter::new(&HEAP);
///
/// assert_eq!(ADAPTER, AllocatorAdapter::new(&HEAP));
/// ```
pub struct AllocatorAdapter<'a, A: ?Sized + Allocator> {
    allocator: &'a A,
}

impl<'a, A: ?Sized + Allocator> AllocatorAdapter<'a, A> {
    /// Wraps a borrowed allocator
    pub const fn new(allocator: &'a A) -> Self {
        Self { allocator }
    }

    /// The wrapped allocator
    pub fn allocator(&self) -> &'a A {
        self.allocator
    }
}

impl<A: ?Sized + Allocator> Clone for AllocatorAdapter<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: ?Sized + Allocator> Copy for AllocatorAdapter<'_, A> {}

impl<A: ?Sized + Allocator> PartialEq for AllocatorAdapter<'_, A> {
    fn eq(&self, other: &Self) -> bool {
        ptr::addr_eq(self.allocator, other.allocator)
    }
}

impl<A: ?Sized + Allocator> Eq for AllocatorAdapter<'_, A> {}

impl<A: ?Sized + Allocator> core::fmt::Debug for AllocatorAdapter<'_, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AllocatorAdapter")
            .field("allocator", &ptr::from_ref(self.allocator).cast::<()>())
            .finish()
    }
}

// SAFETY: GlobalAlloc impl wraps Allocator trait.
// - Null returned on allocation failure (GlobalAlloc contract)
// - dealloc/realloc receive pointers this adapter handed out, so the
//   Allocator release contracts hold
unsafe impl<A: ?Sized + Allocator> GlobalAlloc for AllocatorAdapter<'_, A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match self.allocator.allocate(layout) {
            Ok(block) => block.cast::<u8>().as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        let ptr = unsafe { self.alloc(layout) };
        if !ptr.is_null() {
            // SAFETY: ptr is valid for layout.size() bytes.
            unsafe { ptr::write_bytes(ptr, 0, layout.size()) };
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            // SAFETY: ptr came from this adapter's alloc with layout.
            unsafe { self.allocator.deallocate(ptr, layout) };
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let Ok(new_layout) = Layout::from_size_align(new_size, layout.align()) else {
            return ptr::null_mut();
        };

        // SAFETY: ptr/layout describe a live allocation of this adapter and
        // new_size is non-zero (GlobalAlloc::realloc contract).
        match unsafe { self.allocator.reallocate(NonNull::new(ptr), layout, new_layout) } {
            Ok(Some(block)) => block.cast::<u8>().as_ptr(),
            Ok(None) | Err(_) => ptr::null_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{ArenaAllocator, HeapAllocator};

    #[test]
    fn alloc_and_realloc_through_global_alloc() {
        let heap = HeapAllocator::new();
        let adapter = AllocatorAdapter::new(&heap);
        let layout = Layout::from_size_align(8, 8).unwrap();

        unsafe {
            let ptr = adapter.alloc_zeroed(layout);
            assert!(!ptr.is_null());
            assert_eq!(*ptr.cast::<u64>(), 0);
            ptr.cast::<u64>().write(7);

            let grown = adapter.realloc(ptr, layout, 64);
            assert!(!grown.is_null());
            assert_eq!(*grown.cast::<u64>(), 7);
            adapter.dealloc(grown, Layout::from_size_align(64, 8).unwrap());
        }
    }

    #[test]
    fn failures_become_null() {
        let arena = ArenaAllocator::new(16).unwrap();
        let adapter = AllocatorAdapter::new(&arena);
        unsafe {
            assert!(adapter.alloc(Layout::from_size_align(32, 8).unwrap()).is_null());
        }
    }

    #[test]
    fn equality_is_instance_identity() {
        let a = HeapAllocator::new();
        let b = HeapAllocator::new();
        assert_eq!(AllocatorAdapter::new(&a), AllocatorAdapter::new(&a));
        assert_ne!(AllocatorAdapter::new(&a), AllocatorAdapter::new(&b));
    }

    #[test]
    fn adapter_works_over_trait_objects() {
        let heap = HeapAllocator::new();
        let dynamic: &dyn Allocator = &heap;
        let adapter = AllocatorAdapter::new(dynamic);
        let layout = Layout::new::<u32>();
        unsafe {
            let ptr = adapter.alloc(layout);
            assert!(!ptr.is_null());
            adapter.dealloc(ptr, layout);
        }
    }
}
