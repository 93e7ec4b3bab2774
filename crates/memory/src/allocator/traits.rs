//! Allocator traits
//!
//! The system is built around two traits:
//! - `Allocator`: raw allocate / deallocate / reallocate over [`Layout`]s
//! - `TypedAllocator`: typed helpers (`create`, `destroy`, arrays) available on
//!   every `Allocator` through a blanket impl
//!
//! # Safety
//!
//! `Allocator` is an unsafe trait: implementors promise that every pointer they
//! hand out is valid for `layout.size()` bytes, aligned to `layout.align()` and
//! disjoint from every other live allocation of the same instance.
//!
//! Release paths are unsafe to call. The allocators do not track sizes, so the
//! caller must pass back the exact layout that produced a pointer. Double
//! frees, foreign pointers and mismatched layouts are undefined behavior
//! unless an allocator documents a debug check for them.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use std::sync::Arc;

use super::{AllocError, AllocResult};

/// Raw memory allocation capability
///
/// # Safety Requirements
///
/// Implementors must ensure that:
/// - Returned pointers are valid for `layout.size()` bytes until deallocated
/// - Memory is aligned according to the layout
/// - Two live allocations never overlap
/// - A failed operation leaves every existing allocation untouched
pub unsafe trait Allocator {
    /// Allocates memory with the given layout
    ///
    /// The returned slice may be longer than requested; its contents are
    /// uninitialized. Allocators are free to reject zero-sized layouts.
    fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Deallocates memory at the given pointer with the specified layout
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator
    /// - `layout` must match the layout used to allocate it
    /// - After this call, `ptr` becomes invalid and must not be used
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Grows or shrinks an existing allocation
    ///
    /// - `ptr == None` behaves as `allocate(new_layout)`
    /// - a zero `new_layout.size()` deallocates `ptr` and returns `Ok(None)`
    /// - otherwise defers to [`Allocator::resize`]
    ///
    /// On `Err` the original allocation is untouched and remains valid.
    ///
    /// # Safety
    /// When `ptr` is `Some`, the same requirements as [`Allocator::deallocate`]
    /// apply to `ptr` and `old_layout`.
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<Option<NonNull<[u8]>>> {
        let Some(ptr) = ptr else {
            return self.allocate(new_layout).map(Some);
        };

        if new_layout.size() == 0 {
            // SAFETY: ptr/old_layout describe a live allocation (caller contract).
            unsafe { self.deallocate(ptr, old_layout) };
            return Ok(None);
        }

        // SAFETY: forwarded caller contract; new_layout is non-zero-sized.
        unsafe { self.resize(ptr, old_layout, new_layout) }.map(Some)
    }

    /// Moves an allocation to `new_layout`
    ///
    /// The default implementation allocates a new block, copies
    /// `min(old, new)` bytes and only then releases the old block, so a failed
    /// allocation leaves `ptr` valid.
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator with `old_layout`
    /// - `new_layout.size()` must be non-zero
    /// - On success `ptr` must no longer be used unless the returned pointer
    ///   is the same address
    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        let new_ptr = self.allocate(new_layout)?;

        // SAFETY: Copying data from old allocation to new allocation.
        // - ptr is valid for reads of old_layout.size() bytes (caller contract)
        // - new_ptr is valid for writes of new_layout.size() bytes (just allocated)
        // - Regions don't overlap (new allocation is distinct from the live old one)
        unsafe {
            core::ptr::copy_nonoverlapping(
                ptr.as_ptr(),
                new_ptr.cast::<u8>().as_ptr(),
                old_layout.size().min(new_layout.size()),
            );
        }

        // SAFETY: data has been copied out; ptr/old_layout match (caller contract).
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_ptr)
    }
}

// SAFETY: forwarding to `A` preserves every guarantee `A` makes.
unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<Option<NonNull<[u8]>>> {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).reallocate(ptr, old_layout, new_layout) }
    }

    #[inline]
    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).resize(ptr, old_layout, new_layout) }
    }
}

// SAFETY: forwarding to `A` preserves every guarantee `A` makes.
unsafe impl<A: Allocator + ?Sized> Allocator for Arc<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<Option<NonNull<[u8]>>> {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).reallocate(ptr, old_layout, new_layout) }
    }

    #[inline]
    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).resize(ptr, old_layout, new_layout) }
    }
}

/// Typed helpers on top of [`Allocator`]
///
/// Layouts are derived from `T`, so the size/alignment pair passed back on
/// release always matches the one used on allocation. Zero-sized types and
/// empty arrays never reach the underlying allocator; they are represented by
/// a dangling, well-aligned pointer.
///
/// # Examples
/// ```rust
/// use dakt_memory::prelude::*;
///
/// let arena = ArenaAllocator::new(1024)?;
/// let value = arena.create(42u64)?;
/// unsafe {
///     assert_eq!(*value.as_ptr(), 42);
///     arena.destroy(value);
/// }
/// # Ok::<(), dakt_memory::MemoryError>(())
/// ```
pub trait TypedAllocator: Allocator {
    /// Allocates memory for a `T` and moves `value` into it
    ///
    /// The caller owns the result and must release it with
    /// [`TypedAllocator::destroy`] on the same allocator.
    fn create<T>(&self, value: T) -> AllocResult<NonNull<T>> {
        let layout = Layout::new::<T>();
        if layout.size() == 0 {
            let ptr = NonNull::<T>::dangling();
            // SAFETY: dangling() is aligned and valid for zero-sized writes.
            unsafe { ptr.as_ptr().write(value) };
            return Ok(ptr);
        }

        let ptr = self.allocate(layout)?.cast::<T>();
        // SAFETY: ptr is valid for writes of size_of::<T>() bytes and aligned
        // for T (allocator contract).
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Drops the `T` at `ptr` and releases its memory
    ///
    /// # Safety
    /// - `ptr` must come from [`TypedAllocator::create`] on this allocator
    /// - `ptr` must not be used after this call
    unsafe fn destroy<T>(&self, ptr: NonNull<T>) {
        // SAFETY: ptr holds an initialized T owned by the caller.
        unsafe { core::ptr::drop_in_place(ptr.as_ptr()) };

        let layout = Layout::new::<T>();
        if layout.size() != 0 {
            // SAFETY: same allocator and layout as in `create`.
            unsafe { self.deallocate(ptr.cast(), layout) };
        }
    }

    /// Allocates uninitialized memory for `count` values of `T`
    ///
    /// Returns [`AllocError::SizeOverflow`] if `size_of::<T>() * count` does
    /// not fit in a `Layout`.
    fn allocate_array<T>(&self, count: usize) -> AllocResult<NonNull<T>> {
        let layout =
            Layout::array::<T>(count).map_err(|_| AllocError::size_overflow("array layout"))?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        Ok(self.allocate(layout)?.cast::<T>())
    }

    /// Releases an array from [`TypedAllocator::allocate_array`]
    ///
    /// Elements are not dropped; drop any initialized elements first.
    ///
    /// # Safety
    /// - `ptr` must come from `allocate_array::<T>(count)` on this allocator
    ///   with the same `count`
    unsafe fn deallocate_array<T>(&self, ptr: NonNull<T>, count: usize) {
        // allocate_array succeeded with this count, so the layout is valid.
        if let Ok(layout) = Layout::array::<T>(count) {
            if layout.size() != 0 {
                // SAFETY: same allocator and layout as in `allocate_array`.
                unsafe { self.deallocate(ptr.cast(), layout) };
            }
        }
    }

    /// Safely allocates a value that is dropped and freed with its guard
    ///
    /// # Example
    /// ```rust
    /// use dakt_memory::prelude::*;
    ///
    /// let heap = HeapAllocator::new();
    /// let mut text = heap.create_owned(String::from("hello"))?;
    /// text.push_str(", world");
    /// assert_eq!(&*text, "hello, world");
    /// # Ok::<(), dakt_memory::MemoryError>(())
    /// ```
    fn create_owned<T>(&self, value: T) -> AllocResult<AllocatedValue<'_, T, Self>> {
        let ptr = self.create(value)?;
        Ok(AllocatedValue {
            ptr,
            allocator: self,
            _owns: PhantomData,
        })
    }
}

impl<A: Allocator + ?Sized> TypedAllocator for A {}

/// RAII guard for a value created with [`TypedAllocator::create_owned`]
pub struct AllocatedValue<'a, T, A: Allocator + ?Sized> {
    ptr: NonNull<T>,
    allocator: &'a A,
    _owns: PhantomData<T>,
}

impl<T, A: Allocator + ?Sized> AllocatedValue<'_, T, A> {
    /// Raw pointer to the value; valid while the guard lives
    pub fn as_ptr(&self) -> NonNull<T> {
        self.ptr
    }
}

impl<T, A: Allocator + ?Sized> Deref for AllocatedValue<'_, T, A> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ptr is valid and initialized (from create)
        unsafe { self.ptr.as_ref() }
    }
}

impl<T, A: Allocator + ?Sized> DerefMut for AllocatedValue<'_, T, A> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: ptr is valid, initialized and uniquely owned by the guard
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: core::fmt::Debug, A: Allocator + ?Sized> core::fmt::Debug for AllocatedValue<'_, T, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AllocatedValue").field(&**self).finish()
    }
}

impl<T, A: Allocator + ?Sized> Drop for AllocatedValue<'_, T, A> {
    fn drop(&mut self) {
        // SAFETY: ptr was produced by self.allocator.create and is dropped once
        unsafe { self.allocator.destroy(self.ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HeapAllocator;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn create_and_destroy_runs_destructor_once() {
        let heap = HeapAllocator::new();
        let drops = Rc::new(Cell::new(0));

        let ptr = heap.create(DropCounter(drops.clone())).unwrap();
        assert_eq!(drops.get(), 0);
        unsafe { heap.destroy(ptr) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn zero_sized_values_skip_the_allocator() {
        // The heap rejects zero-sized layouts, so success here proves the
        // allocator was never asked.
        let heap = HeapAllocator::new();
        let unit = heap.create(()).unwrap();
        unsafe { heap.destroy(unit) };

        let empty = heap.allocate_array::<u64>(0).unwrap();
        unsafe { heap.deallocate_array(empty, 0) };
    }

    #[test]
    fn array_roundtrip() {
        let heap = HeapAllocator::new();
        let array = heap.allocate_array::<u32>(16).unwrap();
        unsafe {
            for i in 0..16 {
                array.as_ptr().add(i).write(i as u32 * 3);
            }
            assert_eq!(*array.as_ptr().add(15), 45);
            heap.deallocate_array(array, 16);
        }
    }

    #[test]
    fn array_overflow_is_reported() {
        let heap = HeapAllocator::new();
        let err = heap.allocate_array::<u64>(usize::MAX).unwrap_err();
        assert_eq!(err.code(), "MEM:ALLOC:OVERFLOW");
    }

    #[test]
    fn owned_value_drops_with_guard() {
        let heap = HeapAllocator::new();
        let drops = Rc::new(Cell::new(0));
        {
            let guard = heap.create_owned(DropCounter(drops.clone())).unwrap();
            assert_eq!(guard.0.get(), 0);
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn reallocate_null_and_zero_paths() {
        let heap = HeapAllocator::new();
        let layout = Layout::from_size_align(32, 8).unwrap();

        unsafe {
            let ptr = heap
                .reallocate(None, Layout::new::<()>(), layout)
                .unwrap()
                .expect("null pointer reallocates as allocate");
            assert_eq!(ptr.len(), 32);

            let gone = heap
                .reallocate(Some(ptr.cast()), layout, Layout::from_size_align(0, 8).unwrap())
                .unwrap();
            assert!(gone.is_none());
        }
    }

    #[test]
    fn reference_and_arc_forwarding() {
        fn through<A: Allocator>(alloc: A) {
            let layout = Layout::new::<u64>();
            let ptr = alloc.allocate(layout).unwrap();
            unsafe { alloc.deallocate(ptr.cast(), layout) };
        }

        let heap = HeapAllocator::new();
        through(&heap);
        through(Arc::new(heap));
    }
}
