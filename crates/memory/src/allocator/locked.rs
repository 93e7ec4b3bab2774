//! Mutex wrapper for sharing single-threaded allocators
//!
//! Arena and pool keep their bookkeeping in `Cell`s and are therefore `!Sync`.
//! [`LockedAllocator`] serializes every call through a `parking_lot::Mutex`
//! so one instance can be used from many threads.
//!
//! Values handed out through `&LockedAllocator` borrow it shared, so anything
//! that invalidates them (reset, replacing the allocator) needs `&mut self`.
//! [`LockedAllocator::lock`] therefore only ever yields `&A`.

use core::alloc::Layout;
use core::fmt;
use core::ops::Deref;
use core::ptr::NonNull;

use parking_lot::{Mutex, MutexGuard};

use super::{AllocResult, Allocator};
use crate::core::Resettable;

/// Thread-safe wrapper over any `Send` allocator
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use core::alloc::Layout;
/// use dakt_memory::allocator::{Allocator, ArenaAllocator, LockedAllocator};
///
/// let arena = Arc::new(LockedAllocator::new(ArenaAllocator::new(4096)?));
/// let worker = {
///     let arena = Arc::clone(&arena);
///     std::thread::spawn(move || arena.allocate(Layout::new::<u64>()).is_ok())
/// };
/// assert!(worker.join().unwrap());
/// assert_eq!(arena.lock().used(), 8);
/// # Ok::<(), dakt_memory::MemoryError>(())
/// ```
///
/// Resetting needs exclusive access, so it cannot run while a value created
/// through the wrapper is alive:
/// ```rust,compile_fail
/// use dakt_memory::allocator::{ArenaAllocator, LockedAllocator, TypedAllocator};
///
/// let mut arena = LockedAllocator::new(ArenaAllocator::new(64)?);
/// let value = arena.create_owned([1u8; 16])?;
/// arena.reset();
/// assert_eq!(value[0], 1);
/// # Ok::<(), dakt_memory::MemoryError>(())
/// ```
///
/// Nor can the lock guard be used to get at the allocator mutably:
/// ```rust,compile_fail
/// use dakt_memory::allocator::{ArenaAllocator, LockedAllocator};
///
/// let arena = LockedAllocator::new(ArenaAllocator::new(64)?);
/// arena.lock().reset();
/// # Ok::<(), dakt_memory::MemoryError>(())
/// ```
#[derive(Debug, Default)]
pub struct LockedAllocator<A> {
    inner: Mutex<A>,
}

impl<A> LockedAllocator<A> {
    /// Wraps `allocator`
    pub const fn new(allocator: A) -> Self {
        Self {
            inner: Mutex::new(allocator),
        }
    }

    /// Locks the allocator for read access to its inherent methods
    ///
    /// The guard derefs to `&A` only; use [`get_mut`](Self::get_mut) or
    /// [`reset`](Self::reset) for anything that needs `&mut A`.
    pub fn lock(&self) -> LockedGuard<'_, A> {
        LockedGuard(self.inner.lock())
    }

    /// Mutable access without locking; the exclusive borrow rules out
    /// values still borrowed from the wrapper
    pub fn get_mut(&mut self) -> &mut A {
        self.inner.get_mut()
    }

    /// Unwraps the allocator
    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }
}

impl<A: Resettable> LockedAllocator<A> {
    /// Resets the wrapped allocator
    pub fn reset(&mut self) {
        self.inner.get_mut().reset();
    }
}

impl<A: Resettable> Resettable for LockedAllocator<A> {
    fn reset(&mut self) {
        self.inner.get_mut().reset();
    }
}

/// Shared view of a locked allocator, returned by [`LockedAllocator::lock`]
///
/// Holds the mutex until dropped.
pub struct LockedGuard<'a, A>(MutexGuard<'a, A>);

impl<A> Deref for LockedGuard<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.0
    }
}

impl<A: fmt::Debug> fmt::Debug for LockedGuard<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// SAFETY: each call runs under the mutex, so the inner allocator sees the
// same serialized sequence of calls a single thread would make.
unsafe impl<A: Allocator> Allocator for LockedAllocator<A> {
    fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        self.inner.lock().allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.lock().deallocate(ptr, layout) }
    }

    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<Option<NonNull<[u8]>>> {
        // One lock for the whole allocate-copy-free sequence.
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.lock().reallocate(ptr, old_layout, new_layout) }
    }

    unsafe fn resize(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.lock().resize(ptr, old_layout, new_layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{ArenaAllocator, PoolAllocator, TypedAllocator};
    use std::sync::Arc;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn wrappers_are_sync() {
        assert_send_sync::<LockedAllocator<ArenaAllocator<'static>>>();
        assert_send_sync::<LockedAllocator<PoolAllocator>>();
    }

    #[test]
    fn pool_shared_across_threads() {
        let pool = Arc::new(LockedAllocator::new(PoolAllocator::new(64, 32).unwrap()));
        let layout = Layout::from_size_align(64, 8).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let block = pool.allocate(layout).unwrap();
                        unsafe { pool.deallocate(block.cast(), layout) };
                    }
                    let kept = pool.allocate(layout).unwrap();
                    kept.cast::<u8>().as_ptr().addr()
                })
            })
            .collect();

        let mut addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        addrs.sort_unstable();
        addrs.dedup();
        assert_eq!(addrs.len(), 4);
        assert_eq!(pool.lock().allocated_count(), 4);
    }

    #[test]
    fn lock_gives_read_access_and_reset_needs_exclusive_borrow() {
        let mut arena = LockedAllocator::new(ArenaAllocator::new(128).unwrap());
        arena.allocate(Layout::new::<[u8; 32]>()).unwrap();
        assert_eq!(arena.lock().used(), 32);

        arena.reset();
        assert_eq!(arena.lock().used(), 0);
        assert_eq!(arena.get_mut().remaining(), 128);
        assert_eq!(arena.into_inner().used(), 0);
    }

    #[test]
    fn live_arena_value_is_not_reused() {
        let mut arena = LockedAllocator::new(ArenaAllocator::new(64).unwrap());
        {
            let first = arena.create_owned([1u8; 16]).unwrap();
            let mut second = arena.create_owned([2u8; 16]).unwrap();
            second[0] = 9;
            assert_ne!(first.as_ptr().cast::<u8>(), second.as_ptr().cast::<u8>());
            assert_eq!(*first, [1u8; 16]);
        }

        // Guards are gone, so the exclusive reset is allowed again.
        Resettable::reset(&mut arena);
        assert_eq!(arena.lock().used(), 0);
    }

    #[test]
    fn live_pool_value_survives_other_allocations() {
        let mut pool = LockedAllocator::new(PoolAllocator::for_type::<u64>(2).unwrap());
        {
            let first = pool.create_owned(7u64).unwrap();
            let second = pool.create_owned(99u64).unwrap();
            assert_eq!(*first, 7);
            assert_eq!(*second, 99);
            assert!(pool.lock().is_exhausted());
        }
        assert_eq!(pool.lock().free_count(), 2);

        pool.reset();
        assert_eq!(pool.get_mut().allocated_count(), 0);
    }
}
