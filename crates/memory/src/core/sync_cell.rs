//! `UnsafeCell` that may be shared between threads.
//!
//! Holds the destroyer slot of a reference-count header: written once before
//! the object is published, read once by the thread that drops the last
//! reference. Neither access races, so the header can stay `Sync`.

use core::cell::UnsafeCell;

#[repr(transparent)]
pub(crate) struct SyncUnsafeCell<T: ?Sized>(UnsafeCell<T>);

// SAFETY: callers order every access (write before publication, read after
// the final AcqRel decrement); T: Send lets that read happen on any thread.
unsafe impl<T: ?Sized + Send> Sync for SyncUnsafeCell<T> {}

impl<T> SyncUnsafeCell<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }
}

impl<T: ?Sized> SyncUnsafeCell<T> {
    /// Raw pointer to the value; dereferencing it is on the caller
    #[inline]
    pub(crate) const fn get(&self) -> *mut T {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let slot = SyncUnsafeCell::new(Some(7_u32));
        unsafe {
            assert_eq!(*slot.get(), Some(7));
            *slot.get() = None;
            assert_eq!(*slot.get(), None);
        }
    }

    #[test]
    fn shareable_when_value_is_send() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncUnsafeCell<Option<u64>>>();
    }
}
