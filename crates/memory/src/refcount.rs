//! Intrusive reference counting
//!
//! An object opts in by embedding a [`RefCount`] header and implementing
//! [`RefCounted`] (usually through [`impl_ref_counted!`](crate::impl_ref_counted)).
//! [`Ref<T>`] is the shared-ownership handle: cloning increments the header,
//! dropping decrements it, and the last drop destroys the object.
//!
//! Because the count lives inside the object, a `Ref` can be rebuilt from a
//! bare pointer ([`Ref::from_raw`]) and projected to another view of the same
//! object, such as a trait object ([`Ref::upcast`]), without a side
//! allocation.
//!
//! The empty handle is `Option<Ref<T>>`; moving out of a slot is
//! `Option::take`.
//!
//! # Examples
//! ```rust
//! use dakt_memory::impl_ref_counted;
//! use dakt_memory::refcount::{make_ref, Ref, RefCount};
//!
//! struct Node {
//!     refs: RefCount,
//!     value: u32,
//! }
//! impl_ref_counted!(Node, refs);
//!
//! let a = make_ref(Node { refs: RefCount::new(), value: 7 });
//! let b = a.clone();
//! assert_eq!(Ref::ref_count(&a), 2);
//! assert!(Ref::ptr_eq(&a, &b));
//! assert_eq!(b.value, 7);
//! ```

use core::cmp::Ordering as CmpOrdering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "logging")]
use tracing::trace;

use crate::core::SyncUnsafeCell;

/// Counts above this abort the process instead of risking wrap-around
const MAX_REFCOUNT: u32 = i32::MAX as u32;

/// Type-erased destructor installed by [`make_ref`]
#[derive(Clone, Copy)]
struct Destroyer {
    object: NonNull<()>,
    destroy: unsafe fn(NonNull<()>),
}

// SAFETY: the object pointer is only dereferenced by the thread that drops
// the last reference, after an AcqRel decrement has ordered every other
// thread's accesses before it.
unsafe impl Send for Destroyer {}

/// Reference-count header embedded in every [`RefCounted`] object
///
/// Starts at 1: the creator owns the first reference.
pub struct RefCount {
    count: AtomicU32,
    destroyer: SyncUnsafeCell<Option<Destroyer>>,
}

impl RefCount {
    /// Creates a header with a count of 1
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(1),
            destroyer: SyncUnsafeCell::new(None),
        }
    }

    /// Increments the count
    #[inline]
    pub fn add_ref(&self) {
        let previous = self.count.fetch_add(1, Ordering::Relaxed);
        if previous > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Current count
    ///
    /// Only a snapshot; other threads may change it immediately.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// # Safety
    /// Must be called before the object is shared with another thread.
    unsafe fn set_destroyer(&self, destroyer: Destroyer) {
        // SAFETY: no other thread can observe the header yet.
        unsafe { *self.destroyer.get() = Some(destroyer) };
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCount").field("count", &self.count()).finish()
    }
}

/// Objects carrying an embedded [`RefCount`]
///
/// # Safety
/// `ref_header` must always return the same header, embedded in `self`, for
/// the whole life of the object. Distinct objects must have distinct headers.
pub unsafe trait RefCounted {
    /// The embedded header
    fn ref_header(&self) -> &RefCount;

    /// Increments the reference count
    #[inline]
    fn add_ref(&self) {
        self.ref_header().add_ref();
    }

    /// Current reference count
    #[inline]
    fn ref_count(&self) -> u32 {
        self.ref_header().count()
    }
}

/// Drops one reference to the object at `ptr`
///
/// On the 1 → 0 transition the destroyer installed by [`make_ref`] runs
/// exactly once. Objects that never went through `make_ref` have no
/// destroyer and are left alone.
///
/// # Safety
/// - `ptr` must point to a live object
/// - the caller must own the reference being released and must not use
///   `ptr` afterwards unless it holds another reference
pub unsafe fn release<T: ?Sized + RefCounted>(ptr: NonNull<T>) {
    // SAFETY: the object is live (caller contract). Only a raw header pointer
    // survives this statement, so no reference outlives a possible destroy.
    let header = ptr::from_ref(unsafe { ptr.as_ref() }.ref_header());
    // SAFETY: forwarded caller contract.
    unsafe { release_header(header) }
}

unsafe fn release_header(header: *const RefCount) {
    // SAFETY: the header is live until the count reaches zero.
    let previous = unsafe { (*header).count.fetch_sub(1, Ordering::AcqRel) };
    debug_assert!(previous != 0, "reference count underflow");
    if previous != 1 {
        return;
    }

    // SAFETY: this thread observed the final decrement, so it is the only one
    // left touching the object; the destroyer slot was written before the
    // object was shared.
    let destroyer = unsafe { *(*header).destroyer.get() };
    match destroyer {
        // SAFETY: installed by make_ref for exactly this object, runs once.
        Some(destroyer) => unsafe { (destroyer.destroy)(destroyer.object) },
        None => {
            #[cfg(feature = "logging")]
            trace!(header = ?header, "last reference released without destroyer");
        }
    }
}

/// Frees a `Box<T>` created by [`make_ref`]
unsafe fn destroy_boxed<T>(object: NonNull<()>) {
    // SAFETY: object came from Box::leak::<T> in make_ref.
    drop(unsafe { Box::from_raw(object.cast::<T>().as_ptr()) });
}

/// Shared-ownership handle to a [`RefCounted`] object
///
/// `Ref` is never null; use `Option<Ref<T>>` for an empty slot. Equality,
/// ordering and hashing compare object addresses, not contents.
pub struct Ref<T: ?Sized + RefCounted> {
    ptr: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: like Arc, handing a Ref to another thread shares T (needs Sync) and
// may drop T there (needs Send).
unsafe impl<T: ?Sized + RefCounted + Send + Sync> Send for Ref<T> {}
// SAFETY: as above; &Ref<T> can be cloned into an owned Ref on another thread.
unsafe impl<T: ?Sized + RefCounted + Send + Sync> Sync for Ref<T> {}

impl<T: RefCounted> Ref<T> {
    /// Same as [`make_ref`]
    pub fn new(value: T) -> Self {
        make_ref(value)
    }
}

impl<T: ?Sized + RefCounted> Ref<T> {
    /// Current reference count of the object
    #[inline]
    pub fn ref_count(this: &Self) -> u32 {
        this.ref_header().count()
    }

    /// Whether two handles point to the same object
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        ptr::addr_eq(this.ptr.as_ptr(), other.ptr.as_ptr())
    }

    /// Raw pointer to the object, valid while any reference is held
    #[inline]
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    /// Gives up the handle without releasing its reference
    ///
    /// Rebuild it with `Ref::from_raw(ptr, false)` to avoid a leak.
    pub fn into_raw(this: Self) -> NonNull<T> {
        let this = ManuallyDrop::new(this);
        this.ptr
    }

    /// Wraps a raw object pointer
    ///
    /// With `add_ref` the handle takes a new reference; without it, the handle
    /// adopts one the caller already owns (e.g. from [`Ref::into_raw`]).
    ///
    /// # Safety
    /// `ptr` must point to a live `RefCounted` object, and when `add_ref` is
    /// `false` the caller must own a reference it has not released.
    pub unsafe fn from_raw(ptr: NonNull<T>, add_ref: bool) -> Self {
        if add_ref {
            // SAFETY: ptr is live (caller contract).
            unsafe { ptr.as_ref() }.add_ref();
        }
        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// Takes a new reference to another view of the same object
    ///
    /// `project` maps the object to the target view, typically an unsizing
    /// cast such as `|node| node as &dyn Shape`. Returns `None` if the
    /// projected value does not share this object's header.
    ///
    /// ```rust
    /// use dakt_memory::impl_ref_counted;
    /// use dakt_memory::refcount::{make_ref, Ref, RefCount, RefCounted};
    ///
    /// trait Shape: RefCounted {
    ///     fn area(&self) -> f64;
    /// }
    ///
    /// struct Square {
    ///     refs: RefCount,
    ///     side: f64,
    /// }
    /// impl_ref_counted!(Square, refs);
    /// impl Shape for Square {
    ///     fn area(&self) -> f64 {
    ///         self.side * self.side
    ///     }
    /// }
    ///
    /// let square = make_ref(Square { refs: RefCount::new(), side: 3.0 });
    /// let shape: Ref<dyn Shape> = Ref::upcast(&square, |s| s as &dyn Shape).unwrap();
    /// assert_eq!(shape.area(), 9.0);
    /// assert_eq!(Ref::ref_count(&square), 2);
    /// ```
    pub fn upcast<U: ?Sized + RefCounted>(this: &Self, project: impl FnOnce(&T) -> &U) -> Option<Ref<U>> {
        let source: &T = this;
        let target = project(source);
        if !ptr::eq(source.ref_header(), target.ref_header()) {
            return None;
        }
        target.add_ref();
        Some(Ref {
            ptr: NonNull::from(target),
            _owns: PhantomData,
        })
    }
}

/// Moves `value` to the heap and returns the first reference to it
///
/// The header must be fresh (count 1); the returned handle owns that
/// reference, so the count stays 1.
pub fn make_ref<T: RefCounted>(value: T) -> Ref<T> {
    let ptr = NonNull::from(Box::leak(Box::new(value)));
    // SAFETY: ptr was just leaked from a Box and is not shared yet.
    let header = unsafe { ptr.as_ref() }.ref_header();
    debug_assert_eq!(header.count(), 1, "make_ref expects a fresh RefCount");

    // SAFETY: the object has not been published to any other thread.
    unsafe {
        header.set_destroyer(Destroyer {
            object: ptr.cast(),
            destroy: destroy_boxed::<T>,
        });
    }

    Ref {
        ptr,
        _owns: PhantomData,
    }
}

impl<T: ?Sized + RefCounted> Clone for Ref<T> {
    fn clone(&self) -> Self {
        self.ref_header().add_ref();
        Self {
            ptr: self.ptr,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized + RefCounted> Drop for Ref<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference and is never used again.
        unsafe { release(self.ptr) };
    }
}

impl<T: ?Sized + RefCounted> Deref for Ref<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the handle keeps the object alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized + RefCounted> AsRef<T> for Ref<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized + RefCounted> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized + RefCounted> Eq for Ref<T> {}

impl<T: ?Sized + RefCounted> PartialOrd for Ref<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized + RefCounted> Ord for Ref<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.ptr
            .as_ptr()
            .cast::<()>()
            .cmp(&other.ptr.as_ptr().cast::<()>())
    }
}

impl<T: ?Sized + RefCounted> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.as_ptr().cast::<()>().hash(state);
    }
}

impl<T: ?Sized + RefCounted + fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + RefCounted + fmt::Display> fmt::Display for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized + RefCounted> fmt::Pointer for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Self::as_ptr(self), f)
    }
}
