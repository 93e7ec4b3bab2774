//! Public macros for dakt-memory

/// Implement [`RefCounted`](crate::refcount::RefCounted) for a type that
/// embeds a [`RefCount`](crate::refcount::RefCount) field
///
/// # Examples
/// ```
/// use dakt_memory::impl_ref_counted;
/// use dakt_memory::refcount::{make_ref, Ref, RefCount};
///
/// struct Texture {
///     refs: RefCount,
///     width: u32,
/// }
/// impl_ref_counted!(Texture, refs);
///
/// struct Slot<T> {
///     refs: RefCount,
///     value: T,
/// }
/// impl_ref_counted!([T] Slot<T>, refs);
///
/// let texture = make_ref(Texture { refs: RefCount::new(), width: 64 });
/// let slot = make_ref(Slot { refs: RefCount::new(), value: "a" });
/// assert_eq!(Ref::ref_count(&texture) + Ref::ref_count(&slot), 2);
/// assert_eq!((texture.width, slot.value), (64, "a"));
/// ```
#[macro_export]
macro_rules! impl_ref_counted {
    ([$($generics:tt)*] $ty:ty, $field:ident) => {
        // SAFETY: the header is a field of `self`, so it is unique per object
        // and stable for the object's lifetime.
        unsafe impl<$($generics)*> $crate::refcount::RefCounted for $ty {
            #[inline]
            fn ref_header(&self) -> &$crate::refcount::RefCount {
                &self.$field
            }
        }
    };

    ($ty:ty, $field:ident) => {
        $crate::impl_ref_counted!([] $ty, $field);
    };
}
