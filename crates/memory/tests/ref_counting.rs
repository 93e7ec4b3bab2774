//! Integration tests for intrusive reference counting

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dakt_memory::impl_ref_counted;
use dakt_memory::refcount::{Ref, RefCount, RefCounted, make_ref};

struct Resource {
    refs: RefCount,
    name: String,
    drops: Arc<AtomicUsize>,
}

impl_ref_counted!(Resource, refs);

impl Drop for Resource {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

trait Named: RefCounted {
    fn name(&self) -> &str;
}

impl Named for Resource {
    fn name(&self) -> &str {
        &self.name
    }
}

fn resource(name: &str) -> (Ref<Resource>, Arc<AtomicUsize>) {
    let drops = Arc::new(AtomicUsize::new(0));
    let r = make_ref(Resource {
        refs: RefCount::new(),
        name: name.to_owned(),
        drops: Arc::clone(&drops),
    });
    (r, drops)
}

#[test]
fn test_clones_increment_and_last_drop_destroys() {
    let (r, drops) = resource("texture");
    assert_eq!(Ref::ref_count(&r), 1);

    let clones: Vec<_> = (0..5).map(|_| r.clone()).collect();
    assert_eq!(Ref::ref_count(&r), 6);

    drop(clones);
    assert_eq!(Ref::ref_count(&r), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(r);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_move_keeps_count_and_empties_slot() {
    let (r, _drops) = resource("mesh");
    let mut slot = Some(r);

    let moved = slot.take().unwrap();
    assert!(slot.is_none());
    assert_eq!(Ref::ref_count(&moved), 1);
}

#[test]
fn test_reset_slot_with_raw_pointer() {
    let (a, drops_a) = resource("a");
    let (b, drops_b) = resource("b");
    let raw_b = Ref::into_raw(b);

    let mut slot = Some(a);
    // Replacing acquires the new reference before the old one is released.
    slot = Some(unsafe { Ref::from_raw(raw_b, false) });
    assert_eq!(drops_a.load(Ordering::SeqCst), 1);
    assert_eq!(slot.as_ref().map(|r| r.name.as_str()), Some("b"));

    slot = None;
    assert!(slot.is_none());
    assert_eq!(drops_b.load(Ordering::SeqCst), 1);
}

#[test]
fn test_upcast_to_trait_object() {
    let (r, drops) = resource("shader");
    let named: Ref<dyn Named> = Ref::upcast(&r, |res| res as &dyn Named).unwrap();
    assert_eq!(named.name(), "shader");
    assert_eq!(Ref::ref_count(&r), 2);

    drop(r);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert_eq!(Ref::ref_count(&named), 1);

    // The trait-object handle destroys the concrete object.
    drop(named);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_clone_and_drop_destroys_once() {
    let (r, drops) = resource("shared");

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let local = r.clone();
            scope.spawn(move || {
                for _ in 0..1000 {
                    let c = local.clone();
                    assert!(Ref::ref_count(&c) >= 2);
                }
                drop(local);
            });
        }
    });

    assert_eq!(Ref::ref_count(&r), 1);
    drop(r);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_last_handle_dropped_on_other_thread() {
    let (r, drops) = resource("sent");
    std::thread::spawn(move || drop(r)).join().unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}
