//! Integration tests for the pool allocator

use std::alloc::Layout;
use std::collections::HashSet;

use dakt_memory::MemoryError;
use dakt_memory::allocator::{Allocator, PoolAllocator, PoolConfig, TypedAllocator};
use dakt_memory::core::traits::{MemoryUsage, Resettable};
use pretty_assertions::assert_eq;

#[test]
fn test_pool_scenario_four_blocks() {
    let pool = PoolAllocator::new(16, 4).expect("Failed to create pool");
    let layout = Layout::from_size_align(16, 1).unwrap();

    let blocks: Vec<_> = (0..4)
        .map(|_| pool.allocate(layout).expect("block available").cast::<u8>())
        .collect();
    let distinct: HashSet<_> = blocks.iter().map(|b| b.as_ptr().addr()).collect();
    assert_eq!(distinct.len(), 4);

    let err = pool.allocate(layout).unwrap_err();
    assert_eq!(
        err,
        MemoryError::PoolExhausted {
            block_size: 16,
            block_count: 4
        }
    );

    unsafe { pool.deallocate(blocks[1], layout) };
    let reused = pool.allocate(layout).expect("freed block is reusable");
    assert_eq!(reused.cast::<u8>(), blocks[1]);
}

#[test]
fn test_pool_free_count_tracks_operations() {
    let pool = PoolAllocator::with_config(32, 8, 6, PoolConfig::production()).unwrap();
    let layout = Layout::from_size_align(24, 8).unwrap();

    let a = pool.allocate(layout).unwrap();
    let b = pool.allocate(layout).unwrap();
    assert_eq!(pool.free_count(), 4);
    assert_eq!(pool.allocated_count(), 2);

    unsafe { pool.deallocate(a.cast(), layout) };
    assert_eq!(pool.free_count(), 5);

    unsafe { pool.deallocate(b.cast(), layout) };
    assert_eq!(pool.free_count(), 6);
    assert_eq!(pool.used_memory(), 0);
    assert_eq!(pool.available_memory(), Some(6 * 32));
}

#[test]
fn test_pool_lifo_reuse_order() {
    let pool = PoolAllocator::new(8, 3).unwrap();
    let layout = Layout::new::<u64>();

    let first = pool.allocate(layout).unwrap();
    let second = pool.allocate(layout).unwrap();
    unsafe {
        pool.deallocate(first.cast(), layout);
        pool.deallocate(second.cast(), layout);
    }

    // Last freed comes back first.
    assert_eq!(pool.allocate(layout).unwrap().cast::<u8>(), second.cast::<u8>());
    assert_eq!(pool.allocate(layout).unwrap().cast::<u8>(), first.cast::<u8>());
}

#[test]
fn test_pool_oversize_fails_even_when_free() {
    let pool = PoolAllocator::new(64, 2).unwrap();
    assert!(matches!(
        pool.allocate(Layout::from_size_align(65, 1).unwrap()),
        Err(MemoryError::ExceedsMaxSize { size: 65, max_size: 64 })
    ));
    assert_eq!(pool.free_count(), 2);
}

#[test]
fn test_pool_reset_reclaims_all() {
    let mut pool = PoolAllocator::for_type::<u128>(16).unwrap();
    for _ in 0..16 {
        pool.create(0u128).unwrap();
    }
    assert!(pool.is_exhausted());

    Resettable::reset(&mut pool);
    assert_eq!(pool.free_count(), 16);
    assert!(!pool.is_exhausted());
}

#[test]
fn test_pool_typed_objects() {
    #[derive(Debug, PartialEq)]
    struct Particle {
        position: [f32; 3],
        velocity: [f32; 3],
    }

    let pool = PoolAllocator::for_type::<Particle>(4).unwrap();
    let particle = pool
        .create_owned(Particle {
            position: [0.0, 1.0, 2.0],
            velocity: [0.5; 3],
        })
        .unwrap();

    assert_eq!(particle.position[2], 2.0);
    assert!(pool.owns(particle.as_ptr().as_ptr().cast::<u8>()));
    assert_eq!(pool.allocated_count(), 1);
}
