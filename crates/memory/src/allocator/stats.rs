//! Allocator statistics tracking
//!
//! [`MemoryStats`] is a lock-free counter block that heap allocators report
//! into; [`MemoryStatsSnapshot`] is its plain-data view.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Point-in-time copy of [`MemoryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStatsSnapshot {
    /// Successful allocations since creation or the last reset
    pub total_allocations: usize,
    /// Deallocations since creation or the last reset
    pub total_deallocations: usize,
    /// Allocations not yet released
    pub current_allocations: usize,
    /// Cumulative bytes handed out
    pub total_bytes_allocated: usize,
    /// Bytes currently live
    pub current_bytes_allocated: usize,
    /// High-water mark of `current_bytes_allocated`
    pub peak_bytes_allocated: usize,
    /// Allocation requests that returned an error
    pub failed_allocations: usize,
}

impl MemoryStatsSnapshot {
    /// Calculate the average allocation size
    pub fn average_allocation_size(&self) -> Option<f64> {
        if self.total_allocations > 0 {
            Some(self.total_bytes_allocated as f64 / self.total_allocations as f64)
        } else {
            None
        }
    }

    /// Check if there are any live allocations
    pub fn has_live_allocations(&self) -> bool {
        self.current_allocations > 0
    }
}

impl core::fmt::Display for MemoryStatsSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Memory Statistics:")?;
        writeln!(f, "  Current allocated: {} bytes", self.current_bytes_allocated)?;
        writeln!(f, "  Peak allocated: {} bytes", self.peak_bytes_allocated)?;
        writeln!(f, "  Live allocations: {}", self.current_allocations)?;
        writeln!(f, "  Allocations: {}", self.total_allocations)?;
        writeln!(f, "  Deallocations: {}", self.total_deallocations)?;
        writeln!(f, "  Failed allocations: {}", self.failed_allocations)?;

        if let Some(avg) = self.average_allocation_size() {
            writeln!(f, "  Average allocation size: {avg:.2} bytes")?;
        }

        Ok(())
    }
}

/// Thread-safe allocation counters
#[derive(Debug, Default)]
pub struct MemoryStats {
    total_allocations: AtomicUsize,
    total_deallocations: AtomicUsize,
    current_allocations: AtomicUsize,
    total_bytes_allocated: AtomicUsize,
    current_bytes_allocated: AtomicUsize,
    peak_bytes_allocated: AtomicUsize,
    failed_allocations: AtomicUsize,
}

impl MemoryStats {
    /// Creates a new zeroed counter block
    pub const fn new() -> Self {
        Self {
            total_allocations: AtomicUsize::new(0),
            total_deallocations: AtomicUsize::new(0),
            current_allocations: AtomicUsize::new(0),
            total_bytes_allocated: AtomicUsize::new(0),
            current_bytes_allocated: AtomicUsize::new(0),
            peak_bytes_allocated: AtomicUsize::new(0),
            failed_allocations: AtomicUsize::new(0),
        }
    }

    /// Record a successful allocation of `size` bytes
    pub fn record_allocation(&self, size: usize) {
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        self.current_allocations.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_allocated.fetch_add(size, Ordering::Relaxed);
        let current = self
            .current_bytes_allocated
            .fetch_add(size, Ordering::Relaxed)
            .saturating_add(size);

        // Update peak if necessary (using compare_exchange loop for accuracy)
        let mut peak = self.peak_bytes_allocated.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_bytes_allocated.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    /// Record the release of an allocation of `size` bytes
    pub fn record_deallocation(&self, size: usize) {
        self.total_deallocations.fetch_add(1, Ordering::Relaxed);
        // Saturating: a reset between allocate and deallocate must not wrap.
        let _ = self
            .current_allocations
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
        let _ = self
            .current_bytes_allocated
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(size))
            });
    }

    /// Record a failed allocation request
    pub fn record_failure(&self) {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of every counter
    ///
    /// Counters are read individually, so a snapshot taken while other
    /// threads allocate may mix values from neighbouring instants.
    pub fn snapshot(&self) -> MemoryStatsSnapshot {
        MemoryStatsSnapshot {
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_deallocations: self.total_deallocations.load(Ordering::Relaxed),
            current_allocations: self.current_allocations.load(Ordering::Relaxed),
            total_bytes_allocated: self.total_bytes_allocated.load(Ordering::Relaxed),
            current_bytes_allocated: self.current_bytes_allocated.load(Ordering::Relaxed),
            peak_bytes_allocated: self.peak_bytes_allocated.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics to zero
    pub fn reset(&self) {
        self.total_allocations.store(0, Ordering::Relaxed);
        self.total_deallocations.store(0, Ordering::Relaxed);
        self.current_allocations.store(0, Ordering::Relaxed);
        self.total_bytes_allocated.store(0, Ordering::Relaxed);
        self.current_bytes_allocated.store(0, Ordering::Relaxed);
        self.peak_bytes_allocated.store(0, Ordering::Relaxed);
        self.failed_allocations.store(0, Ordering::Relaxed);
    }
}

/// Process-wide statistics shared by the default heap allocator
pub fn global_stats() -> &'static Arc<MemoryStats> {
    static GLOBAL: OnceLock<Arc<MemoryStats>> = OnceLock::new();
    GLOBAL.get_or_init(|| Arc::new(MemoryStats::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_and_snapshots() {
        let stats = MemoryStats::new();
        stats.record_allocation(100);
        stats.record_allocation(300);
        stats.record_deallocation(100);
        stats.record_failure();

        assert_eq!(
            stats.snapshot(),
            MemoryStatsSnapshot {
                total_allocations: 2,
                total_deallocations: 1,
                current_allocations: 1,
                total_bytes_allocated: 400,
                current_bytes_allocated: 300,
                peak_bytes_allocated: 400,
                failed_allocations: 1,
            }
        );
    }

    #[test]
    fn peak_survives_deallocation() {
        let stats = MemoryStats::new();
        stats.record_allocation(64);
        stats.record_deallocation(64);
        stats.record_allocation(32);

        let snap = stats.snapshot();
        assert_eq!(snap.peak_bytes_allocated, 64);
        assert_eq!(snap.current_bytes_allocated, 32);
        assert_eq!(snap.average_allocation_size(), Some(48.0));
        assert!(snap.has_live_allocations());
    }

    #[test]
    fn reset_zeroes_everything() {
        let stats = MemoryStats::new();
        stats.record_allocation(8);
        stats.reset();
        assert_eq!(stats.snapshot(), MemoryStatsSnapshot::default());

        // Late deallocation after a reset saturates instead of wrapping.
        stats.record_deallocation(8);
        assert_eq!(stats.snapshot().current_bytes_allocated, 0);
    }

    #[test]
    fn display_mentions_counters() {
        let stats = MemoryStats::new();
        stats.record_allocation(10);
        let text = stats.snapshot().to_string();
        assert!(text.contains("Allocations: 1"));
        assert!(text.contains("Average allocation size: 10.00 bytes"));
    }

    #[test]
    fn concurrent_updates_balance() {
        let stats = Arc::new(MemoryStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_allocation(16);
                        stats.record_deallocation(16);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.total_allocations, 4000);
        assert_eq!(snap.current_allocations, 0);
        assert_eq!(snap.current_bytes_allocated, 0);
        assert!(snap.peak_bytes_allocated >= 16);
    }
}
