//! Base traits shared by the allocators
//!
//! - `MemoryUsage` reports how much of a fixed-capacity allocator is in use
//! - `Resettable` reclaims every allocation at once

/// Memory usage reporting for allocators with a known capacity
pub trait MemoryUsage {
    /// Get currently used memory in bytes
    fn used_memory(&self) -> usize;

    /// Get available memory in bytes (if known)
    fn available_memory(&self) -> Option<usize>;

    /// Get total memory capacity in bytes (if known)
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Returns memory usage as a percentage (0.0 to 100.0)
    ///
    /// Returns `None` if total memory is unknown.
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }

    /// Checks if memory usage is above the specified percentage threshold
    fn is_memory_pressure(&self, threshold_percent: f32) -> Option<bool> {
        self.memory_usage_percent()
            .map(|usage| usage >= threshold_percent)
    }

    /// Returns a snapshot of the usage figures
    fn memory_usage(&self) -> BasicMemoryUsage {
        BasicMemoryUsage {
            used: self.used_memory(),
            available: self.available_memory(),
            total: self.total_memory(),
            usage_percent: self.memory_usage_percent(),
        }
    }
}

/// Basic memory usage information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicMemoryUsage {
    /// Currently used memory in bytes
    pub used: usize,
    /// Available memory in bytes (None if unlimited)
    pub available: Option<usize>,
    /// Total memory capacity in bytes (None if unlimited)
    pub total: Option<usize>,
    /// Usage percentage (None if total is unknown)
    pub usage_percent: Option<f32>,
}

/// Allocators that can release every allocation at once
pub trait Resettable {
    /// Reset allocator to initial state
    ///
    /// `&mut self` guarantees no guard or reference borrowed from the
    /// allocator is alive. Raw pointers handed out before the reset dangle
    /// afterwards and must not be dereferenced.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        used: usize,
        cap: usize,
    }

    impl MemoryUsage for Fixed {
        fn used_memory(&self) -> usize {
            self.used
        }

        fn available_memory(&self) -> Option<usize> {
            Some(self.cap - self.used)
        }
    }

    #[test]
    fn usage_percent_and_pressure() {
        let fixed = Fixed { used: 48, cap: 64 };
        let usage = fixed.memory_usage();
        assert_eq!(usage.total, Some(64));
        assert_eq!(usage.usage_percent, Some(75.0));
        assert_eq!(fixed.is_memory_pressure(70.0), Some(true));
        assert_eq!(fixed.is_memory_pressure(80.0), Some(false));
    }

    #[test]
    fn empty_capacity_reports_zero_percent() {
        let fixed = Fixed { used: 0, cap: 0 };
        assert_eq!(fixed.memory_usage_percent(), Some(0.0));
    }
}
