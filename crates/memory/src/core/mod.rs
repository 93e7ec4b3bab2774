//! Building blocks shared by the allocators
//!
//! Alignment constants, the usage and reset traits, and the crate-internal
//! owned region and shareable cell.

pub(crate) mod region;
pub(crate) mod sync_cell;
pub mod traits;
pub mod types;

pub(crate) use region::RawRegion;
pub(crate) use sync_cell::SyncUnsafeCell;

pub use traits::{BasicMemoryUsage, MemoryUsage, Resettable};
pub use types::DEFAULT_ALIGN;
