//! Alignment constants shared by the allocators

pub mod alignment {
    /// Alignment of `max_align_t` on mainstream 64-bit targets; owned arena
    /// regions start on it
    pub const DEFAULT_ALIGN: usize = 16;

    /// Floor for the alignment of any owned region
    pub const MIN_ALIGN: usize = align_of::<usize>();
}

pub use alignment::DEFAULT_ALIGN;
