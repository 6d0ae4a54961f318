use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemError>;

/// Errors returned by [`MemoryImage`](crate::MemoryImage) accessors.
///
/// The original console library did not bounds-check accesses at all; failing
/// loudly here is a deliberate strengthening so integration bugs in client
/// code surface as errors instead of silent wraparound. All variants are
/// recoverable and reported at the call boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemError {
    /// The address falls in no known window (including the reserved
    /// hardware-register window, which is never backed by data).
    #[error("unmapped address 0x{vaddr:08x}")]
    Unmapped { vaddr: u32 },

    /// The address maps to a region that exists but is not enabled for this
    /// session (extended RAM without extended mode, audio RAM before
    /// `enable_aram`).
    #[error("access to disabled region {region:?} at 0x{vaddr:08x}")]
    RegionDisabled { region: Region, vaddr: u32 },

    /// The access starts inside a region but runs past its end.
    #[error("out of range: 0x{vaddr:08x} len={len} exceeds {region:?} (size 0x{size:x})")]
    OutOfRange { region: Region, vaddr: u32, len: usize, size: u32 },
}

/// Backing region an address resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    MainRam,
    ExtRam,
    Scratchpad,
    AudioRam,
}
