#![forbid(unsafe_code)]

//! Shared address-space and region-size constants for the emulated console.
//!
//! This crate exists so the memory image, the audio-RAM front end and client
//! wiring agree on addresses and sizes that must match exactly at runtime.
//! All of these values are part of the compatibility contract with
//! console-targeted client code and must not change.

/// Size of main RAM (24 MiB).
pub const MAIN_RAM_SIZE: u32 = 24 * 1024 * 1024;

/// Size of extended RAM (64 MiB). Present only when the session is created
/// in extended mode.
pub const EXT_RAM_SIZE: u32 = 64 * 1024 * 1024;

/// Size of audio RAM (16 MiB). Allocated on demand.
pub const ARAM_SIZE: u32 = 16 * 1024 * 1024;

/// Size of the scratchpad ("locked cache") window (16 KiB).
pub const SCRATCHPAD_SIZE: u32 = 16 * 1024;

/// Base of the physical address range.
pub const PHYS_BASE: u32 = 0x0000_0000;

/// Base of the cached mirror of physical memory.
pub const CACHED_BASE: u32 = 0x8000_0000;

/// Base of the uncached mirror of physical memory.
///
/// Cached and uncached addresses with the same offset alias the same
/// physical bytes; no caching behavior is modeled beyond the aliasing.
pub const UNCACHED_BASE: u32 = 0xC000_0000;

/// Base of the scratchpad window.
pub const SCRATCHPAD_BASE: u32 = 0xE000_0000;

/// Base of the hardware-register window.
///
/// Kept for address-space compatibility only; the window is not backed by
/// data and accesses into it fail with an unmapped-address error. Note that
/// it lies numerically inside the uncached mirror range, so address
/// classification must check it before the mirror.
pub const HW_REG_BASE: u32 = 0xCC00_0000;

/// Size of the reserved hardware-register window (16 MiB).
pub const HW_REG_SIZE: u32 = 16 * 1024 * 1024;

/// Physical offset at which extended RAM begins.
///
/// Main RAM covers physical `0..MAIN_RAM_SIZE`; the second bank starts at
/// the console family's conventional 256 MiB mark, leaving a hole between
/// the two that is not backed by anything.
pub const EXT_RAM_PHYS_BASE: u32 = 0x1000_0000;

/// Sentinel returned by the audio-RAM allocator when a request exceeds the
/// remaining capacity. Out of band: no valid block can start here.
pub const ARAM_ALLOC_FAILED: u32 = 0xFFFF_FFFF;

/// Nominal transfer chunk size reported by the audio-RAM request queue.
///
/// Reported for API compatibility; the emulation performs transfers in one
/// synchronous copy and never actually fragments them.
pub const ARQ_CHUNK_SIZE: u32 = 4096;
