#![forbid(unsafe_code)]

//! Memory image and address translation for the emulated console.
//!
//! One [`MemoryImage`] per session backs main RAM, the optional extended
//! bank, the scratchpad window and (on demand) audio RAM. Cached and
//! uncached virtual mirrors alias the same physical bytes; all sized
//! accessors are big-endian and bounds-checked.

mod error;
mod image;

pub use error::{MemError, Region, Result};
pub use image::{is_scratchpad_address, MemoryImage, MemoryMode};
