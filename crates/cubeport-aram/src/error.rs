use cubeport_memory::MemError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AramError>;

/// Errors from the audio-RAM allocator and DMA front end.
///
/// Capacity exhaustion is surfaced as [`AramError::Exhausted`] internally;
/// the public allocation boundary converts it to the contractual
/// `ARAM_ALLOC_FAILED` sentinel instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AramError {
    /// The request exceeds the remaining capacity above the cursor.
    #[error("audio RAM exhausted: requested {requested} with {remaining} remaining")]
    Exhausted { requested: u32, remaining: u32 },

    /// The audio-RAM side of a transfer runs past the end of the bank.
    #[error("audio RAM range out of bounds: offset=0x{offset:08x} len={len}")]
    OutOfBounds { offset: u32, len: u32 },

    /// The main-memory side of a transfer failed translation or bounds.
    #[error(transparent)]
    Mem(#[from] MemError),
}
