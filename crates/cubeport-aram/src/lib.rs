#![forbid(unsafe_code)]

//! Audio-RAM allocator and queued-DMA front end.
//!
//! The 16 MiB audio bank lives in the session's
//! [`MemoryImage`](cubeport_memory::MemoryImage) and is reached only
//! through DMA; the allocator is a pure LIFO stack over it. Hardware
//! asynchrony is deliberately collapsed: every transfer is a synchronous
//! copy and completion callbacks run before the posting call returns.

mod alloc;
mod dma;
mod error;
mod queue;

pub use alloc::AramAllocator;
pub use dma::{AramDma, DmaDirection, DmaStatus};
pub use error::{AramError, Result};
pub use queue::{Request, RequestKind, RequestPriority, RequestQueue};
