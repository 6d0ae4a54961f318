#![forbid(unsafe_code)]

//! Session wiring for the emulated console runtime.
//!
//! One [`Runtime`] per emulation session: it adopts the constructing host
//! thread as the kernel's boot thread and builds the memory image and the
//! audio-RAM front end around it. Everything is an explicit context object;
//! independent sessions coexist in one process, which keeps tests
//! deterministic and hermetic.

use std::sync::{Arc, Mutex, MutexGuard};

use cubeport_aram::{AramAllocator, AramDma, RequestQueue};
use cubeport_kernel::Kernel;
use cubeport_memory::{MemoryImage, MemoryMode};

/// Audio-RAM subsystem state: the LIFO allocator, the synchronous DMA
/// engine and the request-queue front end.
///
/// Grouped behind one lock because the allocator cursor and the bank it
/// describes must never be mutated concurrently.
pub struct AudioRam {
    pub allocator: AramAllocator,
    pub dma: AramDma,
    pub queue: RequestQueue,
}

/// One emulation session: kernel, memory image and audio-RAM front end.
///
/// The image and audio state sit behind host mutexes: only one emulated
/// thread runs at a time, but emulated threads live on distinct host
/// threads, so shared mutable access still needs a real lock. Nothing in
/// the memory model provides region-level locking, so callers hold the
/// whole-image lock across any compound access.
pub struct Runtime {
    kernel: Kernel,
    image: Arc<Mutex<MemoryImage>>,
    audio: Arc<Mutex<AudioRam>>,
}

impl Runtime {
    pub fn new(mode: MemoryMode) -> Self {
        let mut image = MemoryImage::new(mode);
        let allocator = AramAllocator::init(&mut image);
        tracing::debug!(?mode, "emulation session started");
        Self {
            kernel: Kernel::new(),
            image: Arc::new(Mutex::new(image)),
            audio: Arc::new(Mutex::new(AudioRam {
                allocator,
                dma: AramDma::new(),
                queue: RequestQueue::new(),
            })),
        }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Shared handle to the memory image, for moving into thread entries.
    pub fn image(&self) -> Arc<Mutex<MemoryImage>> {
        Arc::clone(&self.image)
    }

    /// Shared handle to the audio-RAM subsystem.
    pub fn audio(&self) -> Arc<Mutex<AudioRam>> {
        Arc::clone(&self.audio)
    }

    /// Convenience: locks the image for a compound access.
    pub fn lock_image(&self) -> MutexGuard<'_, MemoryImage> {
        self.image.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Convenience: locks the audio subsystem for a compound access.
    pub fn lock_audio(&self) -> MutexGuard<'_, AudioRam> {
        self.audio.lock().unwrap_or_else(|e| e.into_inner())
    }
}
