use cubeport_layout::ARQ_CHUNK_SIZE;
use cubeport_memory::MemoryImage;

use crate::dma::{AramDma, DmaDirection};
use crate::error::Result;

/// Request priority, stored for API compatibility.
///
/// A single-request-at-a-time emulation completes every request before the
/// next can be posted, so priority never influences execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPriority {
    High,
    Low,
}

/// Transfer kind, stored for API compatibility (the original front end
/// distinguished whole-buffer DMA from chunked streaming; this emulation
/// performs every transfer in one synchronous copy either way).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Dma,
    Chunked,
}

/// One queued-DMA request.
///
/// `src` and `dst` follow the transfer direction: for
/// [`DmaDirection::MainToAram`] the source is a main-memory virtual address
/// and the destination an audio-RAM offset; for
/// [`DmaDirection::AramToMain`] the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub owner: u32,
    pub priority: RequestPriority,
    pub kind: RequestKind,
    pub direction: DmaDirection,
    pub src: u32,
    pub dst: u32,
    pub len: u32,
}

/// Queued-DMA front end.
///
/// Despite the name there is never more than one request in flight: posting
/// executes the transfer immediately and synchronously, and the completion
/// callback runs exactly once before [`RequestQueue::post`] returns. The
/// exclusive borrows of the image and queue are what serialize concurrent
/// logical callers, as the cursor and backing store require.
pub struct RequestQueue {
    completed: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self { completed: 0 }
    }

    /// Nominal chunk size, reported for compatibility; transfers are never
    /// actually fragmented.
    pub fn chunk_size(&self) -> u32 {
        ARQ_CHUNK_SIZE
    }

    /// Number of requests completed so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Executes `request` and invokes `callback` with it exactly once
    /// before returning. A transfer that fails validation returns the error
    /// without running the callback or moving bytes.
    pub fn post<F>(
        &mut self,
        image: &mut MemoryImage,
        dma: &mut AramDma,
        request: Request,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(&Request),
    {
        let (main_addr, aram_addr) = match request.direction {
            DmaDirection::MainToAram => (request.src, request.dst),
            DmaDirection::AramToMain => (request.dst, request.src),
        };
        dma.start(image, request.direction, main_addr, aram_addr, request.len)?;
        self.completed += 1;
        callback(&request);
        Ok(())
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AramError;
    use cubeport_memory::MemoryMode;
    use std::cell::Cell;

    fn request(direction: DmaDirection, src: u32, dst: u32, len: u32) -> Request {
        Request {
            owner: 1,
            priority: RequestPriority::High,
            kind: RequestKind::Dma,
            direction,
            src,
            dst,
            len,
        }
    }

    #[test]
    fn callback_runs_exactly_once_before_post_returns() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        image.enable_aram();
        let mut dma = AramDma::new();
        let mut queue = RequestQueue::new();

        image.write_u32(0x100, 0xA1B2_C3D4).unwrap();

        let calls = Cell::new(0u32);
        queue
            .post(
                &mut image,
                &mut dma,
                request(DmaDirection::MainToAram, 0x100, 0x40, 4),
                |req| {
                    assert_eq!(req.len, 4);
                    calls.set(calls.get() + 1);
                },
            )
            .unwrap();

        // `post` already returned, and the callback fired exactly once.
        assert_eq!(calls.get(), 1);
        assert_eq!(queue.completed(), 1);
        assert_eq!(&image.aram().unwrap()[0x40..0x44], &[0xA1, 0xB2, 0xC3, 0xD4]);
    }

    #[test]
    fn failed_requests_do_not_invoke_the_callback() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        image.enable_aram();
        let mut dma = AramDma::new();
        let mut queue = RequestQueue::new();

        let calls = Cell::new(0u32);
        let err = queue.post(
            &mut image,
            &mut dma,
            request(DmaDirection::AramToMain, cubeport_layout::ARAM_SIZE, 0, 8),
            |_| calls.set(calls.get() + 1),
        );
        assert!(matches!(err, Err(AramError::OutOfBounds { .. })));
        assert_eq!(calls.get(), 0);
        assert_eq!(queue.completed(), 0);
    }

    #[test]
    fn chunk_size_is_reported_but_never_fragments() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        image.enable_aram();
        let mut dma = AramDma::new();
        let mut queue = RequestQueue::new();
        assert_eq!(queue.chunk_size(), ARQ_CHUNK_SIZE);

        // Larger than a chunk; still one synchronous copy.
        let len = 3 * ARQ_CHUNK_SIZE + 17;
        let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
        image.write_from(0x2000, &payload).unwrap();
        queue
            .post(
                &mut image,
                &mut dma,
                request(DmaDirection::MainToAram, 0x2000, 0, len),
                |_| {},
            )
            .unwrap();
        assert_eq!(&image.aram().unwrap()[..len as usize], payload.as_slice());
    }
}
