use cubeport_layout::{ARAM_ALLOC_FAILED, ARAM_SIZE};
use cubeport_memory::MemoryImage;

use crate::error::{AramError, Result};

/// Stack-disciplined allocator over the 16 MiB audio-RAM bank.
///
/// Audio RAM is not a general heap: allocation carves blocks upward from
/// the base and the only free operation releases the most recent block.
/// The bank itself carries no metadata; the allocator keeps the single
/// cursor plus a host-side LIFO list of block lengths, the counterpart of
/// the stack-index array the original library had callers supply.
pub struct AramAllocator {
    cursor: u32,
    blocks: Vec<u32>,
    strict: bool,
}

impl AramAllocator {
    /// Enables the audio-RAM bank on `image` (idempotent) and returns a
    /// fresh allocator with the cursor at the base.
    pub fn init(image: &mut MemoryImage) -> Self {
        image.enable_aram();
        Self {
            cursor: 0,
            blocks: Vec::new(),
            strict: false,
        }
    }

    /// Like [`init`](Self::init), with strict diagnostics: freeing with no
    /// outstanding allocation panics instead of returning the defined
    /// `(base, 0)`.
    pub fn init_strict(image: &mut MemoryImage) -> Self {
        let mut a = Self::init(image);
        a.strict = true;
        a
    }

    /// Usable base address of the bank.
    pub fn base(&self) -> u32 {
        0
    }

    /// Total capacity of the bank.
    pub fn total_size(&self) -> u32 {
        ARAM_SIZE
    }

    /// Capacity permanently reserved for internal bookkeeping. This
    /// emulation reserves none.
    pub fn internal_size(&self) -> u32 {
        0
    }

    /// Bytes left above the cursor.
    pub fn remaining(&self) -> u32 {
        ARAM_SIZE - self.cursor
    }

    /// Current top-of-stack cursor, relative to the base.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Carves `len` bytes at the cursor.
    pub fn try_alloc(&mut self, len: u32) -> Result<u32> {
        if len > self.remaining() {
            return Err(AramError::Exhausted {
                requested: len,
                remaining: self.remaining(),
            });
        }
        let addr = self.base() + self.cursor;
        self.cursor += len;
        self.blocks.push(len);
        Ok(addr)
    }

    /// Public allocation boundary: returns the block address, or the
    /// contractual `ARAM_ALLOC_FAILED` sentinel when `len` exceeds the
    /// remaining capacity (the cursor is left unchanged).
    pub fn alloc(&mut self, len: u32) -> u32 {
        match self.try_alloc(len) {
            Ok(addr) => addr,
            Err(_) => ARAM_ALLOC_FAILED,
        }
    }

    /// Releases the most recently allocated block (LIFO only) and returns
    /// its `(address, length)`.
    ///
    /// With no outstanding allocation this returns `(base, 0)`; the
    /// original library left that case undefined, so it is pinned down here
    /// and routed through the diagnostic hook.
    pub fn free(&mut self) -> (u32, u32) {
        match self.blocks.pop() {
            Some(len) => {
                self.cursor -= len;
                (self.base() + self.cursor, len)
            }
            None => {
                tracing::warn!("audio-RAM free with no outstanding allocation");
                if self.strict {
                    panic!("aram misuse: free with no outstanding allocation");
                }
                (self.base(), 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubeport_memory::MemoryMode;

    const MIB: u32 = 1024 * 1024;

    fn allocator() -> AramAllocator {
        let mut image = MemoryImage::new(MemoryMode::Base);
        AramAllocator::init(&mut image)
    }

    #[test]
    fn blocks_come_back_in_reverse_allocation_order() {
        let mut aram = allocator();
        let a = aram.alloc(MIB);
        let b = aram.alloc(512 * 1024);
        assert_eq!(a, aram.base());
        assert_eq!(b, aram.base() + MIB);

        assert_eq!(aram.free(), (b, 512 * 1024));
        assert_eq!(aram.free(), (a, MIB));
        assert_eq!(aram.cursor(), 0);
    }

    #[test]
    fn oversized_requests_return_the_sentinel_and_keep_the_cursor() {
        let mut aram = allocator();
        assert_eq!(aram.alloc(17 * MIB), cubeport_layout::ARAM_ALLOC_FAILED);
        assert_eq!(aram.cursor(), 0);

        // A full-capacity request still fits; one byte more does not.
        assert_eq!(aram.alloc(aram.total_size()), aram.base());
        assert_eq!(aram.alloc(1), cubeport_layout::ARAM_ALLOC_FAILED);
    }

    #[test]
    fn free_with_nothing_outstanding_is_defined() {
        let mut aram = allocator();
        assert_eq!(aram.free(), (aram.base(), 0));
    }

    #[test]
    #[should_panic(expected = "aram misuse")]
    fn strict_mode_panics_on_empty_free() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        let mut aram = AramAllocator::init_strict(&mut image);
        let _ = aram.free();
    }

    #[test]
    fn size_queries_report_the_contractual_capacity() {
        let aram = allocator();
        assert_eq!(aram.total_size(), ARAM_SIZE);
        assert_eq!(aram.internal_size(), 0);
        assert_eq!(aram.remaining(), ARAM_SIZE);
    }
}
