use crate::error::{MemError, Region, Result};
use cubeport_layout::{
    ARAM_SIZE, CACHED_BASE, EXT_RAM_PHYS_BASE, EXT_RAM_SIZE, HW_REG_BASE, HW_REG_SIZE,
    MAIN_RAM_SIZE, SCRATCHPAD_BASE, SCRATCHPAD_SIZE, UNCACHED_BASE,
};

/// Memory configuration chosen once per emulation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    /// Main RAM only.
    Base,
    /// Main RAM plus the 64 MiB extended bank.
    Extended,
}

/// Returns true iff `addr` falls inside the scratchpad window.
///
/// Pure range classification: the result does not depend on whether any
/// region is currently enabled (enablement affects whether an *access*
/// succeeds, not how the address is classified).
pub fn is_scratchpad_address(addr: u32) -> bool {
    (SCRATCHPAD_BASE..SCRATCHPAD_BASE + SCRATCHPAD_SIZE).contains(&addr)
}

fn in_hw_reg_window(addr: u32) -> bool {
    (HW_REG_BASE..HW_REG_BASE + HW_REG_SIZE).contains(&addr)
}

/// Unified backing store for the simulated physical memory regions.
///
/// One image is constructed per emulation session and dropped at teardown;
/// dropping it releases every backing buffer, so any [`MemoryImage::view`]
/// borrow naturally cannot outlive the store it aliases.
///
/// All sized accessors are big-endian regardless of host byte order, matching
/// the emulated console. Every access is bounds-checked against the owning
/// region and reported as a [`MemError`] on failure rather than wrapping.
pub struct MemoryImage {
    main: Box<[u8]>,
    ext: Option<Box<[u8]>>,
    aram: Option<Box<[u8]>>,
    scratchpad: Box<[u8]>,
}

impl MemoryImage {
    pub fn new(mode: MemoryMode) -> Self {
        Self {
            main: vec![0u8; MAIN_RAM_SIZE as usize].into_boxed_slice(),
            ext: match mode {
                MemoryMode::Base => None,
                MemoryMode::Extended => Some(vec![0u8; EXT_RAM_SIZE as usize].into_boxed_slice()),
            },
            aram: None,
            scratchpad: vec![0u8; SCRATCHPAD_SIZE as usize].into_boxed_slice(),
        }
    }

    pub fn mode(&self) -> MemoryMode {
        if self.ext.is_some() {
            MemoryMode::Extended
        } else {
            MemoryMode::Base
        }
    }

    /// Allocates the 16 MiB audio-RAM bank if it is not already present.
    /// Idempotent; an already-enabled bank keeps its contents.
    pub fn enable_aram(&mut self) {
        if self.aram.is_none() {
            self.aram = Some(vec![0u8; ARAM_SIZE as usize].into_boxed_slice());
        }
    }

    pub fn aram_enabled(&self) -> bool {
        self.aram.is_some()
    }

    /// Audio-RAM bank, addressed by its own offsets (not part of
    /// [`translate`](Self::translate)); only DMA moves data in or out.
    pub fn aram(&self) -> Result<&[u8]> {
        self.aram.as_deref().ok_or(MemError::RegionDisabled {
            region: Region::AudioRam,
            vaddr: 0,
        })
    }

    pub fn aram_mut(&mut self) -> Result<&mut [u8]> {
        self.aram.as_deref_mut().ok_or(MemError::RegionDisabled {
            region: Region::AudioRam,
            vaddr: 0,
        })
    }

    /// Strips the mirror base from `vaddr` and returns the backing offset.
    ///
    /// Cached and uncached mirrors of the same physical offset translate to
    /// the identical backing offset; scratchpad addresses translate to their
    /// offset within the scratchpad window. The hardware-register window and
    /// anything above the scratchpad window are unmapped. Translation is
    /// purely arithmetic: whether the resulting offset is actually backed is
    /// decided at access time.
    pub fn translate(&self, vaddr: u32) -> Result<u32> {
        if is_scratchpad_address(vaddr) {
            Ok(vaddr - SCRATCHPAD_BASE)
        } else if in_hw_reg_window(vaddr) {
            Err(MemError::Unmapped { vaddr })
        } else if vaddr >= SCRATCHPAD_BASE {
            Err(MemError::Unmapped { vaddr })
        } else if vaddr >= UNCACHED_BASE {
            Ok(vaddr - UNCACHED_BASE)
        } else if vaddr >= CACHED_BASE {
            Ok(vaddr - CACHED_BASE)
        } else {
            Ok(vaddr)
        }
    }

    /// Resolves `vaddr..vaddr+len` to a backing region and offset, rejecting
    /// accesses that fall in a hole, a disabled region, or run past the end
    /// of the region they start in.
    fn resolve(&self, vaddr: u32, len: usize) -> Result<(Region, usize)> {
        if is_scratchpad_address(vaddr) {
            let off = vaddr - SCRATCHPAD_BASE;
            check_len(Region::Scratchpad, vaddr, off, len, SCRATCHPAD_SIZE)?;
            return Ok((Region::Scratchpad, off as usize));
        }
        let phys = self.translate(vaddr)?;
        if phys < MAIN_RAM_SIZE {
            check_len(Region::MainRam, vaddr, phys, len, MAIN_RAM_SIZE)?;
            return Ok((Region::MainRam, phys as usize));
        }
        if (EXT_RAM_PHYS_BASE..EXT_RAM_PHYS_BASE + EXT_RAM_SIZE).contains(&phys) {
            if self.ext.is_none() {
                return Err(MemError::RegionDisabled {
                    region: Region::ExtRam,
                    vaddr,
                });
            }
            let off = phys - EXT_RAM_PHYS_BASE;
            check_len(Region::ExtRam, vaddr, off, len, EXT_RAM_SIZE)?;
            return Ok((Region::ExtRam, off as usize));
        }
        Err(MemError::Unmapped { vaddr })
    }

    fn region(&self, region: Region) -> &[u8] {
        match region {
            Region::MainRam => &self.main,
            // `resolve` never yields a disabled region.
            Region::ExtRam => self.ext.as_deref().unwrap_or(&[]),
            Region::Scratchpad => &self.scratchpad,
            Region::AudioRam => self.aram.as_deref().unwrap_or(&[]),
        }
    }

    fn region_mut(&mut self, region: Region) -> &mut [u8] {
        match region {
            Region::MainRam => &mut self.main,
            Region::ExtRam => self.ext.as_deref_mut().unwrap_or(&mut []),
            Region::Scratchpad => &mut self.scratchpad,
            Region::AudioRam => self.aram.as_deref_mut().unwrap_or(&mut []),
        }
    }

    /// Bounds-described immutable view into the backing store.
    ///
    /// This replaces a raw aliasing pointer: zero-copy access with the bounds
    /// established up front, and a lifetime the borrow checker ties to the
    /// image so the view cannot outlive a teardown.
    pub fn view(&self, vaddr: u32, len: usize) -> Result<&[u8]> {
        let (region, off) = self.resolve(vaddr, len)?;
        Ok(&self.region(region)[off..off + len])
    }

    /// Bounds-described mutable view into the backing store.
    pub fn view_mut(&mut self, vaddr: u32, len: usize) -> Result<&mut [u8]> {
        let (region, off) = self.resolve(vaddr, len)?;
        Ok(&mut self.region_mut(region)[off..off + len])
    }

    pub fn read_into(&self, vaddr: u32, dst: &mut [u8]) -> Result<()> {
        dst.copy_from_slice(self.view(vaddr, dst.len())?);
        Ok(())
    }

    pub fn write_from(&mut self, vaddr: u32, src: &[u8]) -> Result<()> {
        self.view_mut(vaddr, src.len())?.copy_from_slice(src);
        Ok(())
    }

    pub fn read_u8(&self, vaddr: u32) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_into(vaddr, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&self, vaddr: u32) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_into(vaddr, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_u32(&self, vaddr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(vaddr, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn write_u8(&mut self, vaddr: u32, value: u8) -> Result<()> {
        self.write_from(vaddr, &[value])
    }

    pub fn write_u16(&mut self, vaddr: u32, value: u16) -> Result<()> {
        self.write_from(vaddr, &value.to_be_bytes())
    }

    pub fn write_u32(&mut self, vaddr: u32, value: u32) -> Result<()> {
        self.write_from(vaddr, &value.to_be_bytes())
    }
}

fn check_len(region: Region, vaddr: u32, off: u32, len: usize, size: u32) -> Result<()> {
    let end = off as u64 + len as u64;
    if end > size as u64 {
        return Err(MemError::OutOfRange {
            region,
            vaddr,
            len,
            size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_addresses_translate_to_the_same_offset() {
        let image = MemoryImage::new(MemoryMode::Base);
        for x in [0u32, 1, 0x100, MAIN_RAM_SIZE - 4] {
            assert_eq!(image.translate(CACHED_BASE + x).unwrap(), x);
            assert_eq!(image.translate(UNCACHED_BASE + x).unwrap(), x);
            assert_eq!(image.translate(x).unwrap(), x);
        }
    }

    #[test]
    fn mirrors_alias_the_same_bytes() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        image.write_u32(CACHED_BASE + 0x40, 0xCAFE_F00D).unwrap();
        assert_eq!(image.read_u32(UNCACHED_BASE + 0x40).unwrap(), 0xCAFE_F00D);
        assert_eq!(image.read_u32(0x40).unwrap(), 0xCAFE_F00D);
    }

    #[test]
    fn writes_are_big_endian_regardless_of_host_order() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        image.write_u32(CACHED_BASE + 0x10, 0x0102_0304).unwrap();
        assert_eq!(image.view(0x10, 4).unwrap(), &[0x01, 0x02, 0x03, 0x04]);
        image.write_u16(0x20, 0xBEEF).unwrap();
        assert_eq!(image.view(0x20, 2).unwrap(), &[0xBE, 0xEF]);
    }

    #[test]
    fn scratchpad_classification_ignores_enablement() {
        assert!(is_scratchpad_address(SCRATCHPAD_BASE));
        assert!(is_scratchpad_address(SCRATCHPAD_BASE + SCRATCHPAD_SIZE - 1));
        assert!(!is_scratchpad_address(SCRATCHPAD_BASE + SCRATCHPAD_SIZE));
        assert!(!is_scratchpad_address(CACHED_BASE));
    }

    #[test]
    fn scratchpad_reads_and_writes_stay_inside_the_window() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        image.write_u32(SCRATCHPAD_BASE + 8, 0x1122_3344).unwrap();
        assert_eq!(image.read_u32(SCRATCHPAD_BASE + 8).unwrap(), 0x1122_3344);
        assert!(matches!(
            image.read_u32(SCRATCHPAD_BASE + SCRATCHPAD_SIZE - 2),
            Err(MemError::OutOfRange { region: Region::Scratchpad, .. })
        ));
    }

    #[test]
    fn register_window_is_unmapped() {
        let image = MemoryImage::new(MemoryMode::Base);
        assert!(matches!(
            image.translate(HW_REG_BASE),
            Err(MemError::Unmapped { .. })
        ));
        assert!(matches!(
            image.read_u8(HW_REG_BASE + 0x2000),
            Err(MemError::Unmapped { .. })
        ));
    }

    #[test]
    fn extended_bank_requires_extended_mode() {
        let base_only = MemoryImage::new(MemoryMode::Base);
        assert!(matches!(
            base_only.read_u8(CACHED_BASE + EXT_RAM_PHYS_BASE),
            Err(MemError::RegionDisabled { region: Region::ExtRam, .. })
        ));

        let mut extended = MemoryImage::new(MemoryMode::Extended);
        extended
            .write_u32(CACHED_BASE + EXT_RAM_PHYS_BASE, 0xAABB_CCDD)
            .unwrap();
        assert_eq!(
            extended.read_u32(UNCACHED_BASE + EXT_RAM_PHYS_BASE).unwrap(),
            0xAABB_CCDD
        );
    }

    #[test]
    fn accesses_do_not_run_past_the_region_end() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        assert!(matches!(
            image.read_u32(MAIN_RAM_SIZE - 2),
            Err(MemError::OutOfRange { region: Region::MainRam, .. })
        ));
        assert!(matches!(
            image.write_u16(CACHED_BASE + MAIN_RAM_SIZE - 1, 0),
            Err(MemError::OutOfRange { .. })
        ));
        // The hole between the two RAM banks is unmapped, not wrapped.
        assert!(matches!(
            image.read_u8(MAIN_RAM_SIZE),
            Err(MemError::Unmapped { .. })
        ));
    }

    #[test]
    fn views_alias_the_backing_store() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        image.view_mut(0x100, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(image.read_u32(0x100).unwrap(), 0x0102_0304);
    }

    #[test]
    fn aram_bank_is_allocated_on_demand() {
        let mut image = MemoryImage::new(MemoryMode::Base);
        assert!(image.aram().is_err());
        image.enable_aram();
        assert_eq!(image.aram().unwrap().len(), ARAM_SIZE as usize);
        image.aram_mut().unwrap()[0] = 0x55;
        // Re-enabling keeps contents.
        image.enable_aram();
        assert_eq!(image.aram().unwrap()[0], 0x55);
    }
}
