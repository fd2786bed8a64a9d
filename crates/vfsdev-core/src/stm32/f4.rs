//! STM32F4/F7 flash interface (sector erase, byte programming)

use crate::flash::{FlashController, FlashFamily, FlashStatus};

use super::{flush_caches, read_mapped, unlock, Mmio, CR_LOCK, CR_STRT, FLASH_MEMORY_BASE};

/// `FLASH` peripheral on STM32F4 and STM32F7
pub const STM32F4_FLASH_REGS: usize = 0x4002_3C00;

const ACR: usize = 0x00;
const KEYR: usize = 0x04;
const SR: usize = 0x0C;
const CR: usize = 0x10;

const CR_PG: u32 = 1 << 0;
const CR_SER: u32 = 1 << 1;
const CR_SNB_POS: u32 = 3;
const CR_SNB_MASK: u32 = 0x1F;
/// Program size x8
const CR_PSIZE_BYTE: u32 = 0 << 8;

/// SNB of the first sector of bank 2
const BANK2_SNB: usize = 16;

/// STM32F4/F7 flash controller
#[derive(Debug)]
pub struct Stm32F4Flash {
    family: FlashFamily,
    regs: Mmio,
    memory: usize,
}

impl Stm32F4Flash {
    /// Controller at the default peripheral and memory addresses
    ///
    /// # Safety
    ///
    /// Must run on an STM32F4/F7 whose flash layout matches `family`, and
    /// only one controller instance may exist.
    pub unsafe fn new(family: FlashFamily) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::with_addresses(family, STM32F4_FLASH_REGS, FLASH_MEMORY_BASE) }
    }

    /// Controller with explicit register block and memory base
    ///
    /// # Safety
    ///
    /// `regs` must be the `FLASH` peripheral and `memory` the start of a
    /// mapping of at least `family.capacity()` bytes.
    pub unsafe fn with_addresses(family: FlashFamily, regs: usize, memory: usize) -> Self {
        Self {
            family,
            regs: Mmio { base: regs },
            memory,
        }
    }
}

/// `FLASH_CR` value starting an erase of sector `index`
///
/// In dual-bank mode the sectors of bank 2 are numbered from 16 in `SNB`.
pub fn sector_erase_cr(family: &FlashFamily, index: usize) -> u32 {
    let bank_sectors = family.bank_sectors();
    let snb = if family.banks > 1 && index >= bank_sectors {
        index - bank_sectors + BANK2_SNB
    } else {
        index
    };
    CR_PSIZE_BYTE | CR_SER | ((snb as u32 & CR_SNB_MASK) << CR_SNB_POS)
}

impl FlashController for Stm32F4Flash {
    fn family(&self) -> &FlashFamily {
        &self.family
    }

    fn read(&self, offset: usize, buf: &mut [u8]) {
        read_mapped(self.memory, offset, buf)
    }

    fn unlock(&mut self) {
        unlock(self.regs, KEYR, CR)
    }

    fn lock(&mut self) {
        self.regs.modify(CR, |v| v | CR_LOCK)
    }

    fn status(&self) -> FlashStatus {
        FlashStatus::from_bits_truncate(self.regs.read(SR))
    }

    fn clear_errors(&mut self) {
        // Flags are cleared by writing 1
        self.regs
            .write(SR, (FlashStatus::ERRORS | FlashStatus::EOP).bits())
    }

    fn begin_program(&mut self) {
        self.regs.write(CR, CR_PSIZE_BYTE | CR_PG)
    }

    fn program_unit(&mut self, offset: usize, unit: &[u8]) {
        for (i, &byte) in unit.iter().enumerate() {
            // SAFETY: offset was bounds-checked against the family capacity
            // and the programming sequence is active.
            unsafe { core::ptr::write_volatile((self.memory + offset + i) as *mut u8, byte) }
        }
    }

    fn end_program(&mut self) {
        self.regs.modify(CR, |v| v & !CR_PG)
    }

    fn start_sector_erase(&mut self, index: usize) {
        self.regs.write(CR, sector_erase_cr(&self.family, index));
        self.regs.modify(CR, |v| v | CR_STRT)
    }

    fn flush_caches(&mut self) {
        flush_caches(self.regs, ACR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bank_snb() {
        let family = FlashFamily::STM32F4_1M;
        assert_eq!(sector_erase_cr(&family, 0), CR_SER);
        assert_eq!(sector_erase_cr(&family, 5), CR_SER | (5 << 3));
        assert_eq!(sector_erase_cr(&family, 11), CR_SER | (11 << 3));
    }

    #[test]
    fn test_dual_bank_snb_remap() {
        let family = FlashFamily::STM32F4_2M_DUAL;
        assert_eq!(sector_erase_cr(&family, 11), CR_SER | (11 << 3));
        assert_eq!(sector_erase_cr(&family, 12), CR_SER | (16 << 3));
        assert_eq!(sector_erase_cr(&family, 23), CR_SER | (27 << 3));
    }
}
