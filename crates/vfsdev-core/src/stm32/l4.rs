//! STM32L4 flash interface (page erase, double-word programming)

use core::sync::atomic::{fence, Ordering};

use crate::flash::{FlashController, FlashFamily, FlashStatus};

use super::{flush_caches, read_mapped, unlock, Mmio, CR_LOCK, CR_STRT, FLASH_MEMORY_BASE};

/// `FLASH` peripheral on STM32L4
pub const STM32L4_FLASH_REGS: usize = 0x4002_2000;

const ACR: usize = 0x00;
const KEYR: usize = 0x08;
const SR: usize = 0x10;
const CR: usize = 0x14;

const CR_PG: u32 = 1 << 0;
const CR_PER: u32 = 1 << 1;
const CR_PNB_POS: u32 = 3;
const CR_PNB_MASK: u32 = 0xFF;
const CR_BKER: u32 = 1 << 11;

// FLASH_SR bits
const SR_EOP: u32 = 1 << 0;
const SR_OPERR: u32 = 1 << 1;
const SR_PROGERR: u32 = 1 << 3;
const SR_WRPERR: u32 = 1 << 4;
const SR_PGAERR: u32 = 1 << 5;
const SR_SIZERR: u32 = 1 << 6;
const SR_PGSERR: u32 = 1 << 7;
const SR_MISERR: u32 = 1 << 8;
const SR_FASTERR: u32 = 1 << 9;
const SR_BSY: u32 = 1 << 16;
const SR_ERRORS: u32 = SR_OPERR
    | SR_PROGERR
    | SR_WRPERR
    | SR_PGAERR
    | SR_SIZERR
    | SR_PGSERR
    | SR_MISERR
    | SR_FASTERR;

/// STM32L4 flash controller
#[derive(Debug)]
pub struct Stm32L4Flash {
    family: FlashFamily,
    regs: Mmio,
    memory: usize,
}

impl Stm32L4Flash {
    /// Controller at the default peripheral and memory addresses
    ///
    /// # Safety
    ///
    /// Must run on an STM32L4 with `family.capacity()` bytes of flash, and
    /// only one controller instance may exist.
    pub unsafe fn new(family: FlashFamily) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::with_addresses(family, STM32L4_FLASH_REGS, FLASH_MEMORY_BASE) }
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

/// `FLASH_CR` value starting an erase of page `index`
///
/// On dual-bank parts the upper half of the pages is bank 2, numbered from 0
/// in `PNB`.
pub fn page_erase_cr(family: &FlashFamily, index: usize) -> u32 {
    let bank_pages = family.bank_sectors();
    let (bank, page) = if family.banks > 1 && index >= bank_pages {
        (CR_BKER, index - bank_pages)
    } else {
        (0, index)
    };
    let pnb = page as u32 & CR_PNB_MASK;
    CR_PER | bank | (pnb << CR_PNB_POS)
}

/// Translate `FLASH_SR` into the common status set
pub fn translate_status(sr: u32) -> FlashStatus {
    let mut status = FlashStatus::empty();
    status.set(FlashStatus::EOP, sr & SR_EOP != 0);
    status.set(FlashStatus::OPERR, sr & SR_OPERR != 0);
    status.set(FlashStatus::WRPERR, sr & SR_WRPERR != 0);
    status.set(FlashStatus::PGAERR, sr & SR_PGAERR != 0);
    status.set(FlashStatus::PGPERR, sr & (SR_PROGERR | SR_SIZERR) != 0);
    status.set(
        FlashStatus::PGSERR,
        sr & (SR_PGSERR | SR_MISERR | SR_FASTERR) != 0,
    );
    status.set(FlashStatus::BSY, sr & SR_BSY != 0);
    status
}

impl FlashController for Stm32L4Flash {
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
        translate_status(self.regs.read(SR))
    }

    fn clear_errors(&mut self) {
        self.regs.write(SR, SR_ERRORS | SR_EOP)
    }

    fn begin_program(&mut self) {
        self.regs.write(CR, CR_PG)
    }

    fn program_unit(&mut self, offset: usize, unit: &[u8]) {
        let dst = (self.memory + offset) as *mut u32;
        for (i, word) in unit.chunks_exact(4).enumerate() {
            let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            fence(Ordering::SeqCst);
            // SAFETY: offset is 8-byte aligned and in range; the double word
            // is written as two consecutive 32-bit stores.
            unsafe { core::ptr::write_volatile(dst.add(i), value) }
        }
        fence(Ordering::SeqCst);
    }

    fn end_program(&mut self) {
        self.regs.modify(CR, |v| v & !CR_PG)
    }

    fn start_sector_erase(&mut self, index: usize) {
        self.regs.write(CR, page_erase_cr(&self.family, index));
        self.regs.modify(CR, |v| v | CR_STRT)
    }

    fn flush_caches(&mut self) {
        flush_caches(self.regs, ACR)
    }
}
