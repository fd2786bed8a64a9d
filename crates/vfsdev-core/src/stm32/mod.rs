//! Register-level STM32 flash controllers
//!
//! [`Stm32F4Flash`] covers the F4/F7 sector-erase interface with byte
//! programming, [`Stm32L4Flash`] the L4 page-erase interface with
//! double-word programming. Both talk to the memory-mapped `FLASH`
//! peripheral directly and must only be constructed on matching hardware.

mod f4;
mod l4;

pub use f4::{sector_erase_cr, Stm32F4Flash, STM32F4_FLASH_REGS};
pub use l4::{page_erase_cr, translate_status, Stm32L4Flash, STM32L4_FLASH_REGS};

/// Start of the memory-mapped main flash
pub const FLASH_MEMORY_BASE: usize = 0x0800_0000;

/// First unlock key written to `FLASH_KEYR`
const KEY1: u32 = 0x4567_0123;
/// Second unlock key written to `FLASH_KEYR`
const KEY2: u32 = 0xCDEF_89AB;

/// `FLASH_ACR` cache bits (identical on F4, F7 and L4)
const ACR_ICEN: u32 = 1 << 9;
const ACR_DCEN: u32 = 1 << 10;
const ACR_ICRST: u32 = 1 << 11;
const ACR_DCRST: u32 = 1 << 12;

/// `FLASH_CR` bits shared by all supported controllers
const CR_STRT: u32 = 1 << 16;
const CR_LOCK: u32 = 1 << 31;

/// Memory-mapped register block
///
/// Holds plain addresses so controllers stay `Send`.
#[derive(Debug, Clone, Copy)]
struct Mmio {
    base: usize,
}

impl Mmio {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `base` points at the FLASH peripheral (checked by the
        // constructor's contract) and `offset` is one of its registers.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        // SAFETY: see `read`.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    #[inline]
    fn modify(&self, offset: usize, f: impl FnOnce(u32) -> u32) {
        self.write(offset, f(self.read(offset)));
    }
}

/// Read from memory-mapped flash
fn read_mapped(memory: usize, offset: usize, buf: &mut [u8]) {
    // SAFETY: callers stay within the family's capacity, which the
    // constructor's contract guarantees is mapped at `memory`.
    unsafe {
        core::ptr::copy_nonoverlapping((memory + offset) as *const u8, buf.as_mut_ptr(), buf.len());
    }
}

/// Unlock sequence shared by all controllers
fn unlock(regs: Mmio, keyr: usize, cr: usize) {
    if regs.read(cr) & CR_LOCK != 0 {
        regs.write(keyr, KEY1);
        regs.write(keyr, KEY2);
    }
}

/// Reset and re-enable the instruction and data caches
fn flush_caches(regs: Mmio, acr: usize) {
    let saved = regs.read(acr) & (ACR_ICEN | ACR_DCEN);
    regs.modify(acr, |v| v & !(ACR_ICEN | ACR_DCEN));
    regs.modify(acr, |v| v | ACR_ICRST | ACR_DCRST);
    regs.modify(acr, |v| v & !(ACR_ICRST | ACR_DCRST));
    regs.modify(acr, |v| v | saved);
}
