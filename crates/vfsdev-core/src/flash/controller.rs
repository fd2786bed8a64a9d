//! Flash controller trait
//!
//! This is the register-level seam between the generic write/erase
//! algorithms and a concrete flash interface. Real hardware implements it
//! with MMIO register accesses (see the `stm32` module); tests and the CLI
//! use the in-memory emulator from `vfsdev-sim`.

use bitflags::bitflags;

use super::family::FlashFamily;

bitflags! {
    /// Controller status flags
    ///
    /// Bit positions follow the STM32F4 `FLASH_SR` register. Controllers
    /// with a different layout translate into this set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlashStatus: u32 {
        /// End of operation
        const EOP    = 1 << 0;
        /// Operation error
        const OPERR  = 1 << 1;
        /// Write protection error
        const WRPERR = 1 << 4;
        /// Programming alignment error
        const PGAERR = 1 << 5;
        /// Programming parallelism error
        const PGPERR = 1 << 6;
        /// Programming sequence error
        const PGSERR = 1 << 7;
        /// Erase sequence error
        const ERSERR = 1 << 8;
        /// Operation in progress
        const BSY    = 1 << 16;

        /// All program/erase error flags
        const ERRORS = Self::OPERR.bits()
            | Self::WRPERR.bits()
            | Self::PGAERR.bits()
            | Self::PGPERR.bits()
            | Self::PGSERR.bits()
            | Self::ERSERR.bits();
    }
}

impl FlashStatus {
    /// True if any program/erase error flag is set
    pub fn has_errors(self) -> bool {
        self.intersects(Self::ERRORS)
    }

    /// True while the controller is busy
    pub fn is_busy(self) -> bool {
        self.contains(Self::BSY)
    }
}

/// Register-level access to a flash controller
///
/// All addresses are offsets from the start of the physical flash.
///
/// Methods that start a hardware operation (`program_unit`,
/// `start_sector_erase`) return immediately; the caller polls
/// [`FlashController::status`] until `BSY` clears.
pub trait FlashController {
    /// Family descriptor (geometry, write unit, alignment)
    fn family(&self) -> &FlashFamily;

    /// Copy flash contents starting at `offset` into `buf`
    ///
    /// This is a plain memory-mapped read; it never touches the controller
    /// registers.
    fn read(&self, offset: usize, buf: &mut [u8]);

    /// Unlock the controller for program/erase
    fn unlock(&mut self);

    /// Re-lock the controller
    fn lock(&mut self);

    /// Current status flags
    fn status(&self) -> FlashStatus;

    /// Clear stale error and end-of-operation flags
    fn clear_errors(&mut self);

    /// Enter programming mode before each unit
    fn begin_program(&mut self);

    /// Write one programming unit (`family().write_unit` bytes) at `offset`
    fn program_unit(&mut self, offset: usize, unit: &[u8]);

    /// Leave programming mode
    fn end_program(&mut self);

    /// Start erasing sector `index`
    fn start_sector_erase(&mut self, index: usize);

    /// Invalidate instruction/data caches that may hold stale flash contents
    fn flush_caches(&mut self);

    /// Physical capacity in bytes
    fn capacity(&self) -> usize {
        self.family().capacity()
    }
}

impl<C: FlashController + ?Sized> FlashController for &mut C {
    fn family(&self) -> &FlashFamily {
        (**self).family()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) {
        (**self).read(offset, buf)
    }

    fn unlock(&mut self) {
        (**self).unlock()
    }

    fn lock(&mut self) {
        (**self).lock()
    }

    fn status(&self) -> FlashStatus {
        (**self).status()
    }

    fn clear_errors(&mut self) {
        (**self).clear_errors()
    }

    fn begin_program(&mut self) {
        (**self).begin_program()
    }

    fn program_unit(&mut self, offset: usize, unit: &[u8]) {
        (**self).program_unit(offset, unit)
    }

    fn end_program(&mut self) {
        (**self).end_program()
    }

    fn start_sector_erase(&mut self, index: usize) {
        (**self).start_sector_erase(index)
    }

    fn flush_caches(&mut self) {
        (**self).flush_caches()
    }
}

/// Spin until the controller clears `BSY`
///
/// There is no timeout: a controller that never becomes idle blocks the
/// caller forever.
pub fn wait_idle<C: FlashController + ?Sized>(ctrl: &C) -> FlashStatus {
    loop {
        let status = ctrl.status();
        if !status.is_busy() {
            return status;
        }
        core::hint::spin_loop();
    }
}
