//! vfsdev-sim - In-memory flash controller emulator
//!
//! [`SimFlash`] implements [`FlashController`] over a byte vector and behaves
//! like the real register interface closely enough to exercise the driver:
//! - memory starts erased (0xFF) and programming can only clear bits
//! - program and erase require the controller to be unlocked, otherwise a
//!   sequence or write-protection error flag is raised
//! - units must match the family's write size and alignment
//! - double-word families refuse to program a unit that is not erased
//! - every started operation reports `BSY` for a few status polls
//!
//! Faults can be injected to test error paths, and [`SimStats`] counts the
//! hardware operations performed.

use std::cell::Cell;

use vfsdev_core::flash::{FlashController, FlashFamily, FlashStatus, ERASED_BYTE};
use vfsdev_core::{Error, Result};

/// Counters of hardware operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Unlock calls
    pub unlocks: usize,
    /// Lock calls
    pub locks: usize,
    /// Programmed units
    pub program_units: usize,
    /// Started sector erases
    pub sector_erases: usize,
    /// Cache flushes
    pub cache_flushes: usize,
    /// Operations that raised an error flag
    pub errors: usize,
}

/// Injected faults
#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    program_at: Option<usize>,
    erase_sector: Option<usize>,
    disturb_at: Option<usize>,
    protected_sector: Option<usize>,
}

/// Emulated flash controller
#[derive(Debug)]
pub struct SimFlash {
    family: FlashFamily,
    data: Vec<u8>,
    locked: bool,
    programming: bool,
    flags: FlashStatus,
    busy: Cell<u32>,
    busy_polls: u32,
    faults: Faults,
    stats: SimStats,
}

impl SimFlash {
    /// Blank (fully erased) flash of `family`
    pub fn new(family: FlashFamily) -> Self {
        Self {
            data: vec![ERASED_BYTE; family.capacity()],
            family,
            locked: true,
            programming: false,
            flags: FlashStatus::empty(),
            busy: Cell::new(0),
            busy_polls: 3,
            faults: Faults::default(),
            stats: SimStats::default(),
        }
    }

    /// Flash of `family` initialised from `image`
    ///
    /// A shorter image is padded with erased bytes.
    ///
    /// # Errors
    /// `InvalidArgument` if the image is larger than the flash.
    pub fn from_image(family: FlashFamily, image: &[u8]) -> Result<Self> {
        let mut flash = Self::new(family);
        if image.len() > flash.data.len() {
            log::error!(
                "image of {} bytes does not fit {} ({} bytes)",
                image.len(),
                family.name,
                flash.data.len()
            );
            return Err(Error::InvalidArgument);
        }
        flash.data[..image.len()].copy_from_slice(image);
        Ok(flash)
    }

    /// Current flash contents
    pub fn image(&self) -> &[u8] {
        &self.data
    }

    /// Operation counters
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Reset the operation counters
    pub fn reset_stats(&mut self) {
        self.stats = SimStats::default();
    }

    /// True while the controller is locked
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of `BSY` polls reported after each started operation
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Raise a program error when a unit covering `offset` is programmed
    pub fn fail_program_at(&mut self, offset: Option<usize>) {
        self.faults.program_at = offset;
    }

    /// Raise an operation error when sector `index` is erased
    pub fn fail_erase_sector(&mut self, index: Option<usize>) {
        self.faults.erase_sector = index;
    }

    /// Flip a bit at `offset` when it is programmed, without raising a flag
    pub fn disturb_at(&mut self, offset: Option<usize>) {
        self.faults.disturb_at = offset;
    }

    /// Write-protect sector `index`
    pub fn protect_sector(&mut self, index: Option<usize>) {
        self.faults.protected_sector = index;
    }

    fn raise(&mut self, flag: FlashStatus) {
        self.flags |= flag;
        self.stats.errors += 1;
    }

    fn program_error(&self, offset: usize, unit: &[u8]) -> Option<FlashStatus> {
        if self.locked || !self.programming {
            return Some(FlashStatus::PGSERR);
        }
        let Some(end) = offset.checked_add(unit.len()) else {
            return Some(FlashStatus::PGAERR);
        };
        if unit.len() != self.family.write_unit
            || offset % self.family.write_align != 0
            || end > self.data.len()
        {
            return Some(FlashStatus::PGAERR);
        }
        let sector = self.family.geometry.sector_of(offset);
        if sector.is_some() && sector == self.faults.protected_sector {
            return Some(FlashStatus::WRPERR);
        }
        if self
            .faults
            .program_at
            .is_some_and(|fail| (offset..end).contains(&fail))
        {
            return Some(FlashStatus::PGPERR);
        }
        if self.family.write_unit > 1 && self.data[offset..end].iter().any(|&b| b != ERASED_BYTE)
        {
            return Some(FlashStatus::PGPERR);
        }
        None
    }
}

impl FlashController for SimFlash {
    fn family(&self) -> &FlashFamily {
        &self.family
    }

    fn read(&self, offset: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
    }

    fn unlock(&mut self) {
        self.stats.unlocks += 1;
        self.locked = false;
    }

    fn lock(&mut self) {
        self.stats.locks += 1;
        self.locked = true;
    }

    fn status(&self) -> FlashStatus {
        let busy = self.busy.get();
        if busy > 0 {
            self.busy.set(busy - 1);
            self.flags | FlashStatus::BSY
        } else {
            self.flags
        }
    }

    fn clear_errors(&mut self) {
        self.flags.remove(FlashStatus::ERRORS | FlashStatus::EOP);
    }

    fn begin_program(&mut self) {
        self.programming = true;
    }

    fn program_unit(&mut self, offset: usize, unit: &[u8]) {
        self.busy.set(self.busy_polls);
        if let Some(flag) = self.program_error(offset, unit) {
            log::trace!("sim: program 0x{:x} rejected: {:?}", offset, flag);
            self.raise(flag);
            return;
        }
        self.stats.program_units += 1;
        for (cell, &byte) in self.data[offset..offset + unit.len()].iter_mut().zip(unit) {
            *cell &= byte;
        }
        if let Some(disturb) = self.faults.disturb_at {
            if (offset..offset + unit.len()).contains(&disturb) {
                self.data[disturb] ^= 0x01;
            }
        }
        self.flags |= FlashStatus::EOP;
    }

    fn end_program(&mut self) {
        self.programming = false;
    }

    fn start_sector_erase(&mut self, index: usize) {
        self.busy.set(self.busy_polls);
        if self.locked || self.faults.protected_sector == Some(index) {
            self.raise(FlashStatus::WRPERR);
            return;
        }
        let Some((offset, size)) = self.family.geometry.sector_bounds(index) else {
            self.raise(FlashStatus::ERSERR);
            return;
        };
        self.stats.sector_erases += 1;
        if self.faults.erase_sector == Some(index) {
            // Interrupted erase: only the first half is cleared
            self.data[offset..offset + size / 2].fill(ERASED_BYTE);
            self.raise(FlashStatus::OPERR);
            return;
        }
        self.data[offset..offset + size].fill(ERASED_BYTE);
        self.flags |= FlashStatus::EOP;
    }

    fn flush_caches(&mut self) {
        self.stats.cache_flushes += 1;
    }
}
