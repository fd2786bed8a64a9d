//! Mock flash controller for unit tests
//!
//! Simulates flash behaviour in memory and records every hardware
//! operation so tests can assert on what the algorithms actually did:
//! - Memory starts as all 0xFF (erased state)
//! - Programming can only clear bits (1 -> 0)
//! - Sector erase sets the whole sector to 0xFF
//! - Program/erase while locked raises an error flag

use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use super::controller::{FlashController, FlashStatus};
use super::family::FlashFamily;

pub(crate) struct MockFlash {
    pub family: FlashFamily,
    pub memory: Vec<u8>,
    pub locked: bool,
    pub programming: bool,
    pub flags: FlashStatus,
    /// Number of status polls that still report BSY
    pub busy: Cell<u32>,
    /// BSY polls reported after each started operation
    pub busy_polls: u32,
    /// Record of programmed units: (offset, length)
    pub programs: Vec<(usize, usize)>,
    /// Record of erased sector indices
    pub erases: Vec<usize>,
    pub unlocks: usize,
    pub locks: usize,
    pub flushes: usize,
    /// Raise PGPERR when programming a unit covering this offset
    pub fail_program_at: Option<usize>,
    /// Raise OPERR on sector erase and leave the contents untouched
    pub fail_erase: bool,
    /// Silently flip a bit when this offset is programmed
    pub disturb_at: Option<usize>,
}

impl MockFlash {
    pub fn new(family: FlashFamily) -> Self {
        Self {
            memory: vec![0xFF; family.capacity()],
            family,
            locked: true,
            programming: false,
            flags: FlashStatus::empty(),
            busy: Cell::new(0),
            busy_polls: 2,
            programs: Vec::new(),
            erases: Vec::new(),
            unlocks: 0,
            locks: 0,
            flushes: 0,
            fail_program_at: None,
            fail_erase: false,
            disturb_at: None,
        }
    }

    /// Fill memory at `offset` with `data` without recording a program
    pub fn preload(&mut self, offset: usize, data: &[u8]) {
        self.memory[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn hardware_ops(&self) -> usize {
        self.programs.len() + self.erases.len()
    }
}

impl FlashController for MockFlash {
    fn family(&self) -> &FlashFamily {
        &self.family
    }

    fn read(&self, offset: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.memory[offset..offset + buf.len()]);
    }

    fn unlock(&mut self) {
        self.unlocks += 1;
        self.locked = false;
    }

    fn lock(&mut self) {
        self.locks += 1;
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
        if self.locked || !self.programming {
            self.flags |= FlashStatus::PGSERR;
            return;
        }
        if unit.len() != self.family.write_unit || offset % self.family.write_align != 0 {
            self.flags |= FlashStatus::PGAERR;
            return;
        }
        if let Some(fail) = self.fail_program_at {
            if (offset..offset + unit.len()).contains(&fail) {
                self.flags |= FlashStatus::PGPERR;
                return;
            }
        }
        self.programs.push((offset, unit.len()));
        for (i, &byte) in unit.iter().enumerate() {
            self.memory[offset + i] &= byte;
        }
        if let Some(disturb) = self.disturb_at {
            if (offset..offset + unit.len()).contains(&disturb) {
                self.memory[disturb] ^= 0x01;
            }
        }
        self.flags |= FlashStatus::EOP;
    }

    fn end_program(&mut self) {
        self.programming = false;
    }

    fn start_sector_erase(&mut self, index: usize) {
        self.busy.set(self.busy_polls);
        if self.locked {
            self.flags |= FlashStatus::WRPERR;
            return;
        }
        self.erases.push(index);
        if self.fail_erase {
            self.flags |= FlashStatus::OPERR;
            return;
        }
        if let Some((offset, size)) = self.family.geometry.sector_bounds(index) {
            self.memory[offset..offset + size].fill(0xFF);
        }
        self.flags |= FlashStatus::EOP;
    }

    fn flush_caches(&mut self) {
        self.flushes += 1;
    }
}
