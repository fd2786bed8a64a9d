//! Flash programming primitives
//!
//! `write_region` and `erase_sector` drive a [`FlashController`] through the
//! unlock / operate / wait / lock sequence. Interrupts are masked only while
//! a single unit is programmed (or a sector erase runs) and the busy flag
//! is polled; never for a whole multi-unit write.
//!
//! Both calls block until the hardware finishes and must not be called from
//! an interrupt handler.

use crate::error::{Error, Result};

use super::controller::{wait_idle, FlashController};
use super::erased::find_programmed;

/// Bytes compared per step during write verification
const VERIFY_CHUNK: usize = 256;

/// Program `data` at absolute flash `offset`
///
/// The target range should be erased. After programming, caches are flushed
/// and the range is read back and compared with `data`.
///
/// # Errors
/// * `InvalidArgument` - Range outside the flash or not aligned to the
///   family's write unit; no hardware access happens
/// * `Io` - A program error flag was raised (remaining units are skipped)
///   or the read-back did not match
pub fn write_region<C: FlashController + ?Sized>(
    ctrl: &mut C,
    offset: usize,
    data: &[u8],
) -> Result<()> {
    let family = *ctrl.family();
    match offset.checked_add(data.len()) {
        Some(end) if end <= family.capacity() => {}
        _ => return Err(Error::InvalidArgument),
    }
    if !family.is_write_aligned(offset, data.len()) {
        log::debug!(
            "unaligned write {} @ 0x{:x} (unit {}, align {})",
            data.len(),
            offset,
            family.write_unit,
            family.write_align
        );
        return Err(Error::InvalidArgument);
    }
    if data.is_empty() {
        return Ok(());
    }

    ctrl.unlock();
    ctrl.clear_errors();
    let programmed = program_units(ctrl, offset, data, family.write_unit);
    ctrl.flush_caches();
    ctrl.lock();
    programmed?;

    verify_region(ctrl, offset, data)
}

fn program_units<C: FlashController + ?Sized>(
    ctrl: &mut C,
    offset: usize,
    data: &[u8],
    unit_len: usize,
) -> Result<()> {
    for (i, unit) in data.chunks(unit_len).enumerate() {
        let addr = offset + i * unit_len;
        ctrl.begin_program();
        let status = critical_section::with(|_| {
            ctrl.program_unit(addr, unit);
            wait_idle(&*ctrl)
        });
        if status.has_errors() {
            ctrl.end_program();
            log::error!("flash program error at 0x{:x}, flags: {:?}", addr, status);
            return Err(Error::Io);
        }
    }
    ctrl.end_program();
    Ok(())
}

/// Compare flash contents at `offset` with `expected`
fn verify_region<C: FlashController + ?Sized>(
    ctrl: &C,
    offset: usize,
    expected: &[u8],
) -> Result<()> {
    let mut buf = [0u8; VERIFY_CHUNK];
    for (i, want) in expected.chunks(VERIFY_CHUNK).enumerate() {
        let have = &mut buf[..want.len()];
        let addr = offset + i * VERIFY_CHUNK;
        ctrl.read(addr, have);
        if let Some(pos) = have.iter().zip(want).position(|(h, w)| h != w) {
            log::error!(
                "flash verify error at 0x{:x}: expected 0x{:02x}, found 0x{:02x}",
                addr + pos,
                want[pos],
                have[pos]
            );
            return Err(Error::Io);
        }
    }
    Ok(())
}

/// Physically erase sector `index` and verify it reads as erased
///
/// Interrupts stay masked for the whole erase, which takes milliseconds.
///
/// # Errors
/// * `InvalidArgument` - No such sector
/// * `Io` - An erase error flag was raised or the sector is not blank
///   afterwards
pub fn erase_sector<C: FlashController + ?Sized>(ctrl: &mut C, index: usize) -> Result<()> {
    let (offset, size) = ctrl
        .family()
        .geometry
        .sector_bounds(index)
        .ok_or(Error::InvalidArgument)?;

    ctrl.unlock();
    ctrl.clear_errors();
    let status = critical_section::with(|_| {
        ctrl.start_sector_erase(index);
        wait_idle(&*ctrl)
    });
    ctrl.lock();
    ctrl.flush_caches();

    if status.has_errors() {
        log::error!("flash erase error, sector {}, flags: {:?}", index, status);
        return Err(Error::Io);
    }
    if let Some((addr, found)) = find_programmed(ctrl, offset, size) {
        log::error!(
            "flash erase verify failed, sector {}: 0x{:02x} at 0x{:x}",
            index,
            found,
            addr
        );
        return Err(Error::Io);
    }
    Ok(())
}
