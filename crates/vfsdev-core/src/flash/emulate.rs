//! Erase with sub-sector emulation
//!
//! The hardware can only erase whole sectors. A range smaller than its
//! sector is erased by:
//! 1. Reading the whole sector into a temporary buffer
//! 2. Erasing the sector
//! 3. Writing back the bytes before and after the requested range
//!
//! This sequence is not atomic. If power is lost after step 2 the bytes
//! outside the requested range are gone. Ranges that cross a sector
//! boundary are rejected; callers split them per sector.

use alloc::vec::Vec;

use crate::error::{Error, Result};

use super::controller::FlashController;
use super::erased::{region_is_erased, sector_is_erased};
use super::family::ERASED_BYTE;
use super::geometry::SectorGeometry;
use super::program::{erase_sector, write_region};

/// How an erase request maps onto the sector layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseKind {
    /// Request covers exactly one sector
    Sector {
        /// Sector index
        index: usize,
    },
    /// Request lies strictly inside one sector
    SubSector {
        /// Sector index
        index: usize,
        /// Sector start offset
        sector_offset: usize,
        /// Sector size in bytes
        sector_size: usize,
    },
    /// Request spans more than one sector (unsupported)
    CrossSector,
}

/// Classify an erase of `len` bytes at absolute `offset`
///
/// Returns `None` if `offset` lies beyond the geometry.
pub fn classify(geometry: &SectorGeometry, offset: usize, len: usize) -> Option<EraseKind> {
    let index = geometry.sector_of(offset)?;
    let (sector_offset, sector_size) = geometry.sector_bounds(index)?;
    let kind = if offset == sector_offset && len == sector_size {
        EraseKind::Sector { index }
    } else if offset
        .checked_add(len)
        .is_some_and(|end| end <= sector_offset + sector_size)
    {
        EraseKind::SubSector {
            index,
            sector_offset,
            sector_size,
        }
    } else {
        EraseKind::CrossSector
    };
    Some(kind)
}

/// Erase `len` bytes of flash at absolute `offset`
///
/// Already-erased targets succeed without touching the hardware.
///
/// # Errors
/// * `InvalidArgument` - Offset beyond the flash or range crossing a sector
///   boundary
/// * `NoMemory` - The sector buffer for emulation could not be allocated;
///   nothing has been erased
/// * `Io` - Erase or restore failed. After a failed restore the sector is
///   only partially restored.
pub fn erase_range<C: FlashController + ?Sized>(
    ctrl: &mut C,
    offset: usize,
    len: usize,
) -> Result<()> {
    let geometry = ctrl.family().geometry;
    match classify(&geometry, offset, len).ok_or(Error::InvalidArgument)? {
        EraseKind::Sector { index } => {
            if sector_is_erased(ctrl, index) {
                return Ok(());
            }
            erase_sector(ctrl, index)
        }
        EraseKind::SubSector {
            index,
            sector_offset,
            sector_size,
        } => {
            if region_is_erased(ctrl, offset, len) {
                return Ok(());
            }
            emulate_erase(ctrl, index, sector_offset, sector_size, offset, len)
        }
        EraseKind::CrossSector => {
            log::debug!("cross-sector erase {} @ 0x{:x} not supported", len, offset);
            Err(Error::InvalidArgument)
        }
    }
}

fn emulate_erase<C: FlashController + ?Sized>(
    ctrl: &mut C,
    index: usize,
    sector_offset: usize,
    sector_size: usize,
    offset: usize,
    len: usize,
) -> Result<()> {
    log::warn!(
        "unsafe flash erase: {} @ 0x{:x} (sector {}, 0x{:x}+0x{:x})",
        len,
        offset,
        index,
        sector_offset,
        sector_size
    );

    let mut backup = Vec::new();
    if backup.try_reserve_exact(sector_size).is_err() {
        log::error!("no memory for {} byte sector buffer", sector_size);
        return Err(Error::NoMemory);
    }
    backup.resize(sector_size, 0);
    ctrl.read(sector_offset, &mut backup);

    let before = offset - sector_offset;
    let after = before + len;
    backup[before..after].fill(ERASED_BYTE);

    if let Err(e) = erase_sector(ctrl, index) {
        log::error!(
            "sector {} at 0x{:x} erase failed during erase emulation, data outside 0x{:x}+0x{:x} may be lost: {}",
            index,
            sector_offset,
            offset,
            len,
            e
        );
        return Err(e);
    }

    let unit = ctrl.family().write_unit;
    let result = restore_spans(before, after, sector_size, unit)
        .into_iter()
        .flatten()
        .try_for_each(|(start, end)| {
            write_region(ctrl, sector_offset + start, &backup[start..end])
        });
    if let Err(e) = result {
        log::error!(
            "sector {} at 0x{:x} left partially restored after erase emulation: {}",
            index,
            sector_offset,
            e
        );
    }
    result
}

/// Sector-relative spans to write back after erasing a sector
///
/// Spans are widened to the write unit; the widened part lies inside the
/// requested range and is written with the erased pattern. Spans that
/// would overlap are merged.
fn restore_spans(
    before: usize,
    after: usize,
    sector_size: usize,
    unit: usize,
) -> [Option<(usize, usize)>; 2] {
    let head_end = before.div_ceil(unit) * unit;
    let tail_start = after / unit * unit;
    if head_end >= tail_start && before > 0 && after < sector_size {
        return [Some((0, sector_size)), None];
    }
    let head = (before > 0).then_some((0, head_end));
    let tail = (after < sector_size).then_some((tail_start, sector_size));
    [head, tail]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::mock::MockFlash;
    use crate::flash::FlashFamily;

    const GEOMETRY: SectorGeometry = SectorGeometry::Table(&[16384, 16384, 16384, 16384, 65536]);

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&GEOMETRY, 16384, 16384),
            Some(EraseKind::Sector { index: 1 })
        );
        assert_eq!(
            classify(&GEOMETRY, 20000, 100),
            Some(EraseKind::SubSector {
                index: 1,
                sector_offset: 16384,
                sector_size: 16384
            })
        );
        assert_eq!(classify(&GEOMETRY, 16384, 16385), Some(EraseKind::CrossSector));
        assert_eq!(classify(&GEOMETRY, 30000, 4000), Some(EraseKind::CrossSector));
        assert_eq!(classify(&GEOMETRY, 131072, 1), None);
    }

    #[test]
    fn test_restore_spans() {
        // Byte programming: exact spans
        assert_eq!(restore_spans(10, 20, 100, 1), [Some((0, 10)), Some((20, 100))]);
        assert_eq!(restore_spans(0, 20, 100, 1), [None, Some((20, 100))]);
        assert_eq!(restore_spans(10, 100, 100, 1), [Some((0, 10)), None]);
        // Double-word programming: widened into the requested range
        assert_eq!(restore_spans(10, 30, 2048, 8), [Some((0, 16)), Some((24, 2048))]);
        // Widened spans meet: one write of the whole sector
        assert_eq!(restore_spans(3, 5, 2048, 8), [Some((0, 2048)), None]);
    }

    #[test]
    fn test_full_sector_erase() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);
        mock.preload(0x4000, &[0x00; 0x4000]);

        erase_range(&mut mock, 0x4000, 0x4000).unwrap();

        assert!(mock.memory[0x4000..0x8000].iter().all(|&b| b == 0xFF));
        assert_eq!(mock.erases, [1]);
        assert!(mock.programs.is_empty());
    }

    #[test]
    fn test_erased_sector_is_idempotent() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);

        erase_range(&mut mock, 0x4000, 0x4000).unwrap();
        erase_range(&mut mock, 0x4100, 0x80).unwrap();

        assert_eq!(mock.hardware_ops(), 0);
        assert_eq!(mock.unlocks, 0);
    }

    #[test]
    fn test_sub_sector_erase_preserves_both_sides() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);
        mock.preload(0x4000, &[0xAA; 0x200]); // before
        mock.preload(0x4200, &[0xBB; 0x600]); // requested range
        mock.preload(0x4800, &[0xCC; 0x3800]); // after

        erase_range(&mut mock, 0x4200, 0x600).unwrap();

        assert!(mock.memory[0x4000..0x4200].iter().all(|&b| b == 0xAA));
        assert!(mock.memory[0x4200..0x4800].iter().all(|&b| b == 0xFF));
        assert!(mock.memory[0x4800..0x8000].iter().all(|&b| b == 0xCC));
        assert_eq!(mock.erases, [1]);
    }

    #[test]
    fn test_sub_sector_erase_at_sector_start() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);
        mock.preload(0x4000, &[0x11; 0x4000]);

        erase_range(&mut mock, 0x4000, 0x100).unwrap();

        assert!(mock.memory[0x4000..0x4100].iter().all(|&b| b == 0xFF));
        assert!(mock.memory[0x4100..0x8000].iter().all(|&b| b == 0x11));
        // Only the tail was written back
        assert!(mock.programs.iter().all(|&(addr, _)| addr >= 0x4100));
    }

    #[test]
    fn test_sub_sector_erase_double_word_family() {
        let mut mock = MockFlash::new(FlashFamily::stm32l4(64 * 1024));
        mock.preload(0x800, &[0x5A; 0x800]);

        // Not aligned to the 8-byte write unit on either end
        erase_range(&mut mock, 0x80B, 0x13).unwrap();

        assert!(mock.memory[0x800..0x80B].iter().all(|&b| b == 0x5A));
        assert!(mock.memory[0x80B..0x81E].iter().all(|&b| b == 0xFF));
        assert!(mock.memory[0x81E..0x1000].iter().all(|&b| b == 0x5A));
        assert_eq!(mock.erases, [1]);
    }

    #[test]
    fn test_cross_sector_rejected() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);
        // Already erased, still rejected
        assert_eq!(erase_range(&mut mock, 0x3000, 0x2000), Err(Error::InvalidArgument));
        assert_eq!(erase_range(&mut mock, 0x4000, 0x8000), Err(Error::InvalidArgument));

        mock.preload(0x3000, &[0x00; 0x2000]);
        assert_eq!(erase_range(&mut mock, 0x3000, 0x2000), Err(Error::InvalidArgument));
        assert_eq!(mock.hardware_ops(), 0);
    }

    #[test]
    fn test_offset_beyond_flash() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);
        let capacity = mock.memory.len();
        assert_eq!(erase_range(&mut mock, capacity, 1), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_failed_restore_reports_io_error() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);
        mock.preload(0x4000, &[0xAA; 0x100]);
        mock.preload(0x4100, &[0xBB; 0x100]);
        mock.fail_program_at = Some(0x4080);

        assert_eq!(erase_range(&mut mock, 0x4100, 0x100), Err(Error::Io));

        // The sector was erased and only partly written back
        assert_eq!(mock.erases, [1]);
        assert!(mock.memory[0x4000..0x4080].iter().all(|&b| b == 0xAA));
        assert!(mock.memory[0x4080..0x4100].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_failed_sector_erase_during_emulation() {
        let mut mock = MockFlash::new(FlashFamily::STM32F4_512K);
        mock.preload(0x4000, &[0xAA; 0x200]);
        mock.fail_erase = true;

        assert_eq!(erase_range(&mut mock, 0x4100, 0x10), Err(Error::Io));
        assert_eq!(mock.erases, [1]);
        assert!(mock.programs.is_empty());
        // Nothing is written back after a failed erase
        assert!(mock.memory[0x4000..0x4200].iter().all(|&b| b == 0xAA));
        assert!(mock.locked);
    }
}
