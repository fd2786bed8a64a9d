//! Erase-state scanner
//!
//! Checks whether a byte range reads as erased (all 0xFF), a word at a time
//! with the trailing bytes tested one at a time.

use super::controller::FlashController;
use super::family::ERASED_BYTE;

const ERASED_WORD: u32 = u32::from_ne_bytes([ERASED_BYTE; 4]);

/// Bytes read from the controller per scan step
const SCAN_CHUNK: usize = 256;

/// Check that every byte of `bytes` is erased
///
/// Stops at the first byte or word that is not.
pub fn is_erased(bytes: &[u8]) -> bool {
    let mut words = bytes.chunks_exact(4);
    words
        .by_ref()
        .all(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]) == ERASED_WORD)
        && words.remainder().iter().all(|&b| b == ERASED_BYTE)
}

/// Offset of the first non-erased byte in `bytes`, if any
pub fn first_programmed(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b != ERASED_BYTE)
}

/// Check that `len` bytes of flash starting at `offset` are erased
///
/// A range outside the physical flash is reported as not erased.
pub fn region_is_erased<C: FlashController + ?Sized>(ctrl: &C, offset: usize, len: usize) -> bool {
    match offset.checked_add(len) {
        Some(end) if end <= ctrl.capacity() => {}
        _ => return false,
    }

    let mut buf = [0u8; SCAN_CHUNK];
    let mut pos = 0;
    while pos < len {
        let chunk = &mut buf[..(len - pos).min(SCAN_CHUNK)];
        ctrl.read(offset + pos, chunk);
        if !is_erased(chunk) {
            return false;
        }
        pos += chunk.len();
    }
    true
}

/// Check that sector `index` is fully erased
pub fn sector_is_erased<C: FlashController + ?Sized>(ctrl: &C, index: usize) -> bool {
    match ctrl.family().geometry.sector_bounds(index) {
        Some((offset, size)) => region_is_erased(ctrl, offset, size),
        None => false,
    }
}

/// Absolute offset of the first non-erased byte in a flash range
pub fn find_programmed<C: FlashController + ?Sized>(
    ctrl: &C,
    offset: usize,
    len: usize,
) -> Option<(usize, u8)> {
    let mut buf = [0u8; SCAN_CHUNK];
    let mut pos = 0;
    while pos < len {
        let chunk = &mut buf[..(len - pos).min(SCAN_CHUNK)];
        ctrl.read(offset + pos, chunk);
        if let Some(i) = first_programmed(chunk) {
            return Some((offset + pos + i, chunk[i]));
        }
        pos += chunk.len();
    }
    None
}
