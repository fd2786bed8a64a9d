//! Window-bounded flash device
//!
//! A [`FlashWindow`] is a contiguous `(base, size)` slice of the physical
//! flash. Offsets passed to its operations are relative to `base` and are
//! checked against both the window and the physical capacity before any
//! hardware access.

use crate::device::DeviceOps;
use crate::error::{Error, Result};

use super::controller::FlashController;
use super::emulate::erase_range;
use super::family::FlashFamily;
use super::program::write_region;

/// Bounds of one flash device instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashWindow {
    base: usize,
    size: usize,
}

impl FlashWindow {
    /// Create a window of `size` bytes at physical offset `base`
    ///
    /// # Errors
    /// `InvalidArgument` if `size` is zero or the window does not fit inside
    /// the physical flash of `family`.
    pub fn new(family: &FlashFamily, base: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument);
        }
        match base.checked_add(size) {
            Some(end) if end <= family.capacity() => Ok(Self { base, size }),
            _ => {
                log::debug!(
                    "window 0x{:x}+0x{:x} outside {} (0x{:x} bytes)",
                    base,
                    size,
                    family.name,
                    family.capacity()
                );
                Err(Error::InvalidArgument)
            }
        }
    }

    /// Window covering the whole physical flash
    pub fn whole(family: &FlashFamily) -> Self {
        Self {
            base: 0,
            size: family.capacity(),
        }
    }

    /// Physical offset of the window start
    pub fn base(&self) -> usize {
        self.base
    }

    /// Window size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Translate a window-relative range to a physical offset
    ///
    /// # Errors
    /// `InvalidArgument` if `offset + len` exceeds the window.
    pub fn translate(&self, offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(self.base + offset),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// Read `buf.len()` bytes at window `offset`
    pub fn read<C: FlashController + ?Sized>(
        &self,
        ctrl: &C,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<()> {
        let addr = self.checked(ctrl, offset, buf.len())?;
        ctrl.read(addr, buf);
        Ok(())
    }

    /// Program `data` at window `offset`
    pub fn write<C: FlashController + ?Sized>(
        &self,
        ctrl: &mut C,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        let addr = self.checked(ctrl, offset, data.len())?;
        write_region(ctrl, addr, data)
    }

    /// Erase `len` bytes at window `offset`
    pub fn erase<C: FlashController + ?Sized>(
        &self,
        ctrl: &mut C,
        offset: usize,
        len: usize,
    ) -> Result<()> {
        let addr = self.checked(ctrl, offset, len)?;
        erase_range(ctrl, addr, len)
    }

    fn checked<C: FlashController + ?Sized>(
        &self,
        ctrl: &C,
        offset: usize,
        len: usize,
    ) -> Result<usize> {
        let addr = self.translate(offset, len)?;
        // The window was validated against a family; the controller may
        // still be a different part.
        if addr + len > ctrl.capacity() {
            return Err(Error::InvalidArgument);
        }
        Ok(addr)
    }
}

/// Flash device owning its controller
///
/// Implements [`DeviceOps`] for a single window. Use this when one device
/// has exclusive use of the controller; shared controllers are handled by
/// the registry's `flash` type.
pub struct FlashDevice<C> {
    ctrl: C,
    window: FlashWindow,
}

impl<C: FlashController> FlashDevice<C> {
    /// Open a window of `size` bytes at physical offset `base`
    pub fn new(ctrl: C, base: usize, size: usize) -> Result<Self> {
        let window = FlashWindow::new(ctrl.family(), base, size)?;
        Ok(Self { ctrl, window })
    }

    /// The device's window
    pub fn window(&self) -> FlashWindow {
        self.window
    }

    /// Access the underlying controller
    pub fn controller(&self) -> &C {
        &self.ctrl
    }

    /// Give back the controller
    pub fn into_inner(self) -> C {
        self.ctrl
    }
}

/// Log the outcome of a device data operation
pub fn log_op(op: &str, base: usize, len: usize, offset: usize, result: &Result<()>) {
    match result {
        Ok(()) => log::debug!("flash@0x{:x} {} {} @ 0x{:x} = ok", base, op, len, offset),
        Err(e) => log::error!(
            "flash@0x{:x} {} {} @ 0x{:x} = {} ({})",
            base,
            op,
            len,
            offset,
            e,
            e.code()
        ),
    }
}

impl<C: FlashController> DeviceOps for FlashDevice<C> {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let result = self.window.read(&self.ctrl, offset, buf);
        log_op("read", self.window.base, buf.len(), offset, &result);
        result
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let result = self.window.write(&mut self.ctrl, offset, data);
        log_op("write", self.window.base, data.len(), offset, &result);
        result
    }

    fn erase(&mut self, offset: usize, len: usize) -> Result<()> {
        let result = self.window.erase(&mut self.ctrl, offset, len);
        log_op("erase", self.window.base, len, offset, &result);
        result
    }

    fn size(&self) -> usize {
        self.window.size
    }
}
