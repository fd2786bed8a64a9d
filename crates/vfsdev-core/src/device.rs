//! Device operations contract
//!
//! Every storage backend (flash window, partition, ...) implements
//! [`DeviceOps`]. Construction from open options is the job of the device
//! type that creates the instance; everything after that goes through this
//! trait.

use crate::error::Result;

/// Capability set implemented by every device type
///
/// # All-or-nothing transfers
///
/// `read` and `write` either move the whole buffer or fail. A partial
/// transfer is never reported as success.
///
/// # Example
///
/// ```ignore
/// use vfsdev_core::DeviceOps;
///
/// fn read_header(dev: &mut dyn DeviceOps) -> vfsdev_core::Result<[u8; 16]> {
///     let mut buf = [0u8; 16];
///     dev.read(0, &mut buf)?;
///     Ok(buf)
/// }
/// ```
pub trait DeviceOps {
    /// Read `buf.len()` bytes starting at `offset`
    ///
    /// # Errors
    /// * `InvalidArgument` - If the range extends beyond the device
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `offset`
    ///
    /// On NOR flash the target must already be erased; written bits can only
    /// go from 1 to 0.
    ///
    /// # Errors
    /// * `InvalidArgument` - Out of bounds or misaligned for the hardware
    /// * `Io` - Programming failed or read-back verification mismatched
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()>;

    /// Erase `len` bytes starting at `offset`
    ///
    /// # Errors
    /// * `InvalidArgument` - Out of bounds or unsupported range
    /// * `NoMemory` - A temporary buffer could not be allocated
    /// * `Io` - The hardware erase or restore failed
    fn erase(&mut self, offset: usize, len: usize) -> Result<()>;

    /// Addressable size of the device in bytes
    fn size(&self) -> usize;

    /// Release driver-private resources
    ///
    /// Called exactly once, when the last reference to the device is closed.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Check if a range is valid for this device
    fn is_valid_range(&self, offset: usize, len: usize) -> bool {
        offset
            .checked_add(len)
            .map_or(false, |end| end <= self.size())
    }
}

impl<D: DeviceOps + ?Sized> DeviceOps for alloc::boxed::Box<D> {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        (**self).write(offset, data)
    }

    fn erase(&mut self, offset: usize, len: usize) -> Result<()> {
        (**self).erase(offset, len)
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
