//! `part` device type
//!
//! A fixed sub-range of another registered device.
//!
//! Options:
//! - `dev`: name of the parent device (required)
//! - `offset`: start within the parent (default 0)
//! - `size`: length in bytes (default: rest of the parent)
//!
//! The parent is opened at creation, which adds a reference, and closed
//! together with the partition.

use vfsdev_core::{DeviceOps, Error, Result as DeviceResult};

use crate::device::{Device, DeviceBox};
use crate::error::{RegistryError, Result};
use crate::options::DeviceOptions;
use crate::registry::{DeviceRegistry, DeviceType};

/// Device type creating partitions of registered devices
#[derive(Debug, Default, Clone, Copy)]
pub struct PartType;

impl DeviceType for PartType {
    fn open(&self, registry: &DeviceRegistry, opts: &DeviceOptions) -> Result<DeviceBox> {
        let name = opts
            .get("dev")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| RegistryError::InvalidOptions("missing option 'dev'".into()))?;
        let offset = opts.get_usize("offset")?.unwrap_or(0);
        let size = opts.get_usize("size")?;

        let parent = registry.open(name)?;
        let parent_size = parent.size();
        let size = size.unwrap_or_else(|| parent_size.saturating_sub(offset));
        let fits = offset
            .checked_add(size)
            .is_some_and(|end| end <= parent_size);
        if size == 0 || !fits {
            log::error!(
                "partition 0x{:x}+0x{:x} does not fit '{}' (0x{:x} bytes)",
                offset,
                size,
                name,
                parent_size
            );
            parent.close()?;
            return Err(Error::InvalidArgument.into());
        }

        log::info!("partition '{}' 0x{:x}+0x{:x}", name, offset, size);
        Ok(Box::new(PartDevice {
            parent: Some(parent),
            offset,
            size,
        }))
    }
}

/// Driver state of one `part` device
pub struct PartDevice {
    /// `None` after close
    parent: Option<Device>,
    offset: usize,
    size: usize,
}

impl PartDevice {
    fn parent(&self, offset: usize, len: usize) -> DeviceResult<(&Device, usize)> {
        if !self.is_valid_range(offset, len) {
            return Err(Error::InvalidArgument);
        }
        let parent = self.parent.as_ref().ok_or(Error::DeviceGone)?;
        Ok((parent, self.offset + offset))
    }
}

impl DeviceOps for PartDevice {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> DeviceResult<()> {
        let (parent, addr) = self.parent(offset, buf.len())?;
        parent.read(addr, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> DeviceResult<()> {
        let (parent, addr) = self.parent(offset, data.len())?;
        parent.write(addr, data)
    }

    fn erase(&mut self, offset: usize, len: usize) -> DeviceResult<()> {
        let (parent, addr) = self.parent(offset, len)?;
        parent.erase(addr, len)
    }

    fn size(&self) -> usize {
        self.size
    }

    fn close(&mut self) -> DeviceResult<()> {
        match self.parent.take() {
            Some(parent) => parent.close(),
            None => Ok(()),
        }
    }
}
