//! Shared device handle
//!
//! A [`Device`] is one reference to a device instance. All handles of an
//! instance share its driver state and a reference count. The driver's
//! `close` runs exactly once, when the last reference is closed; dropping a
//! handle without closing it keeps its reference alive.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use vfsdev_core::{DeviceOps, Error, Result};

/// Driver state of an open device, as returned by a device type's `open`
pub type DeviceBox = Box<dyn DeviceOps + Send>;

struct DeviceState {
    refs: usize,
    /// `None` once the last reference has been closed
    ops: Option<DeviceBox>,
}

struct DeviceInner {
    state: Mutex<DeviceState>,
}

/// Reference to a device instance
///
/// Obtained from [`DeviceRegistry::create`](crate::DeviceRegistry::create)
/// or [`DeviceRegistry::open`](crate::DeviceRegistry::open) and released
/// with [`Device::close`].
///
/// Data operations hold the instance's lock for their full duration, so
/// handles may be used from several threads.
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    /// Wrap freshly opened driver state with a reference count of 1
    pub(crate) fn new(ops: DeviceBox) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                state: Mutex::new(DeviceState {
                    refs: 1,
                    ops: Some(ops),
                }),
            }),
        }
    }

    /// Take one more reference to the same instance
    pub(crate) fn share(&self) -> Self {
        self.lock().refs += 1;
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_ops<T>(&self, f: impl FnOnce(&mut DeviceBox) -> Result<T>) -> Result<T> {
        match self.lock().ops.as_mut() {
            Some(ops) => f(ops),
            None => Err(Error::DeviceGone),
        }
    }

    /// Read `buf.len()` bytes at `offset`
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.with_ops(|ops| ops.read(offset, buf))
    }

    /// Write `data` at `offset`
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.with_ops(|ops| ops.write(offset, data))
    }

    /// Erase `len` bytes at `offset`
    pub fn erase(&self, offset: usize, len: usize) -> Result<()> {
        self.with_ops(|ops| ops.erase(offset, len))
    }

    /// Addressable size in bytes (0 once the instance is closed)
    pub fn size(&self) -> usize {
        self.lock().ops.as_ref().map_or(0, |ops| ops.size())
    }

    /// Current number of references to the instance
    pub fn ref_count(&self) -> usize {
        self.lock().refs
    }

    /// True if both handles refer to the same instance
    pub fn same_device(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Release this reference
    ///
    /// When it was the last one, the driver's `close` runs and its result is
    /// returned. Otherwise this always succeeds.
    pub fn close(self) -> Result<()> {
        let ops = {
            let mut state = self.lock();
            if state.refs == 0 {
                return Err(Error::DeviceGone);
            }
            state.refs -= 1;
            if state.refs > 0 {
                log::trace!("device {:p}: {} refs left", Arc::as_ptr(&self.inner), state.refs);
                return Ok(());
            }
            state.ops.take()
        };
        match ops {
            Some(mut ops) => {
                log::debug!("device {:p}: closing", Arc::as_ptr(&self.inner));
                ops.close()
            }
            None => Err(Error::DeviceGone),
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Device")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .field("refs", &state.refs)
            .field("open", &state.ops.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory device counting driver closes
    pub(crate) struct RamDevice {
        pub data: Vec<u8>,
        pub closes: Arc<AtomicUsize>,
    }

    impl RamDevice {
        pub(crate) fn new(size: usize, closes: Arc<AtomicUsize>) -> Self {
            Self {
                data: vec![0xFF; size],
                closes,
            }
        }
    }

    impl DeviceOps for RamDevice {
        fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
            if !self.is_valid_range(offset, buf.len()) {
                return Err(Error::InvalidArgument);
            }
            buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
            Ok(())
        }

        fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
            if !self.is_valid_range(offset, data.len()) {
                return Err(Error::InvalidArgument);
            }
            self.data[offset..offset + data.len()].copy_from_slice(data);
            Ok(())
        }

        fn erase(&mut self, offset: usize, len: usize) -> Result<()> {
            if !self.is_valid_range(offset, len) {
                return Err(Error::InvalidArgument);
            }
            self.data[offset..offset + len].fill(0xFF);
            Ok(())
        }

        fn size(&self) -> usize {
            self.data.len()
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_shared_state_and_refcount() {
        let closes = Arc::new(AtomicUsize::new(0));
        let dev = Device::new(Box::new(RamDevice::new(64, closes.clone())));
        let other = dev.share();
        assert_eq!(dev.ref_count(), 2);
        assert!(dev.same_device(&other));

        dev.write(4, &[1, 2, 3]).unwrap();
        let mut buf = [0u8; 3];
        other.read(4, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);

        dev.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(other.ref_count(), 1);

        other.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ops_after_last_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        let dev = Device::new(Box::new(RamDevice::new(16, closes.clone())));
        let stale = Device {
            inner: Arc::clone(&dev.inner),
        };

        dev.close().unwrap();

        assert_eq!(stale.read(0, &mut [0u8; 1]), Err(Error::DeviceGone));
        assert_eq!(stale.size(), 0);
        assert_eq!(stale.close(), Err(Error::DeviceGone));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_errors_pass_through() {
        let closes = Arc::new(AtomicUsize::new(0));
        let dev = Device::new(Box::new(RamDevice::new(16, closes)));
        assert_eq!(dev.erase(8, 9), Err(Error::InvalidArgument));
        assert_eq!(dev.size(), 16);
        dev.close().unwrap();
    }
}
