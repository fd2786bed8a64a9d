//! `flash` device type
//!
//! Options:
//! - `addr`: window start, offset from the beginning of the flash (required)
//! - `size`: window size in bytes (required, non-zero)
//!
//! All instances share one controller. Each data operation holds the
//! controller lock from unlock to re-lock, so operations of different
//! windows never interleave on the hardware.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use vfsdev_core::flash::{log_op, FlashController, FlashWindow};
use vfsdev_core::{DeviceOps, Result as DeviceResult};

use crate::device::DeviceBox;
use crate::error::Result;
use crate::options::DeviceOptions;
use crate::registry::{DeviceRegistry, DeviceType};

/// Device type creating windows over one flash controller
pub struct FlashType<C> {
    ctrl: Arc<Mutex<C>>,
}

impl<C: FlashController + Send + 'static> FlashType<C> {
    /// Device type taking ownership of `ctrl`
    pub fn new(ctrl: C) -> Self {
        Self::from_shared(Arc::new(Mutex::new(ctrl)))
    }

    /// Device type over an already shared controller
    pub fn from_shared(ctrl: Arc<Mutex<C>>) -> Self {
        Self { ctrl }
    }

    /// The shared controller
    pub fn controller(&self) -> Arc<Mutex<C>> {
        Arc::clone(&self.ctrl)
    }
}

impl<C: FlashController + Send + 'static> DeviceType for FlashType<C> {
    fn open(&self, _registry: &DeviceRegistry, opts: &DeviceOptions) -> Result<DeviceBox> {
        let addr = opts.require_usize("addr")?;
        let size = opts.require_usize("size")?;
        let family = *lock(&self.ctrl).family();

        let window = FlashWindow::new(&family, addr, size).map_err(|e| {
            log::error!(
                "invalid flash window 0x{:x}+0x{:x} for {} (0x{:x} bytes)",
                addr,
                size,
                family.name,
                family.capacity()
            );
            e
        })?;
        log::info!("flash window 0x{:x}+0x{:x} ({})", addr, size, family.name);

        Ok(Box::new(FlashInstance {
            ctrl: Arc::clone(&self.ctrl),
            window,
        }))
    }
}

fn lock<C>(ctrl: &Mutex<C>) -> MutexGuard<'_, C> {
    ctrl.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Driver state of one `flash` device
pub struct FlashInstance<C> {
    ctrl: Arc<Mutex<C>>,
    window: FlashWindow,
}

impl<C: FlashController> FlashInstance<C> {
    /// The instance's window
    pub fn window(&self) -> FlashWindow {
        self.window
    }
}

impl<C: FlashController> DeviceOps for FlashInstance<C> {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> DeviceResult<()> {
        let result = self.window.read(&*lock(&self.ctrl), offset, buf);
        log_op("read", self.window.base(), buf.len(), offset, &result);
        result
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> DeviceResult<()> {
        let result = self.window.write(&mut *lock(&self.ctrl), offset, data);
        log_op("write", self.window.base(), data.len(), offset, &result);
        result
    }

    fn erase(&mut self, offset: usize, len: usize) -> DeviceResult<()> {
        let result = self.window.erase(&mut *lock(&self.ctrl), offset, len);
        log_op("erase", self.window.base(), len, offset, &result);
        result
    }

    fn size(&self) -> usize {
        self.window.size()
    }

    fn close(&mut self) -> DeviceResult<()> {
        log::debug!(
            "flash@0x{:x}: closed window of 0x{:x} bytes",
            self.window.base(),
            self.window.size()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistryError;
    use vfsdev_core::flash::{sector_is_erased, FlashFamily};
    use vfsdev_core::Error;
    use vfsdev_sim::SimFlash;

    fn setup(family: FlashFamily) -> (DeviceRegistry, Arc<Mutex<SimFlash>>) {
        let ty = FlashType::new(SimFlash::new(family));
        let ctrl = ty.controller();
        let registry = DeviceRegistry::new();
        registry.register_type("flash", Arc::new(ty)).unwrap();
        (registry, ctrl)
    }

    fn window(addr: usize, size: usize) -> DeviceOptions {
        DeviceOptions::new()
            .with("addr", format!("{:#x}", addr))
            .with("size", format!("{:#x}", size))
    }

    #[test]
    fn test_open_validates_window() {
        let (registry, _) = setup(FlashFamily::STM32F4_1M);
        let capacity = FlashFamily::STM32F4_1M.capacity();

        for (addr, size) in [(0, capacity), (0x8000, 0x4000), (capacity - 0x100, 0x100)] {
            let dev = registry.create("flash", &window(addr, size)).unwrap();
            assert_eq!(dev.size(), size);
            dev.close().unwrap();
        }
        for (addr, size) in [(0, 0), (0, capacity + 1), (capacity, 1), (0x10000, capacity)] {
            let err = registry.create("flash", &window(addr, size)).unwrap_err();
            assert_eq!(err.kind(), Error::InvalidArgument, "{:x}+{:x}", addr, size);
        }
    }

    #[test]
    fn test_missing_options() {
        let (registry, _) = setup(FlashFamily::STM32F4_1M);
        let only_addr = DeviceOptions::new().with("addr", "0");
        let only_size = DeviceOptions::new().with("size", "0x4000");

        assert!(matches!(
            registry.create("flash", &only_addr),
            Err(RegistryError::InvalidOptions(_))
        ));
        assert!(matches!(
            registry.create("flash", &only_size),
            Err(RegistryError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_write_past_window() {
        let (registry, ctrl) = setup(FlashFamily::STM32F4_1M);
        let dev = registry.create("flash", &window(0x8000, 0x4000)).unwrap();

        assert_eq!(dev.write(0x3FFC, &[0u8; 8]), Err(Error::InvalidArgument));
        assert_eq!(lock(&ctrl).stats().unlocks, 0);
        dev.close().unwrap();
    }

    #[test]
    fn test_windows_share_controller() {
        let (registry, ctrl) = setup(FlashFamily::STM32F4_1M);
        registry
            .create_and_register("flash", &window(0x8000, 0x4000), "a")
            .unwrap();
        registry
            .create_and_register("flash", &window(0xC000, 0x4000), "b")
            .unwrap();

        let a = registry.open("a").unwrap();
        let b = registry.open("b").unwrap();
        a.write(0x10, b"first").unwrap();
        b.write(0x10, b"second").unwrap();

        {
            let sim = lock(&ctrl);
            let image = sim.image();
            assert_eq!(&image[0x8010..0x8015], b"first");
            assert_eq!(&image[0xC010..0xC016], b"second");
        }

        // Full-sector erase of one window leaves the other alone
        a.erase(0, 0x4000).unwrap();
        assert!(sector_is_erased(&*lock(&ctrl), 2));
        let mut buf = [0u8; 6];
        b.read(0x10, &mut buf).unwrap();
        assert_eq!(&buf, b"second");

        a.close().unwrap();
        b.close().unwrap();
        registry.unregister_all().unwrap();
    }

    #[test]
    fn test_sub_sector_erase_through_registry() {
        let (registry, ctrl) = setup(FlashFamily::STM32F4_512K);
        let dev = registry.create("flash", &window(0x4000, 0x4000)).unwrap();
        dev.write(0, &[0x11; 0x4000]).unwrap();

        dev.erase(0x100, 0x100).unwrap();

        let mut buf = vec![0u8; 0x4000];
        dev.read(0, &mut buf).unwrap();
        assert!(buf[..0x100].iter().all(|&b| b == 0x11));
        assert!(buf[0x100..0x200].iter().all(|&b| b == 0xFF));
        assert!(buf[0x200..].iter().all(|&b| b == 0x11));
        assert_eq!(lock(&ctrl).stats().sector_erases, 1);

        // Erasing it again touches nothing
        let before = lock(&ctrl).stats();
        dev.erase(0x100, 0x100).unwrap();
        assert_eq!(lock(&ctrl).stats(), before);
        dev.close().unwrap();
    }
}
