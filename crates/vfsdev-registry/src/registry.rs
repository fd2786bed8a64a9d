//! Device registry
//!
//! Maps device type names to their constructors and device names to shared
//! [`Device`] handles. The registry holds one reference to each named
//! device; unregistering drops that reference but never force-closes an
//! instance still held elsewhere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::RegistryConfig;
use crate::device::{Device, DeviceBox};
use crate::error::{RegistryError, Result};
use crate::options::DeviceOptions;

/// A kind of device that can be created from options
///
/// `open` parses the options and builds the driver state. Everything after
/// that goes through [`DeviceOps`](vfsdev_core::DeviceOps), including the
/// driver's `close`.
pub trait DeviceType: Send + Sync {
    /// Create driver state for a new instance
    ///
    /// The registry is available for types that stack on other devices.
    fn open(&self, registry: &DeviceRegistry, opts: &DeviceOptions) -> Result<DeviceBox>;
}

/// Owner of device types and named device instances
#[derive(Default)]
pub struct DeviceRegistry {
    types: Mutex<HashMap<String, Arc<dyn DeviceType>>>,
    devices: Mutex<HashMap<String, Device>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device type under `name`
    ///
    /// Registering the same name twice is a configuration error.
    pub fn register_type(&self, name: &str, ty: Arc<dyn DeviceType>) -> Result<()> {
        let mut types = lock(&self.types);
        if types.contains_key(name) {
            return Err(RegistryError::DuplicateType(name.to_string()));
        }
        types.insert(name.to_string(), ty);
        log::debug!("registered device type '{}'", name);
        Ok(())
    }

    /// Names of all registered device types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<_> = lock(&self.types).keys().cloned().collect();
        names.sort();
        names
    }

    /// Create a new device instance of type `type_name`
    ///
    /// The returned handle carries the only reference; close it when done.
    /// Nothing is registered on failure.
    pub fn create(&self, type_name: &str, opts: &DeviceOptions) -> Result<Device> {
        let ty = lock(&self.types)
            .get(type_name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))?;

        match ty.open(self, opts) {
            Ok(ops) => {
                let dev = Device::new(ops);
                log::debug!("created {} ({}): {:?}", type_name, opts, dev);
                Ok(dev)
            }
            Err(e) => {
                log::error!("failed to create {} ({}): {}", type_name, opts, e);
                Err(e)
            }
        }
    }

    /// Bind `dev` to `name`, adding one reference
    ///
    /// An empty name is a no-op. Re-registering the same device under the
    /// same name succeeds without adding a reference; a name bound to a
    /// different device is rejected.
    pub fn register(&self, dev: &Device, name: &str) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        let mut devices = lock(&self.devices);
        if let Some(existing) = devices.get(name) {
            if existing.same_device(dev) {
                return Ok(());
            }
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        devices.insert(name.to_string(), dev.share());
        log::info!("registered device '{}' (refs {})", name, dev.ref_count());
        Ok(())
    }

    /// Open the device registered as `name`, adding one reference
    pub fn open(&self, name: &str) -> Result<Device> {
        lock(&self.devices)
            .get(name)
            .map(Device::share)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Release a handle; see [`Device::close`]
    pub fn close(&self, dev: Device) -> Result<()> {
        dev.close().map_err(RegistryError::from)
    }

    /// Remove the binding of `name` and drop the registry's reference
    ///
    /// An empty name is a no-op. The driver is closed only if no other
    /// handle is open.
    pub fn unregister(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        let dev = lock(&self.devices)
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        log::info!("unregistered device '{}'", name);
        dev.close().map_err(|e| {
            log::error!("closing '{}' failed: {}", name, e);
            RegistryError::from(e)
        })
    }

    /// Unregister every named device
    ///
    /// All devices are unregistered even if some fail to close; the first
    /// error is returned.
    pub fn unregister_all(&self) -> Result<()> {
        let mut devices: Vec<_> = lock(&self.devices).drain().collect();
        devices.sort_by(|a, b| a.0.cmp(&b.0));

        let mut result = Ok(());
        for (name, dev) in devices {
            log::debug!("unregistering '{}'", name);
            if let Err(e) = dev.close() {
                log::error!("closing '{}' failed: {}", name, e);
                if result.is_ok() {
                    result = Err(RegistryError::from(e));
                }
            }
        }
        result
    }

    /// Create a device and register it under `name`
    ///
    /// The creator's reference is always closed afterwards, so on success
    /// the registry holds the only reference and on failure nothing leaks.
    pub fn create_and_register(
        &self,
        type_name: &str,
        opts: &DeviceOptions,
        name: &str,
    ) -> Result<()> {
        let dev = self.create(type_name, opts)?;
        let registered = self.register(&dev, name);
        let closed = dev.close();
        registered?;
        closed.map_err(RegistryError::from)
    }

    /// Names of all registered devices, sorted
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<_> = lock(&self.devices).keys().cloned().collect();
        names.sort();
        names
    }

    /// Reference count of the device registered as `name`
    pub fn ref_count(&self, name: &str) -> Option<usize> {
        lock(&self.devices).get(name).map(Device::ref_count)
    }

    /// Create and register every device of `config`, in order
    ///
    /// Stops at the first failure; devices created before it stay
    /// registered.
    pub fn apply_config(&self, config: &RegistryConfig) -> Result<()> {
        for entry in &config.device {
            let opts = entry.options();
            self.create_and_register(&entry.device_type, &opts, &entry.name)
                .map_err(|e| {
                    log::error!("device '{}' ({}): {}", entry.name, entry.device_type, e);
                    e
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::RamDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vfsdev_core::Error;

    /// Device type producing `RamDevice`s that share one close counter
    struct RamType {
        closes: Arc<AtomicUsize>,
    }

    impl DeviceType for RamType {
        fn open(&self, _registry: &DeviceRegistry, opts: &DeviceOptions) -> Result<DeviceBox> {
            let size = opts.require_usize("size")?;
            Ok(Box::new(RamDevice::new(size, self.closes.clone())))
        }
    }

    fn setup() -> (DeviceRegistry, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let registry = DeviceRegistry::new();
        registry
            .register_type(
                "ram",
                Arc::new(RamType {
                    closes: closes.clone(),
                }),
            )
            .unwrap();
        (registry, closes)
    }

    fn size_opts(size: usize) -> DeviceOptions {
        DeviceOptions::new().with("size", size.to_string())
    }

    #[test]
    fn test_refcount_lifecycle() {
        let (registry, closes) = setup();

        let dev = registry.create("ram", &size_opts(64)).unwrap();
        assert_eq!(dev.ref_count(), 1);

        registry.register(&dev, "fs0").unwrap();
        assert_eq!(registry.ref_count("fs0"), Some(2));

        let opened = registry.open("fs0").unwrap();
        assert_eq!(registry.ref_count("fs0"), Some(3));
        assert!(opened.same_device(&dev));

        registry.close(dev).unwrap();
        registry.close(opened).unwrap();
        assert_eq!(registry.ref_count("fs0"), Some(1));
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        registry.unregister("fs0").unwrap();
        assert_eq!(registry.ref_count("fs0"), None);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_keeps_open_handles() {
        let (registry, closes) = setup();
        registry.create_and_register("ram", &size_opts(16), "fs0").unwrap();

        let dev = registry.open("fs0").unwrap();
        registry.unregister("fs0").unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 0);
        dev.write(0, &[0x55]).unwrap();
        assert!(matches!(registry.open("fs0"), Err(RegistryError::NotFound(_))));

        dev.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_shares_state() {
        let (registry, _) = setup();
        registry.create_and_register("ram", &size_opts(16), "fs0").unwrap();

        let a = registry.open("fs0").unwrap();
        let b = registry.open("fs0").unwrap();
        a.write(3, &[9]).unwrap();
        let mut buf = [0u8; 1];
        b.read(3, &mut buf).unwrap();
        assert_eq!(buf, [9]);

        a.close().unwrap();
        b.close().unwrap();
        registry.unregister_all().unwrap();
    }

    #[test]
    fn test_create_failures_leave_nothing_registered() {
        let (registry, closes) = setup();

        assert!(matches!(
            registry.create("nand", &size_opts(16)),
            Err(RegistryError::UnknownType(_))
        ));
        assert!(matches!(
            registry.create_and_register("ram", &DeviceOptions::new(), "fs0"),
            Err(RegistryError::InvalidOptions(_))
        ));
        assert!(registry.registered_names().is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_name() {
        let (registry, closes) = setup();
        registry.create_and_register("ram", &size_opts(16), "fs0").unwrap();

        let result = registry.create_and_register("ram", &size_opts(32), "fs0");
        assert!(matches!(result, Err(RegistryError::DuplicateName(_))));
        // The rejected instance was closed, the registered one kept
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.ref_count("fs0"), Some(1));

        let dev = registry.open("fs0").unwrap();
        assert_eq!(dev.size(), 16);
        dev.close().unwrap();
    }

    #[test]
    fn test_reregister_same_device() {
        let (registry, _) = setup();
        let dev = registry.create("ram", &size_opts(16)).unwrap();

        registry.register(&dev, "fs0").unwrap();
        registry.register(&dev, "fs0").unwrap();
        assert_eq!(dev.ref_count(), 2);

        // Same instance under a second name adds a reference
        registry.register(&dev, "alias").unwrap();
        assert_eq!(dev.ref_count(), 3);

        dev.close().unwrap();
        registry.unregister_all().unwrap();
    }

    #[test]
    fn test_empty_names() {
        let (registry, closes) = setup();
        let dev = registry.create("ram", &size_opts(16)).unwrap();

        registry.register(&dev, "").unwrap();
        assert_eq!(dev.ref_count(), 1);
        registry.unregister("").unwrap();

        dev.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_unknown_name() {
        let (registry, _) = setup();
        assert!(matches!(
            registry.unregister("missing"),
            Err(RegistryError::NotFound(_))
        ));
        assert_eq!(
            registry.unregister("missing").unwrap_err().kind(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn test_unregister_all() {
        let (registry, closes) = setup();
        for name in ["b", "a", "c"] {
            registry.create_and_register("ram", &size_opts(8), name).unwrap();
        }
        assert_eq!(registry.registered_names(), ["a", "b", "c"]);

        registry.unregister_all().unwrap();
        assert!(registry.registered_names().is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_duplicate_type() {
        let (registry, closes) = setup();
        let result = registry.register_type("ram", Arc::new(RamType { closes }));
        assert!(matches!(result, Err(RegistryError::DuplicateType(_))));
        assert_eq!(registry.registered_types(), ["ram"]);
    }
}
