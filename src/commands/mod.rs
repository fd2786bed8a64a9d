//! Command implementations

mod erase;
mod list;
mod read;
mod write;

pub use erase::{run_check, run_erase};
pub use list::{run_info, run_list};
pub use read::run_read;
pub use write::run_write;

use vfsdev_registry::{Device, DeviceRegistry};

/// Open `name`, run `f` on it and close it again
///
/// The handle is closed even if `f` fails; the first error wins.
pub(crate) fn with_device<T>(
    registry: &DeviceRegistry,
    name: &str,
    f: impl FnOnce(&Device) -> Result<T, Box<dyn std::error::Error>>,
) -> Result<T, Box<dyn std::error::Error>> {
    let dev = registry.open(name)?;
    let result = f(&dev);
    let closed = registry.close(dev);
    let value = result?;
    closed?;
    Ok(value)
}
