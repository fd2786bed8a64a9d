//! Erase and erase-check commands

use vfsdev_core::flash::first_programmed;
use vfsdev_registry::DeviceRegistry;

use super::with_device;

/// Run the erase command
///
/// The range must lie within one sector; ranges smaller than a sector are
/// emulated and are not power-fail safe.
pub fn run_erase(
    registry: &DeviceRegistry,
    name: &str,
    offset: usize,
    len: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    with_device(registry, name, |dev| Ok(dev.erase(offset, len)?))?;
    println!("Erased {} bytes of {} at {:#x}", len, name, offset);
    Ok(())
}

/// Run the check command
pub fn run_check(
    registry: &DeviceRegistry,
    name: &str,
    offset: usize,
    len: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut data = vec![0u8; len];
    with_device(registry, name, |dev| Ok(dev.read(offset, &mut data)?))?;

    match first_programmed(&data) {
        None => println!("{:#x}+{:#x}: erased", offset, len),
        Some(pos) => println!(
            "{:#x}+{:#x}: not erased (0x{:02x} at {:#x})",
            offset,
            len,
            data[pos],
            offset + pos
        ),
    }
    Ok(())
}
