//! Write command implementation

use std::path::Path;

use vfsdev_registry::DeviceRegistry;

use super::with_device;

/// Run the write command
pub fn run_write(
    registry: &DeviceRegistry,
    name: &str,
    offset: usize,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    log::info!("Writing {} bytes from {:?} to {} @ {:#x}", data.len(), input, name, offset);

    with_device(registry, name, |dev| Ok(dev.write(offset, &data)?))?;

    println!("Wrote {} bytes to {} at {:#x}", data.len(), name, offset);
    Ok(())
}
