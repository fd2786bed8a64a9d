//! List and info commands

use vfsdev_core::flash::FlashFamily;
use vfsdev_registry::DeviceRegistry;

use super::with_device;

/// Run the list command
pub fn run_list(registry: &DeviceRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let names = registry.registered_names();
    if names.is_empty() {
        println!("No devices registered");
        return Ok(());
    }

    println!("{:<16} {:>12} {:>6}", "NAME", "SIZE", "REFS");
    for name in names {
        let refs = registry.ref_count(&name).unwrap_or(0);
        let size = with_device(registry, &name, |dev| Ok(dev.size()))?;
        println!("{:<16} {:>#12x} {:>6}", name, size, refs);
    }
    Ok(())
}

/// Run the info command
pub fn run_info(
    registry: &DeviceRegistry,
    family: &FlashFamily,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = with_device(registry, name, |dev| Ok(dev.size()))?;

    println!("Device:      {}", name);
    println!("Size:        {} bytes ({:#x})", size, size);
    println!("References:  {}", registry.ref_count(name).unwrap_or(0));
    println!();
    println!("Flash:       {}", family.name);
    println!("Capacity:    {} bytes", family.capacity());
    println!("Write unit:  {} bytes", family.write_unit);
    println!("Sectors:     {}", family.geometry.sector_count());
    for index in 0..family.geometry.sector_count() {
        if let Some((offset, size)) = family.geometry.sector_bounds(index) {
            log::debug!("  sector {:>3}: {:#010x} + {:#x}", index, offset, size);
        }
    }
    Ok(())
}
