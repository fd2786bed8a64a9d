//! vfsdev - Storage device layer over NOR flash
//!
//! Runs the device registry and flash driver against a simulated flash
//! controller backed by an image file.
//!
//! # Architecture
//!
//! Devices are created from a TOML configuration (or a single whole-part
//! `flash` device) and accessed by name through the registry, exactly as a
//! filesystem layer would on target hardware. Mutating commands write the
//! simulated flash contents back to the image file.

mod cli;
mod commands;

use std::path::Path;
use std::sync::{Arc, PoisonError};

use clap::Parser;
use cli::{Cli, Commands};
use vfsdev_core::flash::FlashFamily;
use vfsdev_registry::{DeviceOptions, DeviceRegistry, FlashType, PartType, RegistryConfig};
use vfsdev_sim::SimFlash;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still overrides the level chosen by -v
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(cli.verbose)),
    )
    .init();

    let family = FlashFamily::by_name(&cli.family)
        .ok_or_else(|| format!("Unknown flash family: {}", cli.family))?;
    let sim = load_image(family, &cli.image)?;

    let flash_type = FlashType::new(sim);
    let ctrl = flash_type.controller();
    let registry = DeviceRegistry::new();
    registry.register_type("flash", Arc::new(flash_type))?;
    registry.register_type("part", Arc::new(PartType))?;

    let result = setup_devices(&registry, &family, cli.config.as_deref())
        .and_then(|()| run_command(&registry, &family, &cli.command));

    if cli.command.mutates() {
        let sim = ctrl.lock().unwrap_or_else(PoisonError::into_inner);
        std::fs::write(&cli.image, sim.image())?;
        log::info!("Saved image to {:?}", cli.image);
    }

    let teardown = registry.unregister_all();
    result?;
    teardown?;
    Ok(())
}

/// Default log filter for the given number of `-v` flags
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Load the flash image, or start blank if it does not exist yet
fn load_image(family: FlashFamily, path: &Path) -> Result<SimFlash, Box<dyn std::error::Error>> {
    if !path.exists() {
        log::info!("Image {:?} not found, starting with blank {}", path, family.name);
        return Ok(SimFlash::new(family));
    }
    let data = std::fs::read(path)?;
    log::info!("Loaded {} bytes from {:?}", data.len(), path);
    Ok(SimFlash::from_image(family, &data)?)
}

/// Register the configured devices, or one whole-part `flash` device
fn setup_devices(
    registry: &DeviceRegistry,
    family: &FlashFamily,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match config {
        Some(path) => {
            let config = RegistryConfig::from_toml_file(path)?;
            registry.apply_config(&config)?;
        }
        None => {
            let opts = DeviceOptions::new()
                .with("addr", "0")
                .with("size", family.capacity().to_string());
            registry.create_and_register("flash", &opts, "flash")?;
        }
    }
    log::info!("Registered devices: {}", registry.registered_names().join(", "));
    Ok(())
}

fn run_command(
    registry: &DeviceRegistry,
    family: &FlashFamily,
    command: &Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List => commands::run_list(registry),
        Commands::Info { device } => commands::run_info(registry, family, device),
        Commands::Read {
            device,
            offset,
            len,
            output,
        } => commands::run_read(registry, device, *offset, *len, output.as_deref()),
        Commands::Write {
            device,
            offset,
            input,
        } => commands::run_write(registry, device, *offset, input),
        Commands::Erase {
            device,
            offset,
            len,
        } => commands::run_erase(registry, device, *offset, *len),
        Commands::Check {
            device,
            offset,
            len,
        } => commands::run_check(registry, device, *offset, *len),
    }
}
