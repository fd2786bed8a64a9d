//! Device registry for vfsdev
//!
//! This crate owns named storage devices and their lifecycle. Device types
//! are registered once by name; instances are created from options, bound
//! to names, opened and closed with explicit reference counting.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 filesystem / CLI layer                   │
//! │   open(name) -> Device, read/write/erase, close(Device)  │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │               vfsdev-registry (this crate)               │
//! │  - DeviceRegistry: types + name -> Device map            │
//! │  - Device: shared handle with explicit refcount          │
//! │  - device types: "flash" (window), "part" (sub-range)    │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                       vfsdev-core                        │
//! │  - DeviceOps contract, Error kinds                       │
//! │  - flash programmer, erase emulation, FlashController    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vfsdev_registry::{DeviceOptions, DeviceRegistry, FlashType};
//!
//! let registry = DeviceRegistry::new();
//! registry.register_type("flash", Arc::new(FlashType::new(controller)))?;
//! registry.create_and_register("flash", &DeviceOptions::parse("addr=0x8000,size=0x4000")?, "fs0")?;
//!
//! let dev = registry.open("fs0")?;
//! dev.erase(0, 0x4000)?;
//! dev.close()?;
//! registry.unregister_all()?;
//! ```

mod config;
mod device;
mod error;
mod options;
mod registry;
pub mod types;

pub use config::{DeviceConfig, OptionValue, RegistryConfig};
pub use device::{Device, DeviceBox};
pub use error::{RegistryError, Result};
pub use options::{parse_number, DeviceOptions};
pub use registry::{DeviceRegistry, DeviceType};
pub use types::{FlashType, PartType};

pub use vfsdev_core::{DeviceOps, Error};
