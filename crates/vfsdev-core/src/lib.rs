//! vfsdev-core - Block device contract and NOR flash driver
//!
//! This crate provides the device operations contract shared by all storage
//! backends and a flash driver that maps a byte-addressable read/write/erase
//! interface onto sector-erase-only NOR flash. It is `no_std` and needs only
//! `alloc` (for the erase emulation buffer).
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for [`Error`]
//! - `stm32` - Register-level controllers for STM32 flash interfaces
//!
//! # Example
//!
//! ```ignore
//! use vfsdev_core::flash::{FlashDevice, FlashFamily};
//! use vfsdev_core::DeviceOps;
//!
//! fn format_area<C: vfsdev_core::flash::FlashController>(ctrl: C) -> vfsdev_core::Result<()> {
//!     let mut dev = FlashDevice::new(ctrl, 0x8000, 0x4000)?;
//!     dev.erase(0, dev.size())?;
//!     dev.write(0, b"FS01")
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod device;
pub mod error;
pub mod flash;
#[cfg(feature = "stm32")]
pub mod stm32;

pub use device::DeviceOps;
pub use error::{Error, Result};
