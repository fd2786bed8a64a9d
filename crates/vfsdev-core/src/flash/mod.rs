//! NOR flash driver
//!
//! Layered leaves first:
//! - [`SectorGeometry`] and [`FlashFamily`] describe the hardware
//! - [`FlashController`] is the register-level seam
//! - the erase-state scanner, programmer and erase emulator drive a
//!   controller through program and erase sequences
//! - [`FlashWindow`] and [`FlashDevice`] expose a bounded region through
//!   the [`DeviceOps`](crate::DeviceOps) contract

mod controller;
mod emulate;
mod erased;
mod family;
mod geometry;
#[cfg(test)]
pub(crate) mod mock;
mod program;
mod window;

pub use controller::{wait_idle, FlashController, FlashStatus};
pub use emulate::{classify, erase_range, EraseKind};
pub use erased::{find_programmed, first_programmed, is_erased, region_is_erased, sector_is_erased};
pub use family::{
    FlashFamily, ERASED_BYTE, STM32F4_1536K_SECTORS, STM32F4_1M_SECTORS, STM32F4_2M_DUAL_SECTORS,
    STM32F4_512K_SECTORS, STM32F7_1M_SECTORS, STM32L4_PAGE_SIZE, STM32L4_WRITE_UNIT,
};
pub use geometry::SectorGeometry;
pub use program::{erase_sector, write_region};
pub use window::{log_op, FlashDevice, FlashWindow};
