//! Built-in device types
//!
//! - `flash`: a window of a NOR flash controller ([`FlashType`])
//! - `part`: a sub-range of another registered device ([`PartType`])

mod flash;
mod part;

pub use flash::{FlashInstance, FlashType};
pub use part::{PartDevice, PartType};
