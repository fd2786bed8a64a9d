//! TOML startup configuration
//!
//! Lists device instances to create and register at startup:
//!
//! ```toml
//! [[device]]
//! name = "fs0"
//! type = "flash"
//! [device.options]
//! addr = 0x8000
//! size = "0x4000"
//! ```
//!
//! Option values may be TOML integers or strings; strings are passed to the
//! device type unchanged.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::options::DeviceOptions;

/// Root of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Devices in creation order
    #[serde(default)]
    pub device: Vec<DeviceConfig>,
}

/// One device instance
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Registry name (empty: create and close without registering)
    pub name: String,
    /// Device type name
    #[serde(rename = "type")]
    pub device_type: String,
    /// Options passed to the device type
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

/// Option value as written in TOML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Integer value
    Int(u64),
    /// String value (names, hex strings)
    Str(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl DeviceConfig {
    /// Options in the form passed to [`DeviceType::open`](crate::DeviceType::open)
    pub fn options(&self) -> DeviceOptions {
        let mut opts = DeviceOptions::new();
        for (key, value) in &self.options {
            opts.set(key.as_str(), value.to_string());
        }
        opts
    }
}

impl RegistryConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Parse configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }
}
