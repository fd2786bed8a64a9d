//! Device open options
//!
//! Options are `key=value` pairs, written on the command line as
//! `key=value,key=value`. Integers may be decimal or `0x` hex.

use crate::error::{RegistryError, Result};

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> std::result::Result<usize, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Ordered key/value options passed to a device type's `open`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceOptions {
    entries: Vec<(String, String)>,
}

impl DeviceOptions {
    /// Empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value,key=value`
    ///
    /// An empty string yields an empty set. Later keys override earlier ones.
    pub fn parse(s: &str) -> Result<Self> {
        let mut opts = Self::new();
        for opt in s.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            match opt.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    opts.set(key.trim(), value.trim());
                }
                _ => {
                    return Err(RegistryError::InvalidOptions(format!(
                        "invalid parameter format: '{}' (expected key=value)",
                        opt
                    )))
                }
            }
        }
        Ok(opts)
    }

    /// Set `key` to `value`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Builder form of [`DeviceOptions::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Raw value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Integer value of `key`, if present
    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get(key)
            .map(|v| {
                parse_number(v)
                    .map_err(|e| RegistryError::InvalidOptions(format!("{}: {}", key, e)))
            })
            .transpose()
    }

    /// Integer value of a mandatory `key`
    pub fn require_usize(&self, key: &str) -> Result<usize> {
        self.get_usize(key)?
            .ok_or_else(|| RegistryError::InvalidOptions(format!("missing option '{}'", key)))
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True if no options are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for DeviceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}
