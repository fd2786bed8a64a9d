//! Error types for the device registry

use thiserror::Error;
use vfsdev_core::Error as DeviceError;

/// Registry and configuration errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No device type registered under this name
    #[error("unknown device type: {0}")]
    UnknownType(String),

    /// A device type with this name is already registered
    #[error("device type already registered: {0}")]
    DuplicateType(String),

    /// The name is already bound to a different device
    #[error("device name already in use: {0}")]
    DuplicateName(String),

    /// No device registered under this name
    #[error("device not found: {0}")]
    NotFound(String),

    /// Malformed, missing or out-of-range open options
    #[error("invalid device options: {0}")]
    InvalidOptions(String),

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by a device
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl RegistryError {
    /// Error kind reported to the layer above
    pub fn kind(&self) -> DeviceError {
        match self {
            Self::UnknownType(_)
            | Self::DuplicateType(_)
            | Self::DuplicateName(_)
            | Self::NotFound(_)
            | Self::InvalidOptions(_)
            | Self::Config(_) => DeviceError::InvalidArgument,
            Self::Io(_) => DeviceError::Io,
            Self::Device(e) => *e,
        }
    }
}

impl From<toml::de::Error> for RegistryError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            RegistryError::UnknownType("x".into()).kind(),
            DeviceError::InvalidArgument
        );
        assert_eq!(RegistryError::from(DeviceError::NoMemory).kind(), DeviceError::NoMemory);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(RegistryError::from(io).kind(), DeviceError::Io);
    }

    #[test]
    fn test_display() {
        let err = RegistryError::DuplicateName("fs0".into());
        assert_eq!(err.to_string(), "device name already in use: fs0");
        let err = RegistryError::from(DeviceError::Io);
        assert_eq!(err.to_string(), "device error: I/O error");
    }
}
