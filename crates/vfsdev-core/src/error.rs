//! Error types for vfsdev-core
//!
//! This module provides a no_std compatible error type shared by every
//! device implementation. The success case ("none") is `Ok(())`.

use core::fmt;

/// Device error kind - no_std compatible, Copy for efficiency
///
/// Each variant has a stable negative integer code (see [`Error::code`]) so
/// the platform layer above can map it onto its own error numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// Invalid parameter: bad options, out-of-bounds access, misaligned or
    /// unsupported (cross-sector) request
    InvalidArgument,
    /// Not enough memory (e.g. erase emulation buffer)
    NoMemory,
    /// Not enough space on device
    NoSpace,
    /// Access denied (protected region)
    AccessDenied,
    /// Operation timed out
    TimedOut,
    /// Integrity error (CRC, ECC or checksum)
    Corrupt,
    /// Device went away (closed while still referenced)
    DeviceGone,
    /// Hardware program, erase or verify failure
    Io,
}

impl Error {
    /// Stable integer code of this error kind
    pub const fn code(self) -> i32 {
        match self {
            Self::InvalidArgument => -1,
            Self::NoMemory => -2,
            Self::NoSpace => -3,
            Self::AccessDenied => -4,
            Self::TimedOut => -5,
            Self::Corrupt => -6,
            Self::DeviceGone => -7,
            Self::Io => -8,
        }
    }

    /// Inverse of [`Error::code`]
    ///
    /// Returns `None` for 0 (no error) and for unknown codes.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::InvalidArgument),
            -2 => Some(Self::NoMemory),
            -3 => Some(Self::NoSpace),
            -4 => Some(Self::AccessDenied),
            -5 => Some(Self::TimedOut),
            -6 => Some(Self::Corrupt),
            -7 => Some(Self::DeviceGone),
            -8 => Some(Self::Io),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::NoMemory => write!(f, "not enough memory"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::AccessDenied => write!(f, "access denied"),
            Self::TimedOut => write!(f, "operation timed out"),
            Self::Corrupt => write!(f, "integrity error"),
            Self::DeviceGone => write!(f, "device went away"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
