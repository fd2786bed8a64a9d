//! Hardware family descriptors
//!
//! A family bundles everything that differs between flash controllers but is
//! fixed for a given part: sector layout, programming granularity and write
//! alignment. Drivers are written against these values rather than against
//! compile-time switches.

use super::geometry::SectorGeometry;

/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xFF;

/// STM32F4 with 512 KiB of flash
pub const STM32F4_512K_SECTORS: &[usize] = &[
    16384, 16384, 16384, 16384, 65536, 131072, 131072, 131072,
];

/// STM32F4 with 1 MiB of flash
pub const STM32F4_1M_SECTORS: &[usize] = &[
    16384, 16384, 16384, 16384, 65536, 131072, 131072, 131072, 131072, 131072, 131072, 131072,
];

/// STM32F4 with 1.5 MiB of flash
pub const STM32F4_1536K_SECTORS: &[usize] = &[
    16384, 16384, 16384, 16384, 65536, 131072, 131072, 131072, 131072, 131072, 131072, 131072,
    131072, 131072, 131072, 131072,
];

/// STM32F4 with 2 MiB of flash in dual-bank mode
pub const STM32F4_2M_DUAL_SECTORS: &[usize] = &[
    16384, 16384, 16384, 16384, 65536, 131072, 131072, 131072, 131072, 131072, 131072, 131072,
    16384, 16384, 16384, 16384, 65536, 131072, 131072, 131072, 131072, 131072, 131072, 131072,
];

/// STM32F7 with 1 MiB of flash
pub const STM32F7_1M_SECTORS: &[usize] = &[
    32768, 32768, 32768, 32768, 131072, 262144, 262144, 262144,
];

/// STM32L4 page size
pub const STM32L4_PAGE_SIZE: usize = 2048;

/// STM32L4 programs one double word at a time
pub const STM32L4_WRITE_UNIT: usize = 8;

/// Flash hardware family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashFamily {
    /// Short identifier (e.g. "stm32f4-1m")
    pub name: &'static str,
    /// Erase sector layout
    pub geometry: SectorGeometry,
    /// Bytes programmed per hardware program operation
    pub write_unit: usize,
    /// Required alignment of write offset and length
    pub write_align: usize,
    /// Number of flash banks; sectors are split evenly between them
    pub banks: usize,
}

impl FlashFamily {
    /// STM32F4, 512 KiB, byte programming
    pub const STM32F4_512K: Self = Self::byte_programmed("stm32f4-512k", STM32F4_512K_SECTORS);
    /// STM32F4, 1 MiB, byte programming
    pub const STM32F4_1M: Self = Self::byte_programmed("stm32f4-1m", STM32F4_1M_SECTORS);
    /// STM32F4, 1.5 MiB, byte programming
    pub const STM32F4_1536K: Self = Self::byte_programmed("stm32f4-1536k", STM32F4_1536K_SECTORS);
    /// STM32F4, 2 MiB dual-bank, byte programming
    pub const STM32F4_2M_DUAL: Self = Self {
        banks: 2,
        ..Self::byte_programmed("stm32f4-2m-dual", STM32F4_2M_DUAL_SECTORS)
    };
    /// STM32F7, 1 MiB, byte programming
    pub const STM32F7_1M: Self = Self::byte_programmed("stm32f7-1m", STM32F7_1M_SECTORS);

    /// All families with a fixed layout
    pub const FIXED: &'static [FlashFamily] = &[
        Self::STM32F4_512K,
        Self::STM32F4_1M,
        Self::STM32F4_1536K,
        Self::STM32F4_2M_DUAL,
        Self::STM32F7_1M,
    ];

    const fn byte_programmed(name: &'static str, sectors: &'static [usize]) -> Self {
        Self {
            name,
            geometry: SectorGeometry::Table(sectors),
            write_unit: 1,
            write_align: 1,
            banks: 1,
        }
    }

    /// Dual-bank STM32L4 with `capacity` bytes of flash in 2 KiB pages
    ///
    /// Each bank holds half of the pages. Writes must be 8-byte aligned and
    /// a multiple of 8 bytes long.
    pub const fn stm32l4(capacity: usize) -> Self {
        Self {
            name: "stm32l4",
            geometry: SectorGeometry::uniform(STM32L4_PAGE_SIZE, capacity / STM32L4_PAGE_SIZE),
            write_unit: STM32L4_WRITE_UNIT,
            write_align: STM32L4_WRITE_UNIT,
            banks: 2,
        }
    }

    /// Single-bank STM32L4 with `capacity` bytes of flash in 2 KiB pages
    pub const fn stm32l4_single_bank(capacity: usize) -> Self {
        Self {
            banks: 1,
            ..Self::stm32l4(capacity)
        }
    }

    /// Look up a family by its short name
    ///
    /// Accepts the fixed-layout names plus `stm32l4-<KiB>k` for dual-bank
    /// and `stm32l4-<KiB>k-sb` for single-bank parts (e.g. `stm32l4-512k`).
    pub fn by_name(name: &str) -> Option<Self> {
        if let Some(family) = Self::FIXED.iter().find(|f| f.name == name) {
            return Some(*family);
        }
        let size = name.strip_prefix("stm32l4-")?;
        let (size, single_bank) = match size.strip_suffix("-sb") {
            Some(size) => (size, true),
            None => (size, false),
        };
        let kib: usize = size.strip_suffix('k')?.parse().ok()?;
        let capacity = kib.checked_mul(1024)?;
        if capacity == 0 || capacity % STM32L4_PAGE_SIZE != 0 {
            return None;
        }
        if single_bank {
            Some(Self::stm32l4_single_bank(capacity))
        } else {
            Some(Self::stm32l4(capacity))
        }
    }

    /// Physical flash capacity in bytes
    pub fn capacity(&self) -> usize {
        self.geometry.capacity()
    }

    /// Sectors in each bank
    pub fn bank_sectors(&self) -> usize {
        self.geometry.sector_count() / self.banks.max(1)
    }

    /// Check that a write at absolute `offset` of `len` bytes meets the
    /// alignment rules of this family
    pub fn is_write_aligned(&self, offset: usize, len: usize) -> bool {
        offset % self.write_align == 0 && len % self.write_unit == 0
    }
}
