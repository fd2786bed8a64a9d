//! Sector geometry
//!
//! Describes how the physical flash is divided into erase units. Sizes may
//! be non-uniform (STM32F4/F7 sector tables) or a single page size repeated
//! over the whole part (STM32L4).

/// Layout of erase sectors over the physical flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorGeometry {
    /// Ordered sector sizes in bytes, starting at offset 0
    Table(&'static [usize]),
    /// `count` sectors of `size` bytes each
    Uniform {
        /// Size of each sector in bytes
        size: usize,
        /// Number of sectors
        count: usize,
    },
}

impl SectorGeometry {
    /// Create a uniform geometry
    pub const fn uniform(size: usize, count: usize) -> Self {
        Self::Uniform { size, count }
    }

    /// Number of sectors
    pub fn sector_count(&self) -> usize {
        match self {
            Self::Table(sizes) => sizes.len(),
            Self::Uniform { count, .. } => *count,
        }
    }

    /// Total physical capacity covered by the geometry
    pub fn capacity(&self) -> usize {
        match self {
            Self::Table(sizes) => sizes.iter().sum(),
            Self::Uniform { size, count } => size * count,
        }
    }

    /// Index of the sector containing `offset`
    ///
    /// Returns `None` once the table is exhausted, i.e. `offset` is at or
    /// beyond the physical capacity.
    pub fn sector_of(&self, offset: usize) -> Option<usize> {
        match self {
            Self::Table(sizes) => {
                let mut end = 0usize;
                for (index, size) in sizes.iter().enumerate() {
                    end += size;
                    if end > offset {
                        return Some(index);
                    }
                }
                None
            }
            Self::Uniform { size, count } => {
                let index = offset / size;
                (index < *count).then_some(index)
            }
        }
    }

    /// Start offset of sector `index`
    pub fn sector_offset(&self, index: usize) -> Option<usize> {
        match self {
            Self::Table(sizes) => {
                (index < sizes.len()).then(|| sizes[..index].iter().sum())
            }
            Self::Uniform { size, count } => (index < *count).then(|| index * size),
        }
    }

    /// Size of sector `index` in bytes
    pub fn sector_size(&self, index: usize) -> Option<usize> {
        match self {
            Self::Table(sizes) => sizes.get(index).copied(),
            Self::Uniform { size, count } => (index < *count).then_some(*size),
        }
    }

    /// Start offset and size of sector `index`
    pub fn sector_bounds(&self, index: usize) -> Option<(usize, usize)> {
        Some((self.sector_offset(index)?, self.sector_size(index)?))
    }
}
