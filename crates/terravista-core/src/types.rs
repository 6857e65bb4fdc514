//! Identifiers and categories shared across subsystems.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Index of a terrain material tile in the world's tile grid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
#[repr(transparent)]
pub struct TileIndex(pub u32);

impl TileIndex {
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Interned identifier of a unique model path.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
#[repr(transparent)]
pub struct ModelId(pub u32);

impl ModelId {
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// World-load generation stamp.
///
/// Bumped on every world reload; asynchronous results carrying an older stamp
/// are discarded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// Return the following generation.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Category of a placed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    Buildings,
    Vegetation,
    Rocks,
    Props,
}

impl ObjectCategory {
    /// All categories in display order.
    pub const ALL: [Self; 4] = [Self::Buildings, Self::Vegetation, Self::Rocks, Self::Props];

    /// Dense index usable for per-category arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Buildings => 0,
            Self::Vegetation => 1,
            Self::Rocks => 2,
            Self::Props => 3,
        }
    }

    /// The toggle bit for this category.
    #[inline]
    pub const fn mask(self) -> CategoryMask {
        match self {
            Self::Buildings => CategoryMask::BUILDINGS,
            Self::Vegetation => CategoryMask::VEGETATION,
            Self::Rocks => CategoryMask::ROCKS,
            Self::Props => CategoryMask::PROPS,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Buildings => "buildings",
            Self::Vegetation => "vegetation",
            Self::Rocks => "rocks",
            Self::Props => "props",
        }
    }
}

bitflags! {
    /// User-toggleable set of visible object categories.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CategoryMask: u8 {
        const BUILDINGS = 1 << 0;
        const VEGETATION = 1 << 1;
        const ROCKS = 1 << 2;
        const PROPS = 1 << 3;
    }
}

impl Default for CategoryMask {
    fn default() -> Self {
        Self::all()
    }
}

impl CategoryMask {
    /// Returns true if objects of `category` should be drawn.
    #[inline]
    pub const fn allows(self, category: ObjectCategory) -> bool {
        self.contains(category.mask())
    }
}
