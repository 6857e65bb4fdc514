//! Pixel layers of a resolved tile.

use image::{Rgba, RgbaImage};
use terravista_core::constants::MAX_SURFACES;

/// Side length of the missing-tile placeholder.
pub const CHECKERBOARD_SIZE: u32 = 4;

/// Macro, normal and detail maps of one surface material.
#[derive(Clone, Debug)]
pub struct SurfaceLayers {
    pub macro_color: RgbaImage,
    pub normal: RgbaImage,
    pub detail: RgbaImage,
}

/// Everything resolved for one tile.
#[derive(Clone, Debug, Default)]
pub struct TileLayers {
    pub satellite: Option<RgbaImage>,
    pub mask: Option<RgbaImage>,
    /// At most [`MAX_SURFACES`] entries.
    pub surfaces: Vec<SurfaceLayers>,
}

impl TileLayers {
    /// A tile that is just one flat image.
    pub fn flat(image: RgbaImage) -> Self {
        Self {
            satellite: Some(image),
            ..Default::default()
        }
    }

    /// The missing-tile placeholder.
    pub fn missing() -> Self {
        Self::flat(checkerboard())
    }

    /// Drop surfaces beyond [`MAX_SURFACES`].
    #[must_use]
    pub fn truncated(mut self) -> Self {
        self.surfaces.truncate(MAX_SURFACES);
        self
    }

    /// Bytes of pixel data held.
    pub fn byte_size(&self) -> usize {
        let image = |img: &RgbaImage| img.as_raw().len();
        self.satellite.as_ref().map_or(0, image)
            + self.mask.as_ref().map_or(0, image)
            + self
                .surfaces
                .iter()
                .map(|s| image(&s.macro_color) + image(&s.normal) + image(&s.detail))
                .sum::<usize>()
    }
}

/// 4x4 magenta/black checkerboard substituted for tiles with no source.
pub fn checkerboard() -> RgbaImage {
    RgbaImage::from_fn(CHECKERBOARD_SIZE, CHECKERBOARD_SIZE, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 0, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}
