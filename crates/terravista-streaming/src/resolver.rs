//! Texture resolution boundary.
//!
//! The host supplies a [`TextureResolver`] that turns candidate source paths
//! into pixels. Resolvers run on worker threads and must be `Send + Sync`.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use terravista_core::constants::MAX_SURFACES;
use thiserror::Error;
use tracing::trace;

use crate::layers::{SurfaceLayers, TileLayers};

/// Errors from resolving a tile's sources.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// None of the candidates exist.
    #[error("no source found among [{0}]")]
    NotFound(String),

    /// A source exists but could not be decoded.
    #[error("failed to decode {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// A layered bundle is missing a required layer.
    #[error("incomplete layered material at {0}")]
    Incomplete(String),
}

/// What a resolver produced for a tile.
#[derive(Clone, Debug)]
pub enum ResolvedTexture {
    /// A single image, used as the tile's satellite layer.
    Flat(RgbaImage),
    /// Satellite + mask + up to four surface triples.
    Layered(TileLayers),
}

impl ResolvedTexture {
    pub fn is_layered(&self) -> bool {
        matches!(self, Self::Layered(_))
    }

    pub fn into_layers(self) -> TileLayers {
        match self {
            Self::Flat(image) => TileLayers::flat(image),
            Self::Layered(layers) => layers.truncated(),
        }
    }
}

/// Resolves candidate source paths to pixels.
pub trait TextureResolver: Send + Sync {
    /// Try `candidates` in order and return the first that resolves.
    fn resolve(&self, candidates: &[String]) -> Result<ResolvedTexture, ResolveError>;
}

/// Resolver reading images from a directory tree.
///
/// A candidate naming a file is decoded as a flat image. A candidate naming a
/// directory is read as a layered bundle: `satellite.png`, `mask.png` and
/// `surface{N}_{macro,normal,detail}.png` for `N` in `0..4`.
#[derive(Clone, Debug)]
pub struct FsTextureResolver {
    root: PathBuf,
}

impl FsTextureResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load(path: &Path) -> Result<RgbaImage, ResolveError> {
        image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|source| ResolveError::Image {
                path: path.display().to_string(),
                source,
            })
    }

    fn load_optional(path: &Path) -> Result<Option<RgbaImage>, ResolveError> {
        if path.is_file() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn load_bundle(dir: &Path) -> Result<TileLayers, ResolveError> {
        let mut layers = TileLayers {
            satellite: Self::load_optional(&dir.join("satellite.png"))?,
            mask: Self::load_optional(&dir.join("mask.png"))?,
            surfaces: Vec::new(),
        };

        for index in 0..MAX_SURFACES {
            let layer = |kind: &str| dir.join(format!("surface{index}_{kind}.png"));
            let Some(macro_color) = Self::load_optional(&layer("macro"))? else {
                break;
            };
            let (Some(normal), Some(detail)) = (
                Self::load_optional(&layer("normal"))?,
                Self::load_optional(&layer("detail"))?,
            ) else {
                return Err(ResolveError::Incomplete(format!(
                    "{} (surface {index})",
                    dir.display()
                )));
            };
            layers.surfaces.push(SurfaceLayers {
                macro_color,
                normal,
                detail,
            });
        }

        if layers.satellite.is_none() && layers.mask.is_none() && layers.surfaces.is_empty() {
            return Err(ResolveError::Incomplete(dir.display().to_string()));
        }
        Ok(layers)
    }
}

impl TextureResolver for FsTextureResolver {
    fn resolve(&self, candidates: &[String]) -> Result<ResolvedTexture, ResolveError> {
        for candidate in candidates {
            let path = self.root.join(candidate);
            if path.is_dir() {
                trace!("Resolving layered material {}", path.display());
                return Self::load_bundle(&path).map(ResolvedTexture::Layered);
            }
            if path.is_file() {
                trace!("Resolving flat texture {}", path.display());
                return Self::load(&path).map(ResolvedTexture::Flat);
            }
        }
        Err(ResolveError::NotFound(candidates.join(", ")))
    }
}
