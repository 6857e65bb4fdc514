//! Stub resolvers and synthetic worlds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use glam::{Mat4, Vec3};
use hashbrown::HashMap;
use image::{Rgba, RgbaImage};
use parking_lot::{Condvar, Mutex};
use terravista_app::WorldData;
use terravista_objects::{
    MeshGroup, ModelData, ModelLoadError, ModelLod, ModelResolver, ModelVertex,
};
use terravista_render::Camera;
use terravista_streaming::{
    ResolveError, ResolvedTexture, SurfaceLayers, TextureCatalog, TextureResolver, TileLayers,
};
use terravista_terrain::{Heightmap, TileLayout};

use crate::Result;

/// A `size` x `size` image of one color.
pub fn solid_image(size: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(size, size, Rgba(color))
}

/// Heightmap rising along X, and half as fast along Z.
pub fn ramp_heightmap(width: usize, height: usize, slope: f32) -> Result<Heightmap> {
    let heights = (0..height)
        .flat_map(|z| (0..width).map(move |x| (x as f32 + z as f32 * 0.5) * slope))
        .collect();
    Ok(Heightmap::new(width, height, heights)?)
}

/// Ramp world with one `tile{N}` candidate per material tile.
pub fn tiled_world(
    width: usize,
    height: usize,
    cell_size: f32,
    cells_per_tile: u32,
) -> Result<WorldData> {
    let layout = TileLayout::new(width, height, cells_per_tile);
    let mut world = WorldData::from_heightmap(ramp_heightmap(width, height, 0.25)?, cell_size);
    world.cells_per_tile = cells_per_tile;
    world.catalog = TextureCatalog::from_pattern(layout.tile_count(), "tile{tile}");
    Ok(world)
}

/// Camera straight above `center` at `altitude`, looking down.
pub fn overhead_view(center: Vec3, altitude: f32, aspect: f32) -> Camera {
    let eye = center + Vec3::Y * altitude;
    Camera::new(eye, center, 60f32.to_radians(), aspect, 0.5, 50_000.0)
}

/// View-projection for [`overhead_view`].
pub fn overhead_view_projection(center: Vec3, altitude: f32) -> Mat4 {
    overhead_view(center, altitude, 16.0 / 9.0).view_projection_matrix()
}

/// In-memory textures keyed by candidate name.
#[derive(Clone, Debug, Default)]
pub struct MemoryTextureResolver {
    textures: HashMap<String, ResolvedTexture>,
    calls: Arc<AtomicUsize>,
}

impl MemoryTextureResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver knowing `tile0..tile{count}` as solid images of `size` pixels.
    pub fn with_solid_tiles(count: usize, size: u32) -> Self {
        let mut resolver = Self::new();
        for tile in 0..count {
            let shade = (tile * 37 % 256) as u8;
            resolver.insert_flat(format!("tile{tile}"), solid_image(size, [shade, 128, 64, 255]));
        }
        resolver
    }

    pub fn insert_flat(&mut self, name: impl Into<String>, image: RgbaImage) {
        self.textures
            .insert(name.into(), ResolvedTexture::Flat(image));
    }

    /// Register a layered bundle with `surfaces` surface triples.
    pub fn insert_layered(&mut self, name: impl Into<String>, size: u32, surfaces: usize) {
        let surface = |i: usize| SurfaceLayers {
            macro_color: solid_image(size, [40 * i as u8, 90, 30, 255]),
            normal: solid_image(size, [128, 128, 255, 255]),
            detail: solid_image(size, [200, 200, 200, 255]),
        };
        let layers = TileLayers {
            satellite: Some(solid_image(size, [90, 110, 70, 255])),
            mask: Some(solid_image(size, [255, 0, 0, 0])),
            surfaces: (0..surfaces).map(surface).collect(),
        };
        self.textures
            .insert(name.into(), ResolvedTexture::Layered(layers));
    }

    /// Shared counter of `resolve` calls, readable after the resolver moved
    /// into a worker pool.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl TextureResolver for MemoryTextureResolver {
    fn resolve(&self, candidates: &[String]) -> std::result::Result<ResolvedTexture, ResolveError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        candidates
            .iter()
            .find_map(|name| self.textures.get(name).cloned())
            .ok_or_else(|| ResolveError::NotFound(candidates.join(", ")))
    }
}

/// Resolver that parks every call until [`GatedResolver::open`].
///
/// Lets tests hold jobs in flight while they change the streamer under them.
#[derive(Debug)]
pub struct GatedResolver {
    inner: MemoryTextureResolver,
    open: Mutex<bool>,
    opened: Condvar,
    entered_tx: Sender<()>,
    entered_rx: Receiver<()>,
}

impl GatedResolver {
    pub fn new(inner: MemoryTextureResolver) -> Arc<Self> {
        let (entered_tx, entered_rx) = channel::unbounded();
        Arc::new(Self {
            inner,
            open: Mutex::new(false),
            opened: Condvar::new(),
            entered_tx,
            entered_rx,
        })
    }

    /// Release every parked and future call.
    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    /// Wait until a worker is inside `resolve`.
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered_rx.recv_timeout(timeout).is_ok()
    }
}

impl TextureResolver for GatedResolver {
    fn resolve(&self, candidates: &[String]) -> std::result::Result<ResolvedTexture, ResolveError> {
        let _ = self.entered_tx.send(());
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
        drop(open);
        self.inner.resolve(candidates)
    }
}

/// Model resolver serving cubes.
///
/// Names starting with `missing` fail; `huge*` models are ten times larger.
#[derive(Debug, Default)]
pub struct StubModelResolver {
    calls: Arc<AtomicUsize>,
}

impl StubModelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ModelResolver for StubModelResolver {
    fn resolve(&self, name: &str) -> terravista_objects::Result<ModelData> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if name.starts_with("missing") {
            return Err(ModelLoadError::NotFound(name.to_string()));
        }
        let half = if name.starts_with("huge") { 10.0 } else { 1.0 };
        Ok(cube_model(half, 3))
    }
}

/// Cube of half-size `half` with `lods` identical levels of detail.
pub fn cube_model(half: f32, lods: usize) -> ModelData {
    let vertices: Vec<ModelVertex> = (0..8u32)
        .map(|i| {
            let corner = Vec3::new(
                if i & 1 == 0 { -half } else { half },
                if i & 2 == 0 { -half } else { half },
                if i & 4 == 0 { -half } else { half },
            );
            ModelVertex {
                position: corner.to_array(),
                normal: corner.normalize_or_zero().to_array(),
                uv: [0.0, 0.0],
            }
        })
        .collect();
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    let lod = ModelLod {
        groups: vec![MeshGroup {
            vertices,
            indices,
            material: 0,
        }],
    };
    ModelData::from_lods(vec![lod; lods.max(1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_resolver_tries_candidates_in_order() {
        let mut resolver = MemoryTextureResolver::new();
        resolver.insert_flat("b", solid_image(2, [1, 2, 3, 255]));
        resolver.insert_layered("c", 2, 2);
        let resolved = resolver
            .resolve(&["a".to_string(), "b".to_string(), "c".to_string()])
            .unwrap();
        assert!(!resolved.is_layered());
        assert!(resolver.resolve(&["c".to_string()]).unwrap().is_layered());
        assert!(matches!(
            resolver.resolve(&["a".to_string()]),
            Err(ResolveError::NotFound(_))
        ));
        assert_eq!(resolver.call_counter().load(Ordering::Relaxed), 3);
    }

    #[test]
    fn gate_blocks_until_opened() {
        let gate = GatedResolver::new(MemoryTextureResolver::with_solid_tiles(1, 2));
        let worker = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || gate.resolve(&["tile0".to_string()]).is_ok())
        };
        assert!(gate.wait_entered(Duration::from_secs(5)));
        assert!(!worker.is_finished());
        gate.open();
        assert!(worker.join().unwrap());
    }

    #[test]
    fn stub_models_validate() {
        let resolver = StubModelResolver::new();
        let model = resolver.resolve("tree").unwrap();
        assert_eq!(model.lods.len(), 3);
        assert!(model.validate("tree").is_ok());
        assert!((model.bounding_radius - 3f32.sqrt()).abs() < 1e-5);
        assert!(resolver.resolve("missing_house").is_err());
        assert_eq!(resolver.call_counter().load(Ordering::Relaxed), 2);
    }

    #[test]
    fn tiled_world_names_every_tile() {
        let world = tiled_world(65, 33, 2.0, 32).unwrap();
        assert_eq!(world.catalog.tile_count(), 2);
        assert_eq!(world.catalog.candidates(terravista_core::TileIndex(1)), ["tile1"]);
    }
}
