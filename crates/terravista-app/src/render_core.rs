//! The per-session render core.

use std::time::Instant;

use anyhow::Context;
use terravista_core::{ObjectCategory, TileIndex};
use terravista_gpu::{
    FrameSubmission, GpuDevice, OwnedTexture, RawTexture, TextureDesc, TextureFormat,
};
use terravista_objects::{ObjectBatcher, ObjectSet, ObjectView};
use terravista_render::{CameraController, InputEvent, InputState, Key};
use terravista_streaming::{
    AtlasPacker, AtlasRebuildScheduler, AtlasRole, AtlasSet, TileTextureStreamer,
    ATLAS_ROLE_COUNT, LOOKUP_ROWS,
};
use terravista_terrain::{PatchGrid, PatchVisibility, TileLayout};
use tracing::{debug, info, trace_span, warn};

use crate::config::RenderConfig;
use crate::context::RenderContext;
use crate::stats::{FrameStats, StatsHandle};
use crate::world::WorldData;

/// State of a loaded world.
struct LoadedWorld {
    grid: PatchGrid,
    visibility: PatchVisibility,
    layout: TileLayout,
    objects: ObjectBatcher,
    visible_tiles: Vec<TileIndex>,
    /// Visible tiles nearest first, the order they are requested in.
    request_order: Vec<TileIndex>,
    atlas: Option<AtlasSet>,
    atlas_textures: Vec<Option<OwnedTexture>>,
    lookup_texture: Option<OwnedTexture>,
}

/// Terrain, tile streaming and object rendering for one session.
///
/// The platform shim owns the window and calls [`Self::on_resize`],
/// [`Self::on_input_event`] and [`Self::on_frame`].
pub struct RenderCore<D: GpuDevice> {
    ctx: RenderContext<D>,
    config: RenderConfig,
    input: InputState,
    controller: CameraController,
    viewport: (u32, u32),
    streamer: TileTextureStreamer,
    packer: AtlasPacker,
    scheduler: AtlasRebuildScheduler,
    world: Option<LoadedWorld>,
    frame: u64,
    stats: FrameStats,
    shared_stats: StatsHandle,
}

impl<D: GpuDevice> RenderCore<D> {
    pub fn new(mut ctx: RenderContext<D>, config: RenderConfig) -> Self {
        ctx.gpu.set_frames_in_flight(config.frames_in_flight);
        let streamer =
            TileTextureStreamer::new(config.streaming.clone(), ctx.texture_resolver.clone());
        let mut controller = CameraController::new(config.camera.clone());
        controller.set_viewport(1280, 720);
        Self {
            packer: AtlasPacker::new(config.atlas.clone()),
            scheduler: AtlasRebuildScheduler::new(config.atlas.debounce_frames),
            ctx,
            input: InputState::new(),
            controller,
            viewport: (1280, 720),
            streamer,
            world: None,
            frame: 0,
            stats: FrameStats::default(),
            shared_stats: StatsHandle::default(),
            config,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn context(&self) -> &RenderContext<D> {
        &self.ctx
    }

    pub fn camera(&self) -> &CameraController {
        &self.controller
    }

    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.controller
    }

    pub fn streamer(&self) -> &TileTextureStreamer {
        &self.streamer
    }

    pub fn has_world(&self) -> bool {
        self.world.is_some()
    }

    pub fn patch_grid(&self) -> Option<&PatchGrid> {
        self.world.as_ref().map(|w| &w.grid)
    }

    pub fn objects(&self) -> Option<&ObjectBatcher> {
        self.world.as_ref().map(|w| &w.objects)
    }

    /// Packed atlases from the last rebuild.
    pub fn atlas(&self) -> Option<&AtlasSet> {
        self.world.as_ref()?.atlas.as_ref()
    }

    pub fn visible_tiles(&self) -> &[TileIndex] {
        self.world.as_ref().map_or(&[][..], |w| &w.visible_tiles)
    }

    /// Statistics of the last frame.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Handle for reading statistics from another thread.
    pub fn stats_handle(&self) -> StatsHandle {
        self.shared_stats.clone()
    }

    /// Load a world, replacing the current one.
    ///
    /// Degenerate terrain renders nothing. Fails only when the GPU rejects
    /// the terrain buffers.
    pub fn load_world(&mut self, world: WorldData) -> anyhow::Result<()> {
        let started = Instant::now();
        if self.world.is_some() {
            info!("Reloading world");
            self.unload_world();
        }

        let mut grid = world.heightmap.as_ref().map_or_else(PatchGrid::empty, |heightmap| {
            PatchGrid::build(
                heightmap,
                &world.material_indices,
                world.cell_size,
                &self.config.terrain.patch_grid(),
            )
        });
        grid.upload(&mut self.ctx.gpu)
            .context("uploading terrain patches")?;

        let visibility = PatchVisibility::for_grid(self.config.terrain.visibility(), &grid);
        let layout = world.tile_layout().unwrap_or(TileLayout {
            tiles_x: 0,
            tiles_z: 0,
            cells_per_tile: world.cells_per_tile.max(1),
        });
        if world.catalog.tile_count() != layout.tile_count() {
            warn!(
                "Texture catalog lists {} tiles, terrain has {}",
                world.catalog.tile_count(),
                layout.tile_count()
            );
        }
        self.streamer.reset(world.catalog);
        self.scheduler.reset();

        let bounds = grid.bounds();
        let extent = if bounds.is_empty() {
            0.0
        } else {
            bounds.size().x.max(bounds.size().z)
        };
        let objects = ObjectBatcher::new(
            self.config.objects.clone(),
            ObjectSet::build(&world.objects),
            extent,
        );

        if !grid.is_empty() {
            self.controller.frame_world(&bounds);
        }
        info!(
            "World loaded in {:.1} ms: {} patches, {} tiles, {} objects",
            started.elapsed().as_secs_f64() * 1000.0,
            grid.len(),
            layout.tile_count(),
            objects.objects().len()
        );

        self.world = Some(LoadedWorld {
            grid,
            visibility,
            layout,
            objects,
            visible_tiles: Vec::new(),
            request_order: Vec::new(),
            atlas: None,
            atlas_textures: Vec::new(),
            lookup_texture: None,
        });
        Ok(())
    }

    /// Drop the current world. Its GPU resources are released once in-flight
    /// frames retire; streaming results still in flight are discarded.
    pub fn unload_world(&mut self) {
        if let Some(mut world) = self.world.take() {
            world.grid.release();
            world.objects.release();
            debug!("World unloaded");
        }
        self.streamer.clear();
        self.scheduler.reset();
    }

    /// Unload and release everything right away. The backend must be idle.
    pub fn shutdown(&mut self) {
        self.unload_world();
        let released = self.ctx.gpu.flush();
        info!("Render core shut down, {released} GPU resources released");
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.controller.set_viewport(width, height);
    }

    /// Returns `true` if the event was consumed.
    pub fn on_input_event(&mut self, event: &InputEvent) -> bool {
        self.input.process_event(event)
    }

    /// Run one frame: camera, terrain visibility, tile streaming, atlas
    /// rebuild, objects, then submission.
    pub fn on_frame(&mut self, dt: f32) -> anyhow::Result<FrameStats> {
        let started = Instant::now();
        self.frame += 1;
        let _frame_span = trace_span!("frame", frame = self.frame).entered();

        {
            let _span = trace_span!("camera").entered();
            self.handle_shortcuts();
            self.controller.update(&self.input, dt);
            self.input.end_frame();
        }

        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };

        // Minimised windows skip rendering but still drain the streamer.
        let minimized = self.viewport.0 == 0 || self.viewport.1 == 0;
        if let Some(world) = self.world.as_mut() {
            let camera = self.controller.camera();
            let view_projection = camera.view_projection_matrix();
            let eye = camera.position;

            {
                let _span = trace_span!("terrain").entered();
                world.visibility.update(&mut world.grid, view_projection, eye);
                world.visible_tiles = world
                    .layout
                    .visible_tiles(&world.grid, world.visibility.visible());
            }

            {
                let _span = trace_span!("streaming").entered();
                world.request_order.clone_from(&world.visible_tiles);
                world
                    .layout
                    .sort_nearest(&mut world.request_order, world.grid.cell_size(), eye);
                self.streamer.enqueue_visible(&world.request_order);
                self.streamer.drain_frame();
            }

            {
                let _span = trace_span!("atlas").entered();
                if self
                    .scheduler
                    .should_rebuild(&world.visible_tiles, self.streamer.cache().version())
                {
                    let set = self.packer.build(
                        &world.visible_tiles,
                        self.streamer.cache(),
                        world.layout.tile_count(),
                    );
                    upload_atlases(&mut self.ctx, world, set);
                }
            }

            {
                let _span = trace_span!("objects").entered();
                let view = ObjectView {
                    view_projection,
                    eye,
                    fov_y: camera.fov,
                    viewport_height: self.viewport.1.max(1) as f32,
                };
                stats.objects =
                    world
                        .objects
                        .update(&view, self.ctx.model_resolver.as_ref(), &mut self.ctx.gpu);
                stats.assets = world.objects.asset_stats();
            }

            if !minimized {
                let _span = trace_span!("submit").entered();
                let patches = world.grid.draws(world.visibility.visible());
                let atlases: Vec<Option<RawTexture>> = world
                    .atlas_textures
                    .iter()
                    .map(|t| t.as_ref().map(OwnedTexture::raw))
                    .collect();
                let instanced = world.objects.instanced_draws();
                let submission = FrameSubmission {
                    view_projection,
                    eye,
                    patches: &patches,
                    atlases: &atlases,
                    tile_lookup: world.lookup_texture.as_ref().map(OwnedTexture::raw),
                    instanced: &instanced,
                    markers: world.objects.markers(),
                };
                self.ctx
                    .gpu
                    .submit(&submission)
                    .context("submitting frame")?;
                stats.terrain_draw_calls = patches.len();
                stats.instanced_draw_calls = instanced.len();
                stats.draw_calls = submission.draw_call_count();
                stats.atlases_bound = atlases.iter().flatten().count();
            }

            let vis = world.visibility.stats();
            stats.total_patches = vis.tested;
            stats.visible_patches = vis.visible;
            stats.patches_culled_distance = vis.culled_distance;
            stats.patches_culled_frustum = vis.culled_frustum;
            stats.lod_histogram = vis.lod_histogram;
            stats.lod_changes = vis.lod_changes;
            stats.visible_tiles = world.visible_tiles.len();
        } else {
            self.streamer.drain_frame();
            if !minimized {
                let camera = self.controller.camera();
                let submission = FrameSubmission {
                    view_projection: camera.view_projection_matrix(),
                    eye: camera.position,
                    patches: &[],
                    atlases: &[],
                    tile_lookup: None,
                    instanced: &[],
                    markers: &[],
                };
                self.ctx
                    .gpu
                    .submit(&submission)
                    .context("submitting frame")?;
            }
        }

        self.ctx.gpu.end_frame();

        let streaming = self.streamer.stats();
        stats.tile_cache_size = self.streamer.cache().len();
        stats.tile_cache_budget = self.streamer.cache().budget();
        stats.tiles_in_flight = self.streamer.in_flight_count();
        stats.cache_hits = streaming.cache_hits;
        stats.cache_misses = streaming.cache_misses;
        stats.jobs_enqueued = streaming.jobs_enqueued;
        stats.results_accepted = streaming.results_accepted;
        stats.stale_results = streaming.stale_results;
        stats.missing_tiles = streaming.missing_tiles;
        stats.tile_evictions = streaming.evictions;
        stats.suppressed_logs = streaming.suppressed_logs;
        stats.atlas_rebuilds = self.scheduler.rebuilds();
        stats.frame_time_ms = started.elapsed().as_secs_f32() * 1000.0;

        self.shared_stats.publish(&stats);
        self.stats.clone_from(&stats);
        Ok(stats)
    }

    /// Summaries from every subsystem, one section per line group.
    pub fn debug_summary(&self) -> String {
        let mut out = self.stats.debug_summary();
        if let Some(world) = &self.world {
            out.push('\n');
            out.push_str(&world.visibility.summary());
            out.push('\n');
            out.push_str(&world.objects.summary());
        }
        out.push('\n');
        out.push_str(&self.streamer.summary());
        out
    }

    fn handle_shortcuts(&mut self) {
        if self.input.is_key_just_pressed(Key::F) {
            if let Some(world) = &self.world {
                let bounds = world.grid.bounds();
                self.controller.frame_world(&bounds);
            }
        }
        let toggles = [
            (Key::Digit1, ObjectCategory::Buildings),
            (Key::Digit2, ObjectCategory::Vegetation),
            (Key::Digit3, ObjectCategory::Rocks),
            (Key::Digit4, ObjectCategory::Props),
        ];
        for (key, category) in toggles {
            if self.input.is_key_just_pressed(key) {
                self.set_category_enabled(category, !self.config.objects.enabled.allows(category));
            }
        }
    }

    /// Show or hide a category of placed objects.
    pub fn set_category_enabled(&mut self, category: ObjectCategory, enabled: bool) {
        self.config.objects.set_category_enabled(category, enabled);
        if let Some(world) = self.world.as_mut() {
            world.objects.set_category_enabled(category, enabled);
        }
        info!(
            "{} {}",
            category.name(),
            if enabled { "shown" } else { "hidden" }
        );
    }
}

/// Replace the world's atlas textures with freshly packed ones.
///
/// Upload failures leave that role unbound; the frame still renders.
fn upload_atlases<D: GpuDevice>(ctx: &mut RenderContext<D>, world: &mut LoadedWorld, set: AtlasSet) {
    let mut textures = Vec::with_capacity(ATLAS_ROLE_COUNT);
    for role in AtlasRole::all() {
        let texture = set.atlas(role).and_then(|atlas| {
            let desc = TextureDesc::new(
                format!("atlas:{}", role.label()),
                atlas.image.width(),
                atlas.image.height(),
                TextureFormat::Rgba8Unorm,
            );
            ctx.gpu
                .create_texture(&desc, atlas.image.as_raw())
                .map_err(|err| warn!("Atlas upload failed for {}: {err}", role.label()))
                .ok()
        });
        textures.push(texture);
    }

    let tile_count = set.lookup.tile_count();
    world.lookup_texture = if tile_count == 0 {
        None
    } else {
        let desc = TextureDesc::new(
            "atlas:lookup",
            tile_count as u32,
            LOOKUP_ROWS as u32,
            TextureFormat::Rgba32Float,
        );
        ctx.gpu
            .create_texture(&desc, set.lookup.as_bytes())
            .map_err(|err| warn!("Tile lookup upload failed: {err}"))
            .ok()
    };
    // The previous textures are dropped here and released once no frame uses them.
    world.atlas_textures = textures;
    world.atlas = Some(set);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use glam::Vec3;
    use terravista_gpu::HeadlessDevice;
    use terravista_objects::{ModelData, ModelLoadError, ModelResolver};
    use terravista_streaming::{ResolveError, ResolvedTexture, TextureCatalog, TextureResolver};
    use terravista_terrain::Heightmap;

    struct NoTextures;

    impl TextureResolver for NoTextures {
        fn resolve(&self, candidates: &[String]) -> Result<ResolvedTexture, ResolveError> {
            Err(ResolveError::NotFound(candidates.join(",")))
        }
    }

    struct NoModels;

    impl ModelResolver for NoModels {
        fn resolve(&self, name: &str) -> terravista_objects::Result<ModelData> {
            Err(ModelLoadError::NotFound(name.to_string()))
        }
    }

    fn core() -> RenderCore<HeadlessDevice> {
        let ctx = RenderContext::new(HeadlessDevice::new(), Arc::new(NoTextures), Box::new(NoModels));
        RenderCore::new(ctx, RenderConfig::default().with_worker_count(2))
    }

    fn small_world() -> WorldData {
        let mut world = WorldData::from_heightmap(Heightmap::flat(65, 65, 0.0), 4.0);
        world.cells_per_tile = 32;
        world.catalog = TextureCatalog::new(vec![Vec::new(); 4]);
        world
    }

    #[test]
    fn empty_core_renders_empty_frames() {
        let mut core = core();
        let stats = core.on_frame(0.016).unwrap();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(core.context().gpu.device().frames_submitted(), 1);
    }

    #[test]
    fn degenerate_world_renders_nothing() {
        let mut core = core();
        core.load_world(WorldData::from_heightmap(Heightmap::flat(1, 1, 0.0), 1.0))
            .unwrap();
        let stats = core.on_frame(0.016).unwrap();
        assert_eq!(stats.total_patches, 0);
        assert_eq!(stats.terrain_draw_calls, 0);
    }

    #[test]
    fn missing_tiles_get_placeholder_atlases() {
        let mut core = core();
        core.load_world(small_world()).unwrap();
        let stats = core.on_frame(0.016).unwrap();

        assert_eq!(stats.total_patches, 4);
        assert_eq!(stats.visible_patches, 4);
        assert_eq!(stats.terrain_draw_calls, 4);
        assert_eq!(stats.visible_tiles, 4);
        // No candidates: resolved on the spot, no jobs.
        assert_eq!(stats.jobs_enqueued, 0);
        assert_eq!(stats.missing_tiles, 4);
        assert_eq!(stats.atlas_rebuilds, 1);

        let atlas = core.atlas().unwrap();
        assert_eq!(atlas.tiles.len(), 4);
        assert!(atlas.atlas(AtlasRole::Satellite).is_some());
        let summary = core.context().gpu.device().last_submission();
        assert!(summary.has_tile_lookup);
        assert_eq!(summary.atlases_bound, 1);
    }

    #[test]
    fn unload_keeps_rendering_empty_frames() {
        let mut core = core();
        core.load_world(small_world()).unwrap();
        assert!(core.has_world());
        core.unload_world();
        assert!(!core.has_world());
        assert!(core.visible_tiles().is_empty());
        let stats = core.on_frame(0.016).unwrap();
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn resize_updates_camera_aspect() {
        let mut core = core();
        core.on_resize(800, 600);
        assert_relative_eq!(core.camera().camera().aspect, 800.0 / 600.0);
    }

    #[test]
    fn frame_shortcut_returns_to_world_view() {
        let mut core = core();
        core.load_world(small_world()).unwrap();
        let framed = core.camera().eye();

        core.camera_mut()
            .set_orbit(Vec3::new(5_000.0, 0.0, -5_000.0), 40.0, 1.0, 0.3);
        core.on_frame(0.016).unwrap();
        assert!(core.camera().eye().distance(framed) > 100.0);

        core.on_input_event(&InputEvent::KeyPressed(Key::F));
        core.on_frame(0.016).unwrap();
        let eye = core.camera().eye();
        assert_relative_eq!(eye.x, framed.x, epsilon = 1e-2);
        assert_relative_eq!(eye.y, framed.y, epsilon = 1e-2);
        assert_relative_eq!(eye.z, framed.z, epsilon = 1e-2);
    }

    #[test]
    fn reload_releases_previous_world() {
        let mut core = core();
        core.load_world(small_world()).unwrap();
        core.on_frame(0.016).unwrap();
        let generation = core.streamer().generation();

        core.load_world(small_world()).unwrap();
        assert!(core.streamer().generation() > generation);
        core.on_frame(0.016).unwrap();

        core.shutdown();
        let device = core.context().gpu.device();
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.double_frees(), 0);
    }

    #[test]
    fn zero_sized_viewport_skips_submission() {
        let mut core = core();
        core.load_world(small_world()).unwrap();
        core.on_resize(0, 0);
        core.on_frame(0.016).unwrap();
        assert_eq!(core.context().gpu.device().frames_submitted(), 0);
        core.on_resize(800, 600);
        core.on_frame(0.016).unwrap();
        assert_eq!(core.context().gpu.device().frames_submitted(), 1);
    }

    #[test]
    fn category_shortcuts_toggle_objects() {
        let mut core = core();
        core.load_world(small_world()).unwrap();
        core.on_input_event(&InputEvent::KeyPressed(Key::Digit2));
        core.on_frame(0.016).unwrap();
        assert!(!core.config().objects.enabled.allows(ObjectCategory::Vegetation));
        assert!(!core.objects().unwrap().config().enabled.allows(ObjectCategory::Vegetation));
    }

    #[test]
    fn stats_are_published() {
        let mut core = core();
        let handle = core.stats_handle();
        core.load_world(small_world()).unwrap();
        core.on_frame(0.016).unwrap();
        core.on_frame(0.016).unwrap();
        assert_eq!(handle.snapshot().frame, 2);
        assert!(core.debug_summary().contains("tiles:"));
    }
}
