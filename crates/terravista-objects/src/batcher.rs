//! Per-frame object culling, LOD selection and instancing.

use std::fmt::Write as _;

use glam::{Mat4, Vec3};
use hashbrown::HashMap;
use terravista_core::{BoundingSphere, Frustum, ModelId, ObjectCategory};
use terravista_gpu::{GpuDevice, GpuResources, InstancedDraw, PointMarker, RawBuffer};
use tracing::trace;

use crate::asset::{AssetState, AssetStats, ModelAssetCache};
use crate::config::ObjectConfig;
use crate::instance::ObjectSet;
use crate::lod::{DistanceLod, ScreenSpaceLod};
use crate::model::ModelResolver;
use crate::spatial::SpatialGrid;

/// Camera parameters the batcher needs.
#[derive(Clone, Copy, Debug)]
pub struct ObjectView {
    pub view_projection: Mat4,
    pub eye: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport height in pixels.
    pub viewport_height: f32,
}

/// Instances sharing one model mesh group at one LOD.
#[derive(Clone, Debug)]
pub struct DrawBatch {
    pub model: ModelId,
    pub lod: u8,
    pub group: u32,
    pub vertex_buffer: RawBuffer,
    pub index_buffer: RawBuffer,
    pub index_count: u32,
    pub material: u32,
    pub transforms: Vec<Mat4>,
}

/// What happened to the candidates of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectFrameStats {
    pub candidates: usize,
    pub culled_category: usize,
    pub culled_distance: usize,
    pub culled_frustum: usize,
    /// Instances drawn as geometry or as a marker.
    pub visible: usize,
    /// Visible instances whose model is not loaded yet.
    pub pending: usize,
    pub markers: usize,
    pub batches: usize,
    pub instances: usize,
    pub loads_attempted: usize,
    pub evicted: usize,
}

type BatchKey = (ModelId, u8, u32);

/// Owns a world's placed objects and turns them into draws every frame.
pub struct ObjectBatcher {
    config: ObjectConfig,
    objects: ObjectSet,
    grid: SpatialGrid,
    assets: ModelAssetCache,
    screen_lod: ScreenSpaceLod,
    candidates: Vec<u32>,
    survivors: Vec<u32>,
    batches: Vec<DrawBatch>,
    batch_lookup: HashMap<BatchKey, usize>,
    markers: Vec<PointMarker>,
    stats: ObjectFrameStats,
}

impl ObjectBatcher {
    /// Index `objects` for a world whose largest horizontal size is `world_extent`.
    pub fn new(config: ObjectConfig, objects: ObjectSet, world_extent: f32) -> Self {
        let extent = if objects.is_empty() {
            world_extent
        } else {
            let size = objects.bounds.size();
            world_extent.max(size.x).max(size.z)
        };
        let grid = SpatialGrid::build(&objects.instances, extent);
        let assets = ModelAssetCache::new(
            &objects.model_names,
            config.max_loads_per_frame,
            config.asset_budget,
        );
        trace!(
            "Object grid: {} cells of {:.0}",
            grid.cell_count(),
            grid.cell_size()
        );
        Self {
            screen_lod: ScreenSpaceLod {
                thresholds: config.screen_lod_thresholds,
                hysteresis: config.lod_hysteresis,
            },
            config,
            objects,
            grid,
            assets,
            candidates: Vec::new(),
            survivors: Vec::new(),
            batches: Vec::new(),
            batch_lookup: HashMap::new(),
            markers: Vec::new(),
            stats: ObjectFrameStats::default(),
        }
    }

    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }

    pub fn set_category_enabled(&mut self, category: ObjectCategory, enabled: bool) {
        self.config.set_category_enabled(category, enabled);
    }

    pub fn objects(&self) -> &ObjectSet {
        &self.objects
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn assets(&self) -> &ModelAssetCache {
        &self.assets
    }

    pub fn asset_stats(&self) -> AssetStats {
        self.assets.stats()
    }

    pub fn stats(&self) -> ObjectFrameStats {
        self.stats
    }

    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    pub fn markers(&self) -> &[PointMarker] {
        &self.markers
    }

    /// Instanced draws borrowing this frame's batches.
    pub fn instanced_draws(&self) -> Vec<InstancedDraw<'_>> {
        self.batches
            .iter()
            .map(|batch| InstancedDraw {
                vertex_buffer: batch.vertex_buffer,
                index_buffer: batch.index_buffer,
                index_count: batch.index_count,
                material: batch.material,
                transforms: &batch.transforms,
            })
            .collect()
    }

    /// Cull, load, select LODs and batch for one frame.
    pub fn update<D: GpuDevice>(
        &mut self,
        view: &ObjectView,
        resolver: &dyn ModelResolver,
        gpu: &mut GpuResources<D>,
    ) -> ObjectFrameStats {
        self.stats = ObjectFrameStats::default();
        self.batches.clear();
        self.batch_lookup.clear();
        self.markers.clear();
        self.survivors.clear();
        self.assets.begin_frame();

        let query_distance = self.config.max_query_distance();
        if self.objects.is_empty() || query_distance <= 0.0 {
            self.stats.evicted = self.assets.evict_over_budget();
            return self.stats;
        }

        self.grid.query(view.eye, query_distance, &mut self.candidates);
        self.stats.candidates = self.candidates.len();

        // Category and distance first, so only models that can show get requested.
        for &index in &self.candidates {
            let instance = &mut self.objects.instances[index as usize];
            if !self.config.enabled.allows(instance.category) {
                self.stats.culled_category += 1;
                continue;
            }
            if let Some(radius) = self
                .assets
                .get(instance.model_id)
                .and_then(|asset| asset.bounding_radius)
            {
                instance.bound_radius = radius * instance.max_scale;
            }
            let distance_sq = instance.position.distance_squared(view.eye);
            if distance_sq.sqrt() - instance.bound_radius
                > self.config.max_distance(instance.category)
            {
                self.stats.culled_distance += 1;
                continue;
            }
            self.assets.request(instance.model_id, distance_sq);
            self.survivors.push(index);
        }

        self.stats.loads_attempted = self.assets.process_loads(resolver, gpu);

        let frustum = Frustum::from_view_projection(view.view_projection);
        for &index in &self.survivors {
            let instance = &mut self.objects.instances[index as usize];
            let sphere = BoundingSphere::new(instance.position, instance.bound_radius);
            if !frustum.test_sphere(&sphere) {
                self.stats.culled_frustum += 1;
                continue;
            }
            self.stats.visible += 1;

            let Some(asset) = self.assets.get(instance.model_id) else {
                continue;
            };
            match asset.state {
                AssetState::Ready => {}
                AssetState::Failed => {
                    self.markers.push(PointMarker {
                        position: instance.position,
                        color: marker_color(instance.category),
                    });
                    continue;
                }
                AssetState::Unloaded | AssetState::Loading => {
                    self.stats.pending += 1;
                    continue;
                }
            }

            let distance = instance.position.distance(view.eye);
            let lod = match asset.bounding_radius {
                Some(radius) if radius > f32::EPSILON => {
                    let pixels = ScreenSpaceLod::projected_radius(
                        radius * instance.max_scale,
                        distance,
                        view.fov_y,
                        view.viewport_height,
                    );
                    self.screen_lod
                        .select(instance.current_lod, pixels, asset.lod_count())
                }
                _ => DistanceLod::from_fractions(
                    self.config.max_distance(instance.category),
                    self.config.distance_lod_fractions,
                    self.config.lod_hysteresis,
                )
                .select(instance.current_lod, distance, asset.lod_count()),
            };
            instance.current_lod = lod;

            let Some(groups) = asset.lods.get(usize::from(lod)) else {
                continue;
            };
            for (group_index, group) in groups.iter().enumerate() {
                let key = (instance.model_id, lod, group_index as u32);
                let slot = *self.batch_lookup.entry(key).or_insert_with(|| {
                    self.batches.push(DrawBatch {
                        model: instance.model_id,
                        lod,
                        group: group_index as u32,
                        vertex_buffer: group.vertex_buffer.raw(),
                        index_buffer: group.index_buffer.raw(),
                        index_count: group.index_count,
                        material: group.material,
                        transforms: Vec::new(),
                    });
                    self.batches.len() - 1
                });
                self.batches[slot].transforms.push(instance.model_matrix);
            }
            self.assets.touch(instance.model_id);
        }

        self.stats.markers = self.markers.len();
        self.stats.batches = self.batches.len();
        self.stats.instances = self.batches.iter().map(|b| b.transforms.len()).sum();
        // Evicted buffers stay alive until the frames using them retire.
        self.stats.evicted = self.assets.evict_over_budget();
        self.stats
    }

    /// Release every loaded model.
    pub fn release(&mut self) {
        self.batches.clear();
        self.batch_lookup.clear();
        self.markers.clear();
        self.assets.clear();
    }

    pub fn summary(&self) -> String {
        let s = &self.stats;
        let assets = self.assets.stats();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "objects: {} candidates, {} visible ({} pending, {} markers)",
            s.candidates, s.visible, s.pending, s.markers
        );
        let _ = writeln!(
            out,
            "  culled: {} category, {} distance, {} frustum",
            s.culled_category, s.culled_distance, s.culled_frustum
        );
        let _ = write!(
            out,
            "  batches: {} ({} instances); models: {} ready, {} loading, {} loaded, {} failed, {} evicted",
            s.batches,
            s.instances,
            assets.ready,
            assets.loading,
            assets.loaded,
            assets.failed,
            assets.evicted
        );
        out
    }
}

/// Placeholder color per category.
pub fn marker_color(category: ObjectCategory) -> [u8; 4] {
    match category {
        ObjectCategory::Buildings => [220, 90, 60, 255],
        ObjectCategory::Vegetation => [70, 190, 80, 255],
        ObjectCategory::Rocks => [160, 160, 170, 255],
        ObjectCategory::Props => [240, 200, 60, 255],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelLoadError, Result};
    use crate::instance::ObjectRecord;
    use crate::model::{MeshGroup, ModelData, ModelLod, ModelVertex};
    use terravista_core::CategoryMask;
    use terravista_gpu::HeadlessDevice;

    /// Unit-radius models with two groups per LOD; `missing*` names fail.
    struct Models;

    impl ModelResolver for Models {
        fn resolve(&self, name: &str) -> Result<ModelData> {
            if name.starts_with("missing") {
                return Err(ModelLoadError::NotFound(name.to_string()));
            }
            let group = |material| MeshGroup {
                vertices: vec![
                    ModelVertex {
                        position: [1.0, 0.0, 0.0],
                        ..Default::default()
                    },
                    ModelVertex {
                        position: [0.0, 1.0, 0.0],
                        ..Default::default()
                    },
                    ModelVertex {
                        position: [0.0, 0.0, 1.0],
                        ..Default::default()
                    },
                ],
                indices: vec![0, 1, 2],
                material,
            };
            let lod = || ModelLod {
                groups: vec![group(0), group(1)],
            };
            Ok(ModelData::from_lods(vec![lod(), lod(), lod()]))
        }
    }

    /// Camera at the origin looking down -Z.
    fn view() -> ObjectView {
        let fov_y = 60f32.to_radians();
        let projection = Mat4::perspective_rh(fov_y, 1.0, 0.1, 10_000.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        ObjectView {
            view_projection: projection * view,
            eye: Vec3::ZERO,
            fov_y,
            viewport_height: 1080.0,
        }
    }

    fn batcher(config: ObjectConfig, records: &[ObjectRecord]) -> ObjectBatcher {
        ObjectBatcher::new(config, ObjectSet::build(records), 1000.0)
    }

    fn frame(batcher: &mut ObjectBatcher, gpu: &mut GpuResources<HeadlessDevice>) -> ObjectFrameStats {
        batcher.update(&view(), &Models, gpu)
    }

    #[test]
    fn distance_boundary_is_inclusive() {
        let mut record = ObjectRecord::new("tree", ObjectCategory::Buildings, Vec3::new(0.0, 0.0, -100.0));
        record.scale = Vec3::splat(5.0);
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 2);

        let mut config = ObjectConfig::default();
        config.far_distance = 95.0;
        let mut included = batcher(config.clone(), &[record.clone()]);
        let stats = frame(&mut included, &mut gpu);
        assert_eq!(stats.culled_distance, 0);
        assert_eq!(stats.visible, 1);
        assert_eq!(stats.instances, 2);

        config.far_distance = 94.9;
        let mut excluded = batcher(config, &[record]);
        let stats = frame(&mut excluded, &mut gpu);
        assert_eq!(stats.culled_distance, 1);
        assert_eq!(stats.visible, 0);
    }

    #[test]
    fn instances_share_batches() {
        let records: Vec<_> = (0..10)
            .map(|i| {
                ObjectRecord::new("house", ObjectCategory::Buildings, Vec3::new(i as f32 * 3.0, 0.0, -50.0))
            })
            .collect();
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 2);
        let mut batcher = batcher(ObjectConfig::default(), &records);

        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.visible, 10);
        // One batch per mesh group, all ten instances in each.
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.instances, 20);
        let draws = batcher.instanced_draws();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| d.transforms.len() == 10));
        assert_eq!(draws[1].material, 1);
    }

    #[test]
    fn frustum_and_category_culling() {
        let records = vec![
            ObjectRecord::new("house", ObjectCategory::Buildings, Vec3::new(0.0, 0.0, -50.0)),
            ObjectRecord::new("house", ObjectCategory::Buildings, Vec3::new(0.0, 0.0, 50.0)),
            ObjectRecord::new("bush", ObjectCategory::Vegetation, Vec3::new(5.0, 0.0, -50.0)),
        ];
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 2);
        let mut batcher = batcher(ObjectConfig::default(), &records);
        batcher.set_category_enabled(ObjectCategory::Vegetation, false);

        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.culled_category, 1);
        assert_eq!(stats.culled_frustum, 1);
        assert_eq!(stats.visible, 1);
        // The disabled category never asked for its model.
        assert_eq!(batcher.assets().state(ModelId(1)), AssetState::Unloaded);
    }

    #[test]
    fn failed_models_render_markers() {
        let records = vec![ObjectRecord::new(
            "missing-statue",
            ObjectCategory::Props,
            Vec3::new(0.0, 0.0, -20.0),
        )];
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 2);
        let mut batcher = batcher(ObjectConfig::default(), &records);

        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.markers, 1);
        assert_eq!(stats.batches, 0);
        assert_eq!(batcher.markers()[0].color, marker_color(ObjectCategory::Props));
        assert_eq!(batcher.asset_stats().failed, 1);

        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.markers, 1);
        assert_eq!(stats.loads_attempted, 0);
    }

    #[test]
    fn load_budget_defers_models() {
        let records: Vec<_> = (0..5)
            .map(|i| {
                ObjectRecord::new(format!("model{i}"), ObjectCategory::Rocks, Vec3::new(0.0, 0.0, -10.0 - i as f32 * 10.0))
            })
            .collect();
        let mut config = ObjectConfig::default();
        config.max_loads_per_frame = 2;
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 2);
        let mut batcher = batcher(config, &records);

        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.loads_attempted, 2);
        assert_eq!(stats.pending, 3);
        // Nearest first.
        assert_eq!(batcher.assets().state(ModelId(0)), AssetState::Ready);
        assert_eq!(batcher.assets().state(ModelId(1)), AssetState::Ready);
        assert_eq!(batcher.assets().state(ModelId(4)), AssetState::Loading);

        frame(&mut batcher, &mut gpu);
        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.visible, 5);
    }

    #[test]
    fn asset_budget_evicts_and_releases_gpu_memory() {
        let records: Vec<_> = (0..4)
            .map(|i| {
                ObjectRecord::new(format!("model{i}"), ObjectCategory::Buildings, Vec3::new(i as f32 * 4.0, 0.0, -30.0))
            })
            .collect();
        let mut config = ObjectConfig::default();
        config.max_loads_per_frame = 4;
        config.asset_budget = 2;
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 1);
        let mut batcher = batcher(config, &records);

        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.evicted, 2);
        assert_eq!(batcher.asset_stats().ready, 2);
        gpu.flush();
        // Two models, three LODs, two groups, two buffers each.
        assert_eq!(gpu.live_buffers(), 2 * 3 * 2 * 2);

        batcher.release();
        gpu.flush();
        assert_eq!(gpu.live_buffers(), 0);
        assert_eq!(gpu.device().double_frees(), 0);
    }

    #[test]
    fn far_objects_use_coarser_lods() {
        let records = vec![
            ObjectRecord::new("house", ObjectCategory::Buildings, Vec3::new(0.0, 0.0, -5.0)),
            ObjectRecord::new("house", ObjectCategory::Buildings, Vec3::new(0.0, 0.0, -1500.0)),
        ];
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 2);
        let mut batcher = batcher(ObjectConfig::default(), &records);
        frame(&mut batcher, &mut gpu);

        let lods: Vec<u8> = batcher.objects().instances.iter().map(|i| i.current_lod).collect();
        assert_eq!(lods, vec![0, 2]);
    }

    #[test]
    fn everything_disabled_draws_nothing() {
        let records = vec![ObjectRecord::new("house", ObjectCategory::Buildings, Vec3::new(0.0, 0.0, -5.0))];
        let mut config = ObjectConfig::default();
        config.enabled = CategoryMask::empty();
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 2);
        let mut batcher = batcher(config, &records);
        let stats = frame(&mut batcher, &mut gpu);
        assert_eq!(stats.candidates, 0);
        assert!(batcher.summary().contains("0 visible"));
    }
}
