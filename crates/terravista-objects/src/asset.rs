//! Model asset cache.
//!
//! Each unique model name gets one [`ObjectModelAsset`] that moves through
//! `Unloaded -> Loading -> Ready | Failed`. Loads run inline on the render
//! thread, nearest request first, at most `max_loads_per_frame` per frame.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};

use hashbrown::HashMap;
use terravista_core::{LogThrottle, ModelId};
use terravista_gpu::{BufferUsage, GpuDevice, GpuResources, OwnedBuffer};
use tracing::{debug, info, warn};

use crate::error::{ModelLoadError, Result};
use crate::model::{ModelData, ModelResolver};

/// Load state of a model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AssetState {
    #[default]
    Unloaded,
    /// Requested and waiting for a load slot.
    Loading,
    Ready,
    /// Load failed. Not retried until the cache is rebuilt.
    Failed,
}

/// A mesh group resident on the GPU.
#[derive(Debug)]
pub struct GpuMeshGroup {
    pub vertex_buffer: OwnedBuffer,
    pub index_buffer: OwnedBuffer,
    pub index_count: u32,
    pub material: u32,
}

/// One model and its GPU geometry.
#[derive(Debug)]
pub struct ObjectModelAsset {
    pub name: String,
    pub state: AssetState,
    /// Mesh groups per LOD, finest first. Empty unless `Ready`.
    pub lods: Vec<Vec<GpuMeshGroup>>,
    /// Model-space bounding radius, known once the model has loaded.
    pub bounding_radius: Option<f32>,
    pub last_used: u64,
}

impl ObjectModelAsset {
    fn new(name: String) -> Self {
        Self {
            name,
            state: AssetState::Unloaded,
            lods: Vec::new(),
            bounding_radius: None,
            last_used: 0,
        }
    }

    pub fn lod_count(&self) -> usize {
        self.lods.len()
    }

    fn release(&mut self) {
        self.lods.clear();
        self.state = AssetState::Unloaded;
    }
}

/// Lifetime counters for the asset cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssetStats {
    pub loaded: u64,
    pub failed: u64,
    pub evicted: u64,
    /// Assets currently `Ready`.
    pub ready: usize,
    /// Assets currently waiting for a load slot.
    pub loading: usize,
}

/// All model assets of a world, indexed by [`ModelId`].
pub struct ModelAssetCache {
    assets: Vec<ObjectModelAsset>,
    /// Closest squared distance requested per waiting model.
    pending: HashMap<ModelId, f32>,
    max_loads_per_frame: usize,
    budget: usize,
    tick: u64,
    failure_log: LogThrottle<ModelId>,
    stats: AssetStats,
}

impl ModelAssetCache {
    pub fn new(model_names: &[String], max_loads_per_frame: usize, budget: usize) -> Self {
        Self {
            assets: model_names.iter().cloned().map(ObjectModelAsset::new).collect(),
            pending: HashMap::new(),
            max_loads_per_frame,
            budget: budget.max(1),
            tick: 0,
            failure_log: LogThrottle::new(),
            stats: AssetStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: ModelId) -> Option<&ObjectModelAsset> {
        self.assets.get(id.as_usize())
    }

    pub fn state(&self, id: ModelId) -> AssetState {
        self.get(id).map_or(AssetState::Failed, |asset| asset.state)
    }

    pub fn stats(&self) -> AssetStats {
        AssetStats {
            ready: self.ready_count(),
            loading: self.pending.len(),
            ..self.stats
        }
    }

    pub fn ready_count(&self) -> usize {
        self.assets
            .iter()
            .filter(|asset| asset.state == AssetState::Ready)
            .count()
    }

    /// Advance the LRU clock. Call once per frame before requesting.
    pub fn begin_frame(&mut self) {
        self.tick += 1;
    }

    /// Ask for a model to be loaded, prioritised by the squared camera distance
    /// of the instance that wants it.
    pub fn request(&mut self, id: ModelId, distance_sq: f32) {
        let Some(asset) = self.assets.get_mut(id.as_usize()) else {
            return;
        };
        match asset.state {
            AssetState::Unloaded => {
                asset.state = AssetState::Loading;
                self.pending.insert(id, distance_sq.max(0.0));
            }
            AssetState::Loading => {
                let best = self.pending.entry(id).or_insert(f32::INFINITY);
                *best = best.min(distance_sq.max(0.0));
            }
            AssetState::Ready | AssetState::Failed => {}
        }
    }

    /// Mark a model as used this frame.
    pub fn touch(&mut self, id: ModelId) {
        if let Some(asset) = self.assets.get_mut(id.as_usize()) {
            asset.last_used = self.tick;
        }
    }

    /// Load up to the per-frame cap of waiting models, nearest first.
    /// Returns the number of load attempts.
    pub fn process_loads<D: GpuDevice>(
        &mut self,
        resolver: &dyn ModelResolver,
        gpu: &mut GpuResources<D>,
    ) -> usize {
        if self.pending.is_empty() || self.max_loads_per_frame == 0 {
            return 0;
        }
        // Non-negative floats order the same as their bit patterns.
        let mut queue: BinaryHeap<Reverse<(u32, ModelId)>> = self
            .pending
            .iter()
            .map(|(&id, &distance_sq)| Reverse((distance_sq.to_bits(), id)))
            .collect();

        let mut attempts = 0;
        while attempts < self.max_loads_per_frame {
            let Some(Reverse((_, id))) = queue.pop() else {
                break;
            };
            self.pending.remove(&id);
            attempts += 1;
            self.load(id, resolver, gpu);
        }
        attempts
    }

    fn load<D: GpuDevice>(
        &mut self,
        id: ModelId,
        resolver: &dyn ModelResolver,
        gpu: &mut GpuResources<D>,
    ) {
        let Some(asset) = self.assets.get_mut(id.as_usize()) else {
            return;
        };
        match load_model(&asset.name, resolver, gpu) {
            Ok((lods, radius)) => {
                debug!("Loaded model '{}' with {} LODs", asset.name, lods.len());
                asset.lods = lods;
                asset.bounding_radius = Some(radius);
                asset.state = AssetState::Ready;
                asset.last_used = self.tick;
                self.stats.loaded += 1;
            }
            Err(err) => {
                asset.release();
                asset.state = AssetState::Failed;
                self.stats.failed += 1;
                if self.failure_log.first_time(id) {
                    warn!("Model '{}' failed to load: {err}", asset.name);
                }
            }
        }
    }

    /// Evict least recently used `Ready` models until the budget holds.
    /// Returns the number evicted.
    pub fn evict_over_budget(&mut self) -> usize {
        let mut ready = self.ready_count();
        let mut evicted = 0;
        while ready > self.budget {
            let oldest = self
                .assets
                .iter_mut()
                .filter(|asset| asset.state == AssetState::Ready)
                .min_by_key(|asset| asset.last_used);
            let Some(asset) = oldest else {
                break;
            };
            debug!("Evicting model '{}'", asset.name);
            asset.release();
            ready -= 1;
            evicted += 1;
        }
        self.stats.evicted += evicted as u64;
        evicted
    }

    /// Release every model. Failed models become loadable again.
    pub fn clear(&mut self) {
        let ready = self.ready_count();
        for asset in &mut self.assets {
            asset.release();
            asset.bounding_radius = None;
        }
        self.pending.clear();
        self.failure_log.reset();
        if ready > 0 {
            info!("Released {ready} model assets");
        }
    }
}

type LoadedLods = Vec<Vec<GpuMeshGroup>>;

fn load_model<D: GpuDevice>(
    name: &str,
    resolver: &dyn ModelResolver,
    gpu: &mut GpuResources<D>,
) -> Result<(LoadedLods, f32)> {
    let model = panic::catch_unwind(AssertUnwindSafe(|| resolver.resolve(name)))
        .map_err(|_| ModelLoadError::Panicked(name.to_string()))??;
    model.validate(name)?;
    let lods = upload_model(name, &model, gpu)?;
    Ok((lods, model.bounding_radius))
}

fn upload_model<D: GpuDevice>(
    name: &str,
    model: &ModelData,
    gpu: &mut GpuResources<D>,
) -> Result<LoadedLods> {
    let mut lods = Vec::with_capacity(model.lods.len());
    for (level, lod) in model.lods.iter().enumerate() {
        let mut groups = Vec::with_capacity(lod.groups.len());
        for (index, group) in lod.groups.iter().enumerate() {
            let vertex_buffer = gpu.create_buffer(
                &format!("model:{name}:lod{level}:g{index}:vertices"),
                BufferUsage::Vertex,
                bytemuck::cast_slice(&group.vertices),
            )?;
            let index_buffer = gpu.create_buffer(
                &format!("model:{name}:lod{level}:g{index}:indices"),
                BufferUsage::Index,
                bytemuck::cast_slice(&group.indices),
            )?;
            groups.push(GpuMeshGroup {
                vertex_buffer,
                index_buffer,
                index_count: group.indices.len() as u32,
                material: group.material,
            });
        }
        lods.push(groups);
    }
    Ok(lods)
}
