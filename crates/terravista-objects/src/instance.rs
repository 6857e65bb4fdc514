//! Placed object instances.

use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use terravista_core::{Aabb, ModelId, ObjectCategory};
use tracing::debug;

/// Bounding radius assumed for a model before it has loaded.
pub const DEFAULT_BOUND_RADIUS: f32 = 1.0;

/// A placed object as supplied by the world data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub model: String,
    pub category: ObjectCategory,
}

impl ObjectRecord {
    pub fn new(model: impl Into<String>, category: ObjectCategory, position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            model: model.into(),
            category,
        }
    }
}

/// Render-side instance of a placed object.
#[derive(Clone, Debug)]
pub struct ObjectInstance {
    pub model_matrix: Mat4,
    pub position: Vec3,
    pub category: ObjectCategory,
    pub model_id: ModelId,
    /// LOD the instance rendered at last frame.
    pub current_lod: u8,
    /// World-space bounding radius; refined once the model has loaded.
    pub bound_radius: f32,
    /// Largest axis of the instance scale.
    pub max_scale: f32,
}

impl ObjectInstance {
    pub fn from_record(record: &ObjectRecord, model_id: ModelId) -> Self {
        let max_scale = record.scale.abs().max_element();
        Self {
            model_matrix: Mat4::from_scale_rotation_translation(
                record.scale,
                record.rotation,
                record.position,
            ),
            position: record.position,
            category: record.category,
            model_id,
            current_lod: 0,
            bound_radius: DEFAULT_BOUND_RADIUS * max_scale,
            max_scale,
        }
    }
}

/// Every instance of a world plus the interned model names.
#[derive(Clone, Debug, Default)]
pub struct ObjectSet {
    pub instances: Vec<ObjectInstance>,
    /// Model name per [`ModelId`].
    pub model_names: Vec<String>,
    pub bounds: Aabb,
}

impl ObjectSet {
    /// Build instances from records, giving each unique model name one id.
    pub fn build(records: &[ObjectRecord]) -> Self {
        let mut ids: HashMap<&str, ModelId> = HashMap::new();
        let mut model_names = Vec::new();
        let mut bounds = Aabb::EMPTY;

        let instances = records
            .iter()
            .map(|record| {
                let id = *ids.entry(record.model.as_str()).or_insert_with(|| {
                    model_names.push(record.model.clone());
                    ModelId(model_names.len() as u32 - 1)
                });
                bounds.expand_to_include(record.position);
                ObjectInstance::from_record(record, id)
            })
            .collect::<Vec<_>>();

        debug!(
            "Built {} object instances over {} models",
            instances.len(),
            model_names.len()
        );
        Self {
            instances,
            model_names,
            bounds,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
