//! Model data handed over by the host's model resolver.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::{ModelLoadError, Result};

/// Vertex layout of model meshes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Geometry sharing one material.
#[derive(Clone, Debug, Default)]
pub struct MeshGroup {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: u32,
}

/// One level of detail: the mesh groups drawn at that level.
#[derive(Clone, Debug, Default)]
pub struct ModelLod {
    pub groups: Vec<MeshGroup>,
}

/// A model with its LOD chain, finest first.
#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub lods: Vec<ModelLod>,
    /// Radius of the bounding sphere around the model origin.
    pub bounding_radius: f32,
}

impl ModelData {
    /// Model from a LOD chain, with the bounding radius taken from every vertex.
    pub fn from_lods(lods: Vec<ModelLod>) -> Self {
        let bounding_radius = lods
            .iter()
            .flat_map(|lod| &lod.groups)
            .flat_map(|group| &group.vertices)
            .map(|v| Vec3::from(v.position).length())
            .fold(0.0, f32::max);
        Self {
            lods,
            bounding_radius,
        }
    }

    /// Check the model can be drawn: at least one LOD, no empty groups, no
    /// out-of-range indices.
    pub fn validate(&self, name: &str) -> Result<()> {
        let malformed = |reason: String| ModelLoadError::Malformed {
            name: name.to_string(),
            reason,
        };
        if self.lods.is_empty() {
            return Err(malformed("no levels of detail".to_string()));
        }
        for (level, lod) in self.lods.iter().enumerate() {
            if lod.groups.is_empty() {
                return Err(malformed(format!("LOD {level} has no mesh groups")));
            }
            for (index, group) in lod.groups.iter().enumerate() {
                if group.vertices.is_empty() || group.indices.is_empty() {
                    return Err(malformed(format!("LOD {level} group {index} is empty")));
                }
                let count = group.vertices.len() as u32;
                if group.indices.iter().any(|&i| i >= count) {
                    return Err(malformed(format!(
                        "LOD {level} group {index} indexes past {count} vertices"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Loads models by name. Called on the render thread, so it should be quick.
pub trait ModelResolver: Send {
    fn resolve(&self, name: &str) -> Result<ModelData>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle(scale: f32) -> MeshGroup {
        MeshGroup {
            vertices: vec![
                ModelVertex {
                    position: [scale, 0.0, 0.0],
                    ..Default::default()
                },
                ModelVertex {
                    position: [0.0, scale, 0.0],
                    ..Default::default()
                },
                ModelVertex::default(),
            ],
            indices: vec![0, 1, 2],
            material: 0,
        }
    }

    #[test]
    fn radius_covers_all_vertices() {
        let model = ModelData::from_lods(vec![ModelLod {
            groups: vec![triangle(2.0), triangle(3.0)],
        }]);
        assert_relative_eq!(model.bounding_radius, 3.0);
        assert!(model.validate("tri").is_ok());
    }

    #[test]
    fn rejects_malformed_models() {
        assert!(ModelData::default().validate("empty").is_err());

        let mut bad = triangle(1.0);
        bad.indices.push(7);
        let model = ModelData::from_lods(vec![ModelLod { groups: vec![bad] }]);
        let err = model.validate("bad").unwrap_err();
        assert!(matches!(err, ModelLoadError::Malformed { ref name, .. } if name == "bad"));
    }
}
