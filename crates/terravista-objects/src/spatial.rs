//! Uniform grid over object instances.

use glam::Vec3;
use hashbrown::HashMap;

use crate::instance::ObjectInstance;

/// Cell key: quantized X and Z.
pub type CellKey = (i32, i32);

/// Buckets instance indices by XZ cell so visibility queries only scan the
/// cells around the camera.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<u32>>,
}

impl SpatialGrid {
    /// Cell size for a world of the given horizontal extent: `extent / 64`
    /// within `32..=512`.
    pub fn cell_size_for_extent(extent: f32) -> f32 {
        (extent / 64.0).clamp(32.0, 512.0)
    }

    /// Bucket all instances. `extent` is the world's largest horizontal size.
    pub fn build(instances: &[ObjectInstance], extent: f32) -> Self {
        let mut grid = Self {
            cell_size: Self::cell_size_for_extent(extent),
            cells: HashMap::new(),
        };
        for (index, instance) in instances.iter().enumerate() {
            let key = grid.cell_of(instance.position);
            grid.cells.entry(key).or_default().push(index as u32);
        }
        grid
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_of(&self, position: Vec3) -> CellKey {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.z / self.cell_size).floor() as i32,
        )
    }

    /// Instances in a cell.
    pub fn cell(&self, key: CellKey) -> &[u32] {
        self.cells.get(&key).map_or(&[][..], Vec::as_slice)
    }

    /// Collect the instances of every cell within a square of
    /// `ceil(radius / cell) + 1` cells around `center`.
    ///
    /// The square over-approximates the radius; callers do the exact test.
    pub fn query(&self, center: Vec3, radius: f32, out: &mut Vec<u32>) {
        out.clear();
        if self.cells.is_empty() || radius < 0.0 {
            return;
        }
        let reach = (radius / self.cell_size).ceil() as i32 + 1;
        let (cx, cz) = self.cell_of(center);

        // Scanning the occupied cells is cheaper once the square outgrows them.
        let square = (2 * i64::from(reach) + 1).pow(2);
        if square > self.cells.len() as i64 {
            for (&(x, z), bucket) in &self.cells {
                if (x - cx).abs() <= reach && (z - cz).abs() <= reach {
                    out.extend_from_slice(bucket);
                }
            }
            return;
        }
        for z in cz - reach..=cz + reach {
            for x in cx - reach..=cx + reach {
                if let Some(bucket) = self.cells.get(&(x, z)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }
}
