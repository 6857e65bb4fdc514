//! Atlas packing of cached tile layers.
//!
//! Each of the 14 layer roles (satellite, mask and macro/normal/detail for up
//! to four surfaces) is shelf-packed into its own atlas. A float lookup table
//! maps tile index to the UV rectangle of every role.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use terravista_core::constants::MAX_SURFACES;
use terravista_core::TileIndex;
use tracing::{debug, trace};

use crate::cache::{CachedTileTexture, TileCache};

/// Number of atlas roles.
pub const ATLAS_ROLE_COUNT: usize = 2 + MAX_SURFACES * 3;

/// Rows in the lookup table: one metadata row plus one rectangle row per role.
pub const LOOKUP_ROWS: usize = 1 + ATLAS_ROLE_COUNT;

/// Layer of a surface material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceLayer {
    Macro,
    Normal,
    Detail,
}

impl SurfaceLayer {
    pub const ALL: [Self; 3] = [Self::Macro, Self::Normal, Self::Detail];

    const fn offset(self) -> usize {
        match self {
            Self::Macro => 0,
            Self::Normal => 1,
            Self::Detail => 2,
        }
    }
}

/// Which tile layer an atlas holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtlasRole {
    Satellite,
    Mask,
    Surface { surface: u8, layer: SurfaceLayer },
}

impl AtlasRole {
    /// All roles in atlas order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..ATLAS_ROLE_COUNT).filter_map(Self::from_index)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Satellite),
            1 => Some(Self::Mask),
            i if i < ATLAS_ROLE_COUNT => {
                let surface = ((i - 2) / 3) as u8;
                let layer = SurfaceLayer::ALL[(i - 2) % 3];
                Some(Self::Surface { surface, layer })
            }
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Satellite => 0,
            Self::Mask => 1,
            Self::Surface { surface, layer } => 2 + surface as usize * 3 + layer.offset(),
        }
    }

    /// Row of this role in the lookup table.
    pub const fn lookup_row(self) -> usize {
        1 + self.index()
    }

    pub fn label(self) -> String {
        match self {
            Self::Satellite => "satellite".to_string(),
            Self::Mask => "mask".to_string(),
            Self::Surface { surface, layer } => format!("surface{surface}_{layer:?}").to_lowercase(),
        }
    }

    /// The image a cached tile holds for this role.
    pub fn image(self, tile: &CachedTileTexture) -> Option<&RgbaImage> {
        match self {
            Self::Satellite => tile.layers.satellite.as_ref(),
            Self::Mask => tile.layers.mask.as_ref(),
            Self::Surface { surface, layer } => {
                let layers = tile.layers.surfaces.get(usize::from(surface))?;
                Some(match layer {
                    SurfaceLayer::Macro => &layers.macro_color,
                    SurfaceLayer::Normal => &layers.normal,
                    SurfaceLayer::Detail => &layers.detail,
                })
            }
        }
    }
}

/// Atlas packing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Padding in pixels around every packed layer.
    pub padding: u32,
    /// A row wraps once placing another layer would exceed this width.
    pub max_row_width: u32,
    /// Frames the visible tile set must differ before a rebuild without new results.
    pub debounce_frames: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            padding: 2,
            max_row_width: 4096,
            debounce_frames: 8,
        }
    }
}

/// Placement of one layer: the content rectangle, excluding padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PackedRect {
    /// The rectangle grown by `padding` on every side.
    pub const fn padded(&self, padding: u32) -> Self {
        Self {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + 2 * padding,
            height: self.height + 2 * padding,
        }
    }

    pub const fn overlaps(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Left-to-right shelf packer.
#[derive(Clone, Debug)]
pub struct ShelfPacker {
    padding: u32,
    max_row_width: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
    width: u32,
    height: u32,
}

impl ShelfPacker {
    pub fn new(padding: u32, max_row_width: u32) -> Self {
        Self {
            padding,
            max_row_width,
            cursor_x: 0,
            cursor_y: 0,
            row_height: 0,
            width: 0,
            height: 0,
        }
    }

    /// Place a `width` x `height` layer and return its content rectangle.
    ///
    /// A layer wider than the row limit still gets a row of its own.
    pub fn place(&mut self, width: u32, height: u32) -> PackedRect {
        let padded_w = width + 2 * self.padding;
        let padded_h = height + 2 * self.padding;
        if self.cursor_x > 0 && self.cursor_x + padded_w > self.max_row_width {
            self.cursor_y += self.row_height;
            self.cursor_x = 0;
            self.row_height = 0;
        }

        let rect = PackedRect {
            x: self.cursor_x + self.padding,
            y: self.cursor_y + self.padding,
            width,
            height,
        };
        self.cursor_x += padded_w;
        self.row_height = self.row_height.max(padded_h);
        self.width = self.width.max(self.cursor_x);
        self.height = self.height.max(self.cursor_y + self.row_height);
        rect
    }

    /// Atlas size needed for everything placed so far.
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// One packed role atlas.
#[derive(Debug)]
pub struct RoleAtlas {
    pub role: AtlasRole,
    pub image: RgbaImage,
    pub rects: Vec<(TileIndex, PackedRect)>,
}

impl RoleAtlas {
    pub fn rect(&self, tile: TileIndex) -> Option<PackedRect> {
        self.rects.iter().find(|(t, _)| *t == tile).map(|(_, r)| *r)
    }

    /// Normalized `[u0, v0, u1, v1]` of a rectangle in this atlas.
    pub fn uv(&self, rect: PackedRect) -> [f32; 4] {
        let (w, h) = (self.image.width() as f32, self.image.height() as f32);
        [
            rect.x as f32 / w,
            rect.y as f32 / h,
            (rect.x + rect.width) as f32 / w,
            (rect.y + rect.height) as f32 / h,
        ]
    }
}

/// Float lookup table, [`LOOKUP_ROWS`] rows by `tile_count` columns of RGBA32F.
///
/// Row 0 holds `[present, missing, layered, surface_count]`; row `1 + role`
/// holds that role's `[u0, v0, u1, v1]`, all zero when the tile has no such layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileLookupTable {
    tile_count: usize,
    texels: Vec<[f32; 4]>,
}

impl TileLookupTable {
    pub fn new(tile_count: usize) -> Self {
        Self {
            tile_count,
            texels: vec![[0.0; 4]; tile_count * LOOKUP_ROWS],
        }
    }

    /// Width of the table in texels.
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    pub fn get(&self, row: usize, tile: TileIndex) -> Option<[f32; 4]> {
        if row >= LOOKUP_ROWS || tile.as_usize() >= self.tile_count {
            return None;
        }
        Some(self.texels[row * self.tile_count + tile.as_usize()])
    }

    fn set(&mut self, row: usize, tile: TileIndex, value: [f32; 4]) {
        if row < LOOKUP_ROWS && tile.as_usize() < self.tile_count {
            self.texels[row * self.tile_count + tile.as_usize()] = value;
        }
    }

    /// Raw texel bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

/// Output of one atlas rebuild.
#[derive(Debug, Default)]
pub struct AtlasSet {
    /// Indexed by [`AtlasRole::index`]; `None` when no tile has that layer.
    pub atlases: Vec<Option<RoleAtlas>>,
    pub lookup: TileLookupTable,
    /// Tiles packed into the set.
    pub tiles: Vec<TileIndex>,
}

impl AtlasSet {
    pub fn atlas(&self, role: AtlasRole) -> Option<&RoleAtlas> {
        self.atlases.get(role.index())?.as_ref()
    }

    pub fn atlas_count(&self) -> usize {
        self.atlases.iter().flatten().count()
    }
}

/// Packs cached tiles into role atlases.
#[derive(Clone, Debug, Default)]
pub struct AtlasPacker {
    config: AtlasConfig,
}

impl AtlasPacker {
    pub fn new(config: AtlasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Pack the cached layers of `tiles`; tiles not in the cache are skipped.
    ///
    /// `tile_count` sizes the lookup table.
    pub fn build(&self, tiles: &[TileIndex], cache: &TileCache, tile_count: usize) -> AtlasSet {
        let cached: Vec<(TileIndex, &CachedTileTexture)> = tiles
            .iter()
            .filter_map(|&tile| cache.get(tile).map(|entry| (tile, entry)))
            .collect();

        let mut lookup = TileLookupTable::new(tile_count);
        for &(tile, entry) in &cached {
            lookup.set(
                0,
                tile,
                [
                    1.0,
                    f32::from(u8::from(entry.missing)),
                    f32::from(u8::from(entry.layered)),
                    entry.layers.surfaces.len() as f32,
                ],
            );
        }

        let atlases = AtlasRole::all()
            .map(|role| {
                let atlas = self.pack_role(role, &cached)?;
                for &(tile, rect) in &atlas.rects {
                    lookup.set(role.lookup_row(), tile, atlas.uv(rect));
                }
                Some(atlas)
            })
            .collect::<Vec<_>>();

        let set = AtlasSet {
            atlases,
            lookup,
            tiles: cached.iter().map(|(tile, _)| *tile).collect(),
        };
        debug!(
            "Packed {} tiles into {} atlases",
            set.tiles.len(),
            set.atlas_count()
        );
        set
    }

    fn pack_role(
        &self,
        role: AtlasRole,
        cached: &[(TileIndex, &CachedTileTexture)],
    ) -> Option<RoleAtlas> {
        let mut packer = ShelfPacker::new(self.config.padding, self.config.max_row_width);
        let placed: Vec<(TileIndex, &RgbaImage, PackedRect)> = cached
            .iter()
            .filter_map(|&(tile, entry)| {
                let image = role.image(entry)?;
                if image.width() == 0 || image.height() == 0 {
                    return None;
                }
                Some((tile, image, packer.place(image.width(), image.height())))
            })
            .collect();
        if placed.is_empty() {
            return None;
        }

        let (width, height) = packer.extent();
        let mut atlas = RgbaImage::new(width, height);
        for &(_, image, rect) in &placed {
            blit_with_clamped_padding(&mut atlas, image, rect, self.config.padding);
        }
        trace!("{} atlas {width}x{height} with {} layers", role.label(), placed.len());

        Some(RoleAtlas {
            role,
            image: atlas,
            rects: placed.into_iter().map(|(tile, _, rect)| (tile, rect)).collect(),
        })
    }
}

/// Copy `source` into `rect` and fill the padding by replicating the nearest edge texel.
fn blit_with_clamped_padding(atlas: &mut RgbaImage, source: &RgbaImage, rect: PackedRect, padding: u32) {
    let outer = rect.padded(padding);
    for y in outer.y..outer.y + outer.height {
        let sy = y.clamp(rect.y, rect.y + rect.height - 1) - rect.y;
        for x in outer.x..outer.x + outer.width {
            let sx = x.clamp(rect.x, rect.x + rect.width - 1) - rect.x;
            atlas.put_pixel(x, y, *source.get_pixel(sx, sy));
        }
    }
}

/// Decides when the atlases are worth rebuilding.
///
/// Rebuilds right away when the cache content changed (new results arrived).
/// A changed visible set without new content waits until it has differed from
/// the last rebuild for `debounce_frames` consecutive frames.
#[derive(Clone, Debug)]
pub struct AtlasRebuildScheduler {
    debounce_frames: u32,
    pending_frames: u32,
    last_tiles: Vec<TileIndex>,
    last_cache_version: Option<u64>,
    rebuilds: u64,
}

impl AtlasRebuildScheduler {
    pub fn new(debounce_frames: u32) -> Self {
        Self {
            debounce_frames,
            pending_frames: 0,
            last_tiles: Vec::new(),
            last_cache_version: None,
            rebuilds: 0,
        }
    }

    /// Call once per frame with the sorted visible tile set.
    ///
    /// Returns `true` when the caller should rebuild now; the rebuild is then
    /// recorded as done.
    pub fn should_rebuild(&mut self, visible: &[TileIndex], cache_version: u64) -> bool {
        let content_changed = self.last_cache_version != Some(cache_version);
        let selection_changed = self.last_tiles != visible;

        if !content_changed {
            if !selection_changed {
                self.pending_frames = 0;
                return false;
            }
            self.pending_frames += 1;
            if self.pending_frames < self.debounce_frames {
                return false;
            }
        }

        self.pending_frames = 0;
        self.last_tiles.clear();
        self.last_tiles.extend_from_slice(visible);
        self.last_cache_version = Some(cache_version);
        self.rebuilds += 1;
        true
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Forget the previous rebuild so the next frame rebuilds.
    pub fn reset(&mut self) {
        self.pending_frames = 0;
        self.last_tiles.clear();
        self.last_cache_version = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TileLoadResult;
    use crate::layers::{SurfaceLayers, TileLayers};
    use approx::assert_relative_eq;
    use image::Rgba;
    use terravista_core::Generation;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    fn insert(cache: &mut TileCache, tile: u32, layers: TileLayers, layered: bool) {
        cache.insert(TileLoadResult {
            tile: TileIndex(tile),
            generation: Generation(0),
            layers,
            missing: false,
            layered,
        });
    }

    #[test]
    fn roles_round_trip_through_index() {
        let roles: Vec<_> = AtlasRole::all().collect();
        assert_eq!(roles.len(), 14);
        for (i, role) in roles.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
        assert_eq!(
            AtlasRole::from_index(13),
            Some(AtlasRole::Surface {
                surface: 3,
                layer: SurfaceLayer::Detail
            })
        );
        assert_eq!(AtlasRole::from_index(14), None);
        assert_eq!(AtlasRole::from_index(4).unwrap().label(), "surface0_normal");
    }

    #[test]
    fn shelf_rects_are_disjoint() {
        let mut packer = ShelfPacker::new(2, 64);
        let sizes = [(16, 16), (30, 8), (10, 20), (40, 4), (8, 8), (70, 10), (5, 5)];
        let rects: Vec<_> = sizes.iter().map(|&(w, h)| packer.place(w, h)).collect();
        let (width, height) = packer.extent();

        for (i, a) in rects.iter().enumerate() {
            let pa = a.padded(2);
            assert!(pa.x + pa.width <= width && pa.y + pa.height <= height);
            for b in &rects[i + 1..] {
                assert!(!pa.overlaps(&b.padded(2)), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn rows_wrap_at_max_width() {
        let mut packer = ShelfPacker::new(1, 40);
        let a = packer.place(16, 16);
        let b = packer.place(16, 8);
        let c = packer.place(16, 16);
        assert_eq!((a.x, a.y), (1, 1));
        assert_eq!((b.x, b.y), (19, 1));
        // 36 + 18 > 40, so c starts the second row below the tallest of the first.
        assert_eq!((c.x, c.y), (1, 19));
        assert_eq!(packer.extent(), (36, 36));
    }

    #[test]
    fn padding_replicates_edges() {
        let mut source = RgbaImage::new(2, 2);
        source.put_pixel(0, 0, Rgba([1, 0, 0, 255]));
        source.put_pixel(1, 0, Rgba([2, 0, 0, 255]));
        source.put_pixel(0, 1, Rgba([3, 0, 0, 255]));
        source.put_pixel(1, 1, Rgba([4, 0, 0, 255]));
        let mut atlas = RgbaImage::new(6, 6);
        let rect = PackedRect {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        };
        blit_with_clamped_padding(&mut atlas, &source, rect, 2);

        assert_eq!(atlas.get_pixel(0, 0)[0], 1);
        assert_eq!(atlas.get_pixel(5, 0)[0], 2);
        assert_eq!(atlas.get_pixel(0, 5)[0], 3);
        assert_eq!(atlas.get_pixel(5, 5)[0], 4);
        assert_eq!(atlas.get_pixel(1, 2)[0], 1);
        assert_eq!(atlas.get_pixel(3, 4)[0], 4);
    }

    #[test]
    fn build_fills_lookup_table() {
        let mut cache = TileCache::new(8);
        insert(&mut cache, 0, TileLayers::flat(solid(8, 8, 10)), false);
        let surface = SurfaceLayers {
            macro_color: solid(4, 4, 1),
            normal: solid(4, 4, 2),
            detail: solid(4, 4, 3),
        };
        insert(
            &mut cache,
            2,
            TileLayers {
                satellite: Some(solid(8, 8, 20)),
                mask: Some(solid(8, 8, 30)),
                surfaces: vec![surface],
            },
            true,
        );

        let packer = AtlasPacker::new(AtlasConfig::default());
        let set = packer.build(&[TileIndex(0), TileIndex(1), TileIndex(2)], &cache, 4);
        assert_eq!(set.tiles, vec![TileIndex(0), TileIndex(2)]);
        // Satellite, mask and the three layers of surface 0.
        assert_eq!(set.atlas_count(), 5);

        assert_eq!(set.lookup.get(0, TileIndex(0)), Some([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(set.lookup.get(0, TileIndex(1)), Some([0.0; 4]));
        assert_eq!(set.lookup.get(0, TileIndex(2)), Some([1.0, 0.0, 1.0, 1.0]));
        assert_eq!(
            set.lookup.get(AtlasRole::Mask.lookup_row(), TileIndex(0)),
            Some([0.0; 4])
        );

        let satellite = set.atlas(AtlasRole::Satellite).unwrap();
        let rect = satellite.rect(TileIndex(2)).unwrap();
        let uv = set
            .lookup
            .get(AtlasRole::Satellite.lookup_row(), TileIndex(2))
            .unwrap();
        assert_relative_eq!(uv[0], rect.x as f32 / satellite.image.width() as f32);
        assert_relative_eq!(uv[3], (rect.y + 8) as f32 / satellite.image.height() as f32);
        assert_eq!(satellite.image.get_pixel(rect.x, rect.y)[0], 20);

        assert_eq!(set.lookup.as_bytes().len(), LOOKUP_ROWS * 4 * 16);
    }

    #[test]
    fn rebuild_is_immediate_for_new_content() {
        let mut scheduler = AtlasRebuildScheduler::new(4);
        let tiles = [TileIndex(0), TileIndex(1)];
        assert!(scheduler.should_rebuild(&tiles, 1));
        assert!(!scheduler.should_rebuild(&tiles, 1));
        assert!(scheduler.should_rebuild(&tiles, 2));
        assert_eq!(scheduler.rebuilds(), 2);
    }

    #[test]
    fn selection_change_is_debounced() {
        let mut scheduler = AtlasRebuildScheduler::new(3);
        let a = [TileIndex(0)];
        let b = [TileIndex(1)];
        assert!(scheduler.should_rebuild(&a, 7));

        assert!(!scheduler.should_rebuild(&b, 7));
        assert!(!scheduler.should_rebuild(&b, 7));
        assert!(scheduler.should_rebuild(&b, 7));

        // Flicking back for fewer frames than the debounce resets the count.
        assert!(!scheduler.should_rebuild(&a, 7));
        assert!(!scheduler.should_rebuild(&b, 7));
        assert!(!scheduler.should_rebuild(&a, 7));
        assert!(!scheduler.should_rebuild(&a, 7));
        assert_eq!(scheduler.rebuilds(), 2);
    }
}
