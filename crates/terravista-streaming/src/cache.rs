//! LRU-bounded cache of resolved tiles.

use hashbrown::HashMap;
use terravista_core::TileIndex;
use tracing::trace;

use crate::job::TileLoadResult;
use crate::layers::TileLayers;

/// One resolved tile.
#[derive(Clone, Debug)]
pub struct CachedTileTexture {
    pub layers: TileLayers,
    pub missing: bool,
    pub layered: bool,
    /// LRU stamp; higher is more recent.
    pub last_used: u64,
}

/// Capacity-bounded map from tile index to resolved layers.
///
/// Every insert or touch takes a fresh stamp from a monotonic tick. When the
/// entry count exceeds the budget the globally oldest entry is evicted.
#[derive(Debug)]
pub struct TileCache {
    entries: HashMap<TileIndex, CachedTileTexture>,
    budget: usize,
    tick: u64,
    /// Bumped whenever the set of cached tiles or their contents changes.
    version: u64,
    evictions: u64,
}

impl TileCache {
    pub fn new(budget: usize) -> Self {
        Self {
            entries: HashMap::new(),
            budget: budget.max(1),
            tick: 0,
            version: 0,
            evictions: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn contains(&self, tile: TileIndex) -> bool {
        self.entries.contains_key(&tile)
    }

    pub fn get(&self, tile: TileIndex) -> Option<&CachedTileTexture> {
        self.entries.get(&tile)
    }

    /// Content version, for change detection by the atlas scheduler.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Total entries evicted over the cache's lifetime.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Refresh the LRU stamp of a tile. Returns `false` if it is not cached.
    pub fn touch(&mut self, tile: TileIndex) -> bool {
        self.tick += 1;
        let tick = self.tick;
        match self.entries.get_mut(&tile) {
            Some(entry) => {
                entry.last_used = tick;
                true
            }
            None => false,
        }
    }

    /// Insert a result with a fresh stamp, then evict down to the budget.
    ///
    /// Returns the evicted tiles.
    pub fn insert(&mut self, result: TileLoadResult) -> Vec<TileIndex> {
        self.tick += 1;
        self.entries.insert(
            result.tile,
            CachedTileTexture {
                layers: result.layers,
                missing: result.missing,
                layered: result.layered,
                last_used: self.tick,
            },
        );
        self.version += 1;
        self.evict_to_budget()
    }

    fn evict_to_budget(&mut self) -> Vec<TileIndex> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.budget {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(tile, _)| *tile)
            else {
                break;
            };
            self.entries.remove(&oldest);
            trace!("Evicted tile {}", oldest.0);
            evicted.push(oldest);
        }
        if !evicted.is_empty() {
            self.evictions += evicted.len() as u64;
            self.version += 1;
        }
        evicted
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.version += 1;
        }
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileIndex, &CachedTileTexture)> {
        self.entries.iter().map(|(tile, entry)| (*tile, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terravista_core::Generation;

    fn result(tile: u32) -> TileLoadResult {
        TileLoadResult::missing(TileIndex(tile), Generation(0))
    }

    #[test]
    fn never_exceeds_budget() {
        let mut cache = TileCache::new(3);
        for tile in 0..10 {
            cache.insert(result(tile));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.evictions(), 7);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = TileCache::new(2);
        cache.insert(result(1));
        cache.insert(result(2));
        assert!(cache.touch(TileIndex(1)));

        let evicted = cache.insert(result(3));
        assert_eq!(evicted, vec![TileIndex(2)]);
        assert!(cache.contains(TileIndex(1)));
        assert!(cache.contains(TileIndex(3)));
    }

    #[test]
    fn version_tracks_changes() {
        let mut cache = TileCache::new(4);
        let v0 = cache.version();
        cache.insert(result(0));
        assert!(cache.version() > v0);
        let v1 = cache.version();
        cache.touch(TileIndex(0));
        assert_eq!(cache.version(), v1);
        assert!(!cache.touch(TileIndex(7)));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.version() > v1);
    }
}
