//! Tile texture streaming driven by the visible tile set.

use std::sync::Arc;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use terravista_core::{Generation, LogThrottle, TileIndex};
use tracing::{debug, info, trace, warn};

use crate::cache::TileCache;
use crate::catalog::TextureCatalog;
use crate::job::{TileLoadJob, TileLoadResult};
use crate::resolver::TextureResolver;
use crate::worker::{default_worker_count, TileWorkerPool};

/// Configuration for tile streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Worker threads; `None` sizes the pool from the hardware.
    pub worker_count: Option<usize>,
    /// Maximum cached tiles before LRU eviction.
    pub cache_budget: usize,
    /// Maximum results applied per frame.
    pub max_results_per_frame: usize,
    /// Capacity of the job queue.
    pub job_queue_capacity: usize,
    /// Capacity of the result queue.
    pub result_queue_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            cache_budget: 256,
            max_results_per_frame: 8,
            job_queue_capacity: 128,
            result_queue_capacity: 64,
        }
    }
}

impl StreamingConfig {
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.map_or_else(default_worker_count, |n| n.max(1))
    }
}

/// Cumulative streaming counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamerStats {
    pub jobs_enqueued: u64,
    /// Jobs deferred to a later frame because the queue was full.
    pub queue_full: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub results_accepted: u64,
    /// Results dropped for carrying an old generation.
    pub stale_results: u64,
    /// Tiles that resolved to the placeholder, synchronously or not.
    pub missing_tiles: u64,
    pub evictions: u64,
    /// Missing-tile warnings swallowed by the log throttle.
    pub suppressed_logs: u64,
    /// Visible tiles left unrequested because the cache could not hold them.
    pub over_budget: u64,
}

/// Streams terrain tile layers for the visible tile set.
pub struct TileTextureStreamer {
    config: StreamingConfig,
    pool: TileWorkerPool,
    cache: TileCache,
    catalog: TextureCatalog,
    generation: Generation,
    in_flight: HashSet<TileIndex>,
    stats: StreamerStats,
    missing_log: LogThrottle<TileIndex>,
    warned_over_budget: bool,
}

impl TileTextureStreamer {
    pub fn new(config: StreamingConfig, resolver: Arc<dyn TextureResolver>) -> Self {
        let pool = TileWorkerPool::spawn(
            resolver,
            config.resolved_worker_count(),
            config.job_queue_capacity,
            config.result_queue_capacity,
        );
        info!(
            "Tile streamer: {} workers, cache budget {}",
            pool.worker_count(),
            config.cache_budget
        );
        Self {
            cache: TileCache::new(config.cache_budget),
            config,
            pool,
            catalog: TextureCatalog::default(),
            generation: Generation::default(),
            in_flight: HashSet::new(),
            stats: StreamerStats::default(),
            missing_log: LogThrottle::new(),
            warned_over_budget: false,
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn catalog(&self) -> &TextureCatalog {
        &self.catalog
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, tile: TileIndex) -> bool {
        self.in_flight.contains(&tile)
    }

    /// Jobs waiting in the worker queue.
    pub fn queued_jobs(&self) -> usize {
        self.pool.queued_jobs()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            evictions: self.cache.evictions(),
            suppressed_logs: self.missing_log.suppressed(),
            ..self.stats
        }
    }

    /// Start streaming a new world: clear everything and adopt its catalog.
    pub fn reset(&mut self, catalog: TextureCatalog) {
        self.clear();
        self.catalog = catalog;
    }

    /// Request every visible tile that is neither cached nor in flight.
    ///
    /// Only the first `cache_budget` tiles are considered, so callers pass
    /// them nearest first. Cached tiles get a fresh LRU stamp. Tiles without candidates resolve to
    /// the placeholder right here without touching the workers. When the job
    /// queue is full the remaining tiles are retried on a later call.
    ///
    /// Returns the number of jobs queued.
    pub fn enqueue_visible(&mut self, tiles: &[TileIndex]) -> usize {
        let budget = self.cache.budget();
        if tiles.len() > budget {
            self.stats.over_budget += (tiles.len() - budget) as u64;
            if !self.warned_over_budget {
                warn!(
                    "{} visible tiles exceed the cache budget of {budget}, streaming the nearest only",
                    tiles.len()
                );
                self.warned_over_budget = true;
            }
        }

        let mut enqueued = 0;
        for &tile in tiles.iter().take(budget) {
            if self.cache.touch(tile) {
                self.stats.cache_hits += 1;
                continue;
            }
            if self.in_flight.contains(&tile) {
                continue;
            }
            self.stats.cache_misses += 1;

            let candidates = self.catalog.candidates(tile);
            if candidates.is_empty() {
                self.accept(TileLoadResult::missing(tile, self.generation));
                continue;
            }

            let job = TileLoadJob {
                tile,
                generation: self.generation,
                candidates: candidates.to_vec(),
            };
            if self.pool.try_submit(job).is_err() {
                self.stats.queue_full += 1;
                trace!("Tile job queue full, deferring remaining tiles");
                break;
            }
            self.in_flight.insert(tile);
            enqueued += 1;
        }
        self.stats.jobs_enqueued += enqueued as u64;
        enqueued
    }

    /// Apply at most `max_results` finished results.
    ///
    /// Results from an older generation are dropped. Returns the number accepted.
    pub fn drain_ready(&mut self, max_results: usize) -> usize {
        let mut accepted = 0;
        for _ in 0..max_results {
            let Some(result) = self.pool.try_recv() else {
                break;
            };
            if result.generation != self.generation {
                self.stats.stale_results += 1;
                continue;
            }
            self.in_flight.remove(&result.tile);
            self.accept(result);
            accepted += 1;
        }
        accepted
    }

    /// [`Self::drain_ready`] with the configured per-frame cap.
    pub fn drain_frame(&mut self) -> usize {
        self.drain_ready(self.config.max_results_per_frame)
    }

    fn accept(&mut self, result: TileLoadResult) {
        if result.missing {
            self.stats.missing_tiles += 1;
            if self.missing_log.first_time(result.tile) {
                warn!("Tile {} has no resolvable texture, using placeholder", result.tile.0);
            }
        }
        self.stats.results_accepted += 1;
        let evicted = self.cache.insert(result);
        if !evicted.is_empty() {
            trace!("Evicted {} tiles over budget", evicted.len());
        }
    }

    /// Forget the current world.
    ///
    /// Bumps the generation so in-flight work is discarded when it completes,
    /// drops queued jobs and undrained results, and empties the cache.
    pub fn clear(&mut self) {
        self.generation = self.generation.next();
        self.pool.set_generation(self.generation);
        let dropped = self.pool.discard_queued();
        self.in_flight.clear();
        self.cache.clear();
        self.missing_log.reset();
        self.warned_over_budget = false;
        debug!(
            "Tile streamer cleared (generation {}, {dropped} queued items dropped)",
            self.generation.0
        );
    }

    /// One-line summary for debug overlays.
    pub fn summary(&self) -> String {
        let s = self.stats();
        format!(
            "tiles: cache {}/{} in-flight {} queued {} | hits {} misses {} jobs {} stale {} missing {} evicted {}",
            self.cache.len(),
            self.cache.budget(),
            self.in_flight.len(),
            self.pool.queued_jobs(),
            s.cache_hits,
            s.cache_misses,
            s.jobs_enqueued,
            s.stale_results,
            s.missing_tiles,
            s.evictions
        )
    }
}
