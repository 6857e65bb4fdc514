//! Fixed pool of tile resolver threads.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use terravista_core::Generation;
use tracing::{debug, warn};

use crate::job::{TileLoadJob, TileLoadResult};
use crate::resolver::TextureResolver;

/// Worker count for this machine: one less than the hardware threads, within `2..=8`.
pub fn default_worker_count() -> usize {
    let hardware = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    hardware.saturating_sub(1).clamp(2, 8)
}

/// Handle to the tile worker threads.
///
/// Jobs go through a bounded channel; the render thread only ever uses the
/// non-blocking `try_submit`/`try_recv`. Workers block on an empty job queue
/// and apply backpressure by blocking on a full result queue.
pub struct TileWorkerPool {
    job_tx: Option<Sender<TileLoadJob>>,
    /// Kept so queued jobs can be discarded on world reload.
    job_rx: Receiver<TileLoadJob>,
    result_rx: Option<Receiver<TileLoadResult>>,
    generation: Arc<AtomicU64>,
    threads: Vec<JoinHandle<()>>,
}

impl TileWorkerPool {
    /// Spawn `worker_count` workers sharing one resolver.
    pub fn spawn(
        resolver: Arc<dyn TextureResolver>,
        worker_count: usize,
        job_capacity: usize,
        result_capacity: usize,
    ) -> Self {
        let (job_tx, job_rx) = channel::bounded::<TileLoadJob>(job_capacity.max(1));
        let (result_tx, result_rx) = channel::bounded::<TileLoadResult>(result_capacity.max(1));
        let generation = Arc::new(AtomicU64::new(0));

        let threads = (0..worker_count.max(1))
            .map(|index| {
                let resolver = Arc::clone(&resolver);
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let generation = Arc::clone(&generation);
                thread::Builder::new()
                    .name(format!("tile-worker-{index}"))
                    .spawn(move || Self::worker_loop(resolver.as_ref(), &jobs, &results, &generation))
                    .expect("Failed to spawn tile worker thread")
            })
            .collect::<Vec<_>>();

        debug!("Spawned {} tile workers", threads.len());
        Self {
            job_tx: Some(job_tx),
            job_rx,
            result_rx: Some(result_rx),
            generation,
            threads,
        }
    }

    /// Main worker loop - blocks waiting for jobs and resolves them.
    fn worker_loop(
        resolver: &dyn TextureResolver,
        jobs: &Receiver<TileLoadJob>,
        results: &Sender<TileLoadResult>,
        generation: &AtomicU64,
    ) {
        while let Ok(job) = jobs.recv() {
            // Issued before a world reload; nobody wants the result.
            if job.generation.0 != generation.load(Ordering::Acquire) {
                continue;
            }
            let result = resolve_job(resolver, job);
            // Blocking send - backpressure if the render thread drains slowly.
            if results.send(result).is_err() {
                return;
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    /// Generation whose jobs workers still process.
    pub fn set_generation(&self, generation: Generation) {
        self.generation.store(generation.0, Ordering::Release);
    }

    /// Queue a job without blocking. A full or closed queue hands the job back.
    pub fn try_submit(&self, job: TileLoadJob) -> Result<(), TileLoadJob> {
        let Some(job_tx) = &self.job_tx else {
            return Err(job);
        };
        job_tx.try_send(job).map_err(|err| match err {
            TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
        })
    }

    /// Take one finished result, if any.
    pub fn try_recv(&self) -> Option<TileLoadResult> {
        self.result_rx.as_ref()?.try_recv().ok()
    }

    /// Jobs waiting for a worker.
    pub fn queued_jobs(&self) -> usize {
        self.job_rx.len()
    }

    /// Results waiting to be drained.
    pub fn pending_results(&self) -> usize {
        self.result_rx.as_ref().map_or(0, Receiver::len)
    }

    /// Drop every queued job and undrained result. Returns how many were dropped.
    pub fn discard_queued(&self) -> usize {
        let jobs = self.job_rx.try_iter().count();
        let results = self
            .result_rx
            .as_ref()
            .map_or(0, |rx| rx.try_iter().count());
        jobs + results
    }

    /// Stop the workers and wait for them to exit.
    pub fn shutdown(&mut self) {
        self.discard_queued();
        // Closing both channels wakes workers blocked on either side.
        self.job_tx = None;
        self.result_rx = None;
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

impl Drop for TileWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run the resolver, turning errors and panics into a missing result.
pub(crate) fn resolve_job(resolver: &dyn TextureResolver, job: TileLoadJob) -> TileLoadResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| resolver.resolve(&job.candidates)));
    match outcome {
        Ok(Ok(resolved)) => TileLoadResult {
            tile: job.tile,
            generation: job.generation,
            layered: resolved.is_layered(),
            layers: resolved.into_layers(),
            missing: false,
        },
        Ok(Err(err)) => {
            debug!("Tile {} unresolved: {err}", job.tile.0);
            TileLoadResult::missing(job.tile, job.generation)
        }
        Err(_) => {
            warn!("Texture resolver panicked on tile {}", job.tile.0);
            TileLoadResult::missing(job.tile, job.generation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ResolveError, ResolvedTexture};
    use image::RgbaImage;
    use std::time::{Duration, Instant};
    use terravista_core::TileIndex;

    struct Stub;

    impl TextureResolver for Stub {
        fn resolve(&self, candidates: &[String]) -> Result<ResolvedTexture, ResolveError> {
            match candidates.first().map(String::as_str) {
                Some("panic") => panic!("boom"),
                Some("ok") => Ok(ResolvedTexture::Flat(RgbaImage::new(2, 2))),
                _ => Err(ResolveError::NotFound(candidates.join(", "))),
            }
        }
    }

    fn job(tile: u32, candidate: &str, generation: u64) -> TileLoadJob {
        TileLoadJob {
            tile: TileIndex(tile),
            generation: Generation(generation),
            candidates: vec![candidate.to_string()],
        }
    }

    fn recv_within(pool: &TileWorkerPool, timeout: Duration) -> Option<TileLoadResult> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(result) = pool.try_recv() {
                return Some(result);
            }
            thread::sleep(Duration::from_millis(2));
        }
        None
    }

    #[test]
    fn worker_count_is_clamped() {
        let count = default_worker_count();
        assert!((2..=8).contains(&count));
    }

    #[test]
    fn errors_and_panics_become_missing() {
        assert!(!resolve_job(&Stub, job(0, "ok", 0)).missing);
        assert!(resolve_job(&Stub, job(1, "gone", 0)).missing);
        let panicked = resolve_job(&Stub, job(2, "panic", 0));
        assert!(panicked.missing);
        assert_eq!(panicked.layers.satellite.unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn pool_resolves_jobs() {
        let pool = TileWorkerPool::spawn(Arc::new(Stub), 2, 8, 8);
        assert_eq!(pool.worker_count(), 2);
        pool.try_submit(job(3, "ok", 0)).unwrap();
        let result = recv_within(&pool, Duration::from_secs(5)).unwrap();
        assert_eq!(result.tile, TileIndex(3));
        assert!(!result.missing);
    }

    #[test]
    fn stale_jobs_are_skipped() {
        let pool = TileWorkerPool::spawn(Arc::new(Stub), 1, 8, 8);
        pool.set_generation(Generation(2));
        pool.try_submit(job(1, "ok", 1)).unwrap();
        pool.try_submit(job(2, "ok", 2)).unwrap();
        let result = recv_within(&pool, Duration::from_secs(5)).unwrap();
        assert_eq!(result.tile, TileIndex(2));
        assert!(recv_within(&pool, Duration::from_millis(50)).is_none());
    }

    #[test]
    fn shutdown_rejects_jobs() {
        let mut pool = TileWorkerPool::spawn(Arc::new(Stub), 1, 1, 1);
        pool.shutdown();
        assert!(pool.try_submit(job(0, "ok", 0)).is_err());
        assert!(pool.try_recv().is_none());
    }
}
