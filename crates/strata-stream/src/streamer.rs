//! Background chunk pipeline: request bookkeeping on the calling thread, noise
//! fill, padding and erosion on a dedicated worker thread, and per-frame
//! delivery back to the owner.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use rustc_hash::{FxHashMap, FxHashSet};
use strata_erosion::{ChunkPlacement, ErosionAlgorithm, ErosionKind, ErosionSettings};
use strata_noise::WorldGenerator;

use crate::cache::ChunkedHeightCache;
use crate::coord::{ChunkCoord, ConsumerHandle};
use crate::error::StreamError;
use crate::surface::{SurfaceTable, TerrainSurface};

/// Construction parameters for a [`ChunkStreamer`].
#[derive(Clone, Debug)]
pub struct StreamerConfig {
    /// Cells per chunk side. Adjacent chunks share their border row, so chunk
    /// `(cx, cy)` starts at global cell `(cx * (chunk_size - 1), cy * (chunk_size - 1))`.
    pub chunk_size: usize,
    /// World seed handed to the erosion algorithm.
    pub seed: u64,
    /// Algorithm run for requests that ask for erosion.
    pub algorithm: ErosionKind,
    pub erosion: ErosionSettings,
    /// Keep cached cells only within this many chunks of the most recently
    /// processed one. `None` keeps everything.
    pub retain_radius: Option<u32>,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 257,
            seed: 0,
            algorithm: ErosionKind::Droplet,
            erosion: ErosionSettings::default(),
            retain_radius: None,
        }
    }
}

impl StreamerConfig {
    /// Cells of context generated beyond each chunk edge.
    pub fn padding(&self) -> usize {
        self.chunk_size / 2
    }

    /// Distance in cells between the first cells of adjacent chunks.
    pub fn stride(&self) -> usize {
        self.chunk_size - 1
    }

    /// Global cell coordinate of a chunk's first cell.
    pub fn chunk_origin(&self, coord: ChunkCoord) -> (i64, i64) {
        let stride = self.stride() as i64;
        (coord.x as i64 * stride, coord.y as i64 * stride)
    }
}

/// What [`ChunkStreamer::generate`] did with a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// A work item was queued for the worker.
    Queued,
    /// The chunk is already active at the requested level; nothing queued.
    AlreadyActive,
    /// Negative chunk coordinates, or the worker has shut down.
    Rejected,
}

/// A finished chunk on its way to a consumer.
#[derive(Clone, Debug)]
pub struct ReadyChunk {
    pub coord: ChunkCoord,
    pub handle: ConsumerHandle,
    /// Row-major `chunk_size × chunk_size` heights.
    pub heights: Vec<f32>,
    /// Whether erosion has run over this chunk.
    pub eroded: bool,
}

impl ReadyChunk {
    /// Publish the heights to `surface`.
    pub fn apply<S: TerrainSurface + ?Sized>(&self, surface: &mut S) -> Result<(), StreamError> {
        let actual = surface.heights().len();
        if actual != self.heights.len() {
            return Err(StreamError::SurfaceSize {
                expected: self.heights.len(),
                actual,
            });
        }
        surface.set_heights(&self.heights);
        Ok(())
    }
}

/// Snapshot of streamer counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Work items queued or being processed.
    pub in_flight: usize,
    /// Work items the worker has finished.
    pub processed: u64,
    /// Erosion runs performed.
    pub eroded: u64,
    /// Ready chunks handed to the owner.
    pub delivered: u64,
    /// Ready chunks dropped because their chunk was unregistered or reassigned.
    pub dropped_stale: u64,
    /// Blocks allocated in the worker's cache.
    pub cached_blocks: usize,
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    processed: AtomicU64,
    eroded: AtomicU64,
    delivered: AtomicU64,
    dropped_stale: AtomicU64,
    cached_blocks: AtomicUsize,
}

struct WorkItem {
    coord: ChunkCoord,
    handle: ConsumerHandle,
    erode: bool,
}

#[derive(Clone, Copy)]
struct ActiveChunk {
    handle: ConsumerHandle,
    erode: bool,
}

/// Request bookkeeping shared by the owner and the worker.
#[derive(Default)]
struct Registry {
    active: FxHashMap<ChunkCoord, ActiveChunk>,
    eroded: FxHashSet<ChunkCoord>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // The registry stays consistent even if a holder panicked mid-update.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Streams terrain chunks from a world generator through an optional erosion
/// pass on a background thread.
///
/// Requests are serviced in FIFO order by one worker. A chunk that is already
/// active is not queued again unless the new request asks for erosion the
/// chunk has not had yet. Finished chunks are collected on the owning thread
/// with [`update`](Self::update) or [`drain_ready`](Self::drain_ready).
pub struct ChunkStreamer {
    config: StreamerConfig,
    jobs: Option<Sender<WorkItem>>,
    results: Receiver<ReadyChunk>,
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Counters>,
    /// Cleared at shutdown; the worker stops after its current item.
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ChunkStreamer {
    /// Start the worker thread.
    ///
    /// # Panics
    ///
    /// Panics if `config.chunk_size` is below 2.
    pub fn new(config: StreamerConfig, generator: WorldGenerator) -> Result<Self, StreamError> {
        assert!(config.chunk_size >= 2, "chunk size must be at least 2");

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<WorkItem>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<ReadyChunk>();
        let registry = Arc::new(Mutex::new(Registry::default()));
        let counters = Arc::new(Counters::default());
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            erosion: config.erosion.build(config.algorithm, config.seed),
            cache: ChunkedHeightCache::new(config.chunk_size),
            config: config.clone(),
            generator,
            delivered: FxHashSet::default(),
            registry: Arc::clone(&registry),
            counters: Arc::clone(&counters),
            running: Arc::clone(&running),
            results: result_tx,
            scratch: Vec::new(),
        };
        let handle = std::thread::Builder::new()
            .name("strata-chunk-worker".into())
            .spawn(move || worker.run(job_rx))?;

        tracing::info!(
            chunk_size = config.chunk_size,
            algorithm = %config.algorithm,
            "chunk streamer started"
        );

        Ok(Self {
            config,
            jobs: Some(job_tx),
            results: result_rx,
            registry,
            counters,
            running,
            worker: Some(handle),
        })
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// Request chunk `coord` for the consumer behind `handle`.
    ///
    /// Negative coordinates are rejected. A chunk already active for the same
    /// handle is left alone unless `erode` asks for erosion it has not been
    /// requested with yet; a chunk active for another handle is reassigned and
    /// regenerated for the new one.
    pub fn generate(&self, coord: ChunkCoord, handle: ConsumerHandle, erode: bool) -> GenerateOutcome {
        if coord.x < 0 || coord.y < 0 {
            tracing::debug!(chunk = %coord, "rejected chunk request with negative coordinates");
            return GenerateOutcome::Rejected;
        }
        let Some(jobs) = &self.jobs else {
            return GenerateOutcome::Rejected;
        };

        let mut registry = lock(&self.registry);
        let erode_wanted = match registry.active.get(&coord) {
            Some(active) if active.handle == handle && (active.erode || !erode) => {
                return GenerateOutcome::AlreadyActive;
            }
            Some(active) if active.handle == handle => true,
            _ => erode,
        };
        registry.active.insert(
            coord,
            ActiveChunk {
                handle,
                erode: erode_wanted,
            },
        );

        // Sent under the lock so dedup and queue order agree.
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        let item = WorkItem {
            coord,
            handle,
            erode: erode_wanted,
        };
        if jobs.send(item).is_err() {
            self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
            registry.active.remove(&coord);
            return GenerateOutcome::Rejected;
        }
        GenerateOutcome::Queued
    }

    /// Forget that `coord` is active so a later [`generate`](Self::generate)
    /// queues it again. Work already queued still runs, but its result is
    /// dropped. Returns whether the chunk was active.
    pub fn unregister(&self, coord: ChunkCoord) -> bool {
        lock(&self.registry).active.remove(&coord).is_some()
    }

    pub fn is_active(&self, coord: ChunkCoord) -> bool {
        lock(&self.registry).active.contains_key(&coord)
    }

    /// Whether erosion has already run over `coord`.
    pub fn is_eroded(&self, coord: ChunkCoord) -> bool {
        lock(&self.registry).eroded.contains(&coord)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.registry).active.len()
    }

    /// Collect every finished chunk that still belongs to its consumer.
    pub fn drain_ready(&self) -> Vec<ReadyChunk> {
        let mut ready = Vec::new();
        let mut stale = 0u64;
        {
            let registry = lock(&self.registry);
            while let Ok(chunk) = self.results.try_recv() {
                let current = registry.active.get(&chunk.coord).map(|a| a.handle);
                if current == Some(chunk.handle) {
                    ready.push(chunk);
                } else {
                    tracing::trace!(chunk = %chunk.coord, handle = %chunk.handle, "dropped stale chunk");
                    stale += 1;
                }
            }
        }
        self.counters
            .delivered
            .fetch_add(ready.len() as u64, Ordering::Relaxed);
        self.counters
            .dropped_stale
            .fetch_add(stale, Ordering::Relaxed);
        ready
    }

    /// Apply every finished chunk to its surface in `table`. Call once per
    /// frame on the thread that owns the surfaces. Returns the number of
    /// surfaces updated.
    pub fn update<T: SurfaceTable>(&self, table: &mut T) -> usize {
        let mut applied = 0;
        for chunk in self.drain_ready() {
            let Some(surface) = table.surface_mut(chunk.handle) else {
                tracing::debug!(chunk = %chunk.coord, handle = %chunk.handle, "no surface for ready chunk");
                continue;
            };
            match chunk.apply(surface) {
                Ok(()) => applied += 1,
                Err(err) => {
                    tracing::warn!(chunk = %chunk.coord, handle = %chunk.handle, %err, "chunk not applied");
                }
            }
        }
        applied
    }

    pub fn stats(&self) -> StreamStats {
        let c = &self.counters;
        StreamStats {
            in_flight: c.in_flight.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            eroded: c.eroded.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped_stale: c.dropped_stale.load(Ordering::Relaxed),
            cached_blocks: c.cached_blocks.load(Ordering::Relaxed),
        }
    }

    /// Whether the worker has nothing queued or running.
    pub fn is_idle(&self) -> bool {
        self.counters.in_flight.load(Ordering::Relaxed) == 0
    }

    /// Stop accepting requests and join the worker. The item being processed
    /// runs to completion; queued items are discarded.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        self.jobs.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("chunk worker panicked");
            }
        }
    }
}

impl Drop for ChunkStreamer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State owned by the worker thread. The cache is never touched elsewhere.
struct Worker {
    config: StreamerConfig,
    generator: WorldGenerator,
    erosion: Box<dyn ErosionAlgorithm>,
    cache: ChunkedHeightCache,
    /// Chunks this worker has published at least once.
    delivered: FxHashSet<ChunkCoord>,
    registry: Arc<Mutex<Registry>>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    results: Sender<ReadyChunk>,
    scratch: Vec<f32>,
}

impl Worker {
    fn run(mut self, jobs: Receiver<WorkItem>) {
        tracing::debug!("chunk worker running");
        while let Ok(item) = jobs.recv() {
            if !self.is_running() {
                let discarded = 1 + jobs.try_iter().count();
                self.counters
                    .in_flight
                    .fetch_sub(discarded, Ordering::Relaxed);
                tracing::debug!(discarded, "discarded queued chunks at shutdown");
                break;
            }
            self.process(item);
            self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        }
        tracing::info!(
            processed = self.counters.processed.load(Ordering::Relaxed),
            "chunk worker stopped"
        );
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn process(&mut self, item: WorkItem) {
        let start = Instant::now();
        let (ox, oy) = self.config.chunk_origin(item.coord);
        let n = self.config.chunk_size;

        let mut filled = self.ensure_padding(ox, oy);
        filled += self.fill(ox, oy, n, n);

        let erode_now = item.erode && !lock(&self.registry).eroded.contains(&item.coord);
        if erode_now {
            self.erode(item.coord, ox, oy);
        }
        let eroded = lock(&self.registry).eroded.contains(&item.coord);

        self.publish(item.coord, item.handle, eroded);
        if erode_now {
            self.refresh_neighbours(item.coord);
        }
        if let Some(radius) = self.config.retain_radius {
            self.evict(item.coord, radius);
        }

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        self.counters
            .cached_blocks
            .store(self.cache.block_count(), Ordering::Relaxed);
        tracing::debug!(
            chunk = %item.coord,
            eroded,
            filled,
            elapsed_us = start.elapsed().as_micros() as u64,
            "chunk processed"
        );
    }

    /// Fill unwritten cells of a rectangle from the generator.
    fn fill(&mut self, x0: i64, y0: i64, width: usize, height: usize) -> usize {
        let generator = &self.generator;
        self.cache
            .fill_missing(x0, y0, width, height, |x, y| generator.height(x as f32, y as f32))
    }

    /// Make sure the ring of half-chunk padding around the chunk at
    /// `(ox, oy)` exists: four edge strips and four corners.
    fn ensure_padding(&mut self, ox: i64, oy: i64) -> usize {
        let n = self.config.chunk_size;
        let p = self.config.padding();
        let (ni, pi) = (n as i64, p as i64);
        let regions = [
            (ox - pi, oy, p, n),
            (ox + ni, oy, p, n),
            (ox, oy - pi, n, p),
            (ox, oy + ni, n, p),
            (ox - pi, oy - pi, p, p),
            (ox + ni, oy - pi, p, p),
            (ox - pi, oy + ni, p, p),
            (ox + ni, oy + ni, p, p),
        ];
        regions
            .into_iter()
            .map(|(x0, y0, w, h)| self.fill(x0, y0, w, h))
            .sum()
    }

    /// Erode the chunk together with its padding and write the result back.
    fn erode(&mut self, coord: ChunkCoord, ox: i64, oy: i64) {
        let p = self.config.padding() as i64;
        let side = self.config.chunk_size + 2 * self.config.padding();
        let (x0, y0) = (ox - p, oy - p);

        self.cache.read_square(x0, y0, side, &mut self.scratch);
        self.erosion
            .set_chunk(ChunkPlacement::new(coord.x, coord.y, x0, y0));
        self.erosion.erode(&mut self.scratch);
        self.cache.write_square(x0, y0, side, &self.scratch);

        lock(&self.registry).eroded.insert(coord);
        self.counters.eroded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(chunk = %coord, side, algorithm = self.erosion.name(), "chunk eroded");
    }

    fn publish(&mut self, coord: ChunkCoord, handle: ConsumerHandle, eroded: bool) {
        if !self.is_running() {
            return;
        }
        let (ox, oy) = self.config.chunk_origin(coord);
        let mut heights = Vec::new();
        self.cache
            .read_square(ox, oy, self.config.chunk_size, &mut heights);
        self.delivered.insert(coord);
        let chunk = ReadyChunk {
            coord,
            handle,
            heights,
            eroded,
        };
        if self.results.send(chunk).is_err() {
            tracing::warn!(chunk = %coord, "result channel closed, chunk not delivered");
        }
    }

    /// Erosion spills into the padding, which overlaps the neighbouring
    /// chunks. Re-send every delivered, still-active neighbour.
    fn refresh_neighbours(&mut self, coord: ChunkCoord) {
        let stale: Vec<(ChunkCoord, ConsumerHandle, bool)> = {
            let registry = lock(&self.registry);
            coord
                .neighbours()
                .filter(|nb| self.delivered.contains(nb))
                .filter_map(|nb| {
                    registry
                        .active
                        .get(&nb)
                        .map(|active| (nb, active.handle, registry.eroded.contains(&nb)))
                })
                .collect()
        };
        for (nb, handle, eroded) in stale {
            tracing::trace!(chunk = %nb, "refreshing neighbour after erosion");
            self.publish(nb, handle, eroded);
        }
    }

    fn evict(&mut self, center: ChunkCoord, radius: u32) {
        let (ox, oy) = self.config.chunk_origin(center);
        let half = (self.config.chunk_size / 2) as i64;
        // Two extra blocks keep the padding of chunks on the edge of the radius.
        let dropped = self.cache.evict_beyond(ox + half, oy + half, radius + 2);
        if dropped == 0 {
            return;
        }
        self.delivered.retain(|c| c.ring_distance(center) <= radius);
        lock(&self.registry)
            .eroded
            .retain(|c| c.ring_distance(center) <= radius);
        tracing::debug!(chunk = %center, dropped, "evicted distant cache blocks");
    }
}
