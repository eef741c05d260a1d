//! Observer-driven chunk discovery with load/unload hysteresis.
//!
//! Decides which chunks to request from a [`ChunkStreamer`](crate::ChunkStreamer)
//! as an observer moves: nearby chunks are loaded nearest-first under a
//! per-tick budget, and chunks that drift beyond a wider unload radius are
//! released. The gap between the two radii keeps chunks on the boundary from
//! flickering in and out.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashSet;

use crate::coord::ChunkCoord;

/// Radii (in chunks) and budget for a [`ChunkTracker`].
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Chunks within this radius of the observer are loaded.
    pub load_radius: u32,
    /// Loaded chunks beyond this radius are unloaded. Must be at least
    /// `load_radius`.
    pub unload_radius: u32,
    /// Maximum number of chunks handed out for loading per tick.
    pub loads_per_tick: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            load_radius: 3,
            unload_radius: 5,
            loads_per_tick: 2,
        }
    }
}

/// Outcome of one [`ChunkTracker::tick`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TrackerTick {
    /// Chunks to request, nearest first.
    pub load: Vec<ChunkCoord>,
    /// Chunks to release.
    pub unload: Vec<ChunkCoord>,
}

/// Tracks which chunks around an observer should be resident.
///
/// Only chunks with non-negative coordinates are considered, matching the
/// chunks the streamer accepts.
#[derive(Debug)]
pub struct ChunkTracker {
    config: TrackerConfig,
    chunk_world_size: f64,
    loaded: FxHashSet<ChunkCoord>,
}

impl ChunkTracker {
    /// `chunk_world_size` is the world-space width of one chunk.
    ///
    /// # Panics
    ///
    /// Panics if `unload_radius < load_radius` or `chunk_world_size` is not
    /// positive.
    pub fn new(config: TrackerConfig, chunk_world_size: f64) -> Self {
        assert!(
            config.unload_radius >= config.load_radius,
            "unload radius must not be smaller than load radius"
        );
        assert!(chunk_world_size > 0.0, "chunk world size must be positive");
        Self {
            config,
            chunk_world_size,
            loaded: FxHashSet::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The chunk containing a world-space position.
    pub fn chunk_at(&self, x: f64, y: f64) -> ChunkCoord {
        ChunkCoord::new(
            (x / self.chunk_world_size).floor() as i32,
            (y / self.chunk_world_size).floor() as i32,
        )
    }

    /// Chunks handed out for loading and not yet unloaded.
    pub fn loaded(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.loaded.iter().copied()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Forget a chunk, e.g. when its request was rejected, so a later tick
    /// offers it again.
    pub fn forget(&mut self, coord: ChunkCoord) -> bool {
        self.loaded.remove(&coord)
    }

    /// Advance one tick with the observer at world position `(x, y)`.
    pub fn tick(&mut self, x: f64, y: f64) -> TrackerTick {
        let center = self.chunk_at(x, y);
        let mut result = TrackerTick::default();

        let unload_sq = (self.config.unload_radius as u64).pow(2);
        result.unload = self
            .loaded
            .iter()
            .copied()
            .filter(|c| c.distance_sq(center) > unload_sq)
            .collect();
        result.unload.sort_unstable();
        for coord in &result.unload {
            self.loaded.remove(coord);
        }

        let radius = self.config.load_radius as i32;
        let load_sq = (self.config.load_radius as u64).pow(2);
        let mut queue = BinaryHeap::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let coord = ChunkCoord::new(center.x + dx, center.y + dy);
                if coord.x < 0 || coord.y < 0 || self.loaded.contains(&coord) {
                    continue;
                }
                let dist_sq = coord.distance_sq(center);
                if dist_sq <= load_sq {
                    queue.push(Reverse((dist_sq, coord)));
                }
            }
        }

        while result.load.len() < self.config.loads_per_tick as usize {
            let Some(Reverse((_, coord))) = queue.pop() else {
                break;
            };
            self.loaded.insert(coord);
            result.load.push(coord);
        }

        if !result.load.is_empty() || !result.unload.is_empty() {
            tracing::trace!(
                chunk = %center,
                load = result.load.len(),
                unload = result.unload.len(),
                "tracker tick"
            );
        }
        result
    }
}
