//! Chunked terrain streaming.
//!
//! [`ChunkStreamer`] turns "chunk needed at (x, y)" requests into finished
//! height buffers. A single background worker owns a [`ChunkedHeightCache`],
//! fills it from a [`WorldGenerator`](strata_noise::WorldGenerator) with a
//! half-chunk of padding around each requested chunk, optionally erodes the
//! padded region, and hands the chunk back. The owning thread collects results
//! once per frame with [`ChunkStreamer::update`] and applies them to its
//! [`TerrainSurface`]s.

mod cache;
mod coord;
mod error;
mod streamer;
mod surface;
mod tracker;

pub use cache::ChunkedHeightCache;
pub use coord::{ChunkCoord, ConsumerHandle};
pub use error::StreamError;
pub use streamer::{ChunkStreamer, GenerateOutcome, ReadyChunk, StreamStats, StreamerConfig};
pub use surface::{SurfaceTable, TerrainSurface, generate_surface};
pub use tracker::{ChunkTracker, TrackerConfig, TrackerTick};
