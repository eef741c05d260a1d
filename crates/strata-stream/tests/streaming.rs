//! End-to-end tests of the streaming pipeline: request, fill, erode, deliver.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use strata_erosion::ErosionKind;
use strata_noise::presets::default_terrain;
use strata_stream::{
    ChunkCoord, ChunkStreamer, ChunkTracker, ConsumerHandle, GenerateOutcome, ReadyChunk,
    StreamerConfig, TrackerConfig,
};

const SIZE: usize = 33;

fn config(algorithm: ErosionKind) -> StreamerConfig {
    let mut config = StreamerConfig {
        chunk_size: SIZE,
        seed: 11,
        algorithm,
        ..Default::default()
    };
    config.erosion.droplet.cycles = 1_000;
    config.erosion.shallow_water.cycles = 10;
    config.erosion.river.blur_size = 3;
    config
}

fn streamer(algorithm: ErosionKind) -> ChunkStreamer {
    ChunkStreamer::new(config(algorithm), default_terrain(11, 0.15)).unwrap()
}

/// Wait for the worker to finish and return the newest buffer per chunk.
fn collect(streamer: &ChunkStreamer) -> HashMap<ChunkCoord, ReadyChunk> {
    let start = Instant::now();
    while !streamer.is_idle() {
        assert!(start.elapsed() < Duration::from_secs(30), "worker did not finish");
        std::thread::sleep(Duration::from_millis(2));
    }
    let mut latest = HashMap::new();
    for chunk in streamer.drain_ready() {
        latest.insert(chunk.coord, chunk);
    }
    latest
}

fn column(heights: &[f32], x: usize) -> Vec<f32> {
    (0..SIZE).map(|y| heights[x + y * SIZE]).collect()
}

fn row(heights: &[f32], y: usize) -> Vec<f32> {
    heights[y * SIZE..(y + 1) * SIZE].to_vec()
}

#[test]
fn test_chunk_matches_generator() {
    let streamer = streamer(ErosionKind::Droplet);
    let generator = default_terrain(11, 0.15);
    streamer.generate(ChunkCoord::new(2, 1), ConsumerHandle(0), false);
    let ready = collect(&streamer);
    let chunk = &ready[&ChunkCoord::new(2, 1)];

    assert_eq!(chunk.heights.len(), SIZE * SIZE);
    assert!(!chunk.eroded);
    let (ox, oy) = (2 * (SIZE - 1), (SIZE - 1));
    for &(x, y) in &[(0, 0), (5, 9), (SIZE - 1, SIZE - 1)] {
        let expected = generator.height((ox + x) as f32, (oy + y) as f32);
        assert_eq!(chunk.heights[x + y * SIZE], expected);
    }
}

#[test]
fn test_dedup_processes_one_item() {
    let streamer = streamer(ErosionKind::Droplet);
    let coord = ChunkCoord::new(0, 0);
    assert_eq!(streamer.generate(coord, ConsumerHandle(0), true), GenerateOutcome::Queued);
    assert_eq!(
        streamer.generate(coord, ConsumerHandle(0), true),
        GenerateOutcome::AlreadyActive
    );
    assert_eq!(
        streamer.generate(coord, ConsumerHandle(0), false),
        GenerateOutcome::AlreadyActive
    );
    collect(&streamer);
    assert_eq!(streamer.stats().processed, 1);
}

#[test]
fn test_unregister_then_generate_readmits() {
    let streamer = streamer(ErosionKind::Droplet);
    let coord = ChunkCoord::new(1, 0);
    streamer.generate(coord, ConsumerHandle(3), false);
    collect(&streamer);

    assert!(streamer.unregister(coord));
    assert_eq!(streamer.generate(coord, ConsumerHandle(3), false), GenerateOutcome::Queued);
    let ready = collect(&streamer);
    assert!(ready.contains_key(&coord));
    assert_eq!(streamer.stats().processed, 2);
}

#[test]
fn test_erosion_runs_once_per_chunk() {
    let streamer = streamer(ErosionKind::Droplet);
    let coord = ChunkCoord::new(0, 1);
    streamer.generate(coord, ConsumerHandle(0), true);
    collect(&streamer);
    streamer.unregister(coord);
    streamer.generate(coord, ConsumerHandle(0), true);
    let ready = collect(&streamer);

    assert!(ready[&coord].eroded);
    assert_eq!(streamer.stats().eroded, 1, "an eroded chunk must not be eroded again");
}

#[test]
fn test_neighbouring_chunks_share_borders() {
    let streamer = streamer(ErosionKind::Droplet);
    streamer.generate(ChunkCoord::new(0, 0), ConsumerHandle(0), false);
    streamer.generate(ChunkCoord::new(1, 0), ConsumerHandle(1), false);
    streamer.generate(ChunkCoord::new(0, 1), ConsumerHandle(2), false);
    let ready = collect(&streamer);

    let origin = &ready[&ChunkCoord::new(0, 0)].heights;
    let right = &ready[&ChunkCoord::new(1, 0)].heights;
    let above = &ready[&ChunkCoord::new(0, 1)].heights;
    assert_eq!(column(origin, SIZE - 1), column(right, 0));
    assert_eq!(row(origin, SIZE - 1), row(above, 0));
}

#[test]
fn test_eroded_neighbours_stay_seamless() {
    for algorithm in ErosionKind::ALL {
        let streamer = streamer(algorithm);
        streamer.generate(ChunkCoord::new(0, 0), ConsumerHandle(0), true);
        streamer.generate(ChunkCoord::new(1, 0), ConsumerHandle(1), true);
        let ready = collect(&streamer);

        let left = &ready[&ChunkCoord::new(0, 0)];
        let right = &ready[&ChunkCoord::new(1, 0)];
        assert!(left.eroded && right.eroded);
        assert_eq!(
            column(&left.heights, SIZE - 1),
            column(&right.heights, 0),
            "{algorithm} left a seam"
        );
        assert!(left.heights.iter().chain(&right.heights).all(|h| h.is_finite()));
    }
}

#[test]
fn test_update_publishes_to_surfaces() {
    let streamer = streamer(ErosionKind::River);
    let mut surfaces = vec![vec![0.0_f32; SIZE * SIZE]; 3];
    for (i, coord) in [(0, 0), (1, 0), (2, 0)].into_iter().enumerate() {
        streamer.generate(ChunkCoord::new(coord.0, coord.1), ConsumerHandle(i as u32), false);
    }
    let start = Instant::now();
    let mut applied = 0;
    while applied < 3 {
        applied += streamer.update(&mut surfaces);
        assert!(start.elapsed() < Duration::from_secs(30), "chunks never arrived");
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(surfaces.iter().all(|s| s.iter().any(|&h| h != 0.0)));
}

#[test]
fn test_reassigned_chunk_goes_to_new_handle() {
    let streamer = streamer(ErosionKind::Droplet);
    let coord = ChunkCoord::new(3, 3);
    streamer.generate(coord, ConsumerHandle(0), false);
    streamer.generate(coord, ConsumerHandle(1), false);
    let ready = collect(&streamer);
    assert_eq!(ready[&coord].handle, ConsumerHandle(1));
    assert!(streamer.stats().dropped_stale >= 1);
}

#[test]
fn test_eviction_bounds_cache() {
    let mut config = config(ErosionKind::Droplet);
    config.retain_radius = Some(1);
    let streamer = ChunkStreamer::new(config, default_terrain(11, 0.15)).unwrap();
    for x in 0..12 {
        streamer.generate(ChunkCoord::new(x, 0), ConsumerHandle(0), false);
        collect(&streamer);
    }
    // Blocks within three blocks of the last chunk, in a band three blocks tall.
    assert!(
        streamer.stats().cached_blocks <= 7 * 7,
        "cache kept {} blocks",
        streamer.stats().cached_blocks
    );
}

#[test]
fn test_tracker_drives_streamer() {
    let streamer = streamer(ErosionKind::Droplet);
    let mut tracker = ChunkTracker::new(
        TrackerConfig {
            load_radius: 1,
            unload_radius: 2,
            loads_per_tick: 2,
        },
        (SIZE - 1) as f64,
    );

    for _ in 0..4 {
        let tick = tracker.tick(40.0, 40.0);
        for coord in tick.load {
            assert_eq!(
                streamer.generate(coord, ConsumerHandle(0), false),
                GenerateOutcome::Queued
            );
        }
        for coord in tick.unload {
            streamer.unregister(coord);
        }
    }
    collect(&streamer);
    assert_eq!(streamer.active_count(), tracker.loaded_count());
    assert_eq!(tracker.loaded_count(), 5);
}
