//! Headless streaming demo.
//!
//! Moves an observer diagonally across the world, streams the chunks around
//! it through a background worker, and optionally writes a PNG preview of
//! every chunk as it arrives.
//!
//! Run with `cargo run -p strata-demo -- --frames 300 --algorithm river --export true`.

mod preview;
mod surfaces;

use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};

use clap::Parser;
use strata_config::{CliArgs, Config, default_config_dir};
use strata_noise::WorldGenerator;
use strata_stream::{
    ChunkStreamer, ChunkTracker, GenerateOutcome, StreamerConfig, TerrainSurface, TrackerConfig,
};
use tracing::{info, warn};

use crate::surfaces::{ChunkSurface, SurfaceSlots};

const DEFAULT_FRAMES: u32 = 240;
const FRAME_TIME: Duration = Duration::from_millis(16);
/// Observer speed in chunks per frame.
const OBSERVER_SPEED: f64 = 0.02;
/// Extra seeds tried when a clock-derived seed fails the acceptance tests.
const SEED_ATTEMPTS: u64 = 16;
const PREDICATE_STEP: usize = 4;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);
    config.validate()?;

    let log_dir = config_dir.join("logs");
    if let Err(err) = strata_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config))
    {
        eprintln!("Logging unavailable: {err}");
    }

    let (seed, generator) = pick_world(&config);
    info!(seed, algorithm = %config.stream.algorithm, erode = config.stream.erode, "world ready");

    let streamer = ChunkStreamer::new(
        StreamerConfig {
            chunk_size: config.stream.chunk_size,
            seed,
            algorithm: config.stream.algorithm,
            erosion: config.erosion.clone(),
            retain_radius: config.stream.retain_radius,
        },
        generator,
    )?;
    let chunk_size = streamer.config().chunk_size;
    let chunk_world_size = streamer.config().stride() as f64;

    let mut tracker = ChunkTracker::new(
        TrackerConfig {
            load_radius: config.stream.load_radius,
            unload_radius: config.stream.unload_radius,
            loads_per_tick: config.stream.loads_per_tick,
        },
        chunk_world_size,
    );
    let mut surfaces = SurfaceSlots::default();

    let preview_dir = config
        .debug
        .export_previews
        .then(|| config.debug.preview_dir.clone());
    if let Some(dir) = &preview_dir {
        std::fs::create_dir_all(dir)?;
        info!(dir = %dir.display(), "exporting chunk previews");
    }

    let frames = args.frames.unwrap_or(DEFAULT_FRAMES);
    let start = Instant::now();
    let (mut x, mut y) = (0.5 * chunk_world_size, 0.5 * chunk_world_size);

    for frame in 0..frames {
        let tick = tracker.tick(x, y);
        for coord in tick.unload {
            streamer.unregister(coord);
            surfaces.release(coord);
        }
        for coord in tick.load {
            let handle = surfaces.allocate(coord, chunk_size);
            if streamer.generate(coord, handle, config.stream.erode) == GenerateOutcome::Rejected {
                warn!(chunk = %coord, "chunk request rejected");
                surfaces.release(coord);
                tracker.forget(coord);
            }
        }

        let updated = streamer.update(&mut surfaces);
        if updated > 0 {
            tracing::debug!(frame, updated, loaded = surfaces.len(), "surfaces updated");
        }
        export_dirty(&mut surfaces, preview_dir.as_deref(), config.world.sea_level);

        x += OBSERVER_SPEED * chunk_world_size;
        y += OBSERVER_SPEED * chunk_world_size;
        std::thread::sleep(FRAME_TIME);
    }

    let drain_start = Instant::now();
    while !streamer.is_idle() && drain_start.elapsed() < DRAIN_TIMEOUT {
        streamer.update(&mut surfaces);
        export_dirty(&mut surfaces, preview_dir.as_deref(), config.world.sea_level);
        std::thread::sleep(FRAME_TIME);
    }
    streamer.update(&mut surfaces);
    export_dirty(&mut surfaces, preview_dir.as_deref(), config.world.sea_level);

    let stats = streamer.stats();
    info!(
        frames,
        elapsed_ms = start.elapsed().as_millis() as u64,
        processed = stats.processed,
        eroded = stats.eroded,
        delivered = stats.delivered,
        dropped_stale = stats.dropped_stale,
        cached_blocks = stats.cached_blocks,
        loaded = surfaces.len(),
        "demo finished"
    );
    Ok(())
}

/// Build the configured world. A clock-derived seed is advanced until the
/// world passes its acceptance tests; an explicit seed is always kept.
fn pick_world(config: &Config) -> (u64, WorldGenerator) {
    let explicit = config.world.seed != 0;
    let first = config.world.resolved_seed();
    let attempts = if explicit { 1 } else { SEED_ATTEMPTS };

    let mut last = None;
    for seed in first..first.saturating_add(attempts) {
        let generator = config.world.build_generator(seed);
        if generator.try_predicates(PREDICATE_STEP) {
            return (seed, generator);
        }
        tracing::debug!(seed, "world rejected by acceptance tests");
        last = Some((seed, generator));
    }

    warn!("world failed its acceptance tests, continuing anyway");
    last.unwrap_or_else(|| (first, config.world.build_generator(first)))
}

fn export_dirty(surfaces: &mut SurfaceSlots, dir: Option<&Path>, sea_level: f32) {
    let dirty = surfaces.take_dirty();
    let Some(dir) = dir else {
        return;
    };
    for surface in dirty {
        export_preview(surface, dir, sea_level);
    }
}

fn export_preview(surface: &ChunkSurface, dir: &Path, sea_level: f32) {
    let side = (surface.heights().len() as f64).sqrt() as usize;
    let image = preview::render_heights(surface.heights(), side, sea_level);
    let path = dir.join(format!("chunk_{}_{}.png", surface.coord.x, surface.coord.y));
    match image.write_png(&path) {
        Ok(()) => tracing::debug!(path = %path.display(), updates = surface.updates(), "preview written"),
        Err(err) => warn!(path = %path.display(), %err, "preview export failed"),
    }
}
