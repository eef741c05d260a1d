//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use strata_erosion::{ErosionKind, ErosionSettings};
use strata_noise::presets::{default_terrain, standard_predicates};
use strata_noise::{BlendMode, ShapeMask, WorldGenerator};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Height generation settings.
    pub world: WorldConfig,
    /// Chunk streaming settings.
    pub stream: StreamConfig,
    /// Tunables for every erosion algorithm.
    pub erosion: ErosionSettings,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed. `0` picks one from the clock at startup.
    pub seed: u64,
    /// Stretches every noise period; larger values give broader features.
    pub zoom: f32,
    /// World size used by the shape mask. `None` uses the preset's size.
    pub size: Option<f32>,
    /// Continent silhouette.
    pub shape: Option<ShapeMask>,
    /// Heights above this threshold are lifted into steeper peaks.
    pub peak_lift: Option<f32>,
    /// How the preset's layers are combined.
    pub blend: BlendMode,
    /// Sea level used by the coastline acceptance test.
    pub sea_level: f32,
    /// Minimum step used by the steep-slope acceptance test.
    pub min_slope: f32,
}

/// Chunk streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Cells per chunk side.
    pub chunk_size: usize,
    /// Erode chunks as they are generated.
    pub erode: bool,
    /// Erosion algorithm used when `erode` is set.
    pub algorithm: ErosionKind,
    /// Chunks within this radius of the observer are requested.
    pub load_radius: u32,
    /// Chunks beyond this radius are released.
    pub unload_radius: u32,
    /// Maximum chunk requests per frame.
    pub loads_per_tick: u32,
    /// Keep cached cells only this many chunks around the latest chunk.
    pub retain_radius: Option<u32>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a PNG preview for every delivered chunk.
    pub export_previews: bool,
    /// Directory previews are written to, relative to the working directory.
    pub preview_dir: PathBuf,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            zoom: 1.0,
            size: None,
            shape: None,
            peak_lift: None,
            blend: BlendMode::Multiply,
            sea_level: 0.3,
            min_slope: 0.02,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 257,
            erode: true,
            algorithm: ErosionKind::Droplet,
            load_radius: 3,
            unload_radius: 5,
            loads_per_tick: 2,
            retain_radius: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            export_previews: false,
            preview_dir: PathBuf::from("previews"),
        }
    }
}

impl WorldConfig {
    /// The configured seed, or one derived from the current time if unset.
    pub fn resolved_seed(&self) -> u64 {
        if self.seed != 0 {
            return self.seed;
        }
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1)
            .max(1)
    }

    /// Build the world generator described by these settings.
    pub fn build_generator(&self, seed: u64) -> WorldGenerator {
        let mut generator = default_terrain(seed as u32, self.zoom);
        generator.height_field_mut().set_blend_mode(self.blend);
        if let Some(size) = self.size {
            generator.set_size(size);
        }
        generator.set_shape(self.shape);
        generator.set_peak_lift(self.peak_lift);
        for predicate in standard_predicates(self.sea_level, self.min_slope) {
            generator.add_predicate(predicate);
        }
        generator
    }
}

/// Platform config directory for strata (e.g. `~/.config/strata`).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strata")
}

// --- Validation ---

impl Config {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.chunk_size < 2 {
            return Err(ConfigError::Invalid {
                field: "stream.chunk_size",
                reason: format!("must be at least 2, got {}", self.stream.chunk_size),
            });
        }
        if self.stream.unload_radius < self.stream.load_radius {
            return Err(ConfigError::Invalid {
                field: "stream.unload_radius",
                reason: format!(
                    "must not be smaller than load_radius ({} < {})",
                    self.stream.unload_radius, self.stream.load_radius
                ),
            });
        }
        if !(self.world.zoom > 0.0) {
            return Err(ConfigError::Invalid {
                field: "world.zoom",
                reason: format!("must be positive, got {}", self.world.zoom),
            });
        }
        if let Some(ShapeMask::SquarePeak { angularity, .. }) = self.world.shape {
            if angularity <= 0.0 || angularity % 2.0 != 0.0 {
                return Err(ConfigError::Invalid {
                    field: "world.shape",
                    reason: format!("angularity must be a positive even number, got {angularity}"),
                });
            }
        }
        let radii = [
            ("erosion.droplet.erosion_radius", self.erosion.droplet.erosion_radius),
            (
                "erosion.shallow_water.erosion_radius",
                self.erosion.shallow_water.erosion_radius,
            ),
        ];
        for (field, radius) in radii {
            if radius == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    fn read(config_path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(config_path).map_err(|source| ConfigError::ReadError {
                path: config_path.to_path_buf(),
                source,
            })?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::WriteError {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::WriteError {
            path: config_path.clone(),
            source,
        })?;
        log::debug!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
