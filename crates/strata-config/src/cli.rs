//! Command-line argument parsing for the strata demo.

use std::path::PathBuf;

use clap::Parser;
use strata_erosion::ErosionKind;

use crate::Config;

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "strata", about = "Streamed, eroded procedural terrain")]
pub struct CliArgs {
    /// World seed (0 picks one from the clock).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Cells per chunk side.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Erosion algorithm (droplet, shallow-water, river).
    #[arg(long)]
    pub algorithm: Option<ErosionKind>,

    /// Erode chunks as they stream in.
    #[arg(long)]
    pub erode: Option<bool>,

    /// Number of observer frames to simulate.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write PNG previews of delivered chunks.
    #[arg(long)]
    pub export: Option<bool>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(size) = args.chunk_size {
            self.stream.chunk_size = size;
        }
        if let Some(kind) = args.algorithm {
            self.stream.algorithm = kind;
        }
        if let Some(erode) = args.erode {
            self.stream.erode = erode;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(export) = args.export {
            self.debug.export_previews = export;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            seed: None,
            chunk_size: None,
            algorithm: None,
            erode: None,
            frames: None,
            log_level: None,
            config: None,
            export: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            seed: Some(77),
            algorithm: Some(ErosionKind::ShallowWater),
            erode: Some(false),
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.world.seed, 77);
        assert_eq!(config.stream.algorithm, ErosionKind::ShallowWater);
        assert!(!config.stream.erode);
        // Non-overridden fields retain defaults
        assert_eq!(config.stream.chunk_size, 257);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "strata",
            "--algorithm",
            "river",
            "--chunk-size",
            "129",
            "--export",
            "true",
            "--frames",
            "12",
        ])
        .unwrap();
        assert_eq!(args.algorithm, Some(ErosionKind::River));
        assert_eq!(args.chunk_size, Some(129));
        assert_eq!(args.export, Some(true));
        assert_eq!(args.frames, Some(12));
        assert!(args.seed.is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_algorithm() {
        assert!(CliArgs::try_parse_from(["strata", "--algorithm", "glacier"]).is_err());
    }
}
