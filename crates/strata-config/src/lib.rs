//! Configuration for strata tools.
//!
//! Settings persist to disk as a RON file and can be overridden from the
//! command line. Every section uses `#[serde(default)]`, so older files with
//! missing sections or fields still load, and unknown fields are ignored.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, StreamConfig, WorldConfig, default_config_dir};
pub use error::ConfigError;
