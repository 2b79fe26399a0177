//! Parsing and validation of `membist.toml` configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`MembistConfig`], then resolves it into the engine geometry, the
//! simulated memory device, the pattern, and the run plan.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve, ResolvedSetup, RunPlan};
pub use types::*;
