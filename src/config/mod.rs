//! Configuration management for HugeWood.
//!
//! Parameters are gathered into a [`ForestConfig`], either directly, through
//! the fluent [`ConfigBuilder`], from a `.json`/`.toml` file, or from
//! `HUGEWOOD_*` environment variables.

pub mod core;

pub use self::core::{ConfigBuilder, ForestConfig, MaxFeatures, ENV_PREFIX};

use crate::core::error::Result;
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "hugewood.toml";

/// Load a configuration file and apply environment overrides on top of it.
pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<ForestConfig> {
    let mut config = ForestConfig::load_from_file(path)?;
    config.apply_environment_overrides()?;
    Ok(config)
}
