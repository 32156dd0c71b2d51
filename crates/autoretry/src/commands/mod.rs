//! CLI command implementations

pub mod config;
pub mod request;

use anyhow::{Context, Result};
use autoretry_core::types::RuntimeConfig;
use autoretry_core::HierarchicalConfigLoader;
use camino::Utf8Path;

/// Load the runtime config, layering `explicit` over the user config
pub fn load_runtime_config(explicit: Option<&Utf8Path>) -> Result<RuntimeConfig> {
    let mut loader = HierarchicalConfigLoader::new().context("Failed to locate config directory")?;
    if let Some(path) = explicit {
        loader = loader.with_file(path);
    }
    loader
        .load_runtime_config()
        .context("Failed to load runtime configuration")
}
