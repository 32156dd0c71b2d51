//! Config command

use anyhow::{Context, Result};
use autoretry_core::HierarchicalConfigLoader;
use camino::Utf8Path;

use crate::cli::ConfigCommands;

pub fn run(cmd: ConfigCommands, explicit: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(explicit),
        ConfigCommands::Path => path(),
    }
}

fn show(explicit: Option<&Utf8Path>) -> Result<()> {
    let config = super::load_runtime_config(explicit)?;
    let yaml = serde_yaml_ng::to_string(&config).context("Failed to render configuration")?;
    print!("{}", yaml);
    Ok(())
}

fn path() -> Result<()> {
    let loader = HierarchicalConfigLoader::new().context("Failed to locate config directory")?;
    println!("{}", loader.config_dir().join("runtime.yaml"));
    Ok(())
}
