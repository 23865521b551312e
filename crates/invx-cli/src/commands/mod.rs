pub mod config;
pub mod extract;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Context;
use invx_core::InvxConfig;

/// `<config_dir>/invx/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invx")
        .join("config.json")
}

/// The config file in use: the `--config` path or the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(default_config_path)
}

/// Load the configuration, falling back to defaults when no file exists
/// at the default location. An explicit path must exist.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<InvxConfig> {
    let path = config_path(explicit);
    if !path.exists() {
        if explicit.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(InvxConfig::default());
    }
    InvxConfig::from_file(&path).with_context(|| format!("Failed to read config {}", path.display()))
}
