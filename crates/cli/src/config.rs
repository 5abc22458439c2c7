//! Loading a start configuration from disk (`fsw --config`)

use anyhow::{Context, Result};
use std::path::Path;
use watcher::WatchConfig;

/// Load a config file; `.toml` files are parsed as TOML, anything else as JSON
///
/// Keys are the same camelCase names the `start` command uses.
pub fn load(path: &Path) -> Result<WatchConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: WatchConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
    };

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}
