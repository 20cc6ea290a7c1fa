//! Configuration file loading.
//!
//! This module loads engine configuration from TOML files at XDG-compliant
//! locations.

use crate::config::types::EngineConfig;
use crate::error::EngineError;
use std::path::{Path, PathBuf};

/// Default configuration file name for project-local config.
const LOCAL_CONFIG_NAME: &str = "acton-engine.toml";

/// Default configuration file name within XDG config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

/// Application name for XDG directory lookup.
const APP_NAME: &str = "acton-engine";

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./acton-engine.toml` (project-local)
/// 2. `~/.config/acton-engine/config.toml` (XDG config)
///
/// Returns the default configuration if no config file is found. The loaded
/// configuration is validated.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be parsed, or if it
/// sets a bound below 1.
///
/// # Example
///
/// ```rust,no_run
/// use acton_engine::config;
///
/// let config = config::load()?;
/// println!("max turns: {}", config.max_turns);
/// # Ok::<(), acton_engine::error::EngineError>(())
/// ```
pub fn load() -> Result<EngineConfig, EngineError> {
    match search_paths().into_iter().find(|path| path.exists()) {
        Some(path) => from_path(&path),
        None => Ok(EngineConfig::default()),
    }
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The file contains invalid TOML
/// - The TOML doesn't match the expected schema
/// - A bound is below 1
pub fn from_path(path: &Path) -> Result<EngineConfig, EngineError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        EngineError::configuration(
            "config_file",
            format!("failed to read '{}': {}", path.display(), e),
        )
    })?;

    let config = from_str(&contents).map_err(|e| {
        EngineError::configuration(
            "config_file",
            format!("failed to load '{}': {}", path.display(), e),
        )
    })?;

    tracing::debug!(path = %path.display(), "Loaded configuration file");
    Ok(config)
}

/// Parses and validates configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid, doesn't match the schema, or
/// sets a bound below 1.
///
/// # Example
///
/// ```rust
/// use acton_engine::config;
///
/// let config = config::from_str(r#"
/// max_turns = 5
/// protocol = "structured-call"
///
/// [workspace]
/// allowed_commands = ["cargo"]
/// "#)?;
/// assert_eq!(config.max_turns, 5);
/// # Ok::<(), acton_engine::error::EngineError>(())
/// ```
pub fn from_str(toml_str: &str) -> Result<EngineConfig, EngineError> {
    let config: EngineConfig = toml::from_str(toml_str)
        .map_err(|e| EngineError::configuration("config", format!("invalid TOML: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Returns the paths that would be searched for configuration files.
///
/// This is useful for diagnostics and user guidance.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];

    if let Some(dir) = xdg_config_dir() {
        paths.push(dir.join(XDG_CONFIG_NAME));
    }

    paths
}

/// Returns the path to the XDG config directory for the engine.
///
/// This is `~/.config/acton-engine` on most systems.
#[must_use]
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}
