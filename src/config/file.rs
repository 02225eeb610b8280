//! Configuration file loading and discovery.

use super::defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAMES};
use super::types::ScanConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Configuration File Discovery
// ============================================================================

/// Discover a config file by searching standard locations.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. Current directory
/// 3. User config directory (`~/.config/sbom-binscan/`)
/// 4. Home directory
#[must_use]
pub fn discover_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "Config file does not exist, searching defaults");
    }

    if let Some(path) = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_in_dir(&cwd))
    {
        return Some(path);
    }

    if let Some(path) = dirs::config_dir().and_then(|dir| find_config_in_dir(&dir.join(CONFIG_DIR_NAME))) {
        return Some(path);
    }

    dirs::home_dir().and_then(|home| find_config_in_dir(&home))
}

/// Find a config file in a specific directory.
fn find_config_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

// ============================================================================
// Configuration File Loading
// ============================================================================

/// Error type for config file operations.
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
}

/// Load a `ScanConfig` from a YAML file.
pub fn load_config_file(path: &Path) -> Result<ScanConfig, ConfigFileError> {
    if !path.exists() {
        return Err(ConfigFileError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: ScanConfig = serde_yaml_ng::from_str(&content)?;
    Ok(config)
}

/// Load config from the discovered file, or return defaults.
///
/// An unreadable or invalid file is logged and replaced by defaults.
#[must_use]
pub fn load_or_default(explicit_path: Option<&Path>) -> (ScanConfig, Option<PathBuf>) {
    discover_config_file(explicit_path).map_or_else(
        || (ScanConfig::default(), None),
        |path| match load_config_file(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config file");
                (config, Some(path))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                (ScanConfig::default(), None)
            }
        },
    )
}

/// Example config file content: the defaults, serialized.
#[must_use]
pub fn generate_example_config() -> String {
    format!(
        "# sbom-binscan configuration\n\
         # Place this file at .sbom-binscan.yaml in your project root or ~/.config/sbom-binscan/\n\n{}",
        serde_yaml_ng::to_string(&ScanConfig::default()).unwrap_or_default()
    )
}
