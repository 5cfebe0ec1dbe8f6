pub mod error;
pub mod settings;

pub use error::*;
pub use settings::*;

use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "STACKFLOW_CONFIG_PATH";
const CANDIDATES: [&str; 3] = ["stackflow.local.yaml", "stackflow.yaml", ".stackflow.yaml"];

/// Directory holding the user-wide stackflow config
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");
    Ok(config_dir)
}

/// Locate the resolver config file
///
/// Search order:
/// 1. `STACKFLOW_CONFIG_PATH` (direct path)
/// 2. current directory: stackflow.local.yaml, stackflow.yaml, .stackflow.yaml
/// 3. `./.stackflow/` with the same names
/// 4. `~/.config/stackflow/stackflow.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at missing file {}", CONFIG_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = first_existing(&current_dir) {
        return Ok(path);
    }

    let local_dir = current_dir.join(".stackflow");
    if local_dir.is_dir() {
        if let Some(path) = first_existing(&local_dir) {
            return Ok(path);
        }
    }

    if let Ok(global_dir) = get_config_dir() {
        let global_config = global_dir.join("stackflow.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Find and load the resolver config; defaults apply when no file exists
pub fn load_config() -> Result<ResolverConfig> {
    match find_config_file() {
        Ok(path) => ResolverConfig::load(path),
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No config file found, using defaults");
            Ok(ResolverConfig::default())
        }
        Err(e) => Err(e),
    }
}
