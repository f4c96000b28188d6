//! Config file locations and loading

use super::{ConfigFile, LandConfig};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name for jj-land files within `.jj/repo/` and the user config dir
const LAND_DIR: &str = "land";

/// Directory name under the user config dir
const USER_DIR: &str = "jj-land";

/// Filename for configuration
const CONFIG_FILE: &str = "config.toml";

/// Resolve the `.jj/repo` path, handling jj workspace indirection.
///
/// In secondary jj workspaces `.jj/repo` is a plain file holding the path
/// of the main workspace's `.jj/repo` directory.
///
/// Falls back to the original path if resolution fails.
pub(super) fn resolve_repo_path(workspace_root: &Path) -> PathBuf {
    let repo_path = workspace_root.join(".jj").join("repo");

    if repo_path.is_file() {
        if let Ok(contents) = fs::read_to_string(&repo_path) {
            let target = PathBuf::from(contents.trim());
            if target.is_dir() {
                return fs::canonicalize(&target).unwrap_or(target);
            }
        }
        // Pointer file exists but is invalid/unreadable - return as-is to surface error
        return repo_path;
    }

    repo_path
}

/// Path of the repository config file
pub fn repo_config_path(workspace_root: &Path) -> PathBuf {
    resolve_repo_path(workspace_root)
        .join(LAND_DIR)
        .join(CONFIG_FILE)
}

/// Path of the user config file, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(USER_DIR).join(CONFIG_FILE))
}

/// Read one config file. A missing file is not an error.
fn load_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let file: ConfigFile = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    debug!(path = %path.display(), "loaded config file");
    Ok(Some(file))
}

/// Load the layered configuration for a workspace
///
/// `user_path` is normally [`user_config_path()`].
pub fn load_config(workspace_root: &Path, user_path: Option<&Path>) -> Result<LandConfig> {
    let mut config = LandConfig::default();

    if let Some(file) = user_path.map(load_config_file).transpose()?.flatten() {
        config.apply(file);
    }
    if let Some(file) = load_config_file(&repo_config_path(workspace_root))? {
        config.apply(file);
    }

    Ok(config)
}
