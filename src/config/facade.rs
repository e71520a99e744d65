//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::MeshConfig;
use crate::error::DfsError;
use std::path::{Path, PathBuf};

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Per-user config file (e.g. `~/.config/meshfs/config.toml` on Linux).
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "meshfs", "meshfs")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the user config file, if any, and environment.
    pub fn load() -> Result<MeshConfig, DfsError> {
        Ok(MergeService::load(Self::user_config_path().as_deref())?)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<MeshConfig, DfsError> {
        Ok(MergeService::load_from_file(path)?)
    }

    /// Create default configuration.
    pub fn default() -> MeshConfig {
        MeshConfig::default()
    }
}
