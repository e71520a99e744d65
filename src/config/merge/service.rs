//! MergeService: orchestrates sources and deserializes to MeshConfig.

use super::builder_with_defaults;
use crate::config::sources::{environment, file};
use crate::config::MeshConfig;
use config::ConfigError;
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> user file if present -> environment (highest).
    pub fn load(user_file: Option<&Path>) -> Result<MeshConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = match user_file {
            Some(path) => file::add_to_builder(builder, path, false)?,
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load config from a specific file with environment overlay. The file
    /// must exist.
    pub fn load_from_file(path: &Path) -> Result<MeshConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = file::add_to_builder(builder, path, true)?;
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }
}
