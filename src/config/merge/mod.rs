//! Source composition and defaults.

pub mod service;

use crate::config::{
    default_bind_host, default_host, default_registration_port, default_service_port,
    default_storage_root,
};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with every scalar default, lowest precedence.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("naming.bind_host", default_bind_host())?
        .set_default("naming.host", default_host())?
        .set_default("naming.service_port", default_service_port() as i64)?
        .set_default("naming.registration_port", default_registration_port() as i64)?
        .set_default(
            "storage.root",
            default_storage_root().to_string_lossy().into_owned(),
        )?
        .set_default("storage.hostname", default_host())?
        .set_default("storage.client_port", 0i64)?
        .set_default("storage.command_port", 0i64)
}
