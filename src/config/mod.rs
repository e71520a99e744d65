//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `MESHFS_*` environment variables (`__` separates nested keys,
//! e.g. `MESHFS_STORAGE__ROOT=/srv/data`).

pub mod facade;
pub mod merge;
pub mod sources;

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use crate::rmi::RemoteAddress;
use crate::types::{REGISTRATION_PORT, SERVICE_PORT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the naming server listens, and how others reach it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Interface the naming server binds to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Hostname storage servers and clients use to reach the naming server
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_service_port")]
    pub service_port: u16,

    #[serde(default = "default_registration_port")]
    pub registration_port: u16,
}

impl NamingConfig {
    pub fn service_address(&self) -> RemoteAddress {
        RemoteAddress::new(self.host.clone(), self.service_port)
    }

    pub fn registration_address(&self) -> RemoteAddress {
        RemoteAddress::new(self.host.clone(), self.registration_port)
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            host: default_host(),
            service_port: default_service_port(),
            registration_port: default_registration_port(),
        }
    }
}

/// A storage server's local root and ports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local directory holding the served files
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Hostname advertised in this server's stubs
    #[serde(default = "default_host")]
    pub hostname: String,

    /// Port of the client `Storage` interface; 0 lets the system choose
    #[serde(default)]
    pub client_port: u16,

    /// Port of the naming server's `Command` interface; 0 lets the system choose
    #[serde(default)]
    pub command_port: u16,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            hostname: default_host(),
            client_port: 0,
            command_port: 0,
        }
    }
}

pub(crate) fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub(crate) fn default_service_port() -> u16 {
    SERVICE_PORT
}

pub(crate) fn default_registration_port() -> u16 {
    REGISTRATION_PORT
}

pub(crate) fn default_storage_root() -> PathBuf {
    PathBuf::from("meshfs-data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MeshConfig::default();
        assert_eq!(config.naming.bind_host, "0.0.0.0");
        assert_eq!(config.naming.service_port, SERVICE_PORT);
        assert_eq!(config.naming.registration_port, REGISTRATION_PORT);
        assert_eq!(config.storage.client_port, 0);
        assert_eq!(config.storage.hostname, "127.0.0.1");
        assert_eq!(
            config.naming.registration_address(),
            RemoteAddress::new("127.0.0.1", REGISTRATION_PORT)
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: MeshConfig =
            serde_json::from_str(r#"{"storage": {"root": "/srv/data", "client_port": 7000}}"#)
                .unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/srv/data"));
        assert_eq!(config.storage.client_port, 7000);
        assert_eq!(config.storage.command_port, 0);
        assert_eq!(config.naming.service_port, SERVICE_PORT);
    }
}
