//! Naming server
//!
//! Owns the directory tree and exports it through two skeletons: `Service`
//! for clients and `Registration` for storage servers.

pub mod namespace;
pub mod tree;

pub use namespace::Namespace;
pub use tree::{DirectoryTree, Node, StorageBinding};

use crate::api::{Registration, Service};
use crate::config::NamingConfig;
use crate::error::DfsError;
use crate::path::Path;
use crate::rmi::{Skeleton, Stub};
use crate::types::{
    CommandStub, RegistrationStub, ServiceStub, StorageStub, REGISTRATION_PORT, SERVICE_PORT,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::info;

/// The naming server and its two skeletons
pub struct NamingServer {
    namespace: Arc<Namespace>,
    service: Skeleton<dyn Service>,
    registration: Skeleton<dyn Registration>,
}

impl NamingServer {
    /// Server on the well-known ports, all interfaces.
    pub fn new() -> Result<Self, DfsError> {
        let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        Self::with_addresses(
            SocketAddr::new(any, SERVICE_PORT),
            SocketAddr::new(any, REGISTRATION_PORT),
        )
    }

    /// Server on explicit addresses. Port 0 lets the system choose.
    pub fn with_addresses(service: SocketAddr, registration: SocketAddr) -> Result<Self, DfsError> {
        let namespace = Arc::new(Namespace::new());
        let service_server: Arc<dyn Service> = namespace.clone();
        let registration_server: Arc<dyn Registration> = namespace.clone();
        Ok(Self {
            service: Skeleton::with_address(service_server, service)?,
            registration: Skeleton::with_address(registration_server, registration)?,
            namespace,
        })
    }

    pub fn from_config(config: &NamingConfig) -> Result<Self, DfsError> {
        let host: IpAddr = config.bind_host.parse().map_err(|e| {
            DfsError::Config(format!("invalid naming bind host {}: {}", config.bind_host, e))
        })?;
        Self::with_addresses(
            SocketAddr::new(host, config.service_port),
            SocketAddr::new(host, config.registration_port),
        )
    }

    /// Start both skeletons. If either fails, both are stopped.
    pub fn start(&self) -> Result<(), DfsError> {
        let started = self
            .registration
            .start()
            .and_then(|_| self.service.start());
        if let Err(e) = started {
            self.stop();
            return Err(e);
        }
        info!(
            service = ?self.service.address(),
            registration = ?self.registration.address(),
            "Naming server started"
        );
        Ok(())
    }

    /// Stop both skeletons. Idempotent.
    pub fn stop(&self) {
        self.service.stop();
        self.registration.stop();
    }

    pub fn service_address(&self) -> Option<SocketAddr> {
        self.service.address()
    }

    pub fn registration_address(&self) -> Option<SocketAddr> {
        self.registration.address()
    }

    /// Client stub for the running service skeleton.
    ///
    /// Fails with `UnknownHost` when bound to a wildcard address; use
    /// [`NamingServer::service_stub_for_host`] then.
    pub fn service_stub(&self) -> Result<ServiceStub, DfsError> {
        Stub::for_skeleton(&self.service)
    }

    pub fn service_stub_for_host(&self, hostname: &str) -> Result<ServiceStub, DfsError> {
        Stub::for_skeleton_with_host(&self.service, hostname)
    }

    /// Storage-server-facing stub for the running registration skeleton.
    pub fn registration_stub(&self) -> Result<RegistrationStub, DfsError> {
        Stub::for_skeleton(&self.registration)
    }

    pub fn registration_stub_for_host(&self, hostname: &str) -> Result<RegistrationStub, DfsError> {
        Stub::for_skeleton_with_host(&self.registration, hostname)
    }

    /// Record an additional holder of `file`. See [`Namespace::add_replica`].
    pub fn add_replica(
        &self,
        file: &Path,
        storage: StorageStub,
        command: CommandStub,
    ) -> Result<bool, DfsError> {
        self.namespace.add_replica(file, storage, command)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}
