//! Storage server
//!
//! Exports a [`LocalStore`] through two skeletons: `Storage` for clients and
//! `Command` for the naming server. On start the server registers every local
//! file with the naming server and deletes the ones it reports as duplicates.

pub mod local;

pub use local::LocalStore;

use crate::api::{Command, Registration, Storage};
use crate::config::StorageConfig;
use crate::error::DfsError;
use crate::path::enumerate_local_files;
use crate::rmi::{Skeleton, Stub};
use crate::types::{CommandStub, RegistrationStub, StorageStub};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// A storage server rooted at a local directory
pub struct StorageServer {
    store: Arc<LocalStore>,
    storage: Skeleton<dyn Storage>,
    command: Skeleton<dyn Command>,
    stubs: Mutex<Option<(StorageStub, CommandStub)>>,
}

impl StorageServer {
    /// Server on system-assigned ports.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DfsError> {
        Self::with_ports(root, 0, 0)
    }

    /// Server listening on all interfaces at the given ports. Port 0 lets the
    /// system choose.
    pub fn with_ports(
        root: impl Into<PathBuf>,
        client_port: u16,
        command_port: u16,
    ) -> Result<Self, DfsError> {
        let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let store = Arc::new(LocalStore::new(root));
        let storage: Arc<dyn Storage> = store.clone();
        let command: Arc<dyn Command> = store.clone();
        Ok(Self {
            storage: Skeleton::with_address(storage, SocketAddr::new(any, client_port))?,
            command: Skeleton::with_address(command, SocketAddr::new(any, command_port))?,
            store,
            stubs: Mutex::new(None),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, DfsError> {
        Self::with_ports(config.root.clone(), config.client_port, config.command_port)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Start both skeletons and register with the naming server.
    ///
    /// `hostname` is the name clients and the naming server use to reach this
    /// host. Files the naming server already knows are deleted locally, along
    /// with any directories that become empty. On failure both skeletons are
    /// stopped.
    pub fn start(&self, hostname: &str, naming: &RegistrationStub) -> Result<(), DfsError> {
        self.store.check_root()?;
        let result = self.start_and_register(hostname, naming);
        if result.is_err() {
            self.stop();
        }
        result
    }

    fn start_and_register(
        &self,
        hostname: &str,
        naming: &RegistrationStub,
    ) -> Result<(), DfsError> {
        self.storage.start()?;
        self.command.start()?;

        let storage_stub = Stub::for_skeleton_with_host(&self.storage, hostname)?;
        let command_stub = Stub::for_skeleton_with_host(&self.command, hostname)?;

        let files = enumerate_local_files(self.store.root())?;
        let offered = files.len();
        let duplicates = naming.register(storage_stub.clone(), command_stub.clone(), files)?;
        info!(
            storage = %storage_stub,
            command = %command_stub,
            files = offered,
            duplicates = duplicates.len(),
            "Registered with naming server"
        );

        for duplicate in &duplicates {
            if let Err(e) = self.store.prune(duplicate) {
                warn!(path = %duplicate, error = %e, "Failed to delete duplicate file");
            }
        }

        *self.stubs.lock() = Some((storage_stub, command_stub));
        Ok(())
    }

    /// Stop both skeletons. Idempotent.
    pub fn stop(&self) {
        self.storage.stop();
        self.command.stop();
    }

    /// Client-facing stub, once started.
    pub fn storage_stub(&self) -> Option<StorageStub> {
        self.stubs.lock().as_ref().map(|(storage, _)| storage.clone())
    }

    /// Naming-server-facing stub, once started.
    pub fn command_stub(&self) -> Option<CommandStub> {
        self.stubs.lock().as_ref().map(|(_, command)| command.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::rmi::Skeleton;
    use std::fs;
    use tempfile::TempDir;

    /// Registration endpoint that reports a fixed list of duplicates.
    struct FixedRegistration {
        duplicates: Vec<Path>,
        offered: Mutex<Vec<Path>>,
    }

    impl Registration for FixedRegistration {
        fn register(
            &self,
            _storage: StorageStub,
            _command: CommandStub,
            files: Vec<Path>,
        ) -> Result<Vec<Path>, DfsError> {
            *self.offered.lock() = files;
            Ok(self.duplicates.clone())
        }
    }

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_start_registers_and_prunes_duplicates() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/dup.txt"), b"x").unwrap();
        fs::write(temp.path().join("keep.txt"), b"y").unwrap();

        let registration = Arc::new(FixedRegistration {
            duplicates: vec![path("/a/b/dup.txt")],
            offered: Mutex::new(Vec::new()),
        });
        let endpoint: Arc<dyn Registration> = registration.clone();
        let skeleton = Skeleton::new(endpoint).unwrap();
        skeleton.start().unwrap();
        let naming = Stub::for_skeleton(&skeleton).unwrap();

        let server = StorageServer::new(temp.path()).unwrap();
        server.start("127.0.0.1", &naming).unwrap();

        assert_eq!(
            *registration.offered.lock(),
            vec![path("/a/b/dup.txt"), path("/keep.txt")]
        );
        assert!(!temp.path().join("a").exists());
        assert!(temp.path().join("keep.txt").is_file());

        let stub = server.storage_stub().unwrap();
        assert_eq!(stub.size(&path("/keep.txt")).unwrap(), 1);

        server.stop();
        skeleton.stop();
    }

    #[test]
    fn test_missing_root_fails_without_listening() {
        let temp = TempDir::new().unwrap();
        let server = StorageServer::new(temp.path().join("absent")).unwrap();
        let naming = Stub::new(crate::rmi::RemoteAddress::new("127.0.0.1", 1)).unwrap();
        assert!(matches!(
            server.start("127.0.0.1", &naming),
            Err(DfsError::NotFound(_))
        ));
        assert!(server.storage_stub().is_none());
    }

    #[test]
    fn test_unreachable_naming_server_stops_skeletons() {
        let temp = TempDir::new().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let server = StorageServer::new(temp.path()).unwrap();
        let naming = Stub::new(dead.into()).unwrap();
        let err = server.start("127.0.0.1", &naming).unwrap_err();
        assert!(err.is_remote_failure());
        assert!(!server.storage.is_listening());
        assert!(!server.command.is_listening());
    }
}
