//! Shared fixtures: servers on system-assigned loopback ports.

use meshfs::naming::NamingServer;
use meshfs::path::Path;
use meshfs::storage::StorageServer;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tempfile::TempDir;

pub fn path(s: &str) -> Path {
    Path::parse(s).unwrap()
}

pub fn loopback() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
}

/// A started naming server on loopback.
pub fn naming_server() -> NamingServer {
    let server = NamingServer::with_addresses(loopback(), loopback()).unwrap();
    server.start().unwrap();
    server
}

/// A storage server whose root holds `files`, started and registered with
/// `naming`.
pub fn storage_server(naming: &NamingServer, files: &[(&str, &[u8])]) -> (TempDir, StorageServer) {
    let root = TempDir::new().unwrap();
    for (name, contents) in files {
        let local = root.path().join(name.trim_start_matches('/'));
        fs::create_dir_all(local.parent().unwrap()).unwrap();
        fs::write(local, contents).unwrap();
    }
    let server = StorageServer::new(root.path()).unwrap();
    server
        .start("127.0.0.1", &naming.registration_stub().unwrap())
        .unwrap();
    (root, server)
}

pub fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}
