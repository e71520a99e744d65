//! meshfs: a distributed filesystem over remote method invocation
//!
//! A naming server owns the directory tree and routes clients to storage
//! servers, which hold file bytes under a local root. Both talk through a
//! small RMI layer: one TCP connection per call, bincode on the wire.

pub mod api;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod path;
pub mod rmi;
pub mod storage;
pub mod tooling;
pub mod types;

pub use error::DfsError;
pub use naming::NamingServer;
pub use path::Path;
pub use storage::StorageServer;
