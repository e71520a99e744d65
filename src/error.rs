//! Error taxonomy
//!
//! One error type is shared by every layer so that domain errors raised by a
//! remote object can be serialised by the skeleton and re-raised by the stub
//! without translation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the filesystem, its servers and the RMI transport
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DfsError {
    /// A required input was absent
    #[error("Missing argument: {0}")]
    NullArgument(String),

    /// A path string or component violates the path grammar
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A requested path, directory or local file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation expected a directory and found a file, or the reverse
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Offset or length outside the file
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// A storage server attempted to register twice
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// RMI usage violation
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// An address cannot be turned into a reachable host
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// Transport, serialisation or remote invocation failure
    #[error("Remote call failed: {context}: {cause}")]
    RemoteCall { context: String, cause: String },

    /// Local filesystem I/O problem
    #[error("I/O error: {0}")]
    Io(String),

    /// Launcher configuration or logging set-up problem
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Discriminant of [`DfsError`], used in interface method tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NullArgument,
    InvalidPath,
    NotFound,
    NotADirectory,
    OutOfBounds,
    AlreadyRegistered,
    IllegalState,
    UnknownHost,
    RemoteCall,
    Io,
    Config,
}

impl DfsError {
    /// Build a transport failure from a context string and its cause.
    pub fn remote(context: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        DfsError::RemoteCall {
            context: context.into(),
            cause: cause.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DfsError::NullArgument(_) => ErrorKind::NullArgument,
            DfsError::InvalidPath(_) => ErrorKind::InvalidPath,
            DfsError::NotFound(_) => ErrorKind::NotFound,
            DfsError::NotADirectory(_) => ErrorKind::NotADirectory,
            DfsError::OutOfBounds(_) => ErrorKind::OutOfBounds,
            DfsError::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            DfsError::IllegalState(_) => ErrorKind::IllegalState,
            DfsError::UnknownHost(_) => ErrorKind::UnknownHost,
            DfsError::RemoteCall { .. } => ErrorKind::RemoteCall,
            DfsError::Io(_) => ErrorKind::Io,
            DfsError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this is a transport failure rather than a domain error.
    pub fn is_remote_failure(&self) -> bool {
        self.kind() == ErrorKind::RemoteCall
    }
}

impl From<std::io::Error> for DfsError {
    fn from(err: std::io::Error) -> Self {
        DfsError::Io(err.to_string())
    }
}

impl From<bincode::Error> for DfsError {
    fn from(err: bincode::Error) -> Self {
        DfsError::remote("serialisation", err)
    }
}

impl From<config::ConfigError> for DfsError {
    fn from(err: config::ConfigError) -> Self {
        DfsError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            DfsError::NotFound("/a".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert!(DfsError::remote("connect", "refused").is_remote_failure());
        assert!(!DfsError::OutOfBounds("x".to_string()).is_remote_failure());
    }

    #[test]
    fn test_io_error_converts_to_io() {
        let err: DfsError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_survives_bincode() {
        let err = DfsError::remote("read", "connection reset");
        let bytes = bincode::serialize(&err).unwrap();
        let back: DfsError = bincode::deserialize(&bytes).unwrap();
        assert_eq!(err, back);
        assert_eq!(
            back.to_string(),
            "Remote call failed: read: connection reset"
        );
    }
}
