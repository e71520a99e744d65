//! Storage server interfaces
//!
//! `Storage` serves file contents to clients; `Command` lets the naming server
//! create, delete and copy files on a storage server.

use crate::error::{DfsError, ErrorKind};
use crate::path::Path;
use crate::rmi::{Args, MethodSignature, Remote, Stub, Value, WireType};
use crate::types::StorageStub;

/// Client access to file data
pub trait Storage: Send + Sync {
    /// Length of a file in bytes. `NotFound` for missing paths and directories.
    fn size(&self, file: &Path) -> Result<i64, DfsError>;

    /// Exactly `length` bytes starting at `offset`.
    fn read(&self, file: &Path, offset: i64, length: i32) -> Result<Vec<u8>, DfsError>;

    /// Write `data` at `offset`, zero-filling any gap past the current end.
    fn write(&self, file: &Path, offset: i64, data: &[u8]) -> Result<(), DfsError>;
}

/// Naming server control over a storage server's files
pub trait Command: Send + Sync {
    /// Create an empty file and any missing parent directories.
    fn create(&self, file: &Path) -> Result<bool, DfsError>;

    /// Delete a file, or a directory recursively.
    fn delete(&self, path: &Path) -> Result<bool, DfsError>;

    /// Pull a file's contents from another storage server.
    fn copy(&self, file: &Path, source: &StorageStub) -> Result<bool, DfsError>;
}

const PATH: &str = <Path as WireType>::DESCRIPTOR;
const LONG: &str = <i64 as WireType>::DESCRIPTOR;
const INT: &str = <i32 as WireType>::DESCRIPTOR;
const BYTES: &str = <Vec<u8> as WireType>::DESCRIPTOR;
const STORAGE: &str = <StorageStub as WireType>::DESCRIPTOR;

impl Remote for dyn Storage {
    const INTERFACE: &'static str = "Storage";
    const METHODS: &'static [MethodSignature] = &[
        MethodSignature {
            name: "size",
            params: &[PATH],
            raises: &[ErrorKind::NotFound, ErrorKind::RemoteCall],
        },
        MethodSignature {
            name: "read",
            params: &[PATH, LONG, INT],
            raises: &[
                ErrorKind::NotFound,
                ErrorKind::OutOfBounds,
                ErrorKind::Io,
                ErrorKind::RemoteCall,
            ],
        },
        MethodSignature {
            name: "write",
            params: &[PATH, LONG, BYTES],
            raises: &[
                ErrorKind::NullArgument,
                ErrorKind::NotFound,
                ErrorKind::OutOfBounds,
                ErrorKind::Io,
                ErrorKind::RemoteCall,
            ],
        },
    ];

    fn dispatch(&self, method: &MethodSignature, mut args: Args) -> Result<Value, DfsError> {
        match method.name {
            "size" => {
                let file: Path = args.next()?;
                self.size(&file).map(WireType::into_value)
            }
            "read" => {
                let file: Path = args.next()?;
                let offset: i64 = args.next()?;
                let length: i32 = args.next()?;
                self.read(&file, offset, length).map(WireType::into_value)
            }
            "write" => {
                let file: Path = args.next()?;
                let offset: i64 = args.next()?;
                let data: Vec<u8> = args.next()?;
                self.write(&file, offset, &data).map(WireType::into_value)
            }
            other => Err(DfsError::IllegalState(format!("Storage has no method {}", other))),
        }
    }
}

impl Remote for dyn Command {
    const INTERFACE: &'static str = "Command";
    const METHODS: &'static [MethodSignature] = &[
        MethodSignature {
            name: "create",
            params: &[PATH],
            raises: &[ErrorKind::NotFound, ErrorKind::Io, ErrorKind::RemoteCall],
        },
        MethodSignature {
            name: "delete",
            params: &[PATH],
            raises: &[ErrorKind::NotFound, ErrorKind::Io, ErrorKind::RemoteCall],
        },
        MethodSignature {
            name: "copy",
            params: &[PATH, STORAGE],
            raises: &[
                ErrorKind::NotFound,
                ErrorKind::NotADirectory,
                ErrorKind::Io,
                ErrorKind::RemoteCall,
            ],
        },
    ];

    fn dispatch(&self, method: &MethodSignature, mut args: Args) -> Result<Value, DfsError> {
        match method.name {
            "create" => {
                let file: Path = args.next()?;
                self.create(&file).map(WireType::into_value)
            }
            "delete" => {
                let path: Path = args.next()?;
                self.delete(&path).map(WireType::into_value)
            }
            "copy" => {
                let file: Path = args.next()?;
                let source: StorageStub = args.next()?;
                self.copy(&file, &source).map(WireType::into_value)
            }
            other => Err(DfsError::IllegalState(format!("Command has no method {}", other))),
        }
    }
}

impl Storage for Stub<dyn Storage> {
    fn size(&self, file: &Path) -> Result<i64, DfsError> {
        self.invoke("size", vec![file.clone().into_value()])
    }

    fn read(&self, file: &Path, offset: i64, length: i32) -> Result<Vec<u8>, DfsError> {
        self.invoke(
            "read",
            vec![
                file.clone().into_value(),
                offset.into_value(),
                length.into_value(),
            ],
        )
    }

    fn write(&self, file: &Path, offset: i64, data: &[u8]) -> Result<(), DfsError> {
        self.invoke(
            "write",
            vec![
                file.clone().into_value(),
                offset.into_value(),
                data.to_vec().into_value(),
            ],
        )
    }
}

impl Command for Stub<dyn Command> {
    fn create(&self, file: &Path) -> Result<bool, DfsError> {
        self.invoke("create", vec![file.clone().into_value()])
    }

    fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        self.invoke("delete", vec![path.clone().into_value()])
    }

    fn copy(&self, file: &Path, source: &StorageStub) -> Result<bool, DfsError> {
        self.invoke(
            "copy",
            vec![file.clone().into_value(), source.clone().into_value()],
        )
    }
}
