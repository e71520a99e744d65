//! Naming server interfaces
//!
//! `Service` is what clients use to browse and modify the namespace;
//! `Registration` is how storage servers announce the files they hold.

use crate::error::{DfsError, ErrorKind};
use crate::path::Path;
use crate::rmi::{Args, MethodSignature, Remote, Stub, Value, WireType};
use crate::types::{CommandStub, StorageStub};

/// Client view of the directory tree
pub trait Service: Send + Sync {
    /// Whether `path` names a directory. The root always does.
    fn is_directory(&self, path: &Path) -> Result<bool, DfsError>;

    /// Names of the immediate children of `directory`, in no particular order.
    fn list(&self, directory: &Path) -> Result<Vec<String>, DfsError>;

    /// Create an empty file on the primary storage server.
    fn create_file(&self, file: &Path) -> Result<bool, DfsError>;

    /// Create an empty directory. No storage server is contacted.
    fn create_directory(&self, directory: &Path) -> Result<bool, DfsError>;

    /// Remove a file or directory from the tree and from storage.
    fn delete(&self, path: &Path) -> Result<bool, DfsError>;

    /// Stub for the storage server holding the primary copy of `file`.
    fn get_storage(&self, file: &Path) -> Result<StorageStub, DfsError>;
}

/// Storage server sign-up
pub trait Registration: Send + Sync {
    /// Register a storage server and the files it holds. Returns the files
    /// that already exist in the namespace; the caller must delete them.
    fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, DfsError>;
}

const PATH: &str = <Path as WireType>::DESCRIPTOR;
const PATHS: &str = <Vec<Path> as WireType>::DESCRIPTOR;
const STORAGE: &str = <StorageStub as WireType>::DESCRIPTOR;
const COMMAND: &str = <CommandStub as WireType>::DESCRIPTOR;

const LOOKUP_ERRORS: &[ErrorKind] = &[
    ErrorKind::NullArgument,
    ErrorKind::NotFound,
    ErrorKind::RemoteCall,
];

impl Remote for dyn Service {
    const INTERFACE: &'static str = "Service";
    const METHODS: &'static [MethodSignature] = &[
        MethodSignature {
            name: "is_directory",
            params: &[PATH],
            raises: LOOKUP_ERRORS,
        },
        MethodSignature {
            name: "list",
            params: &[PATH],
            raises: LOOKUP_ERRORS,
        },
        MethodSignature {
            name: "create_file",
            params: &[PATH],
            raises: &[
                ErrorKind::NullArgument,
                ErrorKind::NotFound,
                ErrorKind::IllegalState,
                ErrorKind::RemoteCall,
            ],
        },
        MethodSignature {
            name: "create_directory",
            params: &[PATH],
            raises: LOOKUP_ERRORS,
        },
        MethodSignature {
            name: "delete",
            params: &[PATH],
            raises: LOOKUP_ERRORS,
        },
        MethodSignature {
            name: "get_storage",
            params: &[PATH],
            raises: LOOKUP_ERRORS,
        },
    ];

    fn dispatch(&self, method: &MethodSignature, mut args: Args) -> Result<Value, DfsError> {
        let path: Path = args.next()?;
        match method.name {
            "is_directory" => self.is_directory(&path).map(WireType::into_value),
            "list" => self.list(&path).map(WireType::into_value),
            "create_file" => self.create_file(&path).map(WireType::into_value),
            "create_directory" => self.create_directory(&path).map(WireType::into_value),
            "delete" => self.delete(&path).map(WireType::into_value),
            "get_storage" => self.get_storage(&path).map(WireType::into_value),
            other => Err(DfsError::IllegalState(format!("Service has no method {}", other))),
        }
    }
}

impl Remote for dyn Registration {
    const INTERFACE: &'static str = "Registration";
    const METHODS: &'static [MethodSignature] = &[MethodSignature {
        name: "register",
        params: &[STORAGE, COMMAND, PATHS],
        raises: &[
            ErrorKind::NullArgument,
            ErrorKind::AlreadyRegistered,
            ErrorKind::RemoteCall,
        ],
    }];

    fn dispatch(&self, method: &MethodSignature, mut args: Args) -> Result<Value, DfsError> {
        match method.name {
            "register" => {
                let storage: StorageStub = args.next()?;
                let command: CommandStub = args.next()?;
                let files: Vec<Path> = args.next()?;
                self.register(storage, command, files)
                    .map(WireType::into_value)
            }
            other => Err(DfsError::IllegalState(format!(
                "Registration has no method {}",
                other
            ))),
        }
    }
}

impl Service for Stub<dyn Service> {
    fn is_directory(&self, path: &Path) -> Result<bool, DfsError> {
        self.invoke("is_directory", vec![path.clone().into_value()])
    }

    fn list(&self, directory: &Path) -> Result<Vec<String>, DfsError> {
        self.invoke("list", vec![directory.clone().into_value()])
    }

    fn create_file(&self, file: &Path) -> Result<bool, DfsError> {
        self.invoke("create_file", vec![file.clone().into_value()])
    }

    fn create_directory(&self, directory: &Path) -> Result<bool, DfsError> {
        self.invoke("create_directory", vec![directory.clone().into_value()])
    }

    fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        self.invoke("delete", vec![path.clone().into_value()])
    }

    fn get_storage(&self, file: &Path) -> Result<StorageStub, DfsError> {
        self.invoke("get_storage", vec![file.clone().into_value()])
    }
}

impl Registration for Stub<dyn Registration> {
    fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, DfsError> {
        self.invoke(
            "register",
            vec![storage.into_value(), command.into_value(), files.into_value()],
        )
    }
}
