//! Remote interfaces of the filesystem
//!
//! Each interface is a plain trait. The naming and storage servers implement
//! them locally; `Stub<dyn I>` implements them by forwarding over RMI.

mod naming;
mod storage;

pub use naming::{Registration, Service};
pub use storage::{Command, Storage};

use crate::error::DfsError;
use crate::path::Path;
use crate::rmi::{mismatch, Value, WireType};

// Paths travel as their component list and are re-validated on arrival.
impl WireType for Path {
    const DESCRIPTOR: &'static str = "path";

    fn into_value(self) -> Value {
        Value::Texts(self.into())
    }

    fn from_value(value: Value) -> Result<Self, DfsError> {
        match value {
            Value::Texts(components) => Path::try_from(components),
            other => Err(mismatch(Self::DESCRIPTOR, &other)),
        }
    }
}

impl WireType for Vec<Path> {
    const DESCRIPTOR: &'static str = "path[]";

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(WireType::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, DfsError> {
        match value {
            Value::List(values) => values.into_iter().map(Path::from_value).collect(),
            other => Err(mismatch(Self::DESCRIPTOR, &other)),
        }
    }
}
