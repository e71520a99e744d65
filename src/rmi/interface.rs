//! Remote interface descriptions
//!
//! A remote interface publishes a method table. The skeleton resolves incoming
//! calls against it by `(name, parameter descriptors)` and the stub reads the
//! parameter descriptors it sends from the same table.

use super::wire::{Args, Value};
use crate::error::{DfsError, ErrorKind};

/// One entry of a remote interface's method table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: &'static str,
    /// Wire descriptors of the parameters, in order
    pub params: &'static [&'static str],
    /// Error kinds the method may raise
    pub raises: &'static [ErrorKind],
}

impl MethodSignature {
    /// Whether this method declares the transport failure.
    pub fn is_remote(&self) -> bool {
        self.raises.contains(&ErrorKind::RemoteCall)
    }

    fn matches(&self, name: &str, params: &[String]) -> bool {
        self.name == name
            && self.params.len() == params.len()
            && self.params.iter().zip(params).all(|(a, b)| *a == b.as_str())
    }
}

/// An interface that can be exported by a skeleton and proxied by a stub.
///
/// Implemented on the trait object type (`dyn Storage`, `dyn Service`, ...)
/// so that a skeleton can hold any implementation behind an `Arc`.
pub trait Remote: Send + Sync + 'static {
    /// Interface identity carried by stubs
    const INTERFACE: &'static str;
    const METHODS: &'static [MethodSignature];

    /// Invoke a resolved method on the backing object.
    fn dispatch(&self, method: &MethodSignature, args: Args) -> Result<Value, DfsError>;
}

/// Reject interfaces that cannot be exported: every method must declare the
/// transport failure and no `(name, parameters)` pair may appear twice.
pub fn check_remote_interface<T: Remote + ?Sized>() -> Result<(), DfsError> {
    if T::METHODS.is_empty() {
        return Err(DfsError::IllegalState(format!(
            "{} declares no methods",
            T::INTERFACE
        )));
    }
    for (i, method) in T::METHODS.iter().enumerate() {
        if !method.is_remote() {
            return Err(DfsError::IllegalState(format!(
                "{}::{} does not declare RemoteCall and is not a remote interface",
                T::INTERFACE,
                method.name
            )));
        }
        let duplicated = T::METHODS[..i]
            .iter()
            .any(|earlier| earlier.name == method.name && earlier.params == method.params);
        if duplicated {
            return Err(DfsError::IllegalState(format!(
                "{}::{} is declared twice with the same parameters",
                T::INTERFACE,
                method.name
            )));
        }
    }
    Ok(())
}

/// Find the method a caller asked for.
pub fn resolve<T: Remote + ?Sized>(
    name: &str,
    params: &[String],
) -> Option<&'static MethodSignature> {
    T::METHODS.iter().find(|m| m.matches(name, params))
}

/// First method with the given name, used by stubs to fill in descriptors.
pub fn lookup<T: Remote + ?Sized>(name: &str) -> Option<&'static MethodSignature> {
    T::METHODS.iter().find(|m| m.name == name)
}
