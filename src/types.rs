//! Shared constants and stub aliases.

use crate::api::{Command, Registration, Service, Storage};
use crate::rmi::Stub;

/// Well-known port of the naming server's client interface
pub const SERVICE_PORT: u16 = 6000;

/// Well-known port of the naming server's registration interface
pub const REGISTRATION_PORT: u16 = 6001;

/// Bytes pulled per `read` when copying a file between storage servers
pub const COPY_CHUNK_BYTES: i32 = 64 * 1024;

pub type StorageStub = Stub<dyn Storage>;
pub type CommandStub = Stub<dyn Command>;
pub type ServiceStub = Stub<dyn Service>;
pub type RegistrationStub = Stub<dyn Registration>;
