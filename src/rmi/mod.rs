//! Remote Method Invocation
//!
//! Request/response calls over TCP, one call per connection. A [`Skeleton`]
//! exports an object implementing a remote interface; a [`Stub`] implements the
//! same interface on the client by forwarding every method to the skeleton.
//! Nothing in this module knows about the filesystem.

pub mod interface;
pub mod skeleton;
pub mod stub;
pub mod wire;

pub use interface::{check_remote_interface, MethodSignature, Remote};
pub use skeleton::{LoggingHooks, Skeleton, SkeletonHooks};
pub use stub::{RemoteAddress, Stub};
pub use wire::{mismatch, Args, Reply, StubRef, Value, WireType};
