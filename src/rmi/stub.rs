//! RMI stubs
//!
//! A [`Stub`] is a value carrying an interface identity and the address of a
//! skeleton. The remote interface traits are implemented for `Stub<dyn I>` by
//! forwarding each method through [`Stub::invoke`]. Equality, hashing and the
//! string form are local and never touch the network.

use super::interface::{check_remote_interface, lookup, Remote};
use super::skeleton::Skeleton;
use super::wire::{self, Reply, StubRef, Value, WireType};
use crate::error::DfsError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::net::{IpAddr, SocketAddr, TcpStream};
use tracing::debug;

/// Network address of a skeleton as seen by its callers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteAddress {
    pub host: String,
    pub port: u16,
}

impl RemoteAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Whether the host is an unspecified (wildcard) address.
    pub fn is_wildcard(&self) -> bool {
        self.host
            .parse::<IpAddr>()
            .map(|ip| ip.is_unspecified())
            .unwrap_or(false)
    }
}

impl From<SocketAddr> for RemoteAddress {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Client-side proxy for the remote interface `T`
pub struct Stub<T: ?Sized> {
    address: RemoteAddress,
    _interface: PhantomData<fn() -> Box<T>>,
}

impl<T: Remote + ?Sized> Stub<T> {
    /// Stub for a skeleton at a known address. Used to bootstrap against
    /// well-known ports.
    pub fn new(address: RemoteAddress) -> Result<Self, DfsError> {
        check_remote_interface::<T>()?;
        Ok(Self {
            address,
            _interface: PhantomData,
        })
    }

    /// Stub carrying the address of `skeleton`.
    ///
    /// The skeleton must be listening or have been given an explicit address
    /// with a fixed port. Wildcard addresses are rejected with `UnknownHost`.
    pub fn for_skeleton(skeleton: &Skeleton<T>) -> Result<Self, DfsError> {
        let address = skeleton_address(skeleton)?;
        if address.ip().is_unspecified() {
            return Err(DfsError::UnknownHost(format!(
                "skeleton for {} is bound to wildcard address {}",
                T::INTERFACE,
                address
            )));
        }
        Self::new(address.into())
    }

    /// Stub carrying the port of `skeleton` and the given hostname, for hosts
    /// whose externally routable name differs from the bound address.
    pub fn for_skeleton_with_host(
        skeleton: &Skeleton<T>,
        hostname: &str,
    ) -> Result<Self, DfsError> {
        let address = skeleton_address(skeleton)?;
        Self::new(RemoteAddress::new(hostname, address.port()))
    }

    pub fn address(&self) -> &RemoteAddress {
        &self.address
    }

    pub fn interface(&self) -> &'static str {
        T::INTERFACE
    }

    /// Serialised form of this stub.
    pub fn to_ref(&self) -> StubRef {
        StubRef {
            interface: T::INTERFACE.to_string(),
            address: self.address.clone(),
        }
    }

    /// Rebuild a stub from its serialised form, checking the interface.
    pub fn from_ref(stub: StubRef) -> Result<Self, DfsError> {
        if stub.interface != T::INTERFACE {
            return Err(DfsError::remote(
                "stub interface mismatch",
                format!("expected {}, got {}", T::INTERFACE, stub.interface),
            ));
        }
        Self::new(stub.address)
    }

    /// Perform one call: connect, send name, arguments and descriptors, read
    /// the reply. Raised errors come back verbatim; every other failure is a
    /// `RemoteCall`.
    pub fn invoke<R: WireType>(&self, method: &str, args: Vec<Value>) -> Result<R, DfsError> {
        let signature = lookup::<T>(method).ok_or_else(|| {
            DfsError::IllegalState(format!("{} has no method {}", T::INTERFACE, method))
        })?;
        let context = format!("{}::{} at {}", T::INTERFACE, method, self.address);
        debug!(call = %context, "Invoking remote method");

        match self.exchange(method, &args, signature.params, &context)? {
            Reply::Return(value) => {
                R::from_value(value).map_err(|e| DfsError::remote(context, e))
            }
            Reply::Raised(err) => Err(err),
            Reply::Failed(cause) => Err(DfsError::remote(context, cause)),
        }
    }

    fn exchange(
        &self,
        method: &str,
        args: &[Value],
        params: &[&str],
        context: &str,
    ) -> Result<Reply, DfsError> {
        let stream = TcpStream::connect((self.address.host.as_str(), self.address.port))
            .map_err(|e| DfsError::remote(context, e))?;

        let mut writer = BufWriter::new(&stream);
        wire::send(&mut writer, method).map_err(|e| DfsError::remote(context, e))?;
        wire::send(&mut writer, args).map_err(|e| DfsError::remote(context, e))?;
        wire::send(&mut writer, params).map_err(|e| DfsError::remote(context, e))?;
        writer.flush().map_err(|e| DfsError::remote(context, e))?;
        drop(writer);

        let mut reader = BufReader::new(&stream);
        wire::receive(&mut reader).map_err(|e| DfsError::remote(context, e))
    }
}

fn skeleton_address<T: Remote + ?Sized>(skeleton: &Skeleton<T>) -> Result<SocketAddr, DfsError> {
    match skeleton.address() {
        Some(address) if address.port() != 0 => Ok(address),
        _ => Err(DfsError::IllegalState(format!(
            "skeleton for {} has no address: not started and no fixed port",
            T::INTERFACE
        ))),
    }
}

impl<T: ?Sized> Clone for Stub<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            _interface: PhantomData,
        }
    }
}

impl<T: ?Sized> PartialEq for Stub<T> {
    fn eq(&self, other: &Self) -> bool {
        // same T means same interface
        self.address == other.address
    }
}

impl<T: ?Sized> Eq for Stub<T> {}

impl<T: ?Sized> Hash for Stub<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl<T: ?Sized> fmt::Display for Stub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl<T: Remote + ?Sized> fmt::Debug for Stub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("interface", &T::INTERFACE)
            .field("address", &self.address)
            .finish()
    }
}

impl<T: Remote + ?Sized> Serialize for Stub<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_ref().serialize(serializer)
    }
}

impl<'de, T: Remote + ?Sized> Deserialize<'de> for Stub<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stub = StubRef::deserialize(deserializer)?;
        Stub::from_ref(stub).map_err(serde::de::Error::custom)
    }
}

impl<T: Remote + ?Sized> WireType for Stub<T> {
    const DESCRIPTOR: &'static str = T::INTERFACE;

    fn into_value(self) -> Value {
        Value::Stub(self.to_ref())
    }

    fn from_value(value: Value) -> Result<Self, DfsError> {
        match value {
            Value::Stub(stub) => Stub::from_ref(stub),
            other => Err(wire::mismatch(T::INTERFACE, &other)),
        }
    }
}
