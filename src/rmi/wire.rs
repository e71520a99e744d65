//! Wire values and codec
//!
//! A call is one TCP connection carrying three bincode-encoded values out (the
//! method name, the argument list, the parameter descriptors) and one
//! [`Reply`] back.

use super::stub::RemoteAddress;
use crate::error::DfsError;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Largest single value accepted from the network
pub const MAX_MESSAGE_BYTES: u64 = 64 * 1024 * 1024;

/// Dynamically typed argument or return value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Unit,
    Bool(bool),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    Text(String),
    Texts(Vec<String>),
    /// Homogeneous sequence of values
    List(Vec<Value>),
    Stub(StubRef),
}

impl Value {
    fn describe(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unit => "void",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "string",
            Value::Texts(_) => "string[]",
            Value::List(_) => "list",
            Value::Stub(_) => "stub",
        }
    }
}

/// Serialised form of a stub: interface identity plus remote address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StubRef {
    pub interface: String,
    pub address: RemoteAddress,
}

/// Response to a single call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// The method returned normally
    Return(Value),
    /// The method raised an error, re-raised verbatim by the stub
    Raised(DfsError),
    /// The skeleton could not perform the call
    Failed(String),
}

/// Rust types that travel as a [`Value`]
pub trait WireType: Sized {
    /// Parameter descriptor used for method resolution
    const DESCRIPTOR: &'static str;

    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Result<Self, DfsError>;
}

/// Error for a value that does not have the expected type.
pub fn mismatch(expected: &str, found: &Value) -> DfsError {
    match found {
        Value::Null => DfsError::NullArgument(format!("expected {}, got null", expected)),
        other => DfsError::remote(
            "type mismatch",
            format!("expected {}, got {}", expected, other.describe()),
        ),
    }
}

macro_rules! wire_type {
    ($ty:ty, $descriptor:expr, $variant:ident) => {
        impl WireType for $ty {
            const DESCRIPTOR: &'static str = $descriptor;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self, DfsError> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(mismatch(Self::DESCRIPTOR, &other)),
                }
            }
        }
    };
}

wire_type!(bool, "boolean", Bool);
wire_type!(i32, "int", Int);
wire_type!(i64, "long", Long);
wire_type!(Vec<u8>, "bytes", Bytes);
wire_type!(String, "string", Text);
wire_type!(Vec<String>, "string[]", Texts);

impl WireType for () {
    const DESCRIPTOR: &'static str = "void";

    fn into_value(self) -> Value {
        Value::Unit
    }

    fn from_value(value: Value) -> Result<Self, DfsError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(mismatch(Self::DESCRIPTOR, &other)),
        }
    }
}

/// Positional argument reader used by dispatch tables
pub struct Args {
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Take the next argument. A missing or null argument is a `NullArgument`.
    pub fn next<A: WireType>(&mut self) -> Result<A, DfsError> {
        let position = self.position;
        self.position += 1;
        match self.values.next() {
            Some(value) => A::from_value(value),
            None => Err(DfsError::NullArgument(format!(
                "argument {} ({}) missing",
                position,
                A::DESCRIPTOR
            ))),
        }
    }
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_MESSAGE_BYTES)
}

/// Write one value.
pub fn send<W: Write, V: Serialize + ?Sized>(writer: &mut W, value: &V) -> Result<(), DfsError> {
    options()
        .serialize_into(&mut *writer, value)
        .map_err(|e| DfsError::remote("encode", e))
}

/// Read one value.
pub fn receive<R: Read, V: DeserializeOwned>(reader: &mut R) -> Result<V, DfsError> {
    options()
        .deserialize_from(&mut *reader)
        .map_err(|e| DfsError::remote("decode", e))
}
