//! Kinds: the backend collection names of stored record types.
//!
//! A [`Kind`] is derived from the fully-qualified name of a domain type. The
//! same type yields the same kind no matter which handle it is derived from:
//! a [`TypeDescriptor`], a [`TypeUrl`], a [`Message`] instance, or the
//! literal full name.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Kinds starting with this prefix are reserved by the backend.
pub const RESERVED_KIND_PREFIX: &str = "__";

/// Prefix used when a type URL is built from a bare descriptor.
pub const DEFAULT_TYPE_URL_PREFIX: &str = "type.docstore.io";

/// Static description of a domain type: its fully-qualified name.
///
/// Names are dot-separated, e.g. `acme.billing.Invoice`, where everything
/// before the last dot is the package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    full_name: &'static str,
}

impl TypeDescriptor {
    pub const fn new(full_name: &'static str) -> Self {
        Self { full_name }
    }

    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// The package part of the name; empty for unqualified names.
    pub fn package(&self) -> &'static str {
        self.full_name
            .rsplit_once('.')
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    pub fn simple_name(&self) -> &'static str {
        self.full_name
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(self.full_name)
    }

    /// Type URL of this type under [`DEFAULT_TYPE_URL_PREFIX`].
    pub fn type_url(&self) -> TypeUrl {
        TypeUrl {
            prefix: DEFAULT_TYPE_URL_PREFIX.to_string(),
            type_name: self.full_name.to_string(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name)
    }
}

/// A type URL of the form `<prefix>/<full.type.Name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeUrl {
    prefix: String,
    type_name: String,
}

impl TypeUrl {
    /// Parse a type URL. The type name is everything after the last `/`.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let (prefix, type_name) = value
            .rsplit_once('/')
            .ok_or_else(|| TypeError::InvalidTypeUrl(value.to_string()))?;
        if prefix.is_empty() || type_name.is_empty() {
            return Err(TypeError::InvalidTypeUrl(value.to_string()));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            type_name: type_name.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.type_name)
    }
}

/// A domain record type the adapter can store.
///
/// The state of a message is serialized with `serde`; its descriptor names
/// the backend kind it is stored under.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {
    const DESCRIPTOR: TypeDescriptor;

    /// Descriptor of this instance's type.
    fn descriptor(&self) -> TypeDescriptor {
        Self::DESCRIPTOR
    }
}

/// Logical collection name for one record type.
///
/// Equality, ordering and hashing use the name only.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Kind(String);

impl Kind {
    /// Create a kind from a literal name.
    ///
    /// Fails for empty names and names starting with [`RESERVED_KIND_PREFIX`].
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypeError::InvalidKind {
                kind: value,
                reason: "kind must not be empty".into(),
            });
        }
        if value.starts_with(RESERVED_KIND_PREFIX) {
            return Err(TypeError::InvalidKind {
                kind: value,
                reason: format!("prefix {RESERVED_KIND_PREFIX:?} is reserved"),
            });
        }
        Ok(Self(value))
    }

    /// Kind of the message type `M`.
    pub fn of<M: Message>() -> Result<Self, TypeError> {
        Self::of_descriptor(&M::DESCRIPTOR)
    }

    pub fn of_descriptor(descriptor: &TypeDescriptor) -> Result<Self, TypeError> {
        Self::new(descriptor.full_name())
    }

    pub fn of_type_url(url: &TypeUrl) -> Result<Self, TypeError> {
        Self::new(url.type_name())
    }

    pub fn of_message<M: Message>(message: &M) -> Result<Self, TypeError> {
        Self::of_descriptor(&message.descriptor())
    }

    /// A kind named `<self>.<suffix>`, used for records owned by this kind.
    pub fn nested(&self, suffix: &str) -> Result<Self, TypeError> {
        Self::new(format!("{}.{suffix}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self.0)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
