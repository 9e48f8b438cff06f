use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a backend namespace, in bytes.
pub const MAX_NAMESPACE_LEN: usize = 100;

/// Identity of a tenant in a multitenant deployment.
///
/// A tenant is identified either by an internet domain, an email address, or
/// an arbitrary string value. The identity is supplied by the surrounding
/// application and is stable for the tenant's lifetime.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TenantId {
    /// Tenant identified by an internet domain, e.g. `acme.com`.
    Domain(String),
    /// Tenant identified by an email address.
    Email(String),
    /// Tenant identified by an opaque string value.
    Value(String),
}

impl TenantId {
    pub fn domain(value: impl Into<String>) -> Self {
        Self::Domain(value.into())
    }

    pub fn email(value: impl Into<String>) -> Self {
        Self::Email(value.into())
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    /// Generate a random value-based tenant for tests and demos.
    pub fn generate() -> Self {
        Self::Value(uuid::Uuid::new_v4().to_string())
    }

    /// The raw identity string regardless of the tenant kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Domain(v) | Self::Email(v) | Self::Value(v) => v,
        }
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(v) => write!(f, "TenantId(domain:{v})"),
            Self::Email(v) => write!(f, "TenantId(email:{v})"),
            Self::Value(v) => write!(f, "TenantId(value:{v})"),
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend partition key.
///
/// Every key and query is scoped to exactly one namespace. The empty
/// namespace is the backend's default partition. Namespaces are restricted
/// to `[0-9A-Za-z._-]` and at most [`MAX_NAMESPACE_LEN`] bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    /// Validate and wrap a namespace string.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.len() > MAX_NAMESPACE_LEN {
            return Err(TypeError::InvalidNamespace {
                reason: format!("longer than {MAX_NAMESPACE_LEN} bytes"),
                namespace: value,
            });
        }
        if let Some(ch) = value.chars().find(|c| !is_namespace_char(*c)) {
            return Err(TypeError::InvalidNamespace {
                reason: format!("contains forbidden character: {ch:?}"),
                namespace: value,
            });
        }
        Ok(Self(value))
    }

    /// The backend's default (empty) namespace.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Characters the backend accepts in namespace names.
pub fn is_namespace_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({:?})", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Identity of the backend project (database) a client handle targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
