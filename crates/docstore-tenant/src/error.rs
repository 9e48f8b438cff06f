//! Error types for tenant resolution.

use docstore_types::TypeError;
use thiserror::Error;

/// Errors that can occur while mapping tenants to namespaces.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    /// No converter is registered for the project.
    #[error("unsupported operation {operation} for project {project}: no namespace converter registered")]
    Unsupported { project: String, operation: String },

    /// The client handle pins a namespace, so per-tenant namespaces are ambiguous.
    #[error("project {project} pins namespace {namespace:?}; a multitenant resolver needs an unpinned client")]
    AmbiguousNamespace { project: String, namespace: String },

    /// A multitenant resolver was asked for a namespace without a tenant.
    #[error("a tenant is required to resolve a namespace in a multitenant deployment")]
    TenantRequired,

    /// A single-tenant namespace carries no tenant identity.
    #[error("namespace {0:?} belongs to a single-tenant deployment and names no tenant")]
    NoTenantInNamespace(String),

    /// The tenant cannot be encoded as a namespace.
    #[error("tenant {tenant} cannot be encoded: {reason}")]
    InvalidTenant { tenant: String, reason: String },

    /// The namespace was not produced by this converter.
    #[error("namespace {namespace:?} does not encode a tenant: {reason}")]
    MalformedNamespace { namespace: String, reason: String },

    /// A converter is already registered for the project.
    #[error("namespace converter already registered for project {0}")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Convenience type alias for tenant operations.
pub type Result<T> = std::result::Result<T, TenantError>;
