//! Tenant isolation for the docstore adapter.
//!
//! The backing store has no notion of tenants. Isolation is achieved by
//! giving each tenant its own namespace, so every key and query of a tenant
//! lands in a partition no other tenant can address.
//!
//! # Architecture
//!
//! - A [`NamespaceConverter`] turns a [`TenantId`] into a [`Namespace`] and
//!   back. The pair must be a bijection within one backend project.
//! - The [`ConverterRegistry`] holds one converter per [`ProjectId`]. It is
//!   populated while the storage factory is configured and read afterwards.
//!   Projects without a converter get a stub that refuses every conversion.
//! - A [`NamespaceResolver`] is bound to one project and decides whether the
//!   deployment is single-tenant (one fixed namespace) or multitenant (one
//!   namespace per tenant).
//!
//! # Modules
//!
//! - [`error`] -- Error types for tenant resolution
//! - [`converter`] -- Converter trait, default and stub converters
//! - [`registry`] -- Per-project converter registry
//! - [`resolver`] -- Single-tenant and multitenant resolvers
//!
//! [`TenantId`]: docstore_types::TenantId
//! [`Namespace`]: docstore_types::Namespace
//! [`ProjectId`]: docstore_types::ProjectId

pub mod converter;
pub mod error;
pub mod registry;
pub mod resolver;

pub use converter::{
    ConverterFactory, DefaultNamespaceConverter, NamespaceConverter, StubNamespaceConverter,
};
pub use error::{Result, TenantError};
pub use registry::ConverterRegistry;
pub use resolver::NamespaceResolver;
