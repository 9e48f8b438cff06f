//! Foundation types for the docstore adapter.
//!
//! This crate provides the identity and naming types shared by every other
//! docstore crate. It has no knowledge of the backing document store.
//!
//! # Key Types
//!
//! - [`TenantId`] -- Opaque identity of a tenant in a multitenant deployment
//! - [`Namespace`] -- Backend partition key that isolates one tenant's data
//! - [`ProjectId`] -- Identity of the backend project a client handle targets
//! - [`Kind`] -- Logical collection name derived from a domain type
//! - [`TypeDescriptor`] / [`TypeUrl`] -- Fully-qualified domain type names
//! - [`Message`] -- Domain record types storable by the adapter
//! - [`RecordId`] -- Identifier of a stored record (name or number)

pub mod error;
pub mod id;
pub mod kind;
pub mod tenant;

pub use error::TypeError;
pub use id::RecordId;
pub use kind::{Kind, Message, TypeDescriptor, TypeUrl, DEFAULT_TYPE_URL_PREFIX, RESERVED_KIND_PREFIX};
pub use tenant::{Namespace, ProjectId, TenantId, MAX_NAMESPACE_LEN};
