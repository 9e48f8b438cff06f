//! Boundary of the remote document store used by the docstore adapter.
//!
//! The document store is schemaless and eventually consistent. It stores
//! [`Entity`] values under hierarchical [`Key`]s, partitions data by
//! namespace, runs paged [`Query`]s with opaque cursors and offers
//! transactions that are atomic only across a bounded number of entity
//! groups (the root of a key chain).
//!
//! # Backends
//!
//! All backends implement the [`Datastore`] trait:
//!
//! - [`InMemoryDatastore`] -- emulator for tests and embedding. It enforces
//!   the request limits of the hosted service, can lag query visibility to
//!   mimic eventual consistency, and can inject faults per entity group.
//!
//! # Request Limits
//!
//! 1. A write or commit carries at most [`MAX_ENTITIES_PER_WRITE_REQUEST`] mutations.
//! 2. A lookup carries at most [`MAX_KEYS_PER_READ_REQUEST`] keys.
//! 3. A transaction touches at most [`MAX_ENTITY_GROUPS_PER_TRANSACTION`] entity groups.
//!
//! Callers are expected to chunk requests; backends reject oversize requests
//! instead of splitting them.

pub mod entity;
pub mod error;
pub mod key;
pub mod memory;
pub mod query;
pub mod traits;
pub mod value;

pub use entity::Entity;
pub use error::{BackendError, BackendResult};
pub use key::Key;
pub use memory::{InMemoryConfig, InMemoryDatastore, RequestStats};
pub use query::{Cursor, Direction, FilterOp, PropertyFilter, PropertyOrder, Query, QueryPage};
pub use traits::{
    Datastore, Mutation, TransactionId, MAX_ENTITIES_PER_WRITE_REQUEST,
    MAX_ENTITY_GROUPS_PER_TRANSACTION, MAX_KEYS_PER_READ_REQUEST,
};
pub use value::Value;
