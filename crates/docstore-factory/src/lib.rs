//! Storage factory for the docstore adapter.
//!
//! The [`StorageFactory`] is the composition root. It is built once per
//! backend project from a [`Datastore`] handle and hands out storages bound
//! to one tenant's namespace:
//!
//! ```text
//! StorageFactory::builder()
//!     .with_datastore(datastore)
//!     .multitenant(true)
//!     .with_namespace_converter(converter)
//!     .build()?
//!     .create_record_storage(&StorageContext::for_tenant(tenant), &DESCRIPTOR, columns)?
//! ```
//!
//! Configuration errors (missing datastore, ambiguous namespace, unmapped
//! column type, reserved kind, conflicting layouts, missing tenant) surface
//! when the factory is built or a storage is created, before any data is
//! read or written.
//!
//! [`Datastore`]: docstore_backend::Datastore

pub mod config;
pub mod context;
pub mod error;
pub mod factory;

pub use config::FactoryConfig;
pub use context::StorageContext;
pub use error::{FactoryError, FactoryResult};
pub use factory::{StorageFactory, StorageFactoryBuilder};

// Re-export the types callers need to configure and use storages.
pub use docstore_backend::{Datastore, InMemoryConfig, InMemoryDatastore};
pub use docstore_client::ClientConfig;
pub use docstore_mapping::{Column, ColumnMapping, ColumnType, ColumnValue};
pub use docstore_storage::{
    AggregateStorage, AncestorLayout, FlatLayout, KeyLayout, ProjectionStorage, Record,
    RecordBatch, RecordQuery, RecordStorage, StandStorage,
};
pub use docstore_tenant::{DefaultNamespaceConverter, NamespaceConverter};
pub use docstore_types::{Kind, Message, Namespace, RecordId, TenantId, TypeDescriptor};
