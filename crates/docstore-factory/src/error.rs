use docstore_client::ClientError;
use docstore_storage::StorageError;
use docstore_tenant::TenantError;
use docstore_types::TypeError;
use thiserror::Error;

/// Errors from building a factory or creating storages.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// `build()` was called without a datastore.
    #[error("no datastore configured for the storage factory")]
    MissingDatastore,

    /// A second storage for the same kind and namespace asked for another layout.
    #[error("kind {kind} in namespace {namespace} is bound to the {existing} layout; {requested} was requested")]
    LayoutConflict {
        kind: String,
        namespace: String,
        existing: String,
        requested: String,
    },

    /// The factory was closed.
    #[error("storage factory is closed")]
    Closed,

    #[error("tenant error: {0}")]
    Tenant(#[from] TenantError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),
}

pub type FactoryResult<T> = Result<T, FactoryError>;
