use docstore_backend::BackendError;
use docstore_client::ClientError;
use docstore_mapping::MappingError;
use docstore_types::{RecordId, TypeError};

/// Errors from record storage operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// The storage was set up inconsistently.
    #[error("storage configuration error: {0}")]
    Config(String),

    /// A record carries a column the storage does not declare.
    #[error("unknown column {column:?} for kind {kind}")]
    UnknownColumn { kind: String, column: String },

    /// A stored entity cannot be turned back into a record.
    #[error("cannot decode record {id}: {reason}")]
    Decode { id: RecordId, reason: String },

    #[error("state serialization error: {0}")]
    Serialization(String),

    #[error("key error: {0}")]
    Key(#[from] BackendError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
