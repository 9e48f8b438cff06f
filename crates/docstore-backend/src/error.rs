/// Errors reported by a document store backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// A write or commit carried more mutations than the backend accepts.
    #[error("request carries {actual} mutations; the limit is {limit}")]
    TooManyMutations { limit: usize, actual: usize },

    /// A lookup carried more keys than the backend accepts.
    #[error("lookup carries {actual} keys; the limit is {limit}")]
    TooManyKeys { limit: usize, actual: usize },

    /// A transaction touched more entity groups than the backend accepts.
    #[error("transaction touches {actual} entity groups; the limit is {limit}")]
    TooManyEntityGroups { limit: usize, actual: usize },

    /// Another writer changed an entity group read by the transaction.
    #[error("transaction conflict on entity group {group}")]
    Conflict { group: String },

    /// The transaction handle is unknown or already finished.
    #[error("unknown or finished transaction: {0}")]
    UnknownTransaction(String),

    /// The key is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The query cursor cannot be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The backend could not serve the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
