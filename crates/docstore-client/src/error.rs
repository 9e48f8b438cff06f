use docstore_backend::BackendError;

/// Errors from client wrapper operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// The backend failed the request.
    #[error("storage I/O error: {0}")]
    Io(#[from] BackendError),

    /// The wrapper was closed.
    #[error("datastore client is closed")]
    Closed,
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
