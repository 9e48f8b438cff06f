use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid kind {kind:?}: {reason}")]
    InvalidKind { kind: String, reason: String },

    #[error("invalid type URL {0:?}")]
    InvalidTypeUrl(String),

    #[error("invalid namespace {namespace:?}: {reason}")]
    InvalidNamespace { namespace: String, reason: String },

    #[error("invalid record id: {0}")]
    InvalidRecordId(String),
}
