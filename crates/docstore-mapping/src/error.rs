use crate::column::ColumnType;

/// Errors from column value conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// No conversion is registered for the column type.
    #[error("no mapping registered for column type {0}")]
    UnregisteredType(ColumnType),

    /// The value does not have the column's declared type.
    #[error("column {column:?} has type {expected}, got a {found} value")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: String,
    },

    /// A null was written to or read from a non-nullable column.
    #[error("column {0:?} is not nullable")]
    NullNotAllowed(String),

    /// A non-null value converts to the native null value and would read back as null.
    #[error("value of column {0:?} equals the null value")]
    NullValueCollision(String),

    /// The native value cannot be converted back to the column type.
    #[error("cannot decode a native {found} value as {expected}")]
    Decode {
        expected: ColumnType,
        found: &'static str,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
