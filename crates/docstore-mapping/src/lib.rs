//! Column value mapping for the docstore adapter.
//!
//! Records expose typed columns for filtering. The backend only understands
//! its own native [`Value`] types, so every logical [`ColumnType`] needs a
//! conversion in both directions. A [`ColumnMapping`] is the registry of
//! those conversions plus the native value used for nulls.
//!
//! The set of column types is closed. A storage is only constructed once
//! every column type it declares has a registered conversion; there is no
//! fallback conversion.
//!
//! [`Value`]: docstore_backend::Value

pub mod column;
pub mod error;
pub mod mapping;

pub use column::{Column, ColumnType, ColumnValue};
pub use error::{MappingError, MappingResult};
pub use mapping::{ColumnMapping, ColumnMappingBuilder, ColumnTypeMapping, FnMapping};
