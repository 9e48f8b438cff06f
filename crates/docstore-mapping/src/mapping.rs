use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use docstore_backend::Value;

use crate::column::{Column, ColumnType, ColumnValue};
use crate::error::{MappingError, MappingResult};

/// Two-way conversion between one column type and native values.
pub trait ColumnTypeMapping: Send + Sync {
    /// Convert a non-null logical value to its native form.
    fn to_native(&self, value: &ColumnValue) -> MappingResult<Value>;

    /// Convert a non-null native value back to its logical form.
    fn from_native(&self, value: &Value) -> MappingResult<ColumnValue>;
}

type ToNative = fn(&ColumnValue) -> MappingResult<Value>;
type FromNative = fn(&Value) -> MappingResult<ColumnValue>;

/// A [`ColumnTypeMapping`] made of two plain functions.
#[derive(Clone, Copy)]
pub struct FnMapping {
    to_native: ToNative,
    from_native: FromNative,
}

impl FnMapping {
    pub const fn new(to_native: ToNative, from_native: FromNative) -> Self {
        Self {
            to_native,
            from_native,
        }
    }
}

impl ColumnTypeMapping for FnMapping {
    fn to_native(&self, value: &ColumnValue) -> MappingResult<Value> {
        (self.to_native)(value)
    }

    fn from_native(&self, value: &Value) -> MappingResult<ColumnValue> {
        (self.from_native)(value)
    }
}

fn decode_error(expected: ColumnType, found: &Value) -> MappingError {
    MappingError::Decode {
        expected,
        found: found.type_name(),
    }
}

fn encode_error(expected: ColumnType, found: &ColumnValue) -> MappingError {
    MappingError::TypeMismatch {
        column: String::new(),
        expected,
        found: found
            .column_type()
            .map_or_else(|| "null".to_string(), |t| t.to_string()),
    }
}

/// Built-in conversion of `column_type`.
fn builtin(column_type: ColumnType) -> FnMapping {
    match column_type {
        ColumnType::String => FnMapping::new(
            |v| match v {
                ColumnValue::String(s) => Ok(Value::String(s.clone())),
                other => Err(encode_error(ColumnType::String, other)),
            },
            |v| match v {
                Value::String(s) => Ok(ColumnValue::String(s.clone())),
                other => Err(decode_error(ColumnType::String, other)),
            },
        ),
        ColumnType::Integer => FnMapping::new(
            |v| match v {
                ColumnValue::Integer(i) => Ok(Value::Integer(i64::from(*i))),
                other => Err(encode_error(ColumnType::Integer, other)),
            },
            |v| match v {
                Value::Integer(i) => i32::try_from(*i)
                    .map(ColumnValue::Integer)
                    .map_err(|_| decode_error(ColumnType::Integer, v)),
                other => Err(decode_error(ColumnType::Integer, other)),
            },
        ),
        ColumnType::Long => FnMapping::new(
            |v| match v {
                ColumnValue::Long(i) => Ok(Value::Integer(*i)),
                other => Err(encode_error(ColumnType::Long, other)),
            },
            |v| match v {
                Value::Integer(i) => Ok(ColumnValue::Long(*i)),
                other => Err(decode_error(ColumnType::Long, other)),
            },
        ),
        ColumnType::Float => FnMapping::new(
            |v| match v {
                ColumnValue::Float(f) => Ok(Value::Double(f64::from(*f))),
                other => Err(encode_error(ColumnType::Float, other)),
            },
            |v| match v {
                Value::Double(f) => Ok(ColumnValue::Float(*f as f32)),
                other => Err(decode_error(ColumnType::Float, other)),
            },
        ),
        ColumnType::Double => FnMapping::new(
            |v| match v {
                ColumnValue::Double(f) => Ok(Value::Double(*f)),
                other => Err(encode_error(ColumnType::Double, other)),
            },
            |v| match v {
                Value::Double(f) => Ok(ColumnValue::Double(*f)),
                other => Err(decode_error(ColumnType::Double, other)),
            },
        ),
        ColumnType::Boolean => FnMapping::new(
            |v| match v {
                ColumnValue::Boolean(b) => Ok(Value::Boolean(*b)),
                other => Err(encode_error(ColumnType::Boolean, other)),
            },
            |v| match v {
                Value::Boolean(b) => Ok(ColumnValue::Boolean(*b)),
                other => Err(decode_error(ColumnType::Boolean, other)),
            },
        ),
        ColumnType::Bytes => FnMapping::new(
            |v| match v {
                ColumnValue::Bytes(b) => Ok(Value::Blob(b.clone())),
                other => Err(encode_error(ColumnType::Bytes, other)),
            },
            |v| match v {
                Value::Blob(b) => Ok(ColumnValue::Bytes(b.clone())),
                other => Err(decode_error(ColumnType::Bytes, other)),
            },
        ),
        ColumnType::Timestamp => FnMapping::new(
            |v| match v {
                ColumnValue::Timestamp(t) => Ok(Value::Timestamp(*t)),
                other => Err(encode_error(ColumnType::Timestamp, other)),
            },
            |v| match v {
                Value::Timestamp(t) => Ok(ColumnValue::Timestamp(*t)),
                other => Err(decode_error(ColumnType::Timestamp, other)),
            },
        ),
        ColumnType::Enum => FnMapping::new(
            |v| match v {
                ColumnValue::Enum(name) => Ok(Value::String(name.clone())),
                other => Err(encode_error(ColumnType::Enum, other)),
            },
            |v| match v {
                Value::String(name) => Ok(ColumnValue::Enum(name.clone())),
                other => Err(decode_error(ColumnType::Enum, other)),
            },
        ),
        ColumnType::Version => FnMapping::new(
            |v| match v {
                ColumnValue::Version(n) => Ok(Value::Integer(*n)),
                other => Err(encode_error(ColumnType::Version, other)),
            },
            |v| match v {
                Value::Integer(n) => Ok(ColumnValue::Version(*n)),
                other => Err(decode_error(ColumnType::Version, other)),
            },
        ),
        ColumnType::Message => FnMapping::new(
            |v| match v {
                ColumnValue::Message(json) => serde_json::to_string(json)
                    .map(Value::String)
                    .map_err(|e| MappingError::Serialization(e.to_string())),
                other => Err(encode_error(ColumnType::Message, other)),
            },
            |v| match v {
                Value::String(s) => serde_json::from_str(s)
                    .map(ColumnValue::Message)
                    .map_err(|e| MappingError::Serialization(e.to_string())),
                other => Err(decode_error(ColumnType::Message, other)),
            },
        ),
    }
}

/// Registry of column type conversions.
///
/// Cheap to clone; conversions are shared.
#[derive(Clone)]
pub struct ColumnMapping {
    mappings: HashMap<ColumnType, Arc<dyn ColumnTypeMapping>>,
    null_value: Value,
}

impl ColumnMapping {
    /// Builder starting from an empty registry.
    pub fn builder() -> ColumnMappingBuilder {
        ColumnMappingBuilder {
            mappings: HashMap::new(),
            null_value: Value::Null,
        }
    }

    /// Native value written for nulls.
    pub fn null_value(&self) -> &Value {
        &self.null_value
    }

    pub fn supports(&self, column_type: ColumnType) -> bool {
        self.mappings.contains_key(&column_type)
    }

    /// Conversion registered for `column_type`.
    pub fn mapping_for(&self, column_type: ColumnType) -> MappingResult<&dyn ColumnTypeMapping> {
        self.mappings
            .get(&column_type)
            .map(|m| m.as_ref())
            .ok_or(MappingError::UnregisteredType(column_type))
    }

    /// Fail unless every column type has a conversion.
    pub fn check_columns<'a>(&self, columns: impl IntoIterator<Item = &'a Column>) -> MappingResult<()> {
        for column in columns {
            self.mapping_for(column.column_type)?;
        }
        Ok(())
    }

    /// Convert the value of `column` to its native form.
    pub fn to_native(&self, column: &Column, value: &ColumnValue) -> MappingResult<Value> {
        let Some(actual) = value.column_type() else {
            if !column.nullable {
                return Err(MappingError::NullNotAllowed(column.name.clone()));
            }
            return Ok(self.null_value.clone());
        };
        if actual != column.column_type {
            return Err(MappingError::TypeMismatch {
                column: column.name.clone(),
                expected: column.column_type,
                found: actual.to_string(),
            });
        }
        let native = self
            .mapping_for(column.column_type)?
            .to_native(value)
            .map_err(|e| match e {
                MappingError::TypeMismatch {
                    expected, found, ..
                } => MappingError::TypeMismatch {
                    column: column.name.clone(),
                    expected,
                    found,
                },
                other => other,
            })?;
        if !self.null_value.is_null() && native == self.null_value {
            return Err(MappingError::NullValueCollision(column.name.clone()));
        }
        Ok(native)
    }

    /// Convert a native value of `column` back to its logical form.
    pub fn from_native(&self, column: &Column, value: &Value) -> MappingResult<ColumnValue> {
        if value == &self.null_value || value.is_null() {
            if !column.nullable {
                return Err(MappingError::NullNotAllowed(column.name.clone()));
            }
            return Ok(ColumnValue::Null);
        }
        self.mapping_for(column.column_type)?.from_native(value)
    }
}

impl Default for ColumnMapping {
    /// Registry with the built-in conversion of every column type.
    fn default() -> Self {
        Self::builder().with_builtins().build()
    }
}

impl fmt::Debug for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&ColumnType> = self.mappings.keys().collect();
        types.sort();
        f.debug_struct("ColumnMapping")
            .field("types", &types)
            .field("null_value", &self.null_value)
            .finish()
    }
}

/// Builder for [`ColumnMapping`].
pub struct ColumnMappingBuilder {
    mappings: HashMap<ColumnType, Arc<dyn ColumnTypeMapping>>,
    null_value: Value,
}

impl ColumnMappingBuilder {
    /// Register the built-in conversion for every column type not yet mapped.
    pub fn with_builtins(mut self) -> Self {
        for column_type in ColumnType::ALL {
            self.mappings
                .entry(column_type)
                .or_insert_with(|| Arc::new(builtin(column_type)));
        }
        self
    }

    /// Register the built-in conversion of one column type.
    pub fn with_builtin(mut self, column_type: ColumnType) -> Self {
        self.mappings
            .insert(column_type, Arc::new(builtin(column_type)));
        self
    }

    /// Register a custom conversion, replacing any previous one.
    pub fn map(mut self, column_type: ColumnType, mapping: Arc<dyn ColumnTypeMapping>) -> Self {
        self.mappings.insert(column_type, mapping);
        self
    }

    /// Native value written for nulls.
    pub fn null_value(mut self, value: Value) -> Self {
        self.null_value = value;
        self
    }

    pub fn build(self) -> ColumnMapping {
        ColumnMapping {
            mappings: self.mappings,
            null_value: self.null_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn roundtrip(column: &Column, value: ColumnValue) -> ColumnValue {
        let mapping = ColumnMapping::default();
        let native = mapping.to_native(column, &value).unwrap();
        mapping.from_native(column, &native).unwrap()
    }

    #[test]
    fn default_registry_covers_every_type() {
        let mapping = ColumnMapping::default();
        for column_type in ColumnType::ALL {
            assert!(mapping.supports(column_type), "{column_type} missing");
        }
    }

    #[test]
    fn native_representations() {
        let mapping = ColumnMapping::default();
        let status = Column::new("status", ColumnType::Enum);
        assert_eq!(
            mapping.to_native(&status, &ColumnValue::Enum("ACTIVE".into())).unwrap(),
            Value::String("ACTIVE".into())
        );
        let count = Column::new("count", ColumnType::Integer);
        assert_eq!(
            mapping.to_native(&count, &ColumnValue::Integer(7)).unwrap(),
            Value::Integer(7)
        );
        let meta = Column::new("meta", ColumnType::Message);
        assert_eq!(
            mapping
                .to_native(&meta, &ColumnValue::Message(json!({"a": 1})))
                .unwrap(),
            Value::String("{\"a\":1}".into())
        );
    }

    #[test]
    fn values_decode_back() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let cases = [
            (ColumnType::String, ColumnValue::from("ACTIVE")),
            (ColumnType::Long, ColumnValue::Long(-5)),
            (ColumnType::Float, ColumnValue::Float(1.5)),
            (ColumnType::Bytes, ColumnValue::Bytes(vec![1, 2])),
            (ColumnType::Timestamp, ColumnValue::Timestamp(when)),
            (ColumnType::Version, ColumnValue::Version(3)),
            (ColumnType::Message, ColumnValue::Message(json!({"k": [1, 2]}))),
        ];
        for (column_type, value) in cases {
            let column = Column::new("c", column_type);
            assert_eq!(roundtrip(&column, value.clone()), value);
        }
    }

    #[test]
    fn null_handling() {
        let mapping = ColumnMapping::default();
        let strict = Column::new("s", ColumnType::String);
        let loose = Column::new("s", ColumnType::String).nullable();
        assert_eq!(
            mapping.to_native(&strict, &ColumnValue::Null).unwrap_err(),
            MappingError::NullNotAllowed("s".into())
        );
        assert_eq!(mapping.to_native(&loose, &ColumnValue::Null).unwrap(), Value::Null);
        assert_eq!(mapping.from_native(&loose, &Value::Null).unwrap(), ColumnValue::Null);
    }

    #[test]
    fn custom_null_value() {
        let mapping = ColumnMapping::builder()
            .with_builtins()
            .null_value(Value::String("<null>".into()))
            .build();
        let column = Column::new("s", ColumnType::String).nullable();
        let native = mapping.to_native(&column, &ColumnValue::Null).unwrap();
        assert_eq!(native, Value::String("<null>".into()));
        assert_eq!(mapping.from_native(&column, &native).unwrap(), ColumnValue::Null);
    }

    #[test]
    fn value_equal_to_custom_null_is_rejected_on_write() {
        let mapping = ColumnMapping::builder()
            .with_builtins()
            .null_value(Value::String("<null>".into()))
            .build();
        for column in [
            Column::new("status", ColumnType::String),
            Column::new("status", ColumnType::String).nullable(),
        ] {
            assert_eq!(
                mapping.to_native(&column, &ColumnValue::from("<null>")).unwrap_err(),
                MappingError::NullValueCollision("status".into())
            );
        }
        let column = Column::new("status", ColumnType::String);
        let native = mapping.to_native(&column, &ColumnValue::from("ACTIVE")).unwrap();
        assert_eq!(mapping.from_native(&column, &native).unwrap(), ColumnValue::from("ACTIVE"));
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let mapping = ColumnMapping::default();
        let column = Column::new("count", ColumnType::Integer);
        let err = mapping.to_native(&column, &ColumnValue::from("7")).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { ref column, .. } if column == "count"));
    }

    #[test]
    fn out_of_range_integer_fails_to_decode() {
        let mapping = ColumnMapping::default();
        let column = Column::new("count", ColumnType::Integer);
        let err = mapping
            .from_native(&column, &Value::Integer(i64::MAX))
            .unwrap_err();
        assert!(matches!(err, MappingError::Decode { .. }));
    }

    #[test]
    fn unregistered_type_fails_fast() {
        let mapping = ColumnMapping::builder()
            .with_builtin(ColumnType::String)
            .build();
        let columns = [
            Column::new("name", ColumnType::String),
            Column::new("when", ColumnType::Timestamp),
        ];
        assert_eq!(
            mapping.check_columns(&columns).unwrap_err(),
            MappingError::UnregisteredType(ColumnType::Timestamp)
        );
    }

    #[test]
    fn custom_mapping_replaces_builtin() {
        // Enums stored as their ordinal position in a fixed list.
        let ordinal = FnMapping::new(
            |v| match v {
                ColumnValue::Enum(name) if name == "ACTIVE" => Ok(Value::Integer(1)),
                ColumnValue::Enum(_) => Ok(Value::Integer(0)),
                _ => Err(MappingError::Serialization("not an enum".into())),
            },
            |v| match v {
                Value::Integer(1) => Ok(ColumnValue::Enum("ACTIVE".into())),
                _ => Ok(ColumnValue::Enum("INACTIVE".into())),
            },
        );
        let mapping = ColumnMapping::builder()
            .with_builtins()
            .map(ColumnType::Enum, Arc::new(ordinal))
            .build();
        let column = Column::new("status", ColumnType::Enum);
        let native = mapping
            .to_native(&column, &ColumnValue::Enum("ACTIVE".into()))
            .unwrap();
        assert_eq!(native, Value::Integer(1));
        assert_eq!(
            mapping.from_native(&column, &native).unwrap(),
            ColumnValue::Enum("ACTIVE".into())
        );
    }
}
