use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of a stored record.
///
/// The backend identifies entities either by a string name or by a numeric
/// id. Names order before numbers.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordId {
    Name(String),
    Number(i64),
}

impl RecordId {
    /// A name id; empty names are rejected by the backend.
    pub fn name(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypeError::InvalidRecordId("name must not be empty".into()));
        }
        Ok(Self::Name(value))
    }

    /// A numeric id; the backend reserves zero.
    pub fn number(value: i64) -> Result<Self, TypeError> {
        if value == 0 {
            return Err(TypeError::InvalidRecordId("numeric id must not be zero".into()));
        }
        Ok(Self::Number(value))
    }

    /// A fresh random name id.
    pub fn generate() -> Self {
        Self::Name(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "RecordId({name:?})"),
            Self::Number(n) => write!(f, "RecordId({n})"),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Tagged text form: `s:<name>` or `n:<number>`.
///
/// Unlike [`fmt::Display`], the tagged form keeps the variant, so
/// `Number(7)` and `Name("7")` never map to the same string.
impl RecordId {
    pub fn to_tagged(&self) -> String {
        match self {
            Self::Name(name) => format!("s:{name}"),
            Self::Number(n) => format!("n:{n}"),
        }
    }

    pub fn from_tagged(value: &str) -> Result<Self, TypeError> {
        match value.split_once(':') {
            Some(("s", name)) => Self::name(name),
            Some(("n", number)) => number
                .parse()
                .map_err(|_| TypeError::InvalidRecordId(format!("{number:?} is not a number")))
                .and_then(Self::number),
            _ => Err(TypeError::InvalidRecordId(format!(
                "{value:?} is not a tagged record id"
            ))),
        }
    }
}

impl TryFrom<&str> for RecordId {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::name(value)
    }
}

impl TryFrom<String> for RecordId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::name(value)
    }
}

impl TryFrom<i64> for RecordId {
    type Error = TypeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::number(value)
    }
}
