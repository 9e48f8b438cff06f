use std::collections::btree_map;
use std::collections::BTreeMap;

use docstore_mapping::ColumnValue;
use docstore_types::{Message, RecordId};

use crate::error::{StorageError, StorageResult};

/// A stored record: identifier, opaque state and queryable columns.
///
/// Writing a record replaces any previous record with the same id.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub state: Vec<u8>,
    pub columns: BTreeMap<String, ColumnValue>,
}

impl Record {
    pub fn new(id: RecordId, state: Vec<u8>) -> Self {
        Self {
            id,
            state,
            columns: BTreeMap::new(),
        }
    }

    /// A record whose state is the JSON form of `message`.
    pub fn from_message<M: Message>(id: RecordId, message: &M) -> StorageResult<Self> {
        let state =
            serde_json::to_vec(message).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self::new(id, state))
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnValue> {
        self.columns.get(name)
    }

    /// Decode the state written by [`Record::from_message`].
    pub fn state_as<M: Message>(&self) -> StorageResult<M> {
        serde_json::from_slice(&self.state).map_err(|e| StorageError::Decode {
            id: self.id.clone(),
            reason: format!("state is not a {}: {e}", M::DESCRIPTOR.full_name()),
        })
    }
}

/// Records to write together, keyed by id.
///
/// A later record with the same id replaces the earlier one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordBatch {
    records: BTreeMap<RecordId, Record>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, RecordId, Record> {
        self.records.values()
    }
}

impl FromIterator<Record> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut batch = Self::new();
        for record in iter {
            batch.insert(record);
        }
        batch
    }
}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = &'a Record;
    type IntoIter = btree_map::Values<'a, RecordId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
