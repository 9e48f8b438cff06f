use std::sync::Arc;

use docstore_client::DatastoreWrapper;
use docstore_mapping::{Column, ColumnMapping, ColumnType, ColumnValue};
use docstore_types::{Kind, Message, Namespace, RecordId, TypeUrl};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};
use crate::layout::FlatLayout;
use crate::query::RecordQuery;
use crate::record::{Record, RecordBatch};
use crate::storage::RecordStorage;

/// Kind shared by the entity states of every type.
pub const STAND_KIND: &str = "docstore.stand.EntityRecord";

const TYPE_URL: &str = "type_url";
const VERSION: &str = "version";
const ARCHIVED: &str = "archived";
const DELETED: &str = "deleted";

/// Latest state of one entity, as kept by the stand.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub type_url: TypeUrl,
    pub id: RecordId,
    pub version: i64,
    pub archived: bool,
    pub deleted: bool,
    pub state: Vec<u8>,
}

impl EntityRecord {
    pub fn new(type_url: TypeUrl, id: RecordId, version: i64, state: Vec<u8>) -> Self {
        Self {
            type_url,
            id,
            version,
            archived: false,
            deleted: false,
            state,
        }
    }

    /// State of `message` under its type URL.
    pub fn of_message<M: Message>(id: RecordId, version: i64, message: &M) -> StorageResult<Self> {
        let state =
            serde_json::to_vec(message).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self::new(message.descriptor().type_url(), id, version, state))
    }

    pub fn state_as<M: Message>(&self) -> StorageResult<M> {
        serde_json::from_slice(&self.state).map_err(|e| StorageError::Decode {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct StoredState {
    id: RecordId,
    state: Vec<u8>,
}

fn stand_id(type_url: &TypeUrl, id: &RecordId) -> RecordId {
    RecordId::Name(format!("{type_url}|{}", id.to_tagged()))
}

/// Entity states of many types in one kind.
///
/// Records are keyed `<type_url>|<tagged id>` and carry the type URL as a column
/// so the states of one type can be listed.
#[derive(Debug)]
pub struct StandStorage {
    records: RecordStorage,
}

impl StandStorage {
    pub fn new(
        client: Arc<DatastoreWrapper>,
        namespace: Namespace,
        mapping: ColumnMapping,
    ) -> StorageResult<Self> {
        let records = RecordStorage::new(
            client,
            Kind::new(STAND_KIND)?,
            namespace,
            vec![
                Column::new(TYPE_URL, ColumnType::String),
                Column::new(VERSION, ColumnType::Version),
                Column::new(ARCHIVED, ColumnType::Boolean),
                Column::new(DELETED, ColumnType::Boolean),
            ],
            Arc::new(FlatLayout),
            mapping,
        )?;
        Ok(Self { records })
    }

    /// Underlying record storage.
    pub fn records(&self) -> &RecordStorage {
        &self.records
    }

    fn to_record(entity: &EntityRecord) -> StorageResult<Record> {
        let stored = StoredState {
            id: entity.id.clone(),
            state: entity.state.clone(),
        };
        let state =
            serde_json::to_vec(&stored).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Record::new(stand_id(&entity.type_url, &entity.id), state)
            .with_column(TYPE_URL, entity.type_url.to_string())
            .with_column(VERSION, ColumnValue::Version(entity.version))
            .with_column(ARCHIVED, entity.archived)
            .with_column(DELETED, entity.deleted))
    }

    fn from_record(record: Record) -> StorageResult<EntityRecord> {
        let decode = |reason: String| StorageError::Decode {
            id: record.id.clone(),
            reason,
        };
        let stored: StoredState =
            serde_json::from_slice(&record.state).map_err(|e| decode(e.to_string()))?;
        let type_url = match record.column(TYPE_URL).and_then(ColumnValue::as_str) {
            Some(url) => TypeUrl::parse(url)?,
            None => return Err(decode("type URL is missing".into())),
        };
        let version = match record.column(VERSION) {
            Some(ColumnValue::Version(v)) => *v,
            _ => return Err(decode("version is missing".into())),
        };
        let flag = |name| matches!(record.column(name), Some(ColumnValue::Boolean(true)));
        Ok(EntityRecord {
            type_url,
            id: stored.id,
            version,
            archived: flag(ARCHIVED),
            deleted: flag(DELETED),
            state: stored.state,
        })
    }

    /// Store the latest state of one entity.
    pub fn write(&self, entity: &EntityRecord) -> StorageResult<()> {
        self.records.write(&Self::to_record(entity)?)
    }

    /// Store the states of many entities. Not atomic.
    pub fn write_all(&self, entities: &[EntityRecord]) -> StorageResult<()> {
        let batch = entities
            .iter()
            .map(Self::to_record)
            .collect::<StorageResult<RecordBatch>>()?;
        self.records.write_all(&batch)
    }

    /// State of the entity `id` of the given type, if stored.
    pub fn read(&self, type_url: &TypeUrl, id: &RecordId) -> StorageResult<Option<EntityRecord>> {
        self.records
            .read(&stand_id(type_url, id))?
            .map(Self::from_record)
            .transpose()
    }

    /// States of every entity of one type, read lazily.
    pub fn read_all_of_type(
        &self,
        type_url: &TypeUrl,
    ) -> StorageResult<impl Iterator<Item = StorageResult<EntityRecord>> + '_> {
        let query = RecordQuery::new().eq(TYPE_URL, type_url.to_string());
        let records = self.records.read_all_matching(&query)?;
        Ok(records
            .iter()
            .map(|record| record.and_then(Self::from_record)))
    }

    /// Remove the state of one entity. Missing states are skipped.
    pub fn delete(&self, type_url: &TypeUrl, id: &RecordId) -> StorageResult<()> {
        self.records.delete(&stand_id(type_url, id))
    }
}
