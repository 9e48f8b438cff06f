use std::sync::Arc;

use chrono::{DateTime, Utc};
use docstore_backend::Direction;
use docstore_client::DatastoreWrapper;
use docstore_mapping::{Column, ColumnMapping, ColumnType, ColumnValue};
use docstore_types::{Kind, Namespace, RecordId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::layout::{AncestorLayout, FlatLayout};
use crate::query::RecordQuery;
use crate::record::{Record, RecordBatch};
use crate::storage::RecordStorage;

const VERSION: &str = "version";
const TIMESTAMP: &str = "timestamp";
const SNAPSHOT: &str = "snapshot";
const ARCHIVED: &str = "archived";
const DELETED: &str = "deleted";

/// Whether a history record holds an event or a snapshot of the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEntry {
    Event,
    Snapshot,
}

/// One event or snapshot in the history of an aggregate.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateEventRecord {
    pub aggregate_id: RecordId,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub entry: HistoryEntry,
    pub payload: Vec<u8>,
}

impl AggregateEventRecord {
    pub fn event(aggregate_id: RecordId, version: i64, timestamp: DateTime<Utc>, payload: Vec<u8>) -> Self {
        Self {
            aggregate_id,
            version,
            timestamp,
            entry: HistoryEntry::Event,
            payload,
        }
    }

    pub fn snapshot(aggregate_id: RecordId, version: i64, timestamp: DateTime<Utc>, payload: Vec<u8>) -> Self {
        Self {
            entry: HistoryEntry::Snapshot,
            ..Self::event(aggregate_id, version, timestamp, payload)
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.entry == HistoryEntry::Snapshot
    }

    /// Record id: `<version>-<e|s>@<tagged aggregate id>`.
    fn record_id(&self) -> RecordId {
        let tag = match self.entry {
            HistoryEntry::Event => 'e',
            HistoryEntry::Snapshot => 's',
        };
        RecordId::Name(format!(
            "{:020}-{tag}@{}",
            self.version,
            self.aggregate_id.to_tagged()
        ))
    }
}

/// Visibility flags of one aggregate instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleFlags {
    pub archived: bool,
    pub deleted: bool,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    aggregate_id: RecordId,
    entry: HistoryEntry,
    payload: Vec<u8>,
}

/// Aggregate id a history record belongs to; the history of an aggregate
/// is grouped under the aggregate's own key.
fn group_of_record(id: &RecordId) -> RecordId {
    id.as_name()
        .and_then(|name| name.split_once('@'))
        .and_then(|(_, aggregate)| RecordId::from_tagged(aggregate).ok())
        .unwrap_or_else(|| id.clone())
}

/// History and lifecycle storage of one aggregate type.
///
/// History records of an aggregate instance are children of that instance,
/// so a batch of records for one aggregate is written atomically.
#[derive(Debug)]
pub struct AggregateStorage {
    aggregate_kind: Kind,
    history: RecordStorage,
    lifecycle: RecordStorage,
}

impl AggregateStorage {
    pub fn new(
        client: Arc<DatastoreWrapper>,
        aggregate_kind: Kind,
        namespace: Namespace,
        mapping: ColumnMapping,
    ) -> StorageResult<Self> {
        let history = RecordStorage::new(
            client.clone(),
            Self::history_kind(&aggregate_kind)?,
            namespace.clone(),
            vec![
                Column::new(VERSION, ColumnType::Version),
                Column::new(TIMESTAMP, ColumnType::Timestamp),
                Column::new(SNAPSHOT, ColumnType::Boolean),
            ],
            Arc::new(AncestorLayout::new(aggregate_kind.clone(), group_of_record)),
            mapping.clone(),
        )?;
        let lifecycle = RecordStorage::new(
            client,
            Self::lifecycle_kind(&aggregate_kind)?,
            namespace,
            vec![
                Column::new(ARCHIVED, ColumnType::Boolean),
                Column::new(DELETED, ColumnType::Boolean),
            ],
            Arc::new(FlatLayout),
            mapping,
        )?;
        Ok(Self {
            aggregate_kind,
            history,
            lifecycle,
        })
    }

    /// Kind of the history records of `aggregate_kind`.
    pub fn history_kind(aggregate_kind: &Kind) -> StorageResult<Kind> {
        Ok(aggregate_kind.nested("AggregateEventRecord")?)
    }

    /// Kind of the lifecycle flags of `aggregate_kind`.
    pub fn lifecycle_kind(aggregate_kind: &Kind) -> StorageResult<Kind> {
        Ok(aggregate_kind.nested("LifecycleFlags")?)
    }

    pub fn aggregate_kind(&self) -> &Kind {
        &self.aggregate_kind
    }

    /// Storage of the history records.
    pub fn history(&self) -> &RecordStorage {
        &self.history
    }

    fn to_record(entry: &AggregateEventRecord) -> StorageResult<Record> {
        let stored = StoredEntry {
            aggregate_id: entry.aggregate_id.clone(),
            entry: entry.entry,
            payload: entry.payload.clone(),
        };
        let state =
            serde_json::to_vec(&stored).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Record::new(entry.record_id(), state)
            .with_column(VERSION, ColumnValue::Version(entry.version))
            .with_column(TIMESTAMP, entry.timestamp)
            .with_column(SNAPSHOT, entry.is_snapshot()))
    }

    fn from_record(record: Record) -> StorageResult<AggregateEventRecord> {
        let stored: StoredEntry =
            serde_json::from_slice(&record.state).map_err(|e| StorageError::Decode {
                id: record.id.clone(),
                reason: e.to_string(),
            })?;
        let version = match record.column(VERSION) {
            Some(ColumnValue::Version(v)) => *v,
            _ => return Err(decode_error(&record, VERSION)),
        };
        let timestamp = match record.column(TIMESTAMP) {
            Some(ColumnValue::Timestamp(t)) => *t,
            _ => return Err(decode_error(&record, TIMESTAMP)),
        };
        Ok(AggregateEventRecord {
            aggregate_id: stored.aggregate_id,
            version,
            timestamp,
            entry: stored.entry,
            payload: stored.payload,
        })
    }

    /// Append one history record.
    pub fn write(&self, entry: &AggregateEventRecord) -> StorageResult<()> {
        self.history.write(&Self::to_record(entry)?)
    }

    /// Append history records. Records of one aggregate are written
    /// together or not at all.
    pub fn write_all(&self, entries: &[AggregateEventRecord]) -> StorageResult<()> {
        let batch = entries
            .iter()
            .map(Self::to_record)
            .collect::<StorageResult<RecordBatch>>()?;
        self.history.write_all(&batch)
    }

    /// History of an aggregate, newest first, up to and including the most
    /// recent snapshot.
    pub fn history_backward(&self, aggregate_id: &RecordId) -> StorageResult<Vec<AggregateEventRecord>> {
        let query = RecordQuery::new()
            .within_group(aggregate_id.clone())
            .order_by(VERSION, Direction::Descending)
            .order_by(SNAPSHOT, Direction::Descending);
        let records = self.history.read_all_matching(&query)?;
        let mut history = Vec::new();
        for record in &records {
            let entry = Self::from_record(record?)?;
            let snapshot = entry.is_snapshot();
            history.push(entry);
            if snapshot {
                break;
            }
        }
        debug!(kind = %self.aggregate_kind, aggregate = %aggregate_id, count = history.len(), "history read");
        Ok(history)
    }

    /// Remove the whole history of an aggregate.
    pub fn delete_history(&self, aggregate_id: &RecordId) -> StorageResult<()> {
        let ids = self
            .history
            .read_group(aggregate_id)?
            .iter()
            .map(|record| record.map(|r| r.id))
            .collect::<StorageResult<Vec<_>>>()?;
        self.history.delete_all(&ids)
    }

    /// Flags of an aggregate; an aggregate without stored flags is active.
    pub fn lifecycle(&self, aggregate_id: &RecordId) -> StorageResult<LifecycleFlags> {
        let Some(record) = self.lifecycle.read(aggregate_id)? else {
            return Ok(LifecycleFlags::default());
        };
        serde_json::from_slice(&record.state).map_err(|e| StorageError::Decode {
            id: record.id,
            reason: e.to_string(),
        })
    }

    /// Replace the flags of an aggregate.
    pub fn write_lifecycle(&self, aggregate_id: &RecordId, flags: LifecycleFlags) -> StorageResult<()> {
        let state =
            serde_json::to_vec(&flags).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let record = Record::new(aggregate_id.clone(), state)
            .with_column(ARCHIVED, flags.archived)
            .with_column(DELETED, flags.deleted);
        self.lifecycle.write(&record)
    }
}

fn decode_error(record: &Record, column: &str) -> StorageError {
    StorageError::Decode {
        id: record.id.clone(),
        reason: format!("column {column:?} is missing"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use docstore_backend::InMemoryDatastore;
    use docstore_client::ClientConfig;

    use super::*;

    fn setup() -> (Arc<InMemoryDatastore>, AggregateStorage) {
        let store = Arc::new(InMemoryDatastore::local());
        let client = Arc::new(DatastoreWrapper::new(store.clone(), ClientConfig::default()));
        let storage = AggregateStorage::new(
            client,
            Kind::new("test.Project").unwrap(),
            Namespace::empty(),
            ColumnMapping::default(),
        )
        .unwrap();
        (store, storage)
    }

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap()
    }

    fn id(name: &str) -> RecordId {
        RecordId::name(name).unwrap()
    }

    #[test]
    fn kinds_are_nested_under_the_aggregate() {
        let (_, storage) = setup();
        assert_eq!(storage.history().kind().as_str(), "test.Project.AggregateEventRecord");
        let kind = AggregateStorage::lifecycle_kind(storage.aggregate_kind()).unwrap();
        assert_eq!(kind.as_str(), "test.Project.LifecycleFlags");
    }

    #[test]
    fn history_backward_stops_at_snapshot() {
        let (_, storage) = setup();
        let p = id("p-1");
        storage
            .write_all(&[
                AggregateEventRecord::event(p.clone(), 1, at(1), b"e1".to_vec()),
                AggregateEventRecord::event(p.clone(), 2, at(2), b"e2".to_vec()),
                AggregateEventRecord::snapshot(p.clone(), 2, at(3), b"s2".to_vec()),
                AggregateEventRecord::event(p.clone(), 3, at(4), b"e3".to_vec()),
                AggregateEventRecord::event(p.clone(), 4, at(5), b"e4".to_vec()),
            ])
            .unwrap();

        let history = storage.history_backward(&p).unwrap();
        let payloads: Vec<_> = history.iter().map(|e| e.payload.clone()).collect();
        assert_eq!(payloads, vec![b"e4".to_vec(), b"e3".to_vec(), b"s2".to_vec()]);
        assert_eq!(history[0].version, 4);
        assert_eq!(history[0].timestamp, at(5));
        assert_eq!(history[0].aggregate_id, p);
    }

    #[test]
    fn history_without_snapshot_is_complete() {
        let (_, storage) = setup();
        let p = id("p-1");
        for v in 1..=3 {
            storage
                .write(&AggregateEventRecord::event(p.clone(), v, at(v as u32), vec![]))
                .unwrap();
        }
        let versions: Vec<_> = storage
            .history_backward(&p)
            .unwrap()
            .iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    #[test]
    fn histories_are_separate_per_aggregate() {
        let (_, storage) = setup();
        storage
            .write_all(&[
                AggregateEventRecord::event(id("a"), 1, at(1), vec![]),
                AggregateEventRecord::event(id("b"), 1, at(1), vec![]),
                AggregateEventRecord::event(RecordId::number(7).unwrap(), 1, at(1), vec![]),
            ])
            .unwrap();
        assert_eq!(storage.history_backward(&id("a")).unwrap().len(), 1);
        let numeric = storage.history_backward(&RecordId::number(7).unwrap()).unwrap();
        assert_eq!(numeric[0].aggregate_id, RecordId::number(7).unwrap());
    }

    #[test]
    fn failed_aggregate_write_leaves_no_partial_history() {
        let (store, storage) = setup();
        let p = id("p-1");
        let entry = AggregateEventRecord::event(p.clone(), 1, at(1), vec![]);
        let key = storage.history().key_for(&entry.record_id()).unwrap();
        store.fail_writes_to_group(&key);

        let result = storage.write_all(&[
            entry,
            AggregateEventRecord::event(p.clone(), 2, at(2), vec![]),
        ]);
        assert!(result.is_err());
        store.clear_faults();
        assert!(storage.history_backward(&p).unwrap().is_empty());
    }

    #[test]
    fn delete_history_removes_group() {
        let (store, storage) = setup();
        let p = id("p-1");
        storage
            .write_all(&[
                AggregateEventRecord::event(p.clone(), 1, at(1), vec![]),
                AggregateEventRecord::event(p.clone(), 2, at(2), vec![]),
            ])
            .unwrap();
        storage.delete_history(&p).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn numeric_and_named_aggregates_do_not_share_history() {
        let (store, storage) = setup();
        let numeric = RecordId::number(7).unwrap();
        let named = id("7");
        storage
            .write_all(&[
                AggregateEventRecord::event(numeric.clone(), 1, at(1), b"numeric".to_vec()),
                AggregateEventRecord::event(named.clone(), 1, at(1), b"named".to_vec()),
            ])
            .unwrap();
        assert_eq!(store.len(), 2);

        let history = storage.history_backward(&numeric).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].payload, b"numeric".to_vec());
        let history = storage.history_backward(&named).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].payload, b"named".to_vec());
    }

    #[test]
    fn delete_history_runs_in_a_transaction() {
        let (store, storage) = setup();
        let p = id("p-1");
        let entry = AggregateEventRecord::event(p.clone(), 1, at(1), vec![]);
        storage.write(&entry).unwrap();
        let commits = store.stats().commits;

        let key = storage.history().key_for(&entry.record_id()).unwrap();
        store.fail_writes_to_group(&key);
        assert!(storage.delete_history(&p).is_err());
        store.clear_faults();
        assert_eq!(storage.history_backward(&p).unwrap().len(), 1);

        storage.delete_history(&p).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.stats().commits, commits + 2);
        assert_eq!(store.stats().deletes, 0);
    }

    #[test]
    fn lifecycle_defaults_to_active() {
        let (_, storage) = setup();
        let p = id("p-1");
        assert_eq!(storage.lifecycle(&p).unwrap(), LifecycleFlags::default());

        let flags = LifecycleFlags {
            archived: true,
            deleted: false,
        };
        storage.write_lifecycle(&p, flags).unwrap();
        assert_eq!(storage.lifecycle(&p).unwrap(), flags);
    }
}
