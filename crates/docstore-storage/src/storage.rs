use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use docstore_backend::{Entity, Key, PropertyFilter, Query, Value};
use docstore_client::{DatastoreWrapper, QueryResults, TransactionWrapper};
use docstore_mapping::{Column, ColumnMapping, ColumnValue};
use docstore_types::{Kind, Namespace, RecordId};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::layout::{FlatLayout, KeyLayout};
use crate::query::RecordQuery;
use crate::record::{Record, RecordBatch};

/// Property holding the serialized record state.
pub const STATE_PROPERTY: &str = "state";

/// Storage of the records of one kind within one namespace.
///
/// The storage converts records to backend entities: the state goes to
/// [`STATE_PROPERTY`] as a blob and every declared column is converted with
/// the [`ColumnMapping`]. Keys come from the [`KeyLayout`].
pub struct RecordStorage {
    client: Arc<DatastoreWrapper>,
    kind: Kind,
    namespace: Namespace,
    columns: BTreeMap<String, Column>,
    layout: Arc<dyn KeyLayout>,
    mapping: ColumnMapping,
}

impl RecordStorage {
    /// Bind a storage to `kind` in `namespace`.
    ///
    /// Fails when a column type has no conversion, a column uses the state
    /// property name, two columns share a name, or the layout's ancestor
    /// kind equals `kind`.
    pub fn new(
        client: Arc<DatastoreWrapper>,
        kind: Kind,
        namespace: Namespace,
        columns: Vec<Column>,
        layout: Arc<dyn KeyLayout>,
        mapping: ColumnMapping,
    ) -> StorageResult<Self> {
        mapping.check_columns(&columns)?;
        if layout.ancestor_kind() == Some(&kind) {
            return Err(StorageError::Config(format!(
                "ancestor kind of {kind} must differ from the record kind"
            )));
        }
        let mut by_name = BTreeMap::new();
        for column in columns {
            if column.name == STATE_PROPERTY {
                return Err(StorageError::Config(format!(
                    "column name {STATE_PROPERTY:?} is reserved for the record state"
                )));
            }
            let name = column.name.clone();
            if by_name.insert(name.clone(), column).is_some() {
                return Err(StorageError::Config(format!(
                    "column {name:?} is declared twice for {kind}"
                )));
            }
        }
        debug!(%kind, %namespace, layout = layout.name(), columns = by_name.len(), "record storage bound");
        Ok(Self {
            client,
            kind,
            namespace,
            columns: by_name,
            layout,
            mapping,
        })
    }

    /// A flat storage with the default column mapping.
    pub fn flat(
        client: Arc<DatastoreWrapper>,
        kind: Kind,
        namespace: Namespace,
        columns: Vec<Column>,
    ) -> StorageResult<Self> {
        Self::new(
            client,
            kind,
            namespace,
            columns,
            Arc::new(FlatLayout),
            ColumnMapping::default(),
        )
    }

    /// Kind of the stored records.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Namespace the storage is bound to.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Layout deriving record keys.
    pub fn layout(&self) -> &dyn KeyLayout {
        self.layout.as_ref()
    }

    /// Declared columns, ordered by name.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub(crate) fn client(&self) -> &DatastoreWrapper {
        &self.client
    }

    /// Backend key of the record `id`.
    pub fn key_for(&self, id: &RecordId) -> StorageResult<Key> {
        self.layout.key_for(&self.namespace, &self.kind, id)
    }

    fn declared(&self, name: &str) -> StorageResult<&Column> {
        self.columns.get(name).ok_or_else(|| StorageError::UnknownColumn {
            kind: self.kind.to_string(),
            column: name.to_string(),
        })
    }

    fn to_entity(&self, record: &Record) -> StorageResult<Entity> {
        for name in record.columns.keys() {
            self.declared(name)?;
        }
        let mut entity = Entity::new(self.key_for(&record.id)?)
            .with(STATE_PROPERTY, Value::Blob(record.state.clone()));
        for column in self.columns.values() {
            let value = record
                .columns
                .get(&column.name)
                .cloned()
                .unwrap_or(ColumnValue::Null);
            entity.set(column.name.clone(), self.mapping.to_native(column, &value)?);
        }
        Ok(entity)
    }

    fn from_entity(&self, entity: Entity) -> StorageResult<Record> {
        let id = entity.key.id().clone();
        let state = match entity.get(STATE_PROPERTY) {
            Some(Value::Blob(bytes)) => bytes.clone(),
            Some(other) => {
                return Err(StorageError::Decode {
                    id,
                    reason: format!("state is a {} value", other.type_name()),
                })
            }
            None => {
                return Err(StorageError::Decode {
                    id,
                    reason: "state property is missing".into(),
                })
            }
        };
        let mut record = Record::new(id, state);
        for column in self.columns.values() {
            if let Some(value) = entity.get(&column.name) {
                let value = self.mapping.from_native(column, value)?;
                record.columns.insert(column.name.clone(), value);
            }
        }
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write one record, replacing any previous version.
    pub fn write(&self, record: &Record) -> StorageResult<()> {
        let entity = self.to_entity(record)?;
        self.client.put(entity)?;
        Ok(())
    }

    /// Write a batch of records.
    ///
    /// Under a flat layout the batch is sent in chunks and is not atomic.
    /// Under an ancestor layout the batch is split by entity group and each
    /// group is committed in its own transaction, so the records of one
    /// group are written together or not at all. Every group is attempted;
    /// the first failure is returned.
    pub fn write_all(&self, batch: &RecordBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let entities = batch
            .iter()
            .map(|record| self.to_entity(record))
            .collect::<StorageResult<Vec<_>>>()?;

        if self.layout.ancestor_kind().is_none() {
            self.client.put_all(&entities)?;
            debug!(kind = %self.kind, count = entities.len(), "records written");
            return Ok(());
        }

        self.commit_by_group(
            entities,
            |entity| entity.key.root().clone(),
            |tx, chunk| tx.put_all(chunk.iter().cloned()),
            "write",
        )
    }

    /// Commit `items` in one transaction per entity group, chunked at the
    /// write limit. Every group is attempted; the first failure is returned.
    fn commit_by_group<T>(
        &self,
        items: Vec<T>,
        root: impl Fn(&T) -> Key,
        stage: impl Fn(&mut TransactionWrapper<'_>, &[T]),
        action: &str,
    ) -> StorageResult<()> {
        let mut groups: BTreeMap<Key, Vec<T>> = BTreeMap::new();
        for item in items {
            groups.entry(root(&item)).or_default().push(item);
        }
        let chunk_size = self.client.config().max_entities_per_write.max(1);
        let mut first_error = None;
        for (group, items) in &groups {
            for chunk in items.chunks(chunk_size) {
                let result = self.client.run_in_transaction(|tx| {
                    stage(tx, chunk);
                    Ok::<_, StorageError>(())
                });
                if let Err(e) = result {
                    warn!(kind = %self.kind, %group, action, error = %e, "entity group commit failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        debug!(kind = %self.kind, groups = groups.len(), action, "entity groups committed");
        first_error.map_or(Ok(()), Err)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read one record. A missing record is `None`, not an error.
    pub fn read(&self, id: &RecordId) -> StorageResult<Option<Record>> {
        let key = self.key_for(id)?;
        self.client
            .get(&key)?
            .map(|entity| self.from_entity(entity))
            .transpose()
    }

    /// Read records by id, in request order.
    pub fn read_multiple(&self, ids: &[RecordId]) -> StorageResult<Vec<Option<Record>>> {
        let keys = ids
            .iter()
            .map(|id| self.key_for(id))
            .collect::<StorageResult<Vec<_>>>()?;
        self.client
            .lookup(&keys)?
            .into_iter()
            .map(|slot| slot.map(|entity| self.from_entity(entity)).transpose())
            .collect()
    }

    /// Every record of the kind in this namespace, read lazily.
    pub fn read_all(&self) -> LazyRecords<'_> {
        LazyRecords {
            storage: self,
            query: self.base_query(),
        }
    }

    /// Records matching a column query.
    pub fn read_all_matching(&self, query: &RecordQuery) -> StorageResult<LazyRecords<'_>> {
        let mut native = self.base_query();
        if let Some(ancestor) = &query.group {
            let group = self
                .layout
                .group_key(&self.namespace, ancestor)
                .ok_or_else(|| {
                    StorageError::Config(format!(
                        "{} records are not grouped by ancestor",
                        self.kind
                    ))
                })?;
            native = native.ancestor(group);
        }
        for filter in &query.filters {
            let column = self.declared(&filter.column)?;
            let value = self.mapping.to_native(column, &filter.value)?;
            native = native.filter(PropertyFilter::new(&column.name, filter.op, value));
        }
        for (name, direction) in &query.order {
            let column = self.declared(name)?;
            native = native.order_by(&column.name, *direction);
        }
        if let Some(limit) = query.limit {
            native = native.limit(limit);
        }
        Ok(LazyRecords {
            storage: self,
            query: native,
        })
    }

    /// Records of one entity group. Strongly consistent.
    pub fn read_group(&self, ancestor: &RecordId) -> StorageResult<LazyRecords<'_>> {
        self.read_all_matching(&RecordQuery::new().within_group(ancestor.clone()))
    }

    /// Ids of every stored record, read lazily.
    pub fn index(&self) -> StorageResult<impl Iterator<Item = StorageResult<RecordId>> + '_> {
        let results = self.client.run_query(self.base_query().keys_only())?;
        Ok(results.map(|entity| {
            entity
                .map(|e| e.key.id().clone())
                .map_err(StorageError::from)
        }))
    }

    fn base_query(&self) -> Query {
        Query::kind(self.namespace.clone(), self.kind.clone())
    }

    // ------------------------------------------------------------------
    // Deletes
    // ------------------------------------------------------------------

    /// Delete one record. Deleting a missing record is a no-op.
    pub fn delete(&self, id: &RecordId) -> StorageResult<()> {
        self.delete_all(std::slice::from_ref(id))
    }

    /// Delete records by id. Missing records are skipped.
    ///
    /// Under an ancestor layout the deletes of one entity group run in one
    /// transaction and groups succeed or fail independently, as in
    /// [`RecordStorage::write_all`].
    pub fn delete_all(&self, ids: &[RecordId]) -> StorageResult<()> {
        let keys = ids
            .iter()
            .map(|id| self.key_for(id))
            .collect::<StorageResult<Vec<_>>>()?;
        if keys.is_empty() {
            return Ok(());
        }
        if self.layout.ancestor_kind().is_none() {
            self.client.delete(&keys)?;
            return Ok(());
        }
        self.commit_by_group(
            keys,
            |key| key.root().clone(),
            |tx, chunk| chunk.iter().cloned().for_each(|key| tx.delete(key)),
            "delete",
        )
    }
}

impl fmt::Debug for RecordStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStorage")
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .field("layout", &self.layout.name())
            .finish()
    }
}

/// A restartable, lazily evaluated set of records.
///
/// Each call to [`LazyRecords::iter`] re-issues the query, so a second pass
/// observes the store as it is at that time.
pub struct LazyRecords<'a> {
    storage: &'a RecordStorage,
    query: Query,
}

impl<'a> LazyRecords<'a> {
    /// Start a new pass over the records.
    pub fn iter(&self) -> RecordIter<'a> {
        match self.storage.client().run_query(self.query.clone()) {
            Ok(results) => RecordIter {
                storage: self.storage,
                results: Some(results),
                failed: None,
            },
            Err(e) => RecordIter {
                storage: self.storage,
                results: None,
                failed: Some(e.into()),
            },
        }
    }

    /// Read every record into memory.
    pub fn to_vec(&self) -> StorageResult<Vec<Record>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &LazyRecords<'a> {
    type Item = StorageResult<Record>;
    type IntoIter = RecordIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`LazyRecords`] set.
pub struct RecordIter<'a> {
    storage: &'a RecordStorage,
    results: Option<QueryResults<'a>>,
    failed: Option<StorageError>,
}

impl Iterator for RecordIter<'_> {
    type Item = StorageResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.failed.take() {
            return Some(Err(e));
        }
        let entity = self.results.as_mut()?.next()?;
        Some(
            entity
                .map_err(StorageError::from)
                .and_then(|entity| self.storage.from_entity(entity)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use docstore_backend::{Direction, FilterOp, InMemoryDatastore};
    use docstore_client::ClientConfig;
    use docstore_mapping::{ColumnType, MappingError};

    use super::*;
    use crate::layout::AncestorLayout;

    fn setup() -> (Arc<InMemoryDatastore>, Arc<DatastoreWrapper>) {
        let store = Arc::new(InMemoryDatastore::local());
        let client = Arc::new(DatastoreWrapper::new(store.clone(), ClientConfig::default()));
        (store, client)
    }

    fn task_kind() -> Kind {
        Kind::new("test.Task").unwrap()
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("status", ColumnType::String),
            Column::new("priority", ColumnType::Integer),
            Column::new("owner", ColumnType::String).nullable(),
        ]
    }

    fn flat(client: &Arc<DatastoreWrapper>) -> RecordStorage {
        RecordStorage::flat(client.clone(), task_kind(), Namespace::empty(), columns()).unwrap()
    }

    fn grouped(client: &Arc<DatastoreWrapper>) -> RecordStorage {
        let layout = AncestorLayout::new(Kind::new("test.Project").unwrap(), |id| {
            let text = id.to_string();
            let prefix = text.split_once('-').map_or(text.as_str(), |(p, _)| p);
            RecordId::Name(prefix.to_string())
        });
        RecordStorage::new(
            client.clone(),
            task_kind(),
            Namespace::empty(),
            columns(),
            Arc::new(layout),
            ColumnMapping::default(),
        )
        .unwrap()
    }

    fn task(id: &str, status: &str, priority: i32) -> Record {
        Record::new(RecordId::name(id).unwrap(), id.as_bytes().to_vec())
            .with_column("status", status)
            .with_column("priority", ColumnValue::Integer(priority))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    #[test]
    fn unmapped_column_type_is_rejected() {
        let (_, client) = setup();
        let mapping = ColumnMapping::builder()
            .with_builtin(ColumnType::String)
            .build();
        let err = RecordStorage::new(
            client,
            task_kind(),
            Namespace::empty(),
            columns(),
            Arc::new(FlatLayout),
            mapping,
        )
        .unwrap_err();
        assert_eq!(
            err,
            StorageError::Mapping(MappingError::UnregisteredType(ColumnType::Integer))
        );
    }

    #[test]
    fn state_column_name_is_reserved() {
        let (_, client) = setup();
        let err = RecordStorage::flat(
            client,
            task_kind(),
            Namespace::empty(),
            vec![Column::new(STATE_PROPERTY, ColumnType::String)],
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn ancestor_kind_must_differ() {
        let (_, client) = setup();
        let layout = AncestorLayout::new(task_kind(), |id| id.clone());
        let err = RecordStorage::new(
            client,
            task_kind(),
            Namespace::empty(),
            columns(),
            Arc::new(layout),
            ColumnMapping::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    // ------------------------------------------------------------------
    // Single records
    // ------------------------------------------------------------------

    #[test]
    fn write_then_read() {
        let (_, client) = setup();
        let storage = flat(&client);
        let record = task("t-1", "ACTIVE", 3);
        storage.write(&record).unwrap();

        let read = storage.read(&record.id).unwrap().unwrap();
        assert_eq!(read.state, record.state);
        assert_eq!(read.column("status"), Some(&ColumnValue::from("ACTIVE")));
        assert_eq!(read.column("priority"), Some(&ColumnValue::Integer(3)));
        assert_eq!(read.column("owner"), Some(&ColumnValue::Null));
    }

    #[test]
    fn rewrite_replaces_record() {
        let (_, client) = setup();
        let storage = flat(&client);
        storage.write(&task("t-1", "ACTIVE", 1)).unwrap();
        storage.write(&task("t-1", "DONE", 2)).unwrap();
        let read = storage.read(&RecordId::name("t-1").unwrap()).unwrap().unwrap();
        assert_eq!(read.column("status"), Some(&ColumnValue::from("DONE")));
    }

    #[test]
    fn unknown_id_reads_none_and_deletes_quietly() {
        let (_, client) = setup();
        let storage = flat(&client);
        let id = RecordId::name("missing").unwrap();
        assert_eq!(storage.read(&id).unwrap(), None);
        storage.delete(&id).unwrap();
    }

    #[test]
    fn undeclared_column_is_rejected() {
        let (store, client) = setup();
        let storage = flat(&client);
        let record = task("t-1", "ACTIVE", 1).with_column("color", "red");
        let err = storage.write(&record).unwrap_err();
        assert!(matches!(err, StorageError::UnknownColumn { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let (_, client) = setup();
        let storage = flat(&client);
        let record = Record::new(RecordId::name("t-1").unwrap(), vec![]);
        let err = storage.write(&record).unwrap_err();
        assert_eq!(
            err,
            StorageError::Mapping(MappingError::NullNotAllowed("priority".into()))
        );
    }

    #[test]
    fn value_equal_to_custom_null_never_reaches_the_store() {
        let (store, client) = setup();
        let mapping = ColumnMapping::builder()
            .with_builtins()
            .null_value(Value::String("<null>".into()))
            .build();
        let storage = RecordStorage::new(
            client,
            task_kind(),
            Namespace::empty(),
            columns(),
            Arc::new(FlatLayout),
            mapping,
        )
        .unwrap();
        let err = storage.write(&task("t-1", "<null>", 1)).unwrap_err();
        assert_eq!(
            err,
            StorageError::Mapping(MappingError::NullValueCollision("status".into()))
        );
        assert!(store.is_empty());

        storage.write(&task("t-2", "ACTIVE", 1)).unwrap();
        let read = storage.read(&RecordId::name("t-2").unwrap()).unwrap().unwrap();
        assert_eq!(read.column("owner"), Some(&ColumnValue::Null));
        assert_eq!(read.column("status"), Some(&ColumnValue::from("ACTIVE")));
    }

    #[test]
    fn read_multiple_keeps_order() {
        let (_, client) = setup();
        let storage = flat(&client);
        storage.write(&task("a", "ACTIVE", 1)).unwrap();
        storage.write(&task("c", "ACTIVE", 1)).unwrap();
        let ids: Vec<_> = ["c", "b", "a"]
            .iter()
            .map(|id| RecordId::name(*id).unwrap())
            .collect();
        let found = storage.read_multiple(&ids).unwrap();
        assert_eq!(found[0].as_ref().map(|r| r.id.clone()), Some(ids[0].clone()));
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().map(|r| r.id.clone()), Some(ids[2].clone()));
    }

    // ------------------------------------------------------------------
    // Bulk
    // ------------------------------------------------------------------

    #[test]
    fn bulk_write_and_lazy_read_all() {
        let (store, client) = setup();
        let storage = flat(&client);
        let batch: RecordBatch = (0..1200)
            .map(|n| task(&format!("t-{n}"), "ACTIVE", n))
            .collect();
        storage.write_all(&batch).unwrap();
        assert_eq!(store.stats().puts, 3);

        let all = storage.read_all();
        assert_eq!(all.iter().count(), 1200);
        // A second pass re-issues the query.
        let queries = store.stats().queries;
        assert_eq!(all.to_vec().unwrap().len(), 1200);
        assert!(store.stats().queries > queries);
    }

    #[test]
    fn read_all_sees_later_writes_on_next_pass() {
        let (_, client) = setup();
        let storage = flat(&client);
        storage.write(&task("t-1", "ACTIVE", 1)).unwrap();
        let all = storage.read_all();
        assert_eq!(all.iter().count(), 1);
        storage.write(&task("t-2", "ACTIVE", 1)).unwrap();
        assert_eq!(all.iter().count(), 2);
    }

    #[test]
    fn index_lists_ids() {
        let (_, client) = setup();
        let storage = flat(&client);
        let batch: RecordBatch = ["a", "b"].iter().map(|id| task(id, "ACTIVE", 1)).collect();
        storage.write_all(&batch).unwrap();
        let ids: Vec<_> = storage
            .index()
            .unwrap()
            .collect::<StorageResult<_>>()
            .unwrap();
        assert_eq!(ids, vec![RecordId::name("a").unwrap(), RecordId::name("b").unwrap()]);
    }

    #[test]
    fn delete_all_removes_records() {
        let (store, client) = setup();
        let storage = flat(&client);
        let batch: RecordBatch = ["a", "b"].iter().map(|id| task(id, "ACTIVE", 1)).collect();
        storage.write_all(&batch).unwrap();
        storage
            .delete_all(&[RecordId::name("a").unwrap(), RecordId::name("b").unwrap()])
            .unwrap();
        assert!(store.is_empty());
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[test]
    fn matching_filters_orders_and_limits() {
        let (_, client) = setup();
        let storage = flat(&client);
        let batch: RecordBatch = [
            task("a", "ACTIVE", 5),
            task("b", "DONE", 1),
            task("c", "ACTIVE", 2),
            task("d", "ACTIVE", 9),
        ]
        .into_iter()
        .collect();
        storage.write_all(&batch).unwrap();

        let query = RecordQuery::new()
            .eq("status", "ACTIVE")
            .filter("priority", FilterOp::LessThan, ColumnValue::Integer(9))
            .order_by("priority", Direction::Descending);
        let ids: Vec<_> = storage
            .read_all_matching(&query)
            .unwrap()
            .to_vec()
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        let limited = storage
            .read_all_matching(&RecordQuery::new().limit(3))
            .unwrap()
            .to_vec()
            .unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[test]
    fn query_on_undeclared_column_fails() {
        let (_, client) = setup();
        let storage = flat(&client);
        let err = storage
            .read_all_matching(&RecordQuery::new().eq("color", "red"))
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::UnknownColumn { .. }));
    }

    #[test]
    fn group_query_needs_ancestor_layout() {
        let (_, client) = setup();
        let storage = flat(&client);
        let err = storage
            .read_group(&RecordId::name("a").unwrap())
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::Config(_)));
    }

    // ------------------------------------------------------------------
    // Ancestor layout
    // ------------------------------------------------------------------

    #[test]
    fn grouped_batch_is_atomic_per_group() {
        let (store, client) = setup();
        let storage = grouped(&client);
        let failing = storage.key_for(&RecordId::name("a-1").unwrap()).unwrap();
        store.fail_writes_to_group(&failing);

        let batch: RecordBatch = [
            task("a-1", "ACTIVE", 1),
            task("a-2", "ACTIVE", 1),
            task("b-1", "ACTIVE", 1),
        ]
        .into_iter()
        .collect();
        let err = storage.write_all(&batch).unwrap_err();
        assert!(matches!(err, StorageError::Client(_)));

        assert!(storage.read(&RecordId::name("a-1").unwrap()).unwrap().is_none());
        assert!(storage.read(&RecordId::name("a-2").unwrap()).unwrap().is_none());
        assert!(storage.read(&RecordId::name("b-1").unwrap()).unwrap().is_some());
        assert_eq!(store.stats().commits, 2);
    }

    #[test]
    fn grouped_delete_commits_each_group_independently() {
        let (store, client) = setup();
        let storage = grouped(&client);
        let batch: RecordBatch = [
            task("a-1", "ACTIVE", 1),
            task("a-2", "ACTIVE", 1),
            task("b-1", "ACTIVE", 1),
        ]
        .into_iter()
        .collect();
        storage.write_all(&batch).unwrap();
        let failing = storage.key_for(&RecordId::name("b-1").unwrap()).unwrap();
        store.fail_writes_to_group(&failing);

        let commits = store.stats().commits;
        let ids: Vec<_> = ["a-1", "a-2", "b-1"]
            .iter()
            .map(|id| RecordId::name(*id).unwrap())
            .collect();
        let err = storage.delete_all(&ids).unwrap_err();
        assert!(matches!(err, StorageError::Client(_)));

        assert!(storage.read(&ids[0]).unwrap().is_none());
        assert!(storage.read(&ids[1]).unwrap().is_none());
        assert!(storage.read(&ids[2]).unwrap().is_some());
        assert_eq!(store.stats().commits, commits + 2);
        assert_eq!(store.stats().deletes, 0);
    }

    #[test]
    fn read_group_returns_only_the_group() {
        let (_, client) = setup();
        let storage = grouped(&client);
        let batch: RecordBatch = [
            task("a-1", "ACTIVE", 1),
            task("a-2", "DONE", 1),
            task("b-1", "ACTIVE", 1),
        ]
        .into_iter()
        .collect();
        storage.write_all(&batch).unwrap();

        let group = storage
            .read_group(&RecordId::name("a").unwrap())
            .unwrap()
            .to_vec()
            .unwrap();
        assert_eq!(group.len(), 2);
        assert!(group.iter().all(|r| r.id.to_string().starts_with("a-")));
    }

    #[test]
    fn group_reads_ignore_query_lag() {
        let mut config = docstore_backend::InMemoryConfig::for_project("lag");
        config.query_lag = Duration::from_secs(60);
        let store = Arc::new(InMemoryDatastore::new(config));
        let client = Arc::new(DatastoreWrapper::new(store, ClientConfig::default()));
        let storage = grouped(&client);
        storage.write(&task("a-1", "ACTIVE", 1)).unwrap();

        assert_eq!(storage.read_all().iter().count(), 0);
        let group = storage.read_group(&RecordId::name("a").unwrap()).unwrap();
        assert_eq!(group.iter().count(), 1);
    }
}
