use std::sync::Arc;

use chrono::{DateTime, Utc};
use docstore_client::DatastoreWrapper;
use docstore_mapping::{Column, ColumnMapping, ColumnType, ColumnValue};
use docstore_types::{Kind, Namespace, RecordId};

use crate::error::{StorageError, StorageResult};
use crate::layout::{FlatLayout, KeyLayout};
use crate::record::Record;
use crate::storage::RecordStorage;

/// Kind holding the last handled event time of every projection type.
pub const LAST_HANDLED_EVENT_TIME_KIND: &str = "docstore.projection.LastHandledEventTime";

const TIME: &str = "time";

/// Projection states plus the time of the last event the projection handled.
#[derive(Debug)]
pub struct ProjectionStorage {
    records: RecordStorage,
    times: RecordStorage,
}

impl ProjectionStorage {
    pub fn new(
        client: Arc<DatastoreWrapper>,
        projection_kind: Kind,
        namespace: Namespace,
        columns: Vec<Column>,
        layout: Arc<dyn KeyLayout>,
        mapping: ColumnMapping,
    ) -> StorageResult<Self> {
        let times = RecordStorage::new(
            client.clone(),
            Kind::new(LAST_HANDLED_EVENT_TIME_KIND)?,
            namespace.clone(),
            vec![Column::new(TIME, ColumnType::Timestamp)],
            Arc::new(FlatLayout),
            mapping.clone(),
        )?;
        let records = RecordStorage::new(client, projection_kind, namespace, columns, layout, mapping)?;
        Ok(Self { records, times })
    }

    /// Storage of the projection states.
    pub fn records(&self) -> &RecordStorage {
        &self.records
    }

    fn time_id(&self) -> RecordId {
        RecordId::Name(self.records.kind().to_string())
    }

    /// Remember the time of the last event the projection handled.
    pub fn write_last_handled_event_time(&self, time: DateTime<Utc>) -> StorageResult<()> {
        let record = Record::new(self.time_id(), Vec::new()).with_column(TIME, time);
        self.times.write(&record)
    }

    /// `None` until the projection handled its first event.
    pub fn read_last_handled_event_time(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let Some(record) = self.times.read(&self.time_id())? else {
            return Ok(None);
        };
        match record.column(TIME) {
            Some(ColumnValue::Timestamp(time)) => Ok(Some(*time)),
            _ => Err(StorageError::Decode {
                id: record.id,
                reason: "time column is missing".into(),
            }),
        }
    }
}
