//! Record storage for the docstore adapter.
//!
//! A [`RecordStorage`] owns the records of one kind in one namespace. It
//! turns [`Record`]s into backend entities, converting declared columns with
//! a column mapping and deriving keys from a [`KeyLayout`].
//!
//! # Key Layouts
//!
//! - [`FlatLayout`] -- every record is its own entity group. Bulk writes are
//!   chunked and not atomic.
//! - [`AncestorLayout`] -- records are children of an ancestor derived from
//!   their id. Records sharing an ancestor are written in one transaction.
//!
//! # Specializations
//!
//! - [`AggregateStorage`] -- event and snapshot history per aggregate, plus
//!   lifecycle flags.
//! - [`StandStorage`] -- latest entity states of many types in one kind.
//! - [`ProjectionStorage`] -- projection states plus the last handled event
//!   time.
//!
//! Reads of missing records return `None`; deletes of missing records are
//! no-ops. Bulk reads are lazy and restartable.

pub mod aggregate;
pub mod error;
pub mod layout;
pub mod projection;
pub mod query;
pub mod record;
pub mod stand;
pub mod storage;

pub use aggregate::{AggregateEventRecord, AggregateStorage, HistoryEntry, LifecycleFlags};
pub use error::{StorageError, StorageResult};
pub use layout::{AncestorLayout, FlatLayout, KeyLayout};
pub use projection::{ProjectionStorage, LAST_HANDLED_EVENT_TIME_KIND};
pub use query::{ColumnFilter, RecordQuery};
pub use record::{Record, RecordBatch};
pub use stand::{EntityRecord, StandStorage, STAND_KIND};
pub use storage::{LazyRecords, RecordIter, RecordStorage, STATE_PROPERTY};
