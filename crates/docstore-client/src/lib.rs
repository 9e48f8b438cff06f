//! Client wrapper around a [`Datastore`] handle.
//!
//! [`DatastoreWrapper`] is the only component that talks to the backend. It
//! splits bulk requests to fit the backend's request limits, turns paged
//! queries into lazy iterators, and owns the transaction lifecycle: a unit
//! of work runs against a [`TransactionWrapper`] and is committed when it
//! succeeds or rolled back when it fails.
//!
//! The wrapper keeps no business data. Every call is a blocking remote
//! request and transport failures are returned as [`ClientError::Io`]
//! without retries.
//!
//! [`Datastore`]: docstore_backend::Datastore

pub mod config;
pub mod error;
pub mod results;
pub mod transaction;
pub mod wrapper;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use results::QueryResults;
pub use transaction::TransactionWrapper;
pub use wrapper::DatastoreWrapper;
