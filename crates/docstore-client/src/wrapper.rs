use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use docstore_backend::{Datastore, Entity, Key, Query, QueryPage};
use docstore_types::{Kind, Namespace, ProjectId};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::results::QueryResults;
use crate::transaction::TransactionWrapper;

/// Chunking, paging and transactional facade over a [`Datastore`].
pub struct DatastoreWrapper {
    datastore: Arc<dyn Datastore>,
    config: ClientConfig,
    last_write: Mutex<Option<Instant>>,
    closed: AtomicBool,
}

impl DatastoreWrapper {
    /// Wrap a backend handle.
    pub fn new(datastore: Arc<dyn Datastore>, config: ClientConfig) -> Self {
        Self {
            datastore,
            config,
            last_write: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn project_id(&self) -> &ProjectId {
        self.datastore.project_id()
    }

    /// Namespace the underlying handle is pinned to, if any.
    pub fn pinned_namespace(&self) -> Option<&Namespace> {
        self.datastore.default_namespace()
    }

    pub(crate) fn datastore(&self) -> &dyn Datastore {
        self.datastore.as_ref()
    }

    pub(crate) fn ensure_open(&self) -> ClientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    fn record_write(&self) {
        *self.last_write.lock().expect("lock poisoned") = Some(Instant::now());
    }

    fn wait_for_consistency(&self) {
        let Some(wait) = self.config.wait_for_consistency else {
            return;
        };
        let last = *self.last_write.lock().expect("lock poisoned");
        if let Some(remaining) = last.and_then(|at| wait.checked_sub(at.elapsed())) {
            debug!(?remaining, "waiting for query consistency");
            thread::sleep(remaining);
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Store one entity, replacing any previous version.
    pub fn put(&self, entity: Entity) -> ClientResult<()> {
        self.put_all(std::slice::from_ref(&entity))
    }

    /// Insert or replace entities in requests of at most
    /// `max_entities_per_write`. Not atomic; a failed chunk leaves earlier
    /// chunks applied.
    pub fn put_all(&self, entities: &[Entity]) -> ClientResult<()> {
        self.ensure_open()?;
        if entities.is_empty() {
            return Ok(());
        }
        for chunk in entities.chunks(self.config.max_entities_per_write.max(1)) {
            self.datastore.put(chunk)?;
            self.record_write();
        }
        debug!(count = entities.len(), "entities written");
        Ok(())
    }

    /// Delete entities by key in bounded requests. Missing keys are ignored.
    pub fn delete(&self, keys: &[Key]) -> ClientResult<()> {
        self.ensure_open()?;
        if keys.is_empty() {
            return Ok(());
        }
        for chunk in keys.chunks(self.config.max_entities_per_write.max(1)) {
            self.datastore.delete(chunk)?;
            self.record_write();
        }
        debug!(count = keys.len(), "entities deleted");
        Ok(())
    }

    /// Delete every entity of `kind` in `namespace`. Returns the number of
    /// keys deleted.
    pub fn drop_kind(&self, namespace: &Namespace, kind: &Kind) -> ClientResult<usize> {
        let query = Query::kind(namespace.clone(), kind.clone()).keys_only();
        let keys = self
            .run_query(query)?
            .map(|entity| entity.map(|e| e.key))
            .collect::<ClientResult<Vec<_>>>()?;
        self.delete(&keys)?;
        info!(%kind, %namespace, count = keys.len(), "kind dropped");
        Ok(keys.len())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read one entity. A missing entity is `None`.
    pub fn get(&self, key: &Key) -> ClientResult<Option<Entity>> {
        let mut found = self.lookup(std::slice::from_ref(key))?;
        Ok(found.pop().flatten())
    }

    /// Read entities by key in bounded requests. The result has one slot
    /// per key, in request order.
    pub fn lookup(&self, keys: &[Key]) -> ClientResult<Vec<Option<Entity>>> {
        self.ensure_open()?;
        let mut found = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(self.config.max_keys_per_read.max(1)) {
            found.extend(self.datastore.lookup(chunk)?);
        }
        Ok(found)
    }

    /// Run a query lazily. Pages are fetched as the results are consumed.
    pub fn run_query(&self, query: Query) -> ClientResult<QueryResults<'_>> {
        self.ensure_open()?;
        if query.ancestor.is_none() {
            self.wait_for_consistency();
        }
        Ok(QueryResults::new(self, query))
    }

    pub(crate) fn query_page(&self, query: &Query) -> ClientResult<QueryPage> {
        self.ensure_open()?;
        Ok(self.datastore.run_query(query)?)
    }

    /// Namespaces holding data in the project.
    pub fn namespaces(&self) -> ClientResult<Vec<Namespace>> {
        self.ensure_open()?;
        Ok(self.datastore.namespaces()?)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Run `work` in a backend transaction.
    ///
    /// The staged writes are committed when `work` returns `Ok`. When it
    /// returns `Err` the transaction is rolled back and the error returned.
    pub fn run_in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<ClientError>,
        F: FnOnce(&mut TransactionWrapper<'_>) -> Result<T, E>,
    {
        self.ensure_open()?;
        let id = self.datastore.begin_transaction().map_err(ClientError::from)?;
        let mut tx = TransactionWrapper::new(self, id);
        match work(&mut tx) {
            Ok(value) => {
                let (id, mutations) = tx.into_parts();
                let count = mutations.len();
                self.datastore
                    .commit(&id, mutations)
                    .map_err(ClientError::from)?;
                if count > 0 {
                    self.record_write();
                }
                debug!(transaction = %id, mutations = count, "transaction committed");
                Ok(value)
            }
            Err(e) => {
                let (id, _) = tx.into_parts();
                if let Err(rollback) = self.datastore.rollback(&id) {
                    warn!(transaction = %id, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Close the wrapper. Later calls fail with [`ClientError::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(project = %self.project_id(), "datastore client closed");
        }
    }

    /// Whether [`DatastoreWrapper::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DatastoreWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreWrapper")
            .field("project", self.project_id())
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}
