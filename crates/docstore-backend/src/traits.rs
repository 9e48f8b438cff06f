use std::fmt;

use docstore_types::{Namespace, ProjectId};

use crate::entity::Entity;
use crate::error::BackendResult;
use crate::key::Key;
use crate::query::{Query, QueryPage};

/// Maximum number of mutations in one write or commit request.
pub const MAX_ENTITIES_PER_WRITE_REQUEST: usize = 500;

/// Maximum number of keys in one lookup request.
pub const MAX_KEYS_PER_READ_REQUEST: usize = 1000;

/// Maximum number of entity groups one transaction may touch.
pub const MAX_ENTITY_GROUPS_PER_TRANSACTION: usize = 25;

/// Handle of an open backend transaction.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single change applied by a commit.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Insert or fully replace an entity.
    Upsert(Entity),
    /// Delete an entity; deleting a missing key is a no-op.
    Delete(Key),
}

impl Mutation {
    pub fn key(&self) -> &Key {
        match self {
            Self::Upsert(entity) => &entity.key,
            Self::Delete(key) => key,
        }
    }
}

/// Remote document store.
///
/// All implementations must satisfy these invariants:
/// - Every call is a blocking remote request; failures are returned, never
///   retried.
/// - Lookups by key are strongly consistent.
/// - Queries with an ancestor are strongly consistent; other queries may lag
///   behind recent writes.
/// - Requests above the documented limits are rejected, not split.
/// - A commit applies all of its mutations or none of them.
pub trait Datastore: Send + Sync {
    /// Project (database) this handle is connected to.
    fn project_id(&self) -> &ProjectId;

    /// Namespace the handle is pinned to, if the client was configured with one.
    fn default_namespace(&self) -> Option<&Namespace>;

    /// Insert or replace entities. Not atomic across entity groups.
    fn put(&self, entities: &[Entity]) -> BackendResult<()>;

    /// Read entities by key.
    ///
    /// Returns one slot per requested key, in request order; missing
    /// entities are `None`.
    fn lookup(&self, keys: &[Key]) -> BackendResult<Vec<Option<Entity>>>;

    /// Delete entities by key. Missing keys are ignored.
    fn delete(&self, keys: &[Key]) -> BackendResult<()>;

    /// Run one page of a query, starting at the query's cursor.
    fn run_query(&self, query: &Query) -> BackendResult<QueryPage>;

    /// Namespaces holding at least one entity.
    fn namespaces(&self) -> BackendResult<Vec<Namespace>>;

    /// Open a transaction.
    fn begin_transaction(&self) -> BackendResult<TransactionId>;

    /// Read entities inside a transaction.
    ///
    /// The entity groups read take part in the transaction's conflict check.
    fn lookup_in_transaction(
        &self,
        transaction: &TransactionId,
        keys: &[Key],
    ) -> BackendResult<Vec<Option<Entity>>>;

    /// Apply `mutations` atomically and finish the transaction.
    fn commit(&self, transaction: &TransactionId, mutations: Vec<Mutation>) -> BackendResult<()>;

    /// Abandon the transaction.
    fn rollback(&self, transaction: &TransactionId) -> BackendResult<()>;
}
