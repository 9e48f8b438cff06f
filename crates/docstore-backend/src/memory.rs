use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use docstore_types::{Namespace, ProjectId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::Entity;
use crate::error::{BackendError, BackendResult};
use crate::key::Key;
use crate::query::{Cursor, Direction, Query, QueryPage};
use crate::traits::{
    Datastore, Mutation, TransactionId, MAX_ENTITIES_PER_WRITE_REQUEST,
    MAX_ENTITY_GROUPS_PER_TRANSACTION, MAX_KEYS_PER_READ_REQUEST,
};

/// Configuration of the [`InMemoryDatastore`] emulator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InMemoryConfig {
    /// Project identity reported by the handle.
    pub project_id: ProjectId,
    /// Namespace the handle is pinned to, if any.
    pub default_namespace: Option<Namespace>,
    /// Number of entities returned per query page.
    pub page_size: usize,
    /// Delay before a written entity becomes visible to non-ancestor queries.
    pub query_lag: Duration,
    pub max_entities_per_write: usize,
    pub max_keys_per_read: usize,
    pub max_groups_per_transaction: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            project_id: ProjectId::new("docstore-local"),
            default_namespace: None,
            page_size: 300,
            query_lag: Duration::ZERO,
            max_entities_per_write: MAX_ENTITIES_PER_WRITE_REQUEST,
            max_keys_per_read: MAX_KEYS_PER_READ_REQUEST,
            max_groups_per_transaction: MAX_ENTITY_GROUPS_PER_TRANSACTION,
        }
    }
}

impl InMemoryConfig {
    /// Default configuration for the given project.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: ProjectId::new(project_id),
            ..Default::default()
        }
    }
}

/// Number of requests served, per request type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub puts: u64,
    pub lookups: u64,
    pub deletes: u64,
    pub queries: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

#[derive(Default)]
struct Counters {
    puts: AtomicU64,
    lookups: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, AtomicOrdering::Relaxed);
}

struct StoredEntity {
    entity: Entity,
    /// Instant from which non-ancestor queries see this entity.
    visible_at: Instant,
}

#[derive(Default)]
struct State {
    entities: BTreeMap<Key, StoredEntity>,
    /// Write counter per entity group root, for optimistic conflict checks.
    group_versions: HashMap<Key, u64>,
    /// Open transactions and the group versions they have read.
    transactions: HashMap<TransactionId, HashMap<Key, u64>>,
    /// Entity groups whose writes fail with [`BackendError::Unavailable`].
    failing_groups: BTreeSet<Key>,
}

impl State {
    fn group_version(&self, root: &Key) -> u64 {
        self.group_versions.get(root).copied().unwrap_or(0)
    }

    fn check_faults<'a>(&self, keys: impl IntoIterator<Item = &'a Key>) -> BackendResult<()> {
        for key in keys {
            if self.failing_groups.contains(key.root()) {
                return Err(BackendError::Unavailable(format!(
                    "injected fault for entity group {}",
                    key.root()
                )));
            }
        }
        Ok(())
    }

    fn upsert(&mut self, entity: Entity, visible_at: Instant) {
        *self
            .group_versions
            .entry(entity.key.root().clone())
            .or_insert(0) += 1;
        self.entities.insert(
            entity.key.clone(),
            StoredEntity { entity, visible_at },
        );
    }

    fn remove(&mut self, key: &Key) {
        if self.entities.remove(key).is_some() {
            *self.group_versions.entry(key.root().clone()).or_insert(0) += 1;
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CursorState {
    offset: u64,
}

fn encode_cursor(offset: usize) -> BackendResult<Cursor> {
    let state = CursorState {
        offset: offset as u64,
    };
    bincode::serialize(&state)
        .map(Cursor::from_bytes)
        .map_err(|e| BackendError::InvalidCursor(e.to_string()))
}

fn decode_cursor(cursor: &Cursor) -> BackendResult<usize> {
    let state: CursorState = bincode::deserialize(cursor.as_bytes())
        .map_err(|e| BackendError::InvalidCursor(e.to_string()))?;
    Ok(state.offset as usize)
}

/// In-memory emulator of the remote document store.
///
/// Intended for tests and embedding. Entities live in a `BTreeMap` ordered by
/// key behind a `RwLock`. The emulator enforces the request limits from
/// [`InMemoryConfig`], implements optimistic transactions with per-group
/// conflict detection, and can delay query visibility of new writes to
/// mimic the hosted service's eventual consistency. Cursors encode an offset
/// into the ordered result set.
pub struct InMemoryDatastore {
    config: InMemoryConfig,
    state: RwLock<State>,
    counters: Counters,
}

impl InMemoryDatastore {
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
            counters: Counters::default(),
        }
    }

    /// An emulator with the default configuration.
    pub fn local() -> Self {
        Self::new(InMemoryConfig::default())
    }

    pub fn config(&self) -> &InMemoryConfig {
        &self.config
    }

    /// Number of stored entities across all namespaces.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all entities and open transactions. Faults stay armed.
    pub fn clear(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.entities.clear();
        state.group_versions.clear();
        state.transactions.clear();
    }

    /// Requests served so far.
    pub fn stats(&self) -> RequestStats {
        let load = |c: &AtomicU64| c.load(AtomicOrdering::Relaxed);
        RequestStats {
            puts: load(&self.counters.puts),
            lookups: load(&self.counters.lookups),
            deletes: load(&self.counters.deletes),
            queries: load(&self.counters.queries),
            commits: load(&self.counters.commits),
            rollbacks: load(&self.counters.rollbacks),
        }
    }

    /// Make every write touching the entity group of `key` fail.
    pub fn fail_writes_to_group(&self, key: &Key) {
        let mut state = self.state.write().expect("lock poisoned");
        state.failing_groups.insert(key.root().clone());
    }

    pub fn clear_faults(&self) {
        self.state
            .write()
            .expect("lock poisoned")
            .failing_groups
            .clear();
    }

    fn check_write_size(&self, actual: usize) -> BackendResult<()> {
        if actual > self.config.max_entities_per_write {
            return Err(BackendError::TooManyMutations {
                limit: self.config.max_entities_per_write,
                actual,
            });
        }
        Ok(())
    }

    fn check_read_size(&self, actual: usize) -> BackendResult<()> {
        if actual > self.config.max_keys_per_read {
            return Err(BackendError::TooManyKeys {
                limit: self.config.max_keys_per_read,
                actual,
            });
        }
        Ok(())
    }

    fn visible_at(&self) -> Instant {
        Instant::now() + self.config.query_lag
    }
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::local()
    }
}

impl Datastore for InMemoryDatastore {
    fn project_id(&self) -> &ProjectId {
        &self.config.project_id
    }

    fn default_namespace(&self) -> Option<&Namespace> {
        self.config.default_namespace.as_ref()
    }

    fn put(&self, entities: &[Entity]) -> BackendResult<()> {
        bump(&self.counters.puts);
        self.check_write_size(entities.len())?;
        let visible_at = self.visible_at();
        let mut state = self.state.write().expect("lock poisoned");
        state.check_faults(entities.iter().map(|e| &e.key))?;
        for entity in entities {
            state.upsert(entity.clone(), visible_at);
        }
        debug!(count = entities.len(), "emulator put");
        Ok(())
    }

    fn lookup(&self, keys: &[Key]) -> BackendResult<Vec<Option<Entity>>> {
        bump(&self.counters.lookups);
        self.check_read_size(keys.len())?;
        let state = self.state.read().expect("lock poisoned");
        Ok(keys
            .iter()
            .map(|key| state.entities.get(key).map(|s| s.entity.clone()))
            .collect())
    }

    fn delete(&self, keys: &[Key]) -> BackendResult<()> {
        bump(&self.counters.deletes);
        self.check_write_size(keys.len())?;
        let mut state = self.state.write().expect("lock poisoned");
        state.check_faults(keys)?;
        for key in keys {
            state.remove(key);
        }
        Ok(())
    }

    fn run_query(&self, query: &Query) -> BackendResult<QueryPage> {
        bump(&self.counters.queries);
        let offset = match &query.start_cursor {
            Some(cursor) => decode_cursor(cursor)?,
            None => 0,
        };
        let now = Instant::now();
        let state = self.state.read().expect("lock poisoned");

        let mut matched: Vec<&Entity> = state
            .entities
            .values()
            .filter(|stored| {
                let key = &stored.entity.key;
                if key.namespace() != &query.namespace || key.kind() != &query.kind {
                    return false;
                }
                match &query.ancestor {
                    Some(ancestor) => key.has_ancestor(ancestor),
                    None => stored.visible_at <= now,
                }
            })
            .map(|stored| &stored.entity)
            .filter(|entity| query.filters.iter().all(|f| f.matches(entity)))
            .filter(|entity| {
                query
                    .order
                    .iter()
                    .all(|o| entity.properties.contains_key(&o.property))
            })
            .collect();

        // Stable sort keeps key order as the final tie-breaker.
        matched.sort_by(|a, b| {
            for order in &query.order {
                let (Some(x), Some(y)) = (a.get(&order.property), b.get(&order.property)) else {
                    continue;
                };
                let ord = x.compare(y).unwrap_or(Ordering::Equal);
                let ord = match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        // The limit counts from the start cursor, as in the hosted service.
        let start = offset.min(matched.len());
        let stop = query
            .limit
            .map_or(matched.len(), |l| (start + l).min(matched.len()));
        let end = (start + self.config.page_size).min(stop);
        let entities = matched[start..end]
            .iter()
            .map(|e| {
                if query.keys_only {
                    (*e).clone().into_key_only()
                } else {
                    (*e).clone()
                }
            })
            .collect::<Vec<_>>();

        debug!(
            kind = %query.kind,
            namespace = %query.namespace,
            offset = start,
            returned = entities.len(),
            "emulator query page"
        );
        Ok(QueryPage {
            entities,
            end_cursor: encode_cursor(end)?,
            more_results: end < stop,
        })
    }

    fn namespaces(&self) -> BackendResult<Vec<Namespace>> {
        let state = self.state.read().expect("lock poisoned");
        let namespaces: BTreeSet<Namespace> = state
            .entities
            .keys()
            .map(|key| key.namespace().clone())
            .collect();
        Ok(namespaces.into_iter().collect())
    }

    fn begin_transaction(&self) -> BackendResult<TransactionId> {
        let id = TransactionId::new(uuid::Uuid::new_v4().to_string());
        let mut state = self.state.write().expect("lock poisoned");
        state.transactions.insert(id.clone(), HashMap::new());
        Ok(id)
    }

    fn lookup_in_transaction(
        &self,
        transaction: &TransactionId,
        keys: &[Key],
    ) -> BackendResult<Vec<Option<Entity>>> {
        bump(&self.counters.lookups);
        self.check_read_size(keys.len())?;
        let mut state = self.state.write().expect("lock poisoned");
        let versions: Vec<(Key, u64)> = keys
            .iter()
            .map(|key| (key.root().clone(), state.group_version(key.root())))
            .collect();
        let reads = state
            .transactions
            .get_mut(transaction)
            .ok_or_else(|| BackendError::UnknownTransaction(transaction.to_string()))?;
        for (root, version) in versions {
            reads.entry(root).or_insert(version);
        }
        Ok(keys
            .iter()
            .map(|key| state.entities.get(key).map(|s| s.entity.clone()))
            .collect())
    }

    fn commit(&self, transaction: &TransactionId, mutations: Vec<Mutation>) -> BackendResult<()> {
        bump(&self.counters.commits);
        let visible_at = self.visible_at();
        let mut state = self.state.write().expect("lock poisoned");
        let reads = state
            .transactions
            .remove(transaction)
            .ok_or_else(|| BackendError::UnknownTransaction(transaction.to_string()))?;
        self.check_write_size(mutations.len())?;

        let groups: BTreeSet<&Key> = mutations
            .iter()
            .map(|m| m.key().root())
            .chain(reads.keys())
            .collect();
        if groups.len() > self.config.max_groups_per_transaction {
            return Err(BackendError::TooManyEntityGroups {
                limit: self.config.max_groups_per_transaction,
                actual: groups.len(),
            });
        }
        for (root, version) in &reads {
            if state.group_version(root) != *version {
                return Err(BackendError::Conflict {
                    group: root.to_string(),
                });
            }
        }
        state.check_faults(mutations.iter().map(Mutation::key))?;

        let count = mutations.len();
        for mutation in mutations {
            match mutation {
                Mutation::Upsert(entity) => state.upsert(entity, visible_at),
                Mutation::Delete(key) => state.remove(&key),
            }
        }
        debug!(%transaction, mutations = count, "emulator commit");
        Ok(())
    }

    fn rollback(&self, transaction: &TransactionId) -> BackendResult<()> {
        bump(&self.counters.rollbacks);
        let mut state = self.state.write().expect("lock poisoned");
        state
            .transactions
            .remove(transaction)
            .map(|_| ())
            .ok_or_else(|| BackendError::UnknownTransaction(transaction.to_string()))
    }
}

impl std::fmt::Debug for InMemoryDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDatastore")
            .field("project_id", &self.config.project_id)
            .field("entity_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use docstore_types::{Kind, RecordId, TypeError};

    use super::*;
    use crate::query::{FilterOp, PropertyFilter};
    use crate::value::Value;

    fn task_kind() -> Kind {
        Kind::new("acme.Task").unwrap()
    }

    fn key(ns: &Namespace, id: impl TryInto<RecordId, Error = TypeError>) -> Key {
        Key::new(ns.clone(), task_kind(), id.try_into().unwrap())
    }

    fn task(ns: &Namespace, id: &str, status: &str) -> Entity {
        Entity::new(key(ns, id)).with("status", Value::from(status))
    }

    fn all(store: &InMemoryDatastore, query: Query) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut query = query;
        loop {
            let page = store.run_query(&query).unwrap();
            if let Some(limit) = query.limit.as_mut() {
                *limit -= page.entities.len();
            }
            out.extend(page.entities);
            if !page.more_results {
                return out;
            }
            query = query.start_at(page.end_cursor);
        }
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_lookup_preserve_order() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        store
            .put(&[task(&ns, "a", "ACTIVE"), task(&ns, "c", "DONE")])
            .unwrap();

        let found = store
            .lookup(&[key(&ns, "c"), key(&ns, "b"), key(&ns, "a")])
            .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].as_ref().unwrap().get("status"), Some(&Value::from("DONE")));
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().unwrap().key, key(&ns, "a"));
    }

    #[test]
    fn put_replaces_whole_entity() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        store
            .put(&[task(&ns, "a", "ACTIVE").with("extra", Value::from(1))])
            .unwrap();
        store.put(&[task(&ns, "a", "DONE")]).unwrap();
        let found = store.lookup(&[key(&ns, "a")]).unwrap().remove(0).unwrap();
        assert!(found.get("extra").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_missing_key_is_noop() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        store.delete(&[key(&ns, "ghost")]).unwrap();
        store.put(&[task(&ns, "a", "ACTIVE")]).unwrap();
        store.delete(&[key(&ns, "a")]).unwrap();
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Limits
    // -----------------------------------------------------------------------

    #[test]
    fn oversize_requests_are_rejected() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        let entities: Vec<Entity> = (0..=MAX_ENTITIES_PER_WRITE_REQUEST)
            .map(|i| task(&ns, &format!("t{i}"), "ACTIVE"))
            .collect();
        let err = store.put(&entities).unwrap_err();
        assert!(matches!(err, BackendError::TooManyMutations { .. }));
        assert!(store.is_empty());

        let keys: Vec<Key> = (1..=MAX_KEYS_PER_READ_REQUEST as i64 + 1)
            .map(|i| key(&ns, i))
            .collect();
        assert!(matches!(
            store.lookup(&keys).unwrap_err(),
            BackendError::TooManyKeys { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn query_pages_through_results() {
        let config = InMemoryConfig {
            page_size: 4,
            ..Default::default()
        };
        let store = InMemoryDatastore::new(config);
        let ns = Namespace::empty();
        let entities: Vec<Entity> = (0..10)
            .map(|i| task(&ns, &format!("t{i:02}"), "ACTIVE"))
            .collect();
        store.put(&entities).unwrap();

        let first = store.run_query(&Query::kind(ns.clone(), task_kind())).unwrap();
        assert_eq!(first.entities.len(), 4);
        assert!(first.more_results);

        let results = all(&store, Query::kind(ns.clone(), task_kind()));
        assert_eq!(results.len(), 10);
        assert_eq!(results[0].key, key(&ns, "t00"));
        assert_eq!(results[9].key, key(&ns, "t09"));
    }

    #[test]
    fn query_limit_spans_pages() {
        let config = InMemoryConfig {
            page_size: 3,
            ..Default::default()
        };
        let store = InMemoryDatastore::new(config);
        let ns = Namespace::empty();
        let entities: Vec<Entity> = (0..10).map(|i| task(&ns, &format!("t{i}"), "A")).collect();
        store.put(&entities).unwrap();
        let results = all(&store, Query::kind(ns, task_kind()).limit(7));
        assert_eq!(results.len(), 7);
    }

    #[test]
    fn query_filters_orders_and_scopes_namespace() {
        let store = InMemoryDatastore::local();
        let a = Namespace::new("Va").unwrap();
        let b = Namespace::new("Vb").unwrap();
        store
            .put(&[
                task(&a, "1", "ACTIVE").with("rank", Value::from(2)),
                task(&a, "2", "DONE").with("rank", Value::from(1)),
                task(&a, "3", "ACTIVE").with("rank", Value::from(3)),
                task(&b, "4", "ACTIVE").with("rank", Value::from(0)),
            ])
            .unwrap();

        let query = Query::kind(a.clone(), task_kind())
            .filter(PropertyFilter::new("status", FilterOp::Equal, Value::from("ACTIVE")))
            .order_by("rank", Direction::Descending);
        let ids: Vec<String> = all(&store, query)
            .into_iter()
            .map(|e| e.key.id().to_string())
            .collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn keys_only_query_strips_properties() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        store.put(&[task(&ns, "a", "ACTIVE")]).unwrap();
        let results = all(&store, Query::kind(ns, task_kind()).keys_only());
        assert!(results[0].properties.is_empty());
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        let store = InMemoryDatastore::local();
        let query = Query::kind(Namespace::empty(), task_kind())
            .start_at(Cursor::from_bytes(vec![1]));
        assert!(matches!(
            store.run_query(&query).unwrap_err(),
            BackendError::InvalidCursor(_)
        ));
    }

    #[test]
    fn query_lag_hides_fresh_writes_from_kind_queries_only() {
        let config = InMemoryConfig {
            query_lag: Duration::from_millis(50),
            ..Default::default()
        };
        let store = InMemoryDatastore::new(config);
        let ns = Namespace::empty();
        let parent = Key::new(ns.clone(), Kind::new("acme.Project").unwrap(), RecordId::name("p").unwrap());
        let child = parent.child(task_kind(), RecordId::name("t").unwrap()).unwrap();
        store.put(&[Entity::new(child.clone())]).unwrap();

        assert!(all(&store, Query::kind(ns.clone(), task_kind())).is_empty());
        assert!(store.lookup(&[child.clone()]).unwrap()[0].is_some());
        let by_ancestor = all(&store, Query::kind(ns.clone(), task_kind()).ancestor(parent));
        assert_eq!(by_ancestor.len(), 1);

        thread::sleep(Duration::from_millis(80));
        assert_eq!(all(&store, Query::kind(ns, task_kind())).len(), 1);
    }

    #[test]
    fn namespaces_lists_populated_partitions() {
        let store = InMemoryDatastore::local();
        let a = Namespace::new("Va").unwrap();
        let b = Namespace::new("Vb").unwrap();
        store.put(&[task(&b, "1", "x"), task(&a, "1", "x")]).unwrap();
        assert_eq!(store.namespaces().unwrap(), vec![a, b]);
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    #[test]
    fn commit_applies_all_mutations() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        store.put(&[task(&ns, "old", "x")]).unwrap();
        let tx = store.begin_transaction().unwrap();
        store
            .commit(
                &tx,
                vec![
                    Mutation::Upsert(task(&ns, "new", "y")),
                    Mutation::Delete(key(&ns, "old")),
                ],
            )
            .unwrap();
        let found = store.lookup(&[key(&ns, "new"), key(&ns, "old")]).unwrap();
        assert!(found[0].is_some());
        assert!(found[1].is_none());
        assert_eq!(store.stats().commits, 1);
    }

    #[test]
    fn finished_transaction_cannot_be_reused() {
        let store = InMemoryDatastore::local();
        let tx = store.begin_transaction().unwrap();
        store.commit(&tx, vec![]).unwrap();
        assert!(matches!(
            store.commit(&tx, vec![]).unwrap_err(),
            BackendError::UnknownTransaction(_)
        ));
        assert!(store.rollback(&tx).is_err());
    }

    #[test]
    fn concurrent_write_to_read_group_conflicts() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        store.put(&[task(&ns, "a", "x")]).unwrap();

        let tx = store.begin_transaction().unwrap();
        store.lookup_in_transaction(&tx, &[key(&ns, "a")]).unwrap();
        store.put(&[task(&ns, "a", "changed")]).unwrap();

        let err = store
            .commit(&tx, vec![Mutation::Upsert(task(&ns, "a", "mine"))])
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict { .. }));
        let current = store.lookup(&[key(&ns, "a")]).unwrap().remove(0).unwrap();
        assert_eq!(current.get("status"), Some(&Value::from("changed")));
    }

    #[test]
    fn transaction_group_limit_is_enforced() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        let mutations: Vec<Mutation> = (0..=MAX_ENTITY_GROUPS_PER_TRANSACTION)
            .map(|i| Mutation::Upsert(task(&ns, &format!("t{i}"), "x")))
            .collect();
        let tx = store.begin_transaction().unwrap();
        let err = store.commit(&tx, mutations).unwrap_err();
        assert!(matches!(err, BackendError::TooManyEntityGroups { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn injected_fault_fails_whole_commit() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        let parent = Key::new(ns.clone(), Kind::new("acme.Project").unwrap(), RecordId::name("p").unwrap());
        store.fail_writes_to_group(&parent);

        let ok = Entity::new(key(&ns, "free"));
        let doomed = Entity::new(parent.child(task_kind(), RecordId::name("t").unwrap()).unwrap());
        let tx = store.begin_transaction().unwrap();
        let err = store
            .commit(&tx, vec![Mutation::Upsert(ok), Mutation::Upsert(doomed)])
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert!(store.is_empty());

        store.clear_faults();
        store.put(&[Entity::new(parent.child(task_kind(), RecordId::name("t").unwrap()).unwrap())]).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stats_count_requests() {
        let store = InMemoryDatastore::local();
        let ns = Namespace::empty();
        store.put(&[task(&ns, "a", "x")]).unwrap();
        store.lookup(&[key(&ns, "a")]).unwrap();
        store.run_query(&Query::kind(ns, task_kind())).unwrap();
        let stats = store.stats();
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.deletes, 0);
    }
}
