use docstore_backend::{Entity, Key, Mutation, TransactionId};

use crate::error::ClientResult;
use crate::wrapper::DatastoreWrapper;

/// An open backend transaction handed to a unit of work.
///
/// Reads go to the backend immediately and enlist the entity groups they
/// touch in the transaction's conflict check. Writes are staged and sent in
/// one commit when the unit of work succeeds. Staged writes are not visible
/// to reads made through the same transaction.
pub struct TransactionWrapper<'a> {
    wrapper: &'a DatastoreWrapper,
    id: TransactionId,
    mutations: Vec<Mutation>,
}

impl<'a> TransactionWrapper<'a> {
    pub(crate) fn new(wrapper: &'a DatastoreWrapper, id: TransactionId) -> Self {
        Self {
            wrapper,
            id,
            mutations: Vec::new(),
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// Read one entity within the transaction.
    pub fn get(&self, key: &Key) -> ClientResult<Option<Entity>> {
        let mut found = self.lookup(std::slice::from_ref(key))?;
        Ok(found.pop().flatten())
    }

    /// Read entities in request order; missing entities are `None`.
    pub fn lookup(&self, keys: &[Key]) -> ClientResult<Vec<Option<Entity>>> {
        self.wrapper.ensure_open()?;
        Ok(self
            .wrapper
            .datastore()
            .lookup_in_transaction(&self.id, keys)?)
    }

    /// Stage an upsert; applied on commit.
    pub fn put(&mut self, entity: Entity) {
        self.mutations.push(Mutation::Upsert(entity));
    }

    pub fn put_all(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.mutations
            .extend(entities.into_iter().map(Mutation::Upsert));
    }

    /// Stage a delete; applied on commit.
    pub fn delete(&mut self, key: Key) {
        self.mutations.push(Mutation::Delete(key));
    }

    /// Number of staged mutations.
    pub fn pending(&self) -> usize {
        self.mutations.len()
    }

    pub(crate) fn into_parts(self) -> (TransactionId, Vec<Mutation>) {
        (self.id, self.mutations)
    }
}
