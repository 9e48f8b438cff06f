use std::fmt;

use docstore_types::{Kind, Namespace, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// Backend identifier of an entity.
///
/// A key is `(namespace, kind, id)` plus an optional parent key. A key
/// without a parent is *flat*. The root of a parent chain names the entity
/// group the key belongs to; transactions are bounded by entity groups.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    namespace: Namespace,
    kind: Kind,
    id: RecordId,
    parent: Option<Box<Key>>,
}

impl Key {
    /// A flat key.
    pub fn new(namespace: Namespace, kind: Kind, id: RecordId) -> Self {
        Self {
            namespace,
            kind,
            id,
            parent: None,
        }
    }

    /// A child key of `self`.
    ///
    /// The child must have a kind distinct from its parent; the namespace is
    /// inherited.
    pub fn child(&self, kind: Kind, id: RecordId) -> BackendResult<Key> {
        if kind == self.kind {
            return Err(BackendError::InvalidKey(format!(
                "child kind {kind} equals its parent's kind"
            )));
        }
        Ok(Key {
            namespace: self.namespace.clone(),
            kind,
            id,
            parent: Some(Box::new(self.clone())),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// Root of the parent chain: the key naming this key's entity group.
    pub fn root(&self) -> &Key {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Returns `true` if `ancestor` appears in this key's parent chain.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        let mut current = self.parent();
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = key.parent();
        }
        false
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent() {
            Some(parent) => write!(f, "{parent}/{}:{}", self.kind, self.id),
            None => write!(f, "[{}] {}:{}", self.namespace, self.kind, self.id),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}
