use std::fmt;
use std::sync::Arc;

use docstore_backend::Key;
use docstore_types::{Kind, Namespace, RecordId};

use crate::error::StorageResult;

/// Strategy that turns a record id into a backend key.
///
/// Implementations must be deterministic and free of side effects: the same
/// `(namespace, kind, id)` always yields the same key.
pub trait KeyLayout: Send + Sync + fmt::Debug {
    /// Short name of the layout family.
    fn name(&self) -> &str;

    /// Identity used to detect conflicting layouts for one kind: the name
    /// plus the ancestor kind, if any.
    fn identity(&self) -> String {
        match self.ancestor_kind() {
            Some(kind) => format!("{}({kind})", self.name()),
            None => self.name().to_string(),
        }
    }

    /// Key of the record `id` of `kind` in `namespace`.
    fn key_for(&self, namespace: &Namespace, kind: &Kind, id: &RecordId) -> StorageResult<Key>;

    /// Kind of the ancestor entity, for layouts that group records.
    fn ancestor_kind(&self) -> Option<&Kind> {
        None
    }

    /// Key of the entity group holding the records of `ancestor`.
    fn group_key(&self, namespace: &Namespace, ancestor: &RecordId) -> Option<Key> {
        self.ancestor_kind()
            .map(|kind| Key::new(namespace.clone(), kind.clone(), ancestor.clone()))
    }
}

/// Every record is its own entity group.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatLayout;

impl KeyLayout for FlatLayout {
    fn name(&self) -> &str {
        "flat"
    }

    fn key_for(&self, namespace: &Namespace, kind: &Kind, id: &RecordId) -> StorageResult<Key> {
        Ok(Key::new(namespace.clone(), kind.clone(), id.clone()))
    }
}

type AncestorFn = dyn Fn(&RecordId) -> RecordId + Send + Sync;

/// Records are children of an ancestor entity derived from their id.
///
/// Records sharing an ancestor form one entity group and can be written in
/// one transaction.
#[derive(Clone)]
pub struct AncestorLayout {
    ancestor_kind: Kind,
    ancestor_of: Arc<AncestorFn>,
}

impl AncestorLayout {
    pub fn new(
        ancestor_kind: Kind,
        ancestor_of: impl Fn(&RecordId) -> RecordId + Send + Sync + 'static,
    ) -> Self {
        Self {
            ancestor_kind,
            ancestor_of: Arc::new(ancestor_of),
        }
    }

    /// Ancestor id of the record `id`.
    pub fn ancestor_of(&self, id: &RecordId) -> RecordId {
        (self.ancestor_of)(id)
    }
}

impl fmt::Debug for AncestorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AncestorLayout")
            .field("ancestor_kind", &self.ancestor_kind)
            .finish_non_exhaustive()
    }
}

impl KeyLayout for AncestorLayout {
    fn name(&self) -> &str {
        "ancestor"
    }

    fn key_for(&self, namespace: &Namespace, kind: &Kind, id: &RecordId) -> StorageResult<Key> {
        let parent = Key::new(
            namespace.clone(),
            self.ancestor_kind.clone(),
            self.ancestor_of(id),
        );
        Ok(parent.child(kind.clone(), id.clone())?)
    }

    fn ancestor_kind(&self) -> Option<&Kind> {
        Some(&self.ancestor_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Kind {
        Kind::new("test.Task").unwrap()
    }

    fn by_prefix() -> AncestorLayout {
        AncestorLayout::new(Kind::new("test.Project").unwrap(), |id| {
            let text = id.to_string();
            let prefix = text.split_once('-').map_or(text.as_str(), |(p, _)| p);
            RecordId::Name(prefix.to_string())
        })
    }

    #[test]
    fn flat_key_has_no_parent() {
        let id = RecordId::name("t-1").unwrap();
        let key = FlatLayout.key_for(&Namespace::empty(), &task(), &id).unwrap();
        assert!(key.parent().is_none());
        assert_eq!(key.id(), &id);
        assert!(FlatLayout.ancestor_kind().is_none());
    }

    #[test]
    fn identity_includes_the_ancestor_kind() {
        assert_eq!(FlatLayout.identity(), "flat");
        assert_eq!(by_prefix().identity(), "ancestor(test.Project)");
        let other = AncestorLayout::new(Kind::new("test.Team").unwrap(), |id| id.clone());
        assert_ne!(by_prefix().identity(), other.identity());
    }

    #[test]
    fn ancestor_key_is_deterministic() {
        let layout = by_prefix();
        let id = RecordId::name("a-1").unwrap();
        let k1 = layout.key_for(&Namespace::empty(), &task(), &id).unwrap();
        let k2 = layout.key_for(&Namespace::empty(), &task(), &id).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.root().id(), &RecordId::name("a").unwrap());
        assert_eq!(k1.root().kind().as_str(), "test.Project");
    }

    #[test]
    fn shared_ancestor_means_shared_group() {
        let layout = by_prefix();
        let ns = Namespace::empty();
        let a1 = layout.key_for(&ns, &task(), &RecordId::name("a-1").unwrap()).unwrap();
        let a2 = layout.key_for(&ns, &task(), &RecordId::name("a-2").unwrap()).unwrap();
        let b1 = layout.key_for(&ns, &task(), &RecordId::name("b-1").unwrap()).unwrap();
        assert_eq!(a1.root(), a2.root());
        assert_ne!(a1.root(), b1.root());
        assert_eq!(
            layout.group_key(&ns, &RecordId::name("a").unwrap()).as_ref(),
            Some(a1.root())
        );
    }

    #[test]
    fn ancestor_kind_equal_to_record_kind_is_rejected() {
        let layout = AncestorLayout::new(task(), |id| id.clone());
        let id = RecordId::name("t-1").unwrap();
        assert!(layout.key_for(&Namespace::empty(), &task(), &id).is_err());
    }
}
