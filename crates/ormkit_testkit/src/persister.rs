//! A persister that writes into an [`InMemoryStore`].

use crate::fixtures::{InMemoryStore, RowWork};
use ormkit_core::{
    ChangeSet, CollectionPersister, CoreError, CoreResult, ElementType, EntityId, Role, RoleDescriptor, RowSlot,
    Scalar, Slot,
};
use std::sync::Arc;

/// One recorded persister call.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedWork {
    /// Owner entity.
    pub owner: EntityId,
    /// Collection role.
    pub role: Role,
    /// Externalized row work.
    pub work: RowWork,
    /// Number of orphans reported.
    pub orphans: usize,
}

/// Externalizes change sets, records them and applies them to a store.
#[derive(Debug)]
pub struct StorePersister {
    store: Arc<InMemoryStore>,
    applied: Vec<AppliedWork>,
    fail_next: bool,
}

impl StorePersister {
    /// A persister writing into `store`.
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            applied: Vec::new(),
            fail_next: false,
        }
    }

    /// Makes the next call fail with `SourceUnavailable` without writing.
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    /// Every successful call, oldest first.
    pub fn applied(&self) -> &[AppliedWork] {
        &self.applied
    }

    /// The most recent successful call.
    pub fn last(&self) -> Option<&AppliedWork> {
        self.applied.last()
    }

    /// Number of successful calls.
    pub fn call_count(&self) -> usize {
        self.applied.len()
    }
}

fn row_slot<K: Scalar>(slot: &Slot<K>) -> RowSlot {
    match slot {
        Slot::Unordered => RowSlot::Unordered,
        Slot::Index(index) => RowSlot::Index(*index),
        Slot::Key(key) => RowSlot::Key(key.to_value()),
    }
}

impl<T: ElementType, K: Scalar> CollectionPersister<T, K> for StorePersister {
    fn apply(
        &mut self,
        owner: EntityId,
        descriptor: &RoleDescriptor<T>,
        changes: &ChangeSet<T::Element, K>,
    ) -> CoreResult<()> {
        if std::mem::take(&mut self.fail_next) {
            return Err(CoreError::source_unavailable("injected persister failure"));
        }
        let element_type = descriptor.element_type();
        let externalize = |slot: &Slot<K>, element: &T::Element| -> CoreResult<(RowSlot, ormkit_codec::Value)> {
            Ok((row_slot(slot), element_type.externalize(element)?))
        };
        let work = RowWork {
            truncate: changes.truncate,
            deletions: changes
                .deletions
                .iter()
                .map(|c| externalize(&c.slot, &c.element))
                .collect::<CoreResult<_>>()?,
            updates: changes
                .updates
                .iter()
                .map(|u| externalize(&u.slot, &u.element))
                .collect::<CoreResult<_>>()?,
            insertions: changes
                .insertions
                .iter()
                .map(|c| externalize(&c.slot, &c.element))
                .collect::<CoreResult<_>>()?,
        };
        self.store.apply(owner, descriptor.role(), descriptor.shape(), &work);
        tracing::debug!(
            role = %descriptor.role(),
            owner = %owner,
            rows = work.row_count(),
            truncate = work.truncate,
            "row work applied"
        );
        self.applied.push(AppliedWork {
            owner,
            role: descriptor.role().clone(),
            work,
            orphans: changes.orphans.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::StoredRows;
    use ormkit_codec::Value;
    use ormkit_core::{ElementChange, ShapeKind, TextType};

    #[test]
    fn applies_and_records() {
        let store = Arc::new(InMemoryStore::new());
        let mut persister = StorePersister::new(store.clone());
        let descriptor = RoleDescriptor::new("Post.tags", ShapeKind::Set, TextType::new());
        let owner = EntityId::new();
        let changes: ChangeSet<String, ormkit_core::Unkeyed> = ChangeSet {
            insertions: vec![ElementChange {
                slot: Slot::Unordered,
                element: "rust".to_string(),
            }],
            ..ChangeSet::default()
        };

        persister.apply(owner, &descriptor, &changes).unwrap();
        assert_eq!(persister.call_count(), 1);
        assert_eq!(
            store.rows(owner, descriptor.role()),
            Some(StoredRows::Set(vec![Value::from("rust")]))
        );
    }

    #[test]
    fn injected_failure_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let mut persister = StorePersister::new(store.clone());
        persister.fail_next();
        let descriptor = RoleDescriptor::new("Post.tags", ShapeKind::Set, TextType::new());
        let changes: ChangeSet<String, ormkit_core::Unkeyed> = ChangeSet {
            truncate: true,
            ..ChangeSet::default()
        };
        let owner = EntityId::new();
        assert!(persister.apply(owner, &descriptor, &changes).is_err());
        assert!(store.rows(owner, descriptor.role()).is_none());
        assert!(persister.apply(owner, &descriptor, &changes).is_ok());
    }
}
