//! Snapshot diff engine.
//!
//! Compares a collection's current contents with the snapshot taken when
//! it was loaded and describes the per-element row work a persister must
//! do. A persister applies a [`ChangeSet`] in field order: truncate, then
//! deletions, then updates, then insertions.
//!
//! Shape rules:
//!
//! - **Sequence**: compared slot by slot. A slot that is null on one side
//!   and filled on the other is a deletion or insertion, never an update.
//! - **Set**: compared by identity. Sets have no updates; an element whose
//!   value changed is deleted and re-inserted.
//! - **Keyed**: compared key by key.

use super::aggregate::Aggregate;
use super::delayed::{DelayedOperation, Slot};
use crate::element::{ElementType, Scalar};
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeSet;

/// An element at a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementChange<E, K> {
    /// Position of the row.
    pub slot: Slot<K>,
    /// The element inserted or deleted.
    pub element: E,
}

/// An element whose stored row must be rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementUpdate<E, K> {
    /// Position of the row.
    pub slot: Slot<K>,
    /// The stored element.
    pub previous: E,
    /// The element to store.
    pub element: E,
}

/// Row work for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<E, K> {
    /// Delete every stored row before anything else.
    pub truncate: bool,
    /// Rows to delete.
    pub deletions: Vec<ElementChange<E, K>>,
    /// Rows to rewrite.
    pub updates: Vec<ElementUpdate<E, K>>,
    /// Rows to insert.
    pub insertions: Vec<ElementChange<E, K>>,
    /// Removed dependents to cascade-delete. Filled only for roles with
    /// orphan delete.
    pub orphans: Vec<E>,
}

impl<E, K> Default for ChangeSet<E, K> {
    fn default() -> Self {
        Self {
            truncate: false,
            deletions: Vec::new(),
            updates: Vec::new(),
            insertions: Vec::new(),
            orphans: Vec::new(),
        }
    }
}

impl<E, K> ChangeSet<E, K> {
    /// Whether there is no row work.
    pub fn is_empty(&self) -> bool {
        !self.truncate && self.deletions.is_empty() && self.updates.is_empty() && self.insertions.is_empty()
    }
}

/// Whether `current` holds exactly what `snapshot` holds.
///
/// Never mutates either side.
pub fn equals_snapshot<T: ElementType, K: Scalar>(
    element_type: &T,
    snapshot: &Aggregate<T, K>,
    current: &Aggregate<T, K>,
) -> bool {
    match (snapshot, current) {
        (Aggregate::Sequence(old), Aggregate::Sequence(new)) => {
            old.len() == new.len()
                && old.iter().zip(new).all(|pair| match pair {
                    (None, None) => true,
                    (Some(o), Some(n)) => !element_type.is_dirty(n, o),
                    _ => false,
                })
        }
        (Aggregate::Set(old), Aggregate::Set(new)) => {
            old.len() == new.len()
                && new
                    .iter()
                    .all(|(id, n)| old.get(id).is_some_and(|o| !element_type.is_dirty(n, o)))
        }
        (Aggregate::Keyed(old), Aggregate::Keyed(new)) => {
            old.len() == new.len()
                && new
                    .iter()
                    .all(|(k, n)| old.get(k).is_some_and(|o| !element_type.is_dirty(n, o)))
        }
        _ => false,
    }
}

/// Computes the row work that turns `snapshot` into `current`.
///
/// Without a snapshot the collection is recreated: `truncate` is set and
/// every element is inserted.
///
/// # Errors
///
/// Returns [`CoreError::InvariantViolation`] if the two sides have
/// different shapes.
pub fn diff<T: ElementType, K: Scalar>(
    element_type: &T,
    snapshot: Option<&Aggregate<T, K>>,
    current: &Aggregate<T, K>,
    collect_orphans: bool,
) -> CoreResult<ChangeSet<T::Element, K>> {
    let Some(snapshot) = snapshot else {
        return Ok(recreate(current));
    };
    let mut changes = ChangeSet::default();

    match (snapshot, current) {
        (Aggregate::Sequence(old), Aggregate::Sequence(new)) => {
            for index in 0..old.len().max(new.len()) {
                let o = old.get(index).and_then(Option::as_ref);
                let n = new.get(index).and_then(Option::as_ref);
                match (o, n) {
                    (Some(o), None) => changes.deletions.push(ElementChange {
                        slot: Slot::Index(index),
                        element: o.clone(),
                    }),
                    (None, Some(n)) => changes.insertions.push(ElementChange {
                        slot: Slot::Index(index),
                        element: n.clone(),
                    }),
                    (Some(o), Some(n)) if element_type.is_dirty(n, o) => {
                        changes.updates.push(ElementUpdate {
                            slot: Slot::Index(index),
                            previous: o.clone(),
                            element: n.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        (Aggregate::Set(old), Aggregate::Set(new)) => {
            for (id, o) in old {
                if !new.contains_key(id) {
                    changes.deletions.push(ElementChange {
                        slot: Slot::Unordered,
                        element: o.clone(),
                    });
                }
            }
            for (id, n) in new {
                match old.get(id) {
                    None => changes.insertions.push(ElementChange {
                        slot: Slot::Unordered,
                        element: n.clone(),
                    }),
                    Some(o) if element_type.is_dirty(n, o) => {
                        changes.deletions.push(ElementChange {
                            slot: Slot::Unordered,
                            element: o.clone(),
                        });
                        changes.insertions.push(ElementChange {
                            slot: Slot::Unordered,
                            element: n.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        (Aggregate::Keyed(old), Aggregate::Keyed(new)) => {
            for (key, o) in old {
                if !new.contains_key(key) {
                    changes.deletions.push(ElementChange {
                        slot: Slot::Key(key.clone()),
                        element: o.clone(),
                    });
                }
            }
            for (key, n) in new {
                match old.get(key) {
                    None => changes.insertions.push(ElementChange {
                        slot: Slot::Key(key.clone()),
                        element: n.clone(),
                    }),
                    Some(o) if element_type.is_dirty(n, o) => changes.updates.push(ElementUpdate {
                        slot: Slot::Key(key.clone()),
                        previous: o.clone(),
                        element: n.clone(),
                    }),
                    Some(_) => {}
                }
            }
        }
        (old, new) => {
            return Err(CoreError::invariant_violation(format!(
                "snapshot is a {} but contents are a {}",
                old.shape(),
                new.shape()
            )));
        }
    }

    if collect_orphans {
        changes.orphans = orphans(element_type, snapshot, current);
    }
    Ok(changes)
}

/// Snapshot elements whose identity no longer appears in `current`.
pub fn orphans<T: ElementType, K: Scalar>(
    element_type: &T,
    snapshot: &Aggregate<T, K>,
    current: &Aggregate<T, K>,
) -> Vec<T::Element> {
    let live: BTreeSet<T::Id> = current.elements().map(|e| element_type.id_of(e)).collect();
    let mut seen = BTreeSet::new();
    snapshot
        .elements()
        .filter(|e| {
            let id = element_type.id_of(e);
            !live.contains(&id) && seen.insert(id)
        })
        .cloned()
        .collect()
}

fn recreate<T: ElementType, K: Scalar>(current: &Aggregate<T, K>) -> ChangeSet<T::Element, K> {
    let insertions = match current {
        Aggregate::Sequence(items) => items
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|e| ElementChange {
                    slot: Slot::Index(index),
                    element: e.clone(),
                })
            })
            .collect(),
        Aggregate::Set(items) => items
            .values()
            .map(|e| ElementChange {
                slot: Slot::Unordered,
                element: e.clone(),
            })
            .collect(),
        Aggregate::Keyed(items) => items
            .iter()
            .map(|(k, e)| ElementChange {
                slot: Slot::Key(k.clone()),
                element: e.clone(),
            })
            .collect(),
    };
    ChangeSet {
        truncate: true,
        insertions,
        ..ChangeSet::default()
    }
}

/// Builds row work from queued operations alone, without loading.
///
/// The operations were only queued when their effect was knowable, so the
/// result is exact:
///
/// - `Clear` truncates and discards earlier work
/// - an add becomes an insertion
/// - a set or map remove cancels a pending insertion of the same element;
///   otherwise it deletes the stored row
/// - a replace rewrites a pending insertion or update, or becomes an update
///
/// Orphans are the stored elements the queue displaced, minus any the
/// queue itself added back.
pub fn from_queue<T: ElementType, K: Scalar>(
    element_type: &T,
    queue: &[DelayedOperation<T::Element, K>],
    collect_orphans: bool,
) -> ChangeSet<T::Element, K> {
    let mut changes: ChangeSet<T::Element, K> = ChangeSet::default();
    let mut displaced: Vec<T::Element> = Vec::new();
    let same = |a: &ElementChange<T::Element, K>, slot: &Slot<K>, e: &T::Element| match slot {
        Slot::Key(_) => a.slot == *slot,
        _ => a.slot == *slot && element_type.id_of(&a.element) == element_type.id_of(e),
    };

    for op in queue {
        match op {
            DelayedOperation::Clear => {
                changes.truncate = true;
                changes.deletions.clear();
                changes.updates.clear();
                changes.insertions.clear();
            }
            DelayedOperation::Add { slot, value } => changes.insertions.push(ElementChange {
                slot: slot.clone(),
                element: value.clone(),
            }),
            DelayedOperation::Remove { slot, value } => {
                // Sequence removes are only queued for elements no earlier
                // queued operation touched, so they never cancel anything.
                // A cancelled insertion never reached storage.
                if let Some(pos) = changes.insertions.iter().rposition(|c| same(c, slot, value)) {
                    changes.insertions.remove(pos);
                    continue;
                }
                let previous = changes
                    .updates
                    .iter()
                    .rposition(|u| matches!(slot, Slot::Key(_)) && u.slot == *slot)
                    .map(|pos| changes.updates.remove(pos).previous);
                let element = previous.unwrap_or_else(|| value.clone());
                displaced.push(element.clone());
                if !changes.truncate {
                    changes.deletions.push(ElementChange {
                        slot: slot.clone(),
                        element,
                    });
                }
            }
            DelayedOperation::Replace { slot, old, new } => {
                if let Some(pos) = changes.insertions.iter().rposition(|c| same(c, slot, old)) {
                    changes.insertions[pos].element = new.clone();
                } else if let Some(pos) = changes.updates.iter().rposition(|u| u.slot == *slot) {
                    changes.updates[pos].element = new.clone();
                } else {
                    displaced.push(old.clone());
                    changes.updates.push(ElementUpdate {
                        slot: slot.clone(),
                        previous: old.clone(),
                        element: new.clone(),
                    });
                }
            }
        }
    }

    if collect_orphans {
        changes.orphans = queue_orphans(element_type, &changes, displaced);
    }
    changes
}

/// Displaced elements whose identity the change set does not write back.
fn queue_orphans<T: ElementType, K: Scalar>(
    element_type: &T,
    changes: &ChangeSet<T::Element, K>,
    displaced: Vec<T::Element>,
) -> Vec<T::Element> {
    let kept: BTreeSet<T::Id> = changes
        .insertions
        .iter()
        .map(|c| element_type.id_of(&c.element))
        .chain(changes.updates.iter().map(|u| element_type.id_of(&u.element)))
        .collect();
    let mut seen = BTreeSet::new();
    displaced
        .into_iter()
        .filter(|e| {
            let id = element_type.id_of(e);
            !kept.contains(&id) && seen.insert(id)
        })
        .collect()
}
