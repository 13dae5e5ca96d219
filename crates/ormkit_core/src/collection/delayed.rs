//! Delayed operations recorded against unloaded collections.

use super::aggregate::Aggregate;
use crate::element::{ElementType, Scalar};
use crate::error::{CoreError, CoreResult};

/// Where an element sits in its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot<K> {
    /// No position (set elements, appended or value-removed list elements).
    Unordered,
    /// A list index.
    Index(usize),
    /// A map key.
    Key(K),
}

/// A mutation recorded while the collection was not loaded.
///
/// Operations are plain data; [`DelayedOperation::apply`] interprets them
/// against an aggregate once the contents are available.
#[derive(Debug, Clone, PartialEq)]
pub enum DelayedOperation<E, K> {
    /// Remove every element.
    Clear,
    /// Add `value` at `slot`.
    Add {
        /// Target position.
        slot: Slot<K>,
        /// Element introduced.
        value: E,
    },
    /// Remove `value` from `slot`.
    Remove {
        /// Target position.
        slot: Slot<K>,
        /// Element displaced.
        value: E,
    },
    /// Replace `old` with `new` at `slot`.
    Replace {
        /// Target position.
        slot: Slot<K>,
        /// Element expected at `slot`.
        old: E,
        /// Element written.
        new: E,
    },
}

impl<E, K> DelayedOperation<E, K> {
    /// The element this operation introduces, for cascade-persist.
    pub fn added_instance(&self) -> Option<&E> {
        match self {
            Self::Add { value, .. } => Some(value),
            Self::Replace { new, .. } => Some(new),
            Self::Clear | Self::Remove { .. } => None,
        }
    }

    /// The element this operation displaces, for cascade-delete.
    pub fn orphan(&self) -> Option<&E> {
        match self {
            Self::Remove { value, .. } => Some(value),
            Self::Replace { old, .. } => Some(old),
            Self::Clear | Self::Add { .. } => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
        }
    }
}

impl<E: Clone, K: Scalar> DelayedOperation<E, K> {
    /// Applies this operation to loaded contents.
    ///
    /// Sequence adds without an index append. Set adds keep an element that
    /// is already present. Removing an absent element does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] if the slot does not fit the
    /// shape, an index is out of range, or a replace finds something other
    /// than its expected old value.
    pub fn apply<T>(&self, element_type: &T, aggregate: &mut Aggregate<T, K>) -> CoreResult<()>
    where
        T: ElementType<Element = E>,
    {
        match (self, aggregate) {
            (Self::Clear, aggregate) => aggregate.clear(),

            (Self::Add { slot, value }, Aggregate::Sequence(items)) => match slot {
                Slot::Unordered => items.push(Some(value.clone())),
                Slot::Index(index) if *index <= items.len() => items.insert(*index, Some(value.clone())),
                other => return Err(misplaced("add", other, items.len())),
            },
            (Self::Add { slot: Slot::Unordered, value }, Aggregate::Set(items)) => {
                items
                    .entry(element_type.id_of(value))
                    .or_insert_with(|| value.clone());
            }
            (Self::Add { slot: Slot::Key(key), value }, Aggregate::Keyed(items)) => {
                items.insert(key.clone(), value.clone());
            }

            (Self::Remove { slot, value }, Aggregate::Sequence(items)) => match slot {
                Slot::Unordered => {
                    let id = element_type.id_of(value);
                    if let Some(pos) = items
                        .iter()
                        .position(|e| e.as_ref().is_some_and(|e| element_type.id_of(e) == id))
                    {
                        items.remove(pos);
                    }
                }
                Slot::Index(index) if *index < items.len() => {
                    items.remove(*index);
                }
                other => return Err(misplaced("remove", other, items.len())),
            },
            (Self::Remove { slot: Slot::Unordered, value }, Aggregate::Set(items)) => {
                items.remove(&element_type.id_of(value));
            }
            (Self::Remove { slot: Slot::Key(key), .. }, Aggregate::Keyed(items)) => {
                items.remove(key);
            }

            (Self::Replace { slot: Slot::Index(index), old, new }, Aggregate::Sequence(items)) => {
                let current = items.get_mut(*index).and_then(Option::as_mut);
                *expect_old(element_type, current, old)? = new.clone();
            }
            (Self::Replace { slot: Slot::Unordered, old, new }, Aggregate::Set(items)) => {
                let old_id = element_type.id_of(old);
                expect_old(element_type, items.get_mut(&old_id), old)?;
                items.remove(&old_id);
                items.insert(element_type.id_of(new), new.clone());
            }
            (Self::Replace { slot: Slot::Key(key), old, new }, Aggregate::Keyed(items)) => {
                *expect_old(element_type, items.get_mut(key), old)? = new.clone();
            }

            (op, aggregate) => {
                return Err(CoreError::invariant_violation(format!(
                    "{} operation does not fit a {} collection",
                    op.kind(),
                    aggregate.shape()
                )));
            }
        }
        Ok(())
    }
}

fn misplaced<K: std::fmt::Debug>(kind: &str, slot: &Slot<K>, len: usize) -> CoreError {
    CoreError::invariant_violation(format!(
        "queued {kind} at {slot:?} does not fit a sequence of length {len}"
    ))
}

fn expect_old<'e, T: ElementType>(
    element_type: &T,
    current: Option<&'e mut T::Element>,
    old: &T::Element,
) -> CoreResult<&'e mut T::Element> {
    match current {
        Some(current) if element_type.id_of(current) == element_type.id_of(old) && !element_type.is_dirty(current, old) => {
            Ok(current)
        }
        Some(current) => Err(CoreError::invariant_violation(format!(
            "queued replace expected {old:?}, found {current:?}"
        ))),
        None => Err(CoreError::invariant_violation(format!(
            "queued replace expected {old:?}, found nothing"
        ))),
    }
}
