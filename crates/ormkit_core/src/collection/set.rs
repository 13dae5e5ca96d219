//! Identity-keyed persistent collection.

use super::core::CollectionCore;
use super::delayed::{DelayedOperation, Slot};
use super::state::CollectionState;
use crate::element::ElementType;
use crate::error::CoreResult;
use std::ops::{Deref, DerefMut};

/// A persistent set: unordered, at most one element per identity.
///
/// While unloaded, `insert` and `remove` are queued whenever the queue or
/// an extra-lazy probe can tell whether the element is already present.
#[derive(Debug)]
pub struct PersistentSet<T: ElementType> {
    core: CollectionCore<T>,
}

impl<T: ElementType> PersistentSet<T> {
    pub(crate) fn from_core(core: CollectionCore<T>) -> Self {
        Self { core }
    }

    /// Number of elements.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn len(&mut self) -> CoreResult<usize> {
        if let Some(size) = self.core.fast_size()? {
            return Ok(size);
        }
        Ok(self.core.contents()?.1.len())
    }

    /// Whether the set is empty.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn is_empty(&mut self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether an element with the same identity is present.
    ///
    /// # Errors
    ///
    /// Returns initialization or probe errors.
    pub fn contains(&mut self, element: &T::Element) -> CoreResult<bool> {
        if self.core.state() == CollectionState::Uninitialized {
            if let Some(found) = self.core.probe_membership(element)? {
                return Ok(found);
            }
        }
        let (element_type, aggregate) = self.core.contents()?;
        Ok(aggregate.as_set()?.contains_key(&element_type.id_of(element)))
    }

    /// The element with identity `id`.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn get(&mut self, id: &T::Id) -> CoreResult<Option<&T::Element>> {
        Ok(self.core.contents()?.1.as_set()?.get(id))
    }

    /// Elements in identity order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn iter(&mut self) -> CoreResult<impl Iterator<Item = &T::Element> + '_> {
        Ok(self.core.contents()?.1.as_set()?.values())
    }

    /// Clones the elements in identity order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn to_vec(&mut self) -> CoreResult<Vec<T::Element>> {
        Ok(self.iter()?.cloned().collect())
    }

    /// Adds `element` unless one with the same identity is present.
    /// Returns whether the set changed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`](crate::CoreError::InvalidOperation)
    /// for a read-only set, or initialization and probe errors.
    pub fn insert(&mut self, element: T::Element) -> CoreResult<bool> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            match self.core.probe_membership(&element)? {
                Some(true) => return Ok(false),
                Some(false) => {
                    self.core.enqueue(DelayedOperation::Add {
                        slot: Slot::Unordered,
                        value: element,
                    });
                    return Ok(true);
                }
                None => {}
            }
        }
        let (element_type, aggregate) = self.core.contents_mut()?;
        let id = element_type.id_of(&element);
        let items = aggregate.as_set_mut()?;
        if items.contains_key(&id) {
            return Ok(false);
        }
        items.insert(id, element);
        self.core.mark_dirty();
        Ok(true)
    }

    /// Removes the element with the same identity. Returns whether the set
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`](crate::CoreError::InvalidOperation)
    /// for a read-only set, or initialization and probe errors.
    pub fn remove(&mut self, element: &T::Element) -> CoreResult<bool> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            match self.core.probe_membership(element)? {
                Some(true) => {
                    self.core.enqueue(DelayedOperation::Remove {
                        slot: Slot::Unordered,
                        value: element.clone(),
                    });
                    return Ok(true);
                }
                Some(false) => return Ok(false),
                None => {}
            }
        }
        let (element_type, aggregate) = self.core.contents_mut()?;
        let id = element_type.id_of(element);
        if aggregate.as_set_mut()?.remove(&id).is_none() {
            return Ok(false);
        }
        self.core.mark_dirty();
        Ok(true)
    }

    /// Removes every element, queueing the clear if the set is not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`](crate::CoreError::InvalidOperation)
    /// for a read-only set, or initialization errors.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            self.core.enqueue(DelayedOperation::Clear);
            return Ok(());
        }
        let items = self.core.contents_mut()?.1.as_set_mut()?;
        if !items.is_empty() {
            items.clear();
            self.core.mark_dirty();
        }
        Ok(())
    }

    /// Keeps only the elements for which `keep` returns true.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn retain<F: FnMut(&T::Element) -> bool>(&mut self, mut keep: F) -> CoreResult<()> {
        let items = self.core.contents_mut()?.1.as_set_mut()?;
        let before = items.len();
        items.retain(|_, element| keep(element));
        if items.len() != before {
            self.core.mark_dirty();
        }
        Ok(())
    }
}

impl<T: ElementType> Deref for PersistentSet<T> {
    type Target = CollectionCore<T>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<T: ElementType> DerefMut for PersistentSet<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}
