//! Index-ordered persistent collection.

use super::core::CollectionCore;
use super::delayed::{DelayedOperation, Slot};
use super::state::CollectionState;
use crate::element::ElementType;
use crate::error::{CoreError, CoreResult};
use std::ops::{Deref, DerefMut};

/// A persistent list: index-ordered slots that may be null.
///
/// Appends, value removals and `clear` are queued while the list is not
/// loaded. Everything positional loads it first.
#[derive(Debug)]
pub struct PersistentList<T: ElementType> {
    core: CollectionCore<T>,
}

impl<T: ElementType> PersistentList<T> {
    pub(crate) fn from_core(core: CollectionCore<T>) -> Self {
        Self { core }
    }

    /// Number of slots, nulls included.
    ///
    /// Answered from a prefetched or probed size when the list is unloaded
    /// and nothing is queued.
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

    /// Whether the list has no slots.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn is_empty(&mut self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The element at `index`; `None` for a null slot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Bounds`] if `index` is past the end.
    pub fn get(&mut self, index: usize) -> CoreResult<Option<&T::Element>> {
        let items = self.core.contents()?.1.as_sequence()?;
        items
            .get(index)
            .map(Option::as_ref)
            .ok_or_else(|| CoreError::bounds(index, items.len()))
    }

    /// Whether an element with the same identity is present.
    ///
    /// An unloaded list answers from its queue or, when extra-lazy, from an
    /// existence probe.
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
        Ok(self.index_of(element)?.is_some())
    }

    /// Index of the first element with the same identity.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn index_of(&mut self, element: &T::Element) -> CoreResult<Option<usize>> {
        let (element_type, aggregate) = self.core.contents()?;
        let id = element_type.id_of(element);
        Ok(aggregate
            .as_sequence()?
            .iter()
            .position(|e| e.as_ref().is_some_and(|e| element_type.id_of(e) == id)))
    }

    /// Non-null elements in index order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn iter(&mut self) -> CoreResult<impl Iterator<Item = &T::Element> + '_> {
        Ok(self.core.contents()?.1.as_sequence()?.iter().flatten())
    }

    /// All slots in index order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn slots(&mut self) -> CoreResult<&[Option<T::Element>]> {
        Ok(self.core.contents()?.1.as_sequence()?.as_slice())
    }

    /// Clones the non-null elements.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn to_vec(&mut self) -> CoreResult<Vec<T::Element>> {
        Ok(self.iter()?.cloned().collect())
    }

    /// Appends `element`, queueing it if the list is not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a read-only list, or
    /// initialization errors.
    pub fn push(&mut self, element: T::Element) -> CoreResult<()> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            self.core.enqueue(DelayedOperation::Add {
                slot: Slot::Unordered,
                value: element,
            });
            return Ok(());
        }
        self.core.contents_mut()?.1.as_sequence_mut()?.push(Some(element));
        self.core.mark_dirty();
        Ok(())
    }

    /// Appends every element in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing append.
    pub fn extend<I: IntoIterator<Item = T::Element>>(&mut self, elements: I) -> CoreResult<()> {
        elements.into_iter().try_for_each(|e| self.push(e))
    }

    /// Inserts `element` at `index`, shifting later slots.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Bounds`] if `index` is past the end.
    pub fn insert(&mut self, index: usize, element: T::Element) -> CoreResult<()> {
        let items = self.core.contents_mut()?.1.as_sequence_mut()?;
        if index > items.len() {
            return Err(CoreError::bounds(index, items.len()));
        }
        items.insert(index, Some(element));
        self.core.mark_dirty();
        Ok(())
    }

    /// Replaces the slot at `index`, returning its previous element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Bounds`] if `index` is past the end.
    pub fn set(&mut self, index: usize, element: T::Element) -> CoreResult<Option<T::Element>> {
        self.replace_slot(index, Some(element))
    }

    /// Empties the slot at `index`, returning its previous element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Bounds`] if `index` is past the end.
    pub fn set_null(&mut self, index: usize) -> CoreResult<Option<T::Element>> {
        self.replace_slot(index, None)
    }

    /// Removes the slot at `index`, returning its element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Bounds`] if `index` is past the end. The list is
    /// left unchanged.
    pub fn remove_at(&mut self, index: usize) -> CoreResult<Option<T::Element>> {
        let items = self.core.contents_mut()?.1.as_sequence_mut()?;
        if index >= items.len() {
            return Err(CoreError::bounds(index, items.len()));
        }
        let removed = items.remove(index);
        self.core.mark_dirty();
        Ok(removed)
    }

    /// Removes the first element with the same identity as `element`.
    ///
    /// While unloaded the removal is queued if the element is known to be
    /// present; an absent element is a no-op either way.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a read-only list, or
    /// initialization and probe errors.
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
        let items = aggregate.as_sequence_mut()?;
        let id = element_type.id_of(element);
        let Some(position) = items
            .iter()
            .position(|e| e.as_ref().is_some_and(|e| element_type.id_of(e) == id))
        else {
            return Ok(false);
        };
        items.remove(position);
        self.core.mark_dirty();
        Ok(true)
    }

    /// Removes every slot, queueing the clear if the list is not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for a read-only list, or
    /// initialization errors.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            self.core.enqueue(DelayedOperation::Clear);
            return Ok(());
        }
        let items = self.core.contents_mut()?.1.as_sequence_mut()?;
        if !items.is_empty() {
            items.clear();
            self.core.mark_dirty();
        }
        Ok(())
    }

    /// Keeps only the non-null elements for which `keep` returns true.
    /// Null slots are kept.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn retain<F: FnMut(&T::Element) -> bool>(&mut self, mut keep: F) -> CoreResult<()> {
        let items = self.core.contents_mut()?.1.as_sequence_mut()?;
        let before = items.len();
        items.retain(|slot| slot.as_ref().map_or(true, &mut keep));
        if items.len() != before {
            self.core.mark_dirty();
        }
        Ok(())
    }

    /// Removes every element whose identity matches one of `elements`.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn remove_all(&mut self, elements: &[T::Element]) -> CoreResult<bool> {
        let (element_type, aggregate) = self.core.contents_mut()?;
        let ids: Vec<T::Id> = elements.iter().map(|e| element_type.id_of(e)).collect();
        let items = aggregate.as_sequence_mut()?;
        let before = items.len();
        items.retain(|slot| {
            slot.as_ref()
                .map_or(true, |e| !ids.contains(&element_type.id_of(e)))
        });
        let changed = items.len() != before;
        if changed {
            self.core.mark_dirty();
        }
        Ok(changed)
    }

    fn replace_slot(&mut self, index: usize, element: Option<T::Element>) -> CoreResult<Option<T::Element>> {
        let items = self.core.contents_mut()?.1.as_sequence_mut()?;
        let len = items.len();
        let slot = items.get_mut(index).ok_or_else(|| CoreError::bounds(index, len))?;
        let previous = std::mem::replace(slot, element);
        self.core.mark_dirty();
        Ok(previous)
    }
}

impl<T: ElementType> Deref for PersistentList<T> {
    type Target = CollectionCore<T>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<T: ElementType> DerefMut for PersistentList<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}
