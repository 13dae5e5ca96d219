//! Scalar-keyed persistent collection.

use super::core::CollectionCore;
use super::delayed::{DelayedOperation, Slot};
use super::state::CollectionState;
use crate::element::{ElementType, Scalar};
use crate::error::CoreResult;
use std::ops::{Deref, DerefMut};

/// A persistent map from scalar keys to elements.
///
/// While unloaded, `insert` and `remove` are queued when the queue or an
/// extra-lazy element probe knows what the key currently holds, so the
/// previous value can still be returned.
#[derive(Debug)]
pub struct PersistentMap<K: Scalar, T: ElementType> {
    core: CollectionCore<T, K>,
}

impl<K: Scalar, T: ElementType> PersistentMap<K, T> {
    pub(crate) fn from_core(core: CollectionCore<T, K>) -> Self {
        Self { core }
    }

    /// Number of entries.
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

    /// Whether the map is empty.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn is_empty(&mut self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The element under `key`.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn get(&mut self, key: &K) -> CoreResult<Option<&T::Element>> {
        Ok(self.core.contents()?.1.as_keyed()?.get(key))
    }

    /// Whether `key` has an entry. An unloaded map answers from its queue
    /// or, when extra-lazy, from an element probe.
    ///
    /// # Errors
    ///
    /// Returns initialization or probe errors.
    pub fn contains_key(&mut self, key: &K) -> CoreResult<bool> {
        if self.core.state() == CollectionState::Uninitialized {
            if let Some(entry) = self.core.probe_key(key)? {
                return Ok(entry.is_some());
            }
        }
        Ok(self.core.contents()?.1.as_keyed()?.contains_key(key))
    }

    /// Entries in key order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn iter(&mut self) -> CoreResult<impl Iterator<Item = (&K, &T::Element)> + '_> {
        Ok(self.core.contents()?.1.as_keyed()?.iter())
    }

    /// Keys in order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn keys(&mut self) -> CoreResult<impl Iterator<Item = &K> + '_> {
        Ok(self.core.contents()?.1.as_keyed()?.keys())
    }

    /// Elements in key order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn values(&mut self) -> CoreResult<impl Iterator<Item = &T::Element> + '_> {
        Ok(self.core.contents()?.1.as_keyed()?.values())
    }

    /// Clones the entries in key order.
    ///
    /// # Errors
    ///
    /// Returns initialization errors.
    pub fn to_vec(&mut self) -> CoreResult<Vec<(K, T::Element)>> {
        Ok(self.iter()?.map(|(k, e)| (k.clone(), e.clone())).collect())
    }

    /// Stores `element` under `key`, returning the previous element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`](crate::CoreError::InvalidOperation)
    /// for a read-only map, or initialization and probe errors.
    pub fn insert(&mut self, key: K, element: T::Element) -> CoreResult<Option<T::Element>> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            match self.core.probe_key(&key)? {
                Some(None) => {
                    self.core.enqueue(DelayedOperation::Add {
                        slot: Slot::Key(key),
                        value: element,
                    });
                    return Ok(None);
                }
                Some(Some(old)) => {
                    self.core.enqueue(DelayedOperation::Replace {
                        slot: Slot::Key(key),
                        old: old.clone(),
                        new: element,
                    });
                    return Ok(Some(old));
                }
                None => {}
            }
        }
        let previous = self.core.contents_mut()?.1.as_keyed_mut()?.insert(key, element);
        self.core.mark_dirty();
        Ok(previous)
    }

    /// Removes the entry under `key`, returning its element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`](crate::CoreError::InvalidOperation)
    /// for a read-only map, or initialization and probe errors.
    pub fn remove(&mut self, key: &K) -> CoreResult<Option<T::Element>> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            match self.core.probe_key(key)? {
                Some(None) => return Ok(None),
                Some(Some(old)) => {
                    self.core.enqueue(DelayedOperation::Remove {
                        slot: Slot::Key(key.clone()),
                        value: old.clone(),
                    });
                    return Ok(Some(old));
                }
                None => {}
            }
        }
        let removed = self.core.contents_mut()?.1.as_keyed_mut()?.remove(key);
        if removed.is_some() {
            self.core.mark_dirty();
        }
        Ok(removed)
    }

    /// Removes every entry, queueing the clear if the map is not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`](crate::CoreError::InvalidOperation)
    /// for a read-only map, or initialization errors.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.core.check_writable()?;
        if self.core.queue_enabled() {
            self.core.enqueue(DelayedOperation::Clear);
            return Ok(());
        }
        let items = self.core.contents_mut()?.1.as_keyed_mut()?;
        if !items.is_empty() {
            items.clear();
            self.core.mark_dirty();
        }
        Ok(())
    }
}

impl<K: Scalar, T: ElementType> Deref for PersistentMap<K, T> {
    type Target = CollectionCore<T, K>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<K: Scalar, T: ElementType> DerefMut for PersistentMap<K, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}
