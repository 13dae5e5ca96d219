//! Native aggregates behind persistent collections.

use super::role::ShapeKind;
use crate::element::{ElementType, Scalar, Unkeyed};
use crate::error::{CoreError, CoreResult};
use crate::loader::{RowSink, RowSlot};
use ormkit_codec::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The in-memory contents of a collection, one variant per shape.
pub enum Aggregate<T: ElementType, K: Scalar = Unkeyed> {
    /// Index-ordered slots; `None` is a null slot.
    Sequence(Vec<Option<T::Element>>),
    /// Elements keyed by identity.
    Set(BTreeMap<T::Id, T::Element>),
    /// Elements keyed by a scalar.
    Keyed(BTreeMap<K, T::Element>),
}

impl<T: ElementType, K: Scalar> Aggregate<T, K> {
    /// An empty aggregate of `shape`.
    #[must_use]
    pub fn empty(shape: ShapeKind) -> Self {
        Self::with_capacity(shape, 0)
    }

    /// An empty aggregate of `shape` sized for `capacity` elements.
    #[must_use]
    pub fn with_capacity(shape: ShapeKind, capacity: usize) -> Self {
        match shape {
            ShapeKind::Sequence => Self::Sequence(Vec::with_capacity(capacity)),
            ShapeKind::Set => Self::Set(BTreeMap::new()),
            ShapeKind::Keyed => Self::Keyed(BTreeMap::new()),
        }
    }

    /// The shape of this aggregate.
    pub fn shape(&self) -> ShapeKind {
        match self {
            Self::Sequence(_) => ShapeKind::Sequence,
            Self::Set(_) => ShapeKind::Set,
            Self::Keyed(_) => ShapeKind::Keyed,
        }
    }

    /// Number of slots (sequence) or entries (set, keyed).
    pub fn len(&self) -> usize {
        match self {
            Self::Sequence(items) => items.len(),
            Self::Set(items) => items.len(),
            Self::Keyed(items) => items.len(),
        }
    }

    /// Whether the aggregate is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        match self {
            Self::Sequence(items) => items.clear(),
            Self::Set(items) => items.clear(),
            Self::Keyed(items) => items.clear(),
        }
    }

    /// Non-null elements in canonical order.
    pub fn elements(&self) -> Box<dyn Iterator<Item = &T::Element> + '_> {
        match self {
            Self::Sequence(items) => Box::new(items.iter().flatten()),
            Self::Set(items) => Box::new(items.values()),
            Self::Keyed(items) => Box::new(items.values()),
        }
    }

    /// A copy that shares nothing with `self`, made through the element type.
    pub fn deep_copy(&self, element_type: &T) -> Self {
        match self {
            Self::Sequence(items) => Self::Sequence(
                items
                    .iter()
                    .map(|slot| slot.as_ref().map(|e| element_type.deep_copy(e)))
                    .collect(),
            ),
            Self::Set(items) => Self::Set(
                items
                    .iter()
                    .map(|(id, e)| (id.clone(), element_type.deep_copy(e)))
                    .collect(),
            ),
            Self::Keyed(items) => Self::Keyed(
                items
                    .iter()
                    .map(|(k, e)| (k.clone(), element_type.deep_copy(e)))
                    .collect(),
            ),
        }
    }

    /// The slots of a sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] for other shapes.
    pub fn as_sequence(&self) -> CoreResult<&Vec<Option<T::Element>>> {
        match self {
            Self::Sequence(items) => Ok(items),
            other => Err(mismatch(ShapeKind::Sequence, other.shape())),
        }
    }

    /// Mutable slots of a sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] for other shapes.
    pub fn as_sequence_mut(&mut self) -> CoreResult<&mut Vec<Option<T::Element>>> {
        match self {
            Self::Sequence(items) => Ok(items),
            other => Err(mismatch(ShapeKind::Sequence, other.shape())),
        }
    }

    /// The entries of a set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] for other shapes.
    pub fn as_set(&self) -> CoreResult<&BTreeMap<T::Id, T::Element>> {
        match self {
            Self::Set(items) => Ok(items),
            other => Err(mismatch(ShapeKind::Set, other.shape())),
        }
    }

    /// Mutable entries of a set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] for other shapes.
    pub fn as_set_mut(&mut self) -> CoreResult<&mut BTreeMap<T::Id, T::Element>> {
        match self {
            Self::Set(items) => Ok(items),
            other => Err(mismatch(ShapeKind::Set, other.shape())),
        }
    }

    /// The entries of a keyed aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] for other shapes.
    pub fn as_keyed(&self) -> CoreResult<&BTreeMap<K, T::Element>> {
        match self {
            Self::Keyed(items) => Ok(items),
            other => Err(mismatch(ShapeKind::Keyed, other.shape())),
        }
    }

    /// Mutable entries of a keyed aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] for other shapes.
    pub fn as_keyed_mut(&mut self) -> CoreResult<&mut BTreeMap<K, T::Element>> {
        match self {
            Self::Keyed(items) => Ok(items),
            other => Err(mismatch(ShapeKind::Keyed, other.shape())),
        }
    }
}

fn mismatch(expected: ShapeKind, found: ShapeKind) -> CoreError {
    CoreError::ShapeMismatch { expected, found }
}

impl<T: ElementType, K: Scalar> Clone for Aggregate<T, K> {
    fn clone(&self) -> Self {
        match self {
            Self::Sequence(items) => Self::Sequence(items.clone()),
            Self::Set(items) => Self::Set(items.clone()),
            Self::Keyed(items) => Self::Keyed(items.clone()),
        }
    }
}

impl<T: ElementType, K: Scalar> fmt::Debug for Aggregate<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Self::Set(items) => f.debug_tuple("Set").field(items).finish(),
            Self::Keyed(items) => f.debug_tuple("Keyed").field(items).finish(),
        }
    }
}

impl<T, K> PartialEq for Aggregate<T, K>
where
    T: ElementType,
    T::Element: PartialEq,
    K: Scalar,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Keyed(a), Self::Keyed(b)) => a == b,
            _ => false,
        }
    }
}

/// [`RowSink`] that builds an [`Aggregate`] from streamed rows.
///
/// Sequence rows with gaps leave null slots; keyed rows with a null value
/// are skipped.
pub struct AggregateBuilder<'a, T: ElementType, K: Scalar = Unkeyed> {
    element_type: &'a T,
    aggregate: Aggregate<T, K>,
    anticipated: Option<usize>,
}

impl<'a, T: ElementType, K: Scalar> AggregateBuilder<'a, T, K> {
    /// Creates a builder for an aggregate of `shape`.
    pub fn new(element_type: &'a T, shape: ShapeKind) -> Self {
        Self {
            element_type,
            aggregate: Aggregate::empty(shape),
            anticipated: None,
        }
    }

    /// The size announced by `before_initialize`, if it was called.
    pub fn anticipated_size(&self) -> Option<usize> {
        self.anticipated
    }

    /// Returns the built aggregate.
    pub fn finish(self) -> Aggregate<T, K> {
        self.aggregate
    }
}

impl<T: ElementType, K: Scalar> RowSink for AggregateBuilder<'_, T, K> {
    fn before_initialize(&mut self, anticipated_size: usize) {
        self.anticipated = Some(anticipated_size);
        self.aggregate = Aggregate::with_capacity(self.aggregate.shape(), anticipated_size);
    }

    fn read_row(&mut self, slot: RowSlot, value: Value) -> CoreResult<()> {
        let element_type = self.element_type;
        match (&mut self.aggregate, slot) {
            (Aggregate::Sequence(items), RowSlot::Index(index)) => {
                let element = internalize_nullable(element_type, &value)?;
                if index >= items.len() {
                    items.resize_with(index + 1, || None);
                }
                items[index] = element;
            }
            (Aggregate::Sequence(items), RowSlot::Unordered) => {
                items.push(internalize_nullable(element_type, &value)?);
            }
            (Aggregate::Set(items), RowSlot::Unordered) => {
                if !value.is_null() {
                    let element = element_type.internalize(&value)?;
                    items.insert(element_type.id_of(&element), element);
                }
            }
            (Aggregate::Keyed(items), RowSlot::Key(key)) => {
                if !value.is_null() {
                    let key = K::try_from_value(&key)?;
                    items.insert(key, element_type.internalize(&value)?);
                }
            }
            (aggregate, slot) => {
                return Err(CoreError::invariant_violation(format!(
                    "row slot {slot:?} does not fit a {} collection",
                    aggregate.shape()
                )));
            }
        }
        Ok(())
    }
}

fn internalize_nullable<T: ElementType>(element_type: &T, value: &Value) -> CoreResult<Option<T::Element>> {
    if value.is_null() {
        Ok(None)
    } else {
        element_type.internalize(value).map(Some)
    }
}
