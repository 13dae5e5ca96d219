//! Element type descriptors.
//!
//! A collection never compares, copies or converts its elements itself; it
//! asks the role's [`ElementType`]. This is where identity, dirtiness and
//! the externalized form of an element are defined.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use ormkit_codec::Value;
use std::fmt;
use std::marker::PhantomData;

/// Per-role comparator and converter for collection elements.
///
/// # Example
///
/// ```rust,ignore
/// struct LineType;
///
/// impl ElementType for LineType {
///     type Element = Line;
///     type Id = EntityId;
///
///     fn id_of(&self, line: &Line) -> EntityId {
///         line.id
///     }
///
///     fn is_dirty(&self, current: &Line, snapshot: &Line) -> bool {
///         current.version != snapshot.version
///     }
///
///     fn externalize(&self, line: &Line) -> CoreResult<Value> { /* ... */ }
///     fn externalize_id(&self, line: &Line) -> CoreResult<Value> { /* ... */ }
///     fn internalize(&self, value: &Value) -> CoreResult<Line> { /* ... */ }
/// }
/// ```
pub trait ElementType: Send + Sync + 'static {
    /// The element held by the collection.
    type Element: Clone + fmt::Debug;

    /// Identity of an element. Sets are keyed by it and orphans are
    /// detected through it.
    type Id: Ord + Clone + fmt::Debug;

    /// Returns the identity of `element`.
    fn id_of(&self, element: &Self::Element) -> Self::Id;

    /// Copies an element for a snapshot. The copy must not alias `element`.
    fn deep_copy(&self, element: &Self::Element) -> Self::Element {
        element.clone()
    }

    /// Whether `current` differs from its `snapshot` copy in a way that
    /// needs writing.
    fn is_dirty(&self, current: &Self::Element, snapshot: &Self::Element) -> bool;

    /// Converts an element to its externalized form.
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot be represented as a [`Value`].
    fn externalize(&self, element: &Self::Element) -> CoreResult<Value>;

    /// Converts the identity of `element` to its externalized form.
    ///
    /// Existence probes send this instead of the whole element, so two
    /// elements with the same [`ElementType::id_of`] must externalize to
    /// the same value here.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be represented as a [`Value`].
    fn externalize_id(&self, element: &Self::Element) -> CoreResult<Value>;

    /// Rebuilds an element from its externalized form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversion`] if `value` does not describe an element.
    fn internalize(&self, value: &Value) -> CoreResult<Self::Element>;
}

/// A plain value usable as a map key or as a simple element.
pub trait Scalar: Ord + Clone + fmt::Debug + Send + Sync + 'static {
    /// Name used in conversion errors.
    const TYPE_NAME: &'static str;

    /// Converts to the externalized form.
    fn to_value(&self) -> Value;

    /// Converts from the externalized form, if it has the right kind.
    fn from_value(value: &Value) -> Option<Self>;

    /// Like [`Scalar::from_value`], failing with a conversion error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conversion`] if `value` has the wrong kind.
    fn try_from_value(value: &Value) -> CoreResult<Self> {
        Self::from_value(value).ok_or_else(|| {
            CoreError::conversion(format!(
                "expected {}, found {}",
                Self::TYPE_NAME,
                value.type_name()
            ))
        })
    }
}

impl Scalar for String {
    const TYPE_NAME: &'static str = "text";

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

impl Scalar for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer()
    }
}

impl Scalar for bool {
    const TYPE_NAME: &'static str = "bool";

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl Scalar for EntityId {
    const TYPE_NAME: &'static str = "entity id";

    fn to_value(&self) -> Value {
        Value::Bytes(self.as_bytes().to_vec())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bytes().and_then(EntityId::from_slice)
    }
}

/// Key type of shapes that have no keys (lists and sets).
///
/// Uninhabited: a `Slot::Key(Unkeyed)` can never be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unkeyed {}

impl Scalar for Unkeyed {
    const TYPE_NAME: &'static str = "no key";

    fn to_value(&self) -> Value {
        match *self {}
    }

    fn from_value(_value: &Value) -> Option<Self> {
        None
    }
}

/// Element type for collections of plain scalars.
///
/// A scalar is its own identity, so two scalars with equal identity are
/// never dirty against each other.
pub struct ScalarType<S>(PhantomData<fn() -> S>);

/// Collections of text values.
pub type TextType = ScalarType<String>;

/// Collections of integers.
pub type IntegerType = ScalarType<i64>;

impl<S> ScalarType<S> {
    /// Creates the descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<S> Default for ScalarType<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for ScalarType<S> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ScalarType<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarType<{}>", std::any::type_name::<S>())
    }
}

impl<S: Scalar> ElementType for ScalarType<S> {
    type Element = S;
    type Id = S;

    fn id_of(&self, element: &S) -> S {
        element.clone()
    }

    fn is_dirty(&self, current: &S, snapshot: &S) -> bool {
        current != snapshot
    }

    fn externalize(&self, element: &S) -> CoreResult<Value> {
        Ok(element.to_value())
    }

    fn externalize_id(&self, element: &S) -> CoreResult<Value> {
        Ok(element.to_value())
    }

    fn internalize(&self, value: &Value) -> CoreResult<S> {
        S::try_from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conversions() {
        assert_eq!(String::from_value(&Value::from("a")), Some("a".to_string()));
        assert_eq!(i64::from_value(&Value::from("a")), None);
        assert_eq!(bool::from_value(&Value::Bool(true)), Some(true));
        let id = EntityId::new();
        assert_eq!(EntityId::from_value(&id.to_value()), Some(id));
    }

    #[test]
    fn unkeyed_never_converts() {
        assert!(Unkeyed::from_value(&Value::Null).is_none());
        assert!(matches!(
            Unkeyed::try_from_value(&Value::Null),
            Err(CoreError::Conversion { .. })
        ));
    }

    #[test]
    fn scalar_type_compares_by_value() {
        let ty = IntegerType::new();
        assert!(ty.is_dirty(&9, &2));
        assert!(!ty.is_dirty(&2, &2));
        assert_eq!(ty.id_of(&7), 7);
        assert_eq!(ty.externalize_id(&7).unwrap(), Value::Integer(7));
    }

    #[test]
    fn scalar_type_internalize_reports_kind() {
        let err = TextType::new().internalize(&Value::Integer(1)).unwrap_err();
        assert_eq!(err.to_string(), "conversion failed: expected text, found integer");
    }
}
