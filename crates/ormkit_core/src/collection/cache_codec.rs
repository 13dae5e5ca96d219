//! Externalized form of a collection for the second-level cache.

use super::aggregate::{Aggregate, AggregateBuilder};
use super::role::ShapeKind;
use crate::element::{ElementType, Scalar};
use crate::error::{CoreError, CoreResult};
use crate::loader::{RowSink, RowSlot};
use ormkit_codec::{from_cbor, to_canonical_cbor, Value};

/// A collection's contents as externalized values.
///
/// Elements are in canonical order: index order for sequences (nulls
/// included), identity order for sets, key order for keyed collections.
/// `keys` runs parallel to `elements` for keyed collections and is empty
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCollection {
    shape: ShapeKind,
    elements: Vec<Value>,
    keys: Vec<Value>,
}

impl CachedCollection {
    /// A sequence entry. `Value::Null` marks an empty slot.
    #[must_use]
    pub fn sequence(elements: Vec<Value>) -> Self {
        Self {
            shape: ShapeKind::Sequence,
            elements,
            keys: Vec::new(),
        }
    }

    /// A set entry.
    #[must_use]
    pub fn set(elements: Vec<Value>) -> Self {
        Self {
            shape: ShapeKind::Set,
            elements,
            keys: Vec::new(),
        }
    }

    /// A keyed entry from `(key, element)` pairs.
    #[must_use]
    pub fn keyed(entries: Vec<(Value, Value)>) -> Self {
        let (keys, elements) = entries.into_iter().unzip();
        Self {
            shape: ShapeKind::Keyed,
            elements,
            keys,
        }
    }

    /// Shape of the cached collection.
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// Externalized elements.
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// Externalized keys (keyed collections only).
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Externalizes `aggregate` through `element_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if an element cannot be externalized.
    pub fn disassemble<T: ElementType, K: Scalar>(
        element_type: &T,
        aggregate: &Aggregate<T, K>,
    ) -> CoreResult<Self> {
        Ok(match aggregate {
            Aggregate::Sequence(items) => Self::sequence(
                items
                    .iter()
                    .map(|slot| match slot {
                        Some(e) => element_type.externalize(e),
                        None => Ok(Value::Null),
                    })
                    .collect::<CoreResult<_>>()?,
            ),
            Aggregate::Set(items) => Self::set(
                items
                    .values()
                    .map(|e| element_type.externalize(e))
                    .collect::<CoreResult<_>>()?,
            ),
            Aggregate::Keyed(items) => Self::keyed(
                items
                    .iter()
                    .map(|(k, e)| -> CoreResult<(Value, Value)> {
                        Ok((k.to_value(), element_type.externalize(e)?))
                    })
                    .collect::<CoreResult<_>>()?,
            ),
        })
    }

    /// Rebuilds an aggregate of `expected` shape.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] if the entry has another shape,
    /// or a conversion error if an element cannot be internalized.
    pub fn assemble<T: ElementType, K: Scalar>(
        &self,
        element_type: &T,
        expected: ShapeKind,
    ) -> CoreResult<Aggregate<T, K>> {
        if self.shape != expected {
            return Err(CoreError::ShapeMismatch {
                expected,
                found: self.shape,
            });
        }
        let mut builder = AggregateBuilder::new(element_type, self.shape);
        builder.before_initialize(self.elements.len());
        for (index, element) in self.elements.iter().enumerate() {
            let slot = match self.shape {
                ShapeKind::Sequence => RowSlot::Index(index),
                ShapeKind::Set => RowSlot::Unordered,
                ShapeKind::Keyed => RowSlot::Key(self.keys[index].clone()),
            };
            builder.read_row(slot, element.clone())?;
        }
        Ok(builder.finish())
    }

    /// The entry as a single value: `{"shape", "elements", "keys"}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::map(vec![
            (Value::from("shape"), Value::from(self.shape.as_str())),
            (Value::from("elements"), Value::Array(self.elements.clone())),
            (Value::from("keys"), Value::Array(self.keys.clone())),
        ])
    }

    /// Parses [`CachedCollection::to_value`] output.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedEntry`] if a field is missing or has
    /// the wrong kind, or if keys and elements disagree in length.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        let shape = value
            .get("shape")
            .and_then(Value::as_text)
            .and_then(ShapeKind::parse)
            .ok_or_else(|| CoreError::malformed_entry("missing or unknown shape"))?;
        let elements = value
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::malformed_entry("missing elements"))?
            .to_vec();
        let keys = value
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::malformed_entry("missing keys"))?
            .to_vec();

        let expected_keys = if shape == ShapeKind::Keyed { elements.len() } else { 0 };
        if keys.len() != expected_keys {
            return Err(CoreError::malformed_entry(format!(
                "{shape} entry has {} keys for {} elements",
                keys.len(),
                elements.len()
            )));
        }
        Ok(Self { shape, elements, keys })
    }

    /// Encodes the entry as deterministic CBOR.
    ///
    /// # Errors
    ///
    /// Returns a codec error if encoding fails.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(to_canonical_cbor(&self.to_value())?)
    }

    /// Decodes an entry written by [`CachedCollection::encode`].
    ///
    /// # Errors
    ///
    /// Returns a codec error for bad bytes, or
    /// [`CoreError::MalformedEntry`] for a value that is not an entry.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{IntegerType, TextType};
    use std::collections::BTreeMap;

    #[test]
    fn sequence_keeps_null_slots() {
        let ty = IntegerType::new();
        let agg: Aggregate<IntegerType> = Aggregate::Sequence(vec![Some(1), None, Some(3)]);
        let cached = CachedCollection::disassemble(&ty, &agg).unwrap();
        assert_eq!(cached.elements(), &[Value::from(1i64), Value::Null, Value::from(3i64)]);

        let rebuilt: Aggregate<IntegerType> = cached.assemble(&ty, ShapeKind::Sequence).unwrap();
        assert_eq!(rebuilt, agg);
    }

    #[test]
    fn keyed_bytes_roundtrip() {
        let ty = TextType::new();
        let agg: Aggregate<TextType, String> =
            Aggregate::Keyed(BTreeMap::from([("Top".to_string(), "partV1".to_string())]));
        let bytes = CachedCollection::disassemble(&ty, &agg).unwrap().encode().unwrap();
        let decoded = CachedCollection::decode(&bytes).unwrap();
        assert_eq!(decoded.shape(), ShapeKind::Keyed);
        assert_eq!(decoded.keys(), &[Value::from("Top")]);

        let rebuilt: Aggregate<TextType, String> = decoded.assemble(&ty, ShapeKind::Keyed).unwrap();
        assert_eq!(rebuilt, agg);
    }

    #[test]
    fn assemble_rejects_other_shapes() {
        let ty = TextType::new();
        let cached = CachedCollection::set(vec![Value::from("a")]);
        let result: CoreResult<Aggregate<TextType>> = cached.assemble(&ty, ShapeKind::Sequence);
        assert!(matches!(result, Err(CoreError::ShapeMismatch { .. })));
    }

    #[test]
    fn decode_rejects_foreign_values() {
        let bytes = to_canonical_cbor(&Value::from("not an entry")).unwrap();
        assert!(matches!(
            CachedCollection::decode(&bytes),
            Err(CoreError::MalformedEntry { .. })
        ));
        assert!(matches!(
            CachedCollection::decode(&[0x62, b'a']),
            Err(CoreError::Codec(_))
        ));
    }

    #[test]
    fn keys_must_match_elements() {
        let value = Value::map(vec![
            (Value::from("shape"), Value::from("keyed")),
            (Value::from("elements"), Value::Array(vec![Value::from("a")])),
            (Value::from("keys"), Value::Array(vec![])),
        ]);
        assert!(CachedCollection::from_value(&value).is_err());
    }
}
