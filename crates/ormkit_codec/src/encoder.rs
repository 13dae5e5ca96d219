//! Deterministic CBOR encoding.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::Value as Cbor;

/// Encode a value into deterministic CBOR bytes.
///
/// Map entries are written in the order of their encoded keys (shorter
/// encodings first, then bytewise), so equal values always produce equal
/// bytes regardless of how their maps were assembled.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let wire = to_wire(value)?;
    write(&wire)
}

fn write(wire: &Cbor) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(wire, &mut out).map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(out)
}

fn to_wire(value: &Value) -> CodecResult<Cbor> {
    Ok(match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(n) => Cbor::Integer((*n).into()),
        Value::Bytes(b) => Cbor::Bytes(b.clone()),
        Value::Text(s) => Cbor::Text(s.clone()),
        Value::Array(items) => Cbor::Array(items.iter().map(to_wire).collect::<CodecResult<_>>()?),
        Value::Map(entries) => {
            let mut keyed = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let key = to_wire(k)?;
                let key_bytes = write(&key)?;
                keyed.push((key_bytes, key, to_wire(v)?));
            }
            keyed.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
            if let Some(pair) = keyed.windows(2).find(|w| w[0].0 == w[1].0) {
                return Err(CodecError::DuplicateKey {
                    key: format!("{:?}", pair[0].1),
                });
            }
            Cbor::Map(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_integers_use_one_byte() {
        assert_eq!(to_canonical_cbor(&Value::Integer(0)).unwrap(), vec![0x00]);
        assert_eq!(to_canonical_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(to_canonical_cbor(&Value::Integer(24)).unwrap(), vec![0x18, 24]);
    }

    #[test]
    fn simple_values() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
        assert_eq!(to_canonical_cbor(&Value::from("a")).unwrap(), vec![0x61, b'a']);
    }

    #[test]
    fn map_order_does_not_depend_on_insertion() {
        let a = Value::Map(vec![
            (Value::from("long"), Value::from(1i64)),
            (Value::from("k"), Value::from(2i64)),
        ]);
        let b = Value::Map(vec![
            (Value::from("k"), Value::from(2i64)),
            (Value::from("long"), Value::from(1i64)),
        ]);
        assert_eq!(to_canonical_cbor(&a).unwrap(), to_canonical_cbor(&b).unwrap());
    }

    #[test]
    fn duplicate_keys_rejected() {
        let v = Value::Map(vec![
            (Value::from("k"), Value::from(1i64)),
            (Value::from("k"), Value::from(2i64)),
        ]);
        assert!(matches!(to_canonical_cbor(&v), Err(CodecError::DuplicateKey { .. })));
    }

    proptest! {
        #[test]
        fn equal_maps_encode_identically(entries in prop::collection::btree_map("[a-z]{0,6}", any::<i64>(), 0..8)) {
            let pairs: Vec<(Value, Value)> = entries
                .into_iter()
                .map(|(k, v)| (Value::from(k.as_str()), Value::Integer(v)))
                .collect();
            let mut reversed = pairs.clone();
            reversed.reverse();

            let bytes = to_canonical_cbor(&Value::Map(pairs.clone())).unwrap();
            prop_assert_eq!(&bytes, &to_canonical_cbor(&Value::Map(reversed)).unwrap());
            prop_assert_eq!(crate::from_cbor(&bytes).unwrap(), Value::map(pairs));
        }
    }
}
