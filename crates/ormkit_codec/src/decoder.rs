//! CBOR decoding into [`Value`].

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::Value as Cbor;

/// Decode exactly one CBOR item from `bytes`.
///
/// Floats, tags and other items without a [`Value`] counterpart are
/// rejected, as are duplicate map keys and trailing bytes. Map entries of
/// the result are in [`Value::map`] order.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut reader = bytes;
    let wire: Cbor =
        ciborium::de::from_reader(&mut reader).map_err(|e| CodecError::decoding_failed(format!("{e:?}")))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes { count: reader.len() });
    }
    from_wire(wire)
}

fn from_wire(wire: Cbor) -> CodecResult<Value> {
    match wire {
        Cbor::Null => Ok(Value::Null),
        Cbor::Bool(b) => Ok(Value::Bool(b)),
        Cbor::Integer(n) => {
            let wide: i128 = n.into();
            i64::try_from(wide).map(Value::Integer).map_err(|_| CodecError::IntegerOverflow)
        }
        Cbor::Bytes(b) => Ok(Value::Bytes(b)),
        Cbor::Text(s) => Ok(Value::Text(s)),
        Cbor::Array(items) => Ok(Value::Array(items.into_iter().map(from_wire).collect::<CodecResult<_>>()?)),
        Cbor::Map(entries) => {
            let pairs = entries
                .into_iter()
                .map(|(k, v)| Ok((from_wire(k)?, from_wire(v)?)))
                .collect::<CodecResult<Vec<_>>>()?;
            let Value::Map(sorted) = Value::map(pairs) else {
                return Err(CodecError::decoding_failed("map normalization"));
            };
            if let Some(pair) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
                return Err(CodecError::DuplicateKey {
                    key: pair[0].0.to_string(),
                });
            }
            Ok(Value::Map(sorted))
        }
        Cbor::Float(_) => Err(CodecError::FloatForbidden),
        Cbor::Tag(tag, _) => Err(CodecError::unsupported_type(format!("tag {tag}"))),
        other => Err(CodecError::unsupported_type(format!("{other:?}"))),
    }
}
