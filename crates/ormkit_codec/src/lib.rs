//! # ormkit codec
//!
//! Externalized element values for ormkit.
//!
//! Everything that crosses the boundary between a persistent collection and
//! the outside world (rows streamed in by a loader, entries written to the
//! second-level cache) travels as a [`Value`]. This crate defines that type
//! and a deterministic CBOR byte form for it:
//!
//! - Map entries are ordered by their encoded key (length first, then bytewise)
//! - Integers use the shortest encoding
//! - Floats, tags and undefined are rejected
//! - Duplicate map keys are rejected
//!
//! Identical values therefore always produce identical bytes, which keeps
//! cache entries comparable across processes.
//!
//! ## Usage
//!
//! ```
//! use ormkit_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let value = Value::map(vec![
//!     (Value::from("name"), Value::from("wheel")),
//!     (Value::from("qty"), Value::from(4i64)),
//! ]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::from_cbor;
pub use encoder::to_canonical_cbor;
pub use error::{CodecError, CodecResult};
pub use value::Value;
