//! # ormkit cache
//!
//! Second-level cache regions for persistent collections.
//!
//! A region is an **opaque byte store** keyed by `(role, owner)`. It never
//! interprets the bytes it holds; the collection layer owns the entry
//! format and decides what to do with a corrupt or missing entry.
//!
//! ## Implementations
//!
//! - [`InMemoryRegion`] - process-local region with optional FIFO bound

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod memory;
mod region;

pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use memory::InMemoryRegion;
pub use region::CacheRegion;
