//! Owner entity identity.

mod id;

pub use id::EntityId;
