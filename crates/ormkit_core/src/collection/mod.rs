//! Persistent collections and the machinery behind them.
//!
//! - [`CollectionCore`]: lifecycle, delayed-operation queue and snapshot
//! - [`PersistentList`], [`PersistentSet`], [`PersistentMap`]: shape facades
//! - [`diff`]: snapshot comparison and queue translation
//! - [`CachedCollection`]: externalized form for the cache region

mod aggregate;
mod cache_codec;
mod core;
mod delayed;
pub mod diff;
mod list;
mod map;
mod role;
mod set;
mod state;

pub use aggregate::{Aggregate, AggregateBuilder};
pub use cache_codec::CachedCollection;
pub use self::core::CollectionCore;
pub use delayed::{DelayedOperation, Slot};
pub use diff::{ChangeSet, ElementChange, ElementUpdate};
pub use list::PersistentList;
pub use map::PersistentMap;
pub use role::{RoleDescriptor, RoleOptions, ShapeKind};
pub use set::PersistentSet;
pub use state::CollectionState;
