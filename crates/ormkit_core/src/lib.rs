//! # ormkit core
//!
//! Lazy, dirty-tracking persistent collections.
//!
//! Every collection-valued association of an entity loaded through a
//! [`Session`] is wrapped in a persistent collection. The wrapper:
//!
//! - defers loading its contents until first read
//! - records simple mutations as delayed operations instead of loading
//! - keeps a snapshot of the stored state and diffs against it at flush
//! - reads through and writes back to a second-level cache region
//!
//! Three shapes are provided: [`PersistentList`] (index-ordered, nullable
//! slots), [`PersistentSet`] (unordered, identity-keyed) and
//! [`PersistentMap`] (scalar-keyed).
//!
//! ## Example
//!
//! ```rust,ignore
//! let session = Session::open(SessionConfig::default(), loader);
//! let order = session.register_owner(order_id)?;
//! let mut lines = session.lazy_list(order, &lines_role)?;
//!
//! lines.push("bolt".to_string())?;   // queued, nothing loaded
//! assert_eq!(lines.len()?, 3);       // loads, replays the push
//! lines.flush(&mut persister)?;      // emits one insertion
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
mod config;
mod element;
mod entity;
mod error;
mod flush;
mod loader;
mod session;
mod stats;
mod types;

pub use collection::{
    Aggregate, AggregateBuilder, CachedCollection, ChangeSet, CollectionCore, CollectionState,
    DelayedOperation, ElementChange, ElementUpdate, PersistentList, PersistentMap, PersistentSet,
    RoleDescriptor, RoleOptions, ShapeKind, Slot,
};
pub use config::{CacheMode, SessionConfig};
pub use element::{ElementType, IntegerType, Scalar, ScalarType, TextType, Unkeyed};
pub use entity::EntityId;
pub use error::{CoreError, CoreResult};
pub use flush::{flush_collection, CollectionPersister, FlushOutcome};
pub use loader::{CollectionLoader, ElementProbe, RowSink, RowSlot};
pub use session::{OwnerContext, Session};
pub use stats::{SessionStats, StatsSnapshot};
pub use types::{OwnerSlot, Role, UnitOfWorkId};

pub use ormkit_cache::{CacheKey, CacheRegion};
pub use ormkit_codec::Value;
