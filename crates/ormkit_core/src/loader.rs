//! Loader interface consumed by lazy initialization.

use crate::entity::EntityId;
use crate::error::CoreResult;
use crate::types::Role;
use ormkit_codec::Value;

/// Position of a streamed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSlot {
    /// Unordered row (set elements, or list rows appended in stream order).
    Unordered,
    /// Row at a list index.
    Index(usize),
    /// Row under a map key.
    Key(Value),
}

/// Answer of a single-element probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementProbe {
    /// Nothing is stored at the probed slot.
    Absent,
    /// The externalized element stored at the probed slot.
    Present(Value),
}

/// Receiver of rows streamed in by a [`CollectionLoader`].
pub trait RowSink {
    /// Called once, before any row, with the number of rows the loader
    /// expects to stream.
    fn before_initialize(&mut self, anticipated_size: usize);

    /// Accepts one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be converted or does not fit the
    /// collection's shape. The loader should stop and propagate it.
    fn read_row(&mut self, slot: RowSlot, value: Value) -> CoreResult<()>;
}

/// Fetches stored collection contents for an owner.
///
/// Implementations are shared by every session and must be `Send + Sync`.
/// Failures to reach storage should be reported as
/// [`crate::CoreError::SourceUnavailable`]; collections propagate them
/// unchanged.
///
/// The probe methods let an extra-lazy role answer questions without a
/// full load. Their defaults answer "unknown" (`Ok(None)`), which makes the
/// collection fall back to initializing.
pub trait CollectionLoader: Send + Sync {
    /// Streams every stored row of `role` for `owner` into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable or the sink rejects a row.
    fn load(&self, owner: EntityId, role: &Role, sink: &mut dyn RowSink) -> CoreResult<()>;

    /// Number of stored rows, if cheaply known.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    fn read_size(&self, _owner: EntityId, _role: &Role) -> CoreResult<Option<usize>> {
        Ok(None)
    }

    /// Whether an element whose identity is `id` is stored, if cheaply
    /// known. `id` comes from [`crate::ElementType::externalize_id`]; the
    /// stored element's state is not compared.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    fn element_exists(&self, _owner: EntityId, _role: &Role, _id: &Value) -> CoreResult<Option<bool>> {
        Ok(None)
    }

    /// What is stored at `slot`, if cheaply known.
    ///
    /// # Errors
    ///
    /// Returns an error if storage is unreachable.
    fn element_at(
        &self,
        _owner: EntityId,
        _role: &Role,
        _slot: &RowSlot,
    ) -> CoreResult<Option<ElementProbe>> {
        Ok(None)
    }
}
