//! Writing collection changes back to storage.
//!
//! Flush never talks to storage itself. It decides what row work a
//! collection needs and hands a [`ChangeSet`] to a [`CollectionPersister`]:
//!
//! - unloaded with queued operations: the queue is translated directly,
//!   without loading
//! - loaded and dirty: the contents are diffed against the snapshot
//! - read-only, clean or unloaded without a queue: nothing is written
//!
//! The collection's bookkeeping (new snapshot, cleared queue) only changes
//! after the persister succeeds, so a failed flush can be retried.

use crate::collection::{diff, ChangeSet, CollectionCore, CollectionState, RoleDescriptor};
use crate::element::{ElementType, Scalar};
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};

/// Applies row work for one collection to storage.
pub trait CollectionPersister<T: ElementType, K: Scalar> {
    /// Writes `changes` for the collection of `owner` under `descriptor`.
    ///
    /// Changes must be applied in order: truncate, deletions, updates,
    /// insertions.
    ///
    /// # Errors
    ///
    /// Any error leaves the collection as it was before the flush.
    fn apply(
        &mut self,
        owner: EntityId,
        descriptor: &RoleDescriptor<T>,
        changes: &ChangeSet<T::Element, K>,
    ) -> CoreResult<()>;
}

/// What a flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to write: read-only, not dirty, or unloaded without a queue.
    Skipped,
    /// Dirty, but the contents equal the snapshot, or the queued
    /// operations cancel out.
    Clean,
    /// Row work was handed to the persister.
    Flushed {
        /// Rows deleted.
        deletions: usize,
        /// Rows rewritten.
        updates: usize,
        /// Rows inserted.
        insertions: usize,
        /// Whether every stored row was removed first.
        truncated: bool,
    },
}

impl FlushOutcome {
    fn from_changes<E, K>(changes: &ChangeSet<E, K>) -> Self {
        Self::Flushed {
            deletions: changes.deletions.len(),
            updates: changes.updates.len(),
            insertions: changes.insertions.len(),
            truncated: changes.truncate,
        }
    }

    /// Whether the persister was called.
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Flushed { .. })
    }
}

impl<T: ElementType, K: Scalar> CollectionCore<T, K> {
    /// Writes pending changes through `persister`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Lifecycle`] if there is pending work but the session
    ///   is gone or closed
    /// - any error from the persister, after which the collection is
    ///   unchanged
    /// - [`CoreError::Cache`] if the stale cache entry cannot be evicted;
    ///   the write itself has then already been recorded
    pub fn flush<P>(&mut self, persister: &mut P) -> CoreResult<FlushOutcome>
    where
        P: CollectionPersister<T, K> + ?Sized,
    {
        if self.is_read_only() {
            return Ok(FlushOutcome::Skipped);
        }
        match self.state() {
            CollectionState::Initializing => Err(CoreError::invalid_operation(format!(
                "cannot flush {} while it initializes",
                self.role()
            ))),
            CollectionState::Unbound | CollectionState::Uninitialized => self.flush_queue(persister),
            CollectionState::Initialized | CollectionState::ReadOnlyInitialized => self.flush_loaded(persister),
        }
    }

    fn flush_queue<P>(&mut self, persister: &mut P) -> CoreResult<FlushOutcome>
    where
        P: CollectionPersister<T, K> + ?Sized,
    {
        if !self.has_queued_operations() {
            return Ok(FlushOutcome::Skipped);
        }
        let (session, owner_id) = self.live_session()?;
        let changes = diff::from_queue(
            self.descriptor().element_type(),
            self.queued_operations(),
            self.descriptor().options().orphan_delete,
        );
        if changes.is_empty() && changes.orphans.is_empty() {
            tracing::debug!(role = %self.role(), owner = %owner_id, "queued operations cancel out");
            self.after_queue_flush(&session, owner_id)?;
            return Ok(FlushOutcome::Clean);
        }
        persister.apply(owner_id, self.descriptor(), &changes)?;
        session.stats.record_collection_flushed();
        tracing::debug!(
            role = %self.role(),
            owner = %owner_id,
            operations = self.queued_operations().len(),
            "queued operations flushed"
        );
        self.after_queue_flush(&session, owner_id)?;
        Ok(FlushOutcome::from_changes(&changes))
    }

    fn flush_loaded<P>(&mut self, persister: &mut P) -> CoreResult<FlushOutcome>
    where
        P: CollectionPersister<T, K> + ?Sized,
    {
        if !self.is_dirty() {
            if let Some(session) = self.owner().and_then(|owner| owner.session().ok()) {
                session.stats.record_flush_skipped();
            }
            return Ok(FlushOutcome::Skipped);
        }
        if self.equals_snapshot() {
            self.mark_clean();
            return Ok(FlushOutcome::Clean);
        }
        let (session, owner_id) = self.live_session()?;
        let changes = self.diff()?;
        persister.apply(owner_id, self.descriptor(), &changes)?;
        session.stats.record_collection_flushed();
        tracing::debug!(
            role = %self.role(),
            owner = %owner_id,
            deletions = changes.deletions.len(),
            updates = changes.updates.len(),
            insertions = changes.insertions.len(),
            truncated = changes.truncate,
            "collection flushed"
        );
        self.after_flush(&session, owner_id)?;
        Ok(FlushOutcome::from_changes(&changes))
    }
}

/// Flushes `collection` through `persister`.
///
/// Works with any shape facade through deref.
///
/// # Errors
///
/// See [`CollectionCore::flush`].
pub fn flush_collection<T, K, P>(collection: &mut CollectionCore<T, K>, persister: &mut P) -> CoreResult<FlushOutcome>
where
    T: ElementType,
    K: Scalar,
    P: CollectionPersister<T, K> + ?Sized,
{
    collection.flush(persister)
}
