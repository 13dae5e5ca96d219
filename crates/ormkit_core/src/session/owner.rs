//! Back-reference from a collection to the unit of work that owns it.

use crate::config::SessionConfig;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::loader::CollectionLoader;
use crate::stats::SessionStats;
use crate::types::{OwnerSlot, Role, UnitOfWorkId};
use ormkit_cache::CacheRegion;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

/// One row of the session's entity table.
#[derive(Debug, Clone)]
pub(crate) struct EntityEntry {
    pub(crate) id: EntityId,
    pub(crate) dirty: bool,
}

/// State shared between a [`super::Session`] and the collections it created.
///
/// Only the session holds a strong reference; collections hold a
/// [`Weak`] one through their [`OwnerContext`].
pub(crate) struct SessionShared {
    pub(crate) id: UnitOfWorkId,
    pub(crate) config: SessionConfig,
    pub(crate) loader: Arc<dyn CollectionLoader>,
    pub(crate) cache: Option<Arc<dyn CacheRegion>>,
    pub(crate) entities: Mutex<Vec<EntityEntry>>,
    pub(crate) attached: Mutex<HashSet<(OwnerSlot, Role)>>,
    pub(crate) is_open: RwLock<bool>,
    pub(crate) stats: SessionStats,
}

impl SessionShared {
    pub(crate) fn is_open(&self) -> bool {
        *self.is_open.read()
    }
}

/// Non-owning handle from a collection to its owner entity and session.
///
/// The handle stays valid as a value after the session ends; every access
/// through it then fails with [`CoreError::Lifecycle`].
pub struct OwnerContext {
    session: Weak<SessionShared>,
    slot: OwnerSlot,
    owner_id: EntityId,
    unit_of_work: UnitOfWorkId,
}

impl OwnerContext {
    pub(crate) fn new(shared: &Arc<SessionShared>, slot: OwnerSlot, owner_id: EntityId) -> Self {
        Self {
            session: Arc::downgrade(shared),
            slot,
            owner_id,
            unit_of_work: shared.id,
        }
    }

    /// Identifier of the owner entity.
    #[must_use]
    pub fn owner_id(&self) -> EntityId {
        self.owner_id
    }

    /// The owner's slot in the session entity table.
    #[must_use]
    pub fn slot(&self) -> OwnerSlot {
        self.slot
    }

    /// The unit of work this handle belongs to.
    #[must_use]
    pub fn unit_of_work(&self) -> UnitOfWorkId {
        self.unit_of_work
    }

    /// Whether the owning session still exists and is open.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.session.upgrade().is_some_and(|s| s.is_open())
    }

    /// Whether the session permits queuing mutations.
    #[must_use]
    pub fn queue_permitted(&self) -> bool {
        self.session
            .upgrade()
            .is_some_and(|s| s.is_open() && s.config.queue_operations)
    }

    /// Flags the owner entity as modified.
    pub fn mark_owner_dirty(&self) {
        if let Some(shared) = self.session.upgrade() {
            if let Some(entry) = shared.entities.lock().get_mut(self.slot.0) {
                entry.dirty = true;
            }
        }
    }

    pub(crate) fn session(&self) -> CoreResult<Arc<SessionShared>> {
        match self.session.upgrade() {
            Some(shared) if shared.is_open() => Ok(shared),
            Some(shared) => Err(CoreError::lifecycle(format!(
                "{} is closed",
                shared.id
            ))),
            None => Err(CoreError::lifecycle(format!(
                "{} has ended",
                self.unit_of_work
            ))),
        }
    }

    pub(crate) fn release(&self, role: &Role) {
        if let Some(shared) = self.session.upgrade() {
            shared.attached.lock().remove(&(self.slot, role.clone()));
        }
    }
}

impl fmt::Debug for OwnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerContext")
            .field("owner_id", &self.owner_id)
            .field("slot", &self.slot)
            .field("unit_of_work", &self.unit_of_work)
            .field("live", &self.is_live())
            .finish()
    }
}
