//! Unit of work.
//!
//! A [`Session`] owns the entity table that collections point back into,
//! the loader used to populate them and, optionally, a second-level cache
//! region. Collections hold only a weak handle ([`OwnerContext`]), so
//! closing or dropping the session unbinds every collection that has not
//! been loaded yet.

mod owner;

pub use owner::OwnerContext;
pub(crate) use owner::{EntityEntry, SessionShared};

use crate::collection::{
    Aggregate, CollectionCore, PersistentList, PersistentMap, PersistentSet, RoleDescriptor, ShapeKind,
};
use crate::config::SessionConfig;
use crate::element::{ElementType, Scalar};
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::loader::CollectionLoader;
use crate::stats::SessionStats;
use crate::types::{OwnerSlot, Role, UnitOfWorkId};
use ormkit_cache::CacheRegion;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A unit of work.
///
/// # Example
///
/// ```rust,ignore
/// let session = Session::open(SessionConfig::default(), loader);
/// let owner = session.register_owner(order_id)?;
/// let mut lines = session.lazy_list(owner, &lines_role)?;
/// lines.push(line)?;
/// session.close();
/// ```
pub struct Session {
    shared: Arc<SessionShared>,
}

impl Session {
    /// Opens a session without a cache region.
    pub fn open(config: SessionConfig, loader: Arc<dyn CollectionLoader>) -> Self {
        Self::build(config, loader, None)
    }

    /// Opens a session backed by `cache` for cacheable roles.
    pub fn open_with_cache(
        config: SessionConfig,
        loader: Arc<dyn CollectionLoader>,
        cache: Arc<dyn CacheRegion>,
    ) -> Self {
        Self::build(config, loader, Some(cache))
    }

    fn build(
        config: SessionConfig,
        loader: Arc<dyn CollectionLoader>,
        cache: Option<Arc<dyn CacheRegion>>,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            id: UnitOfWorkId::next(),
            config,
            loader,
            cache,
            entities: Mutex::new(Vec::new()),
            attached: Mutex::new(HashSet::new()),
            is_open: RwLock::new(true),
            stats: SessionStats::new(),
        });
        tracing::debug!(session = %shared.id, cached = shared.cache.is_some(), "session opened");
        Self { shared }
    }

    /// The unit-of-work identifier.
    #[must_use]
    pub fn id(&self) -> UnitOfWorkId {
        self.shared.id
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Session counters.
    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.shared.stats
    }

    /// The cache region, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<dyn CacheRegion>> {
        self.shared.cache.as_ref()
    }

    /// Checks if the session is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Closes the session.
    ///
    /// Collections that were never loaded become unbound. Loaded ones keep
    /// their contents but can no longer flush pending work.
    pub fn close(&self) {
        let mut is_open = self.shared.is_open.write();
        if !*is_open {
            return;
        }
        *is_open = false;
        self.shared.attached.lock().clear();
        tracing::debug!(session = %self.shared.id, "session closed");
    }

    // ========================================================================
    // Entity table
    // ========================================================================

    /// Registers an owner entity, returning its slot. Registering the same
    /// identifier twice returns the same slot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Lifecycle`] if the session is closed.
    pub fn register_owner(&self, id: EntityId) -> CoreResult<OwnerSlot> {
        self.ensure_open()?;
        let mut entities = self.shared.entities.lock();
        if let Some(index) = entities.iter().position(|e| e.id == id) {
            return Ok(OwnerSlot(index));
        }
        entities.push(EntityEntry { id, dirty: false });
        Ok(OwnerSlot(entities.len() - 1))
    }

    /// The identifier registered at `slot`.
    #[must_use]
    pub fn owner_id(&self, slot: OwnerSlot) -> Option<EntityId> {
        self.shared.entities.lock().get(slot.0).map(|e| e.id)
    }

    /// Whether a collection of the owner at `slot` changed.
    #[must_use]
    pub fn is_owner_dirty(&self, slot: OwnerSlot) -> bool {
        self.shared.entities.lock().get(slot.0).is_some_and(|e| e.dirty)
    }

    /// Resets the owner's dirty flag, typically after a flush.
    pub fn clear_owner_dirty(&self, slot: OwnerSlot) {
        if let Some(entry) = self.shared.entities.lock().get_mut(slot.0) {
            entry.dirty = false;
        }
    }

    // ========================================================================
    // Collection factories
    // ========================================================================

    /// An unloaded list for the owner at `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] if the role is not a sequence,
    /// [`CoreError::Lifecycle`] if the session is closed, and
    /// [`CoreError::InvalidOperation`] if the owner already has a
    /// collection for the role.
    pub fn lazy_list<T: ElementType>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
    ) -> CoreResult<PersistentList<T>> {
        Ok(PersistentList::from_core(self.lazy_core(owner, descriptor, ShapeKind::Sequence)?))
    }

    /// An unloaded set for the owner at `owner`.
    ///
    /// # Errors
    ///
    /// See [`Session::lazy_list`].
    pub fn lazy_set<T: ElementType>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
    ) -> CoreResult<PersistentSet<T>> {
        Ok(PersistentSet::from_core(self.lazy_core(owner, descriptor, ShapeKind::Set)?))
    }

    /// An unloaded map for the owner at `owner`.
    ///
    /// # Errors
    ///
    /// See [`Session::lazy_list`].
    pub fn lazy_map<K: Scalar, T: ElementType>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
    ) -> CoreResult<PersistentMap<K, T>> {
        Ok(PersistentMap::from_core(self.lazy_core(owner, descriptor, ShapeKind::Keyed)?))
    }

    /// A new list holding `elements`. Every element is an insertion at the
    /// first flush.
    ///
    /// # Errors
    ///
    /// See [`Session::lazy_list`].
    pub fn wrap_list<T, I>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
        elements: I,
    ) -> CoreResult<PersistentList<T>>
    where
        T: ElementType,
        I: IntoIterator<Item = T::Element>,
    {
        let aggregate = Aggregate::Sequence(elements.into_iter().map(Some).collect());
        Ok(PersistentList::from_core(self.wrapped_core(owner, descriptor, aggregate)?))
    }

    /// A new set holding `elements`, deduplicated by identity.
    ///
    /// # Errors
    ///
    /// See [`Session::lazy_list`].
    pub fn wrap_set<T, I>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
        elements: I,
    ) -> CoreResult<PersistentSet<T>>
    where
        T: ElementType,
        I: IntoIterator<Item = T::Element>,
    {
        let element_type = descriptor.element_type();
        let mut items = BTreeMap::new();
        for element in elements {
            items.entry(element_type.id_of(&element)).or_insert(element);
        }
        Ok(PersistentSet::from_core(self.wrapped_core(owner, descriptor, Aggregate::Set(items))?))
    }

    /// A new map holding `entries`. A repeated key keeps the last element.
    ///
    /// # Errors
    ///
    /// See [`Session::lazy_list`].
    pub fn wrap_map<K, T, I>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
        entries: I,
    ) -> CoreResult<PersistentMap<K, T>>
    where
        K: Scalar,
        T: ElementType,
        I: IntoIterator<Item = (K, T::Element)>,
    {
        let aggregate = Aggregate::Keyed(entries.into_iter().collect());
        Ok(PersistentMap::from_core(self.wrapped_core(owner, descriptor, aggregate)?))
    }

    fn lazy_core<T: ElementType, K: Scalar>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
        shape: ShapeKind,
    ) -> CoreResult<CollectionCore<T, K>> {
        descriptor.expect_shape(shape)?;
        let context = self.attach(owner, descriptor.role())?;
        Ok(CollectionCore::lazy(
            Arc::clone(descriptor),
            context,
            self.shared.config.default_read_only,
        ))
    }

    fn wrapped_core<T: ElementType, K: Scalar>(
        &self,
        owner: OwnerSlot,
        descriptor: &Arc<RoleDescriptor<T>>,
        aggregate: Aggregate<T, K>,
    ) -> CoreResult<CollectionCore<T, K>> {
        descriptor.expect_shape(aggregate.shape())?;
        let context = self.attach(owner, descriptor.role())?;
        Ok(CollectionCore::wrapped(Arc::clone(descriptor), context, aggregate))
    }

    /// Registers a collection of `role` for the owner at `slot`.
    pub(crate) fn attach(&self, slot: OwnerSlot, role: &Role) -> CoreResult<OwnerContext> {
        self.ensure_open()?;
        let owner_id = self.owner_id(slot).ok_or_else(|| {
            CoreError::invalid_operation(format!("no owner registered at slot {}", slot.index()))
        })?;
        if !self.shared.attached.lock().insert((slot, role.clone())) {
            return Err(CoreError::invalid_operation(format!(
                "owner {owner_id} already has a collection for {role} in {}",
                self.shared.id
            )));
        }
        Ok(OwnerContext::new(&self.shared, slot, owner_id))
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::lifecycle(format!("{} is closed", self.shared.id)))
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("is_open", &self.is_open())
            .field("owners", &self.shared.entities.lock().len())
            .field("attached", &self.shared.attached.lock().len())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
