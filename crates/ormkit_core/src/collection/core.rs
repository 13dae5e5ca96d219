//! The persistent collection state machine shared by every shape.

use super::aggregate::{Aggregate, AggregateBuilder};
use super::cache_codec::CachedCollection;
use super::delayed::{DelayedOperation, Slot};
use super::diff::{self, ChangeSet};
use super::role::{RoleDescriptor, ShapeKind};
use super::state::CollectionState;
use crate::element::{ElementType, Scalar, Unkeyed};
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::loader::{ElementProbe, RowSlot};
use crate::session::{OwnerContext, Session, SessionShared};
use crate::types::{OwnerSlot, Role};
use ormkit_cache::CacheKey;
use std::fmt;
use std::sync::Arc;

/// What the delayed-operation queue says about an element.
enum Membership {
    Present,
    Absent,
    Unknown,
}

/// Lazy, dirty-tracking wrapper around an [`Aggregate`].
///
/// The typed facades ([`super::PersistentList`], [`super::PersistentSet`],
/// [`super::PersistentMap`]) dereference to this type, so the lifecycle
/// operations below are available on all of them.
///
/// # Lifecycle
///
/// ```text
/// Unbound <-> Uninitialized -> Initializing -> Initialized
///                   ^               |          ReadOnlyInitialized
///                   +--- failure ---+
/// ```
///
/// A failed initialization returns to `Uninitialized` with the queue
/// untouched, so the same call can be retried.
pub struct CollectionCore<T: ElementType, K: Scalar = Unkeyed> {
    descriptor: Arc<RoleDescriptor<T>>,
    owner: Option<OwnerContext>,
    state: CollectionState,
    aggregate: Aggregate<T, K>,
    snapshot: Option<Aggregate<T, K>>,
    dirty: bool,
    cached_size: Option<usize>,
    queue: Vec<DelayedOperation<T::Element, K>>,
    read_only: bool,
}

impl<T: ElementType, K: Scalar> CollectionCore<T, K> {
    /// An unloaded collection of a loaded owner.
    pub(crate) fn lazy(descriptor: Arc<RoleDescriptor<T>>, owner: OwnerContext, read_only: bool) -> Self {
        let aggregate = Aggregate::empty(descriptor.shape());
        Self {
            descriptor,
            owner: Some(owner),
            state: CollectionState::Uninitialized,
            aggregate,
            snapshot: None,
            dirty: false,
            cached_size: None,
            queue: Vec::new(),
            read_only,
        }
    }

    /// A new collection built from application-supplied elements. Its
    /// snapshot is empty, so every element is an insertion at flush.
    pub(crate) fn wrapped(
        descriptor: Arc<RoleDescriptor<T>>,
        owner: OwnerContext,
        aggregate: Aggregate<T, K>,
    ) -> Self {
        let snapshot = descriptor
            .options()
            .dirty_checking
            .then(|| Aggregate::empty(descriptor.shape()));
        let dirty = !aggregate.is_empty();
        if dirty {
            owner.mark_owner_dirty();
        }
        Self {
            descriptor,
            owner: Some(owner),
            state: CollectionState::Initialized,
            aggregate,
            snapshot,
            dirty,
            cached_size: None,
            queue: Vec::new(),
            read_only: false,
        }
    }

    /// The role this collection maps.
    pub fn role(&self) -> &Role {
        self.descriptor.role()
    }

    /// The role descriptor.
    pub fn descriptor(&self) -> &Arc<RoleDescriptor<T>> {
        &self.descriptor
    }

    /// The aggregate shape.
    pub fn shape(&self) -> ShapeKind {
        self.descriptor.shape()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Whether the contents are in memory.
    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    /// Whether a direct mutation happened since the last snapshot.
    ///
    /// Queued operations do not set this flag until they are replayed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The owner handle, if attached.
    pub fn owner(&self) -> Option<&OwnerContext> {
        self.owner.as_ref()
    }

    /// Operations recorded while unloaded, oldest first.
    pub fn queued_operations(&self) -> &[DelayedOperation<T::Element, K>] {
        &self.queue
    }

    /// Whether any operation is queued.
    pub fn has_queued_operations(&self) -> bool {
        !self.queue.is_empty()
    }

    /// The snapshot taken at initialization, if any.
    pub fn snapshot(&self) -> Option<&Aggregate<T, K>> {
        self.snapshot.as_ref()
    }

    /// The prefetched element count, if known.
    pub fn cached_size(&self) -> Option<usize> {
        self.cached_size
    }

    /// Records an element count prefetched by the owner's loader so that
    /// size queries can be answered without loading. Ignored once the
    /// collection is initialized.
    pub fn set_cached_size(&mut self, size: usize) {
        if !self.is_initialized() {
            self.cached_size = Some(size);
        }
    }

    /// Switches read-only mode. Flush skips read-only collections.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        self.state = match (self.state, read_only) {
            (CollectionState::Initialized, true) => CollectionState::ReadOnlyInitialized,
            (CollectionState::ReadOnlyInitialized, false) => CollectionState::Initialized,
            (state, _) => state,
        };
    }

    /// Attaches a detached collection to `session` for `owner`.
    ///
    /// An unbound collection becomes uninitialized again; its queue is kept.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the collection is still
    /// attached to a live session, or if `session` already holds a
    /// collection for this owner and role.
    pub fn bind(&mut self, session: &Session, owner: OwnerSlot) -> CoreResult<()> {
        if self.owner.as_ref().is_some_and(OwnerContext::is_live) {
            return Err(CoreError::invalid_operation(format!(
                "{} is still attached to a live session",
                self.role()
            )));
        }
        let context = session.attach(owner, self.descriptor.role())?;
        if let Some(previous) = self.owner.replace(context) {
            previous.release(self.descriptor.role());
        }
        if self.state == CollectionState::Unbound {
            self.state = CollectionState::Uninitialized;
        }
        tracing::debug!(role = %self.role(), state = %self.state, "collection bound");
        Ok(())
    }

    /// Detaches the collection from its session.
    ///
    /// Loaded contents stay readable and writable. An uninitialized
    /// collection becomes unbound.
    pub fn unbind(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.release(self.descriptor.role());
        }
        if self.state == CollectionState::Uninitialized {
            self.state = CollectionState::Unbound;
        }
    }

    /// Loads the contents if they are not in memory yet.
    ///
    /// The second-level cache is consulted first when the role is
    /// cacheable; otherwise, or on a miss, the session's loader runs. The
    /// snapshot captures the stored contents, then queued operations are
    /// replayed in order and the queue is cleared. The collection is dirty
    /// afterwards iff anything was replayed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Lifecycle`] if the owning session is gone or closed
    /// - [`CoreError::SourceUnavailable`] from the loader or cache region
    /// - [`CoreError::InvariantViolation`] if a queued operation cannot replay
    ///
    /// On error the collection stays uninitialized with its queue intact.
    pub fn ensure_initialized(&mut self) -> CoreResult<()> {
        match self.state {
            CollectionState::Initialized | CollectionState::ReadOnlyInitialized => return Ok(()),
            CollectionState::Initializing => {
                return Err(CoreError::invalid_operation(format!(
                    "{} is already initializing",
                    self.role()
                )));
            }
            CollectionState::Unbound => return Err(self.unbound_error()),
            CollectionState::Uninitialized => {}
        }

        let (session, owner_id) = self.live_session()?;
        self.state = CollectionState::Initializing;
        let result = self
            .load_contents(&session, owner_id)
            .and_then(|loaded| self.replay_onto(loaded));
        match result {
            Ok((aggregate, snapshot)) => {
                let replayed = self.complete_initialization(aggregate, snapshot);
                if replayed > 0 {
                    session.stats.record_queue_replayed();
                }
                tracing::debug!(
                    role = %self.role(),
                    owner = %owner_id,
                    session = %session.id,
                    size = self.aggregate.len(),
                    replayed,
                    "collection initialized"
                );
                Ok(())
            }
            Err(e) => {
                self.state = CollectionState::Uninitialized;
                tracing::debug!(role = %self.role(), owner = %owner_id, error = %e, "initialization failed");
                Err(e)
            }
        }
    }

    /// Initializes from a cache entry instead of the loader.
    ///
    /// The snapshot equals the entry's contents, so the collection starts
    /// clean unless operations were queued.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if already initialized,
    /// [`CoreError::Lifecycle`] if unbound, and shape or conversion errors
    /// from the entry.
    pub fn assemble(&mut self, cached: &CachedCollection) -> CoreResult<()> {
        match self.state {
            CollectionState::Uninitialized => {}
            CollectionState::Unbound => return Err(self.unbound_error()),
            state => {
                return Err(CoreError::invalid_operation(format!(
                    "cannot assemble {} collection {}",
                    state,
                    self.role()
                )));
            }
        }
        let aggregate = cached.assemble(self.descriptor.element_type(), self.shape())?;
        let (aggregate, snapshot) = self.replay_onto(aggregate)?;
        let replayed = self.complete_initialization(aggregate, snapshot);
        tracing::debug!(role = %self.role(), size = cached.len(), replayed, "collection assembled from cache entry");
        Ok(())
    }

    /// Externalizes the contents for a cache, loading them first.
    ///
    /// # Errors
    ///
    /// Returns initialization errors, or a conversion error if an element
    /// cannot be externalized.
    pub fn disassemble(&mut self) -> CoreResult<CachedCollection> {
        self.ensure_initialized()?;
        CachedCollection::disassemble(self.descriptor.element_type(), &self.aggregate)
    }

    /// Whether the contents equal the snapshot.
    ///
    /// An uninitialized collection equals its stored state iff nothing is
    /// queued. An initialized collection without a snapshot never does.
    pub fn equals_snapshot(&self) -> bool {
        match (self.is_initialized(), &self.snapshot) {
            (false, _) => self.queue.is_empty(),
            (true, Some(snapshot)) => {
                diff::equals_snapshot(self.descriptor.element_type(), snapshot, &self.aggregate)
            }
            (true, None) => false,
        }
    }

    /// Row work relative to the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the collection is not
    /// initialized.
    pub fn diff(&self) -> CoreResult<ChangeSet<T::Element, K>> {
        if !self.is_initialized() {
            return Err(CoreError::invalid_operation(format!(
                "cannot diff uninitialized collection {}",
                self.role()
            )));
        }
        diff::diff(
            self.descriptor.element_type(),
            self.snapshot.as_ref(),
            &self.aggregate,
            self.descriptor.options().orphan_delete,
        )
    }

    /// Snapshot elements no longer present, for cascade-delete.
    pub fn orphans(&self) -> Vec<T::Element> {
        match (&self.snapshot, self.is_initialized()) {
            (Some(snapshot), true) => diff::orphans(self.descriptor.element_type(), snapshot, &self.aggregate),
            _ => Vec::new(),
        }
    }

    /// Elements introduced by queued operations, for cascade-persist.
    pub fn queued_additions(&self) -> Vec<&T::Element> {
        self.queue.iter().filter_map(DelayedOperation::added_instance).collect()
    }

    /// Stored elements displaced by queued operations, for cascade-delete.
    /// Elements the queue added and then removed again are not included.
    pub fn queued_orphans(&self) -> Vec<T::Element> {
        diff::from_queue(self.descriptor.element_type(), &self.queue, true).orphans
    }

    // ========================================================================
    // Shape facades
    // ========================================================================

    /// Loaded contents together with the element type.
    pub(crate) fn contents(&mut self) -> CoreResult<(&T, &Aggregate<T, K>)> {
        self.ensure_initialized()?;
        Ok((self.descriptor.element_type(), &self.aggregate))
    }

    /// Writable loaded contents together with the element type. Callers
    /// must call [`Self::mark_dirty`] after a successful mutation.
    pub(crate) fn contents_mut(&mut self) -> CoreResult<(&T, &mut Aggregate<T, K>)> {
        self.check_writable()?;
        self.ensure_initialized()?;
        Ok((self.descriptor.element_type(), &mut self.aggregate))
    }

    pub(crate) fn check_writable(&self) -> CoreResult<()> {
        if self.read_only {
            return Err(CoreError::invalid_operation(format!("{} is read-only", self.role())));
        }
        Ok(())
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        if let Some(owner) = &self.owner {
            owner.mark_owner_dirty();
        }
    }

    /// Whether the next mutation may be queued instead of loading.
    pub(crate) fn queue_enabled(&self) -> bool {
        self.state == CollectionState::Uninitialized
            && !self.read_only
            && self.descriptor.options().queue_operations
            && self.owner.as_ref().is_some_and(OwnerContext::queue_permitted)
    }

    pub(crate) fn enqueue(&mut self, operation: DelayedOperation<T::Element, K>) {
        if let Some(owner) = &self.owner {
            owner.mark_owner_dirty();
            if let Ok(session) = owner.session() {
                session.stats.record_operation_queued();
            }
        }
        tracing::trace!(
            role = %self.role(),
            operation = operation.kind(),
            queued = self.queue.len() + 1,
            "operation queued"
        );
        self.queue.push(operation);
    }

    /// Answers a size query without loading, when possible.
    pub(crate) fn fast_size(&mut self) -> CoreResult<Option<usize>> {
        if self.state != CollectionState::Uninitialized || !self.queue.is_empty() {
            return Ok(None);
        }
        let (session, owner_id) = self.live_session()?;
        if self.cached_size.is_some() || !self.descriptor.options().extra_lazy {
            return Ok(self.cached_size);
        }
        session.stats.record_probe();
        let size = session.loader.read_size(owner_id, self.descriptor.role())?;
        tracing::trace!(role = %self.role(), size = ?size, "size probe");
        self.cached_size = size;
        Ok(size)
    }

    /// Whether an element with the identity of `element` is in the
    /// collection, answered from the queue or an extra-lazy existence
    /// probe. `None` means a load is needed.
    pub(crate) fn probe_membership(&mut self, element: &T::Element) -> CoreResult<Option<bool>> {
        match self.queued_membership(element) {
            Some(Membership::Present) => return Ok(Some(true)),
            Some(Membership::Absent) => return Ok(Some(false)),
            Some(Membership::Unknown) => return Ok(None),
            None => {}
        }
        if !self.descriptor.options().extra_lazy {
            return Ok(None);
        }
        let (session, owner_id) = self.live_session()?;
        let id = self.descriptor.element_type().externalize_id(element)?;
        session.stats.record_probe();
        let found = session.loader.element_exists(owner_id, self.descriptor.role(), &id)?;
        tracing::trace!(role = %self.role(), found = ?found, "existence probe");
        Ok(found)
    }

    /// The element stored under `key`, answered from the queue or an
    /// extra-lazy element probe. `None` means a load is needed.
    pub(crate) fn probe_key(&mut self, key: &K) -> CoreResult<Option<Option<T::Element>>> {
        for op in self.queue.iter().rev() {
            match op {
                DelayedOperation::Clear => return Ok(Some(None)),
                DelayedOperation::Add {
                    slot: Slot::Key(k),
                    value,
                } if k == key => return Ok(Some(Some(value.clone()))),
                DelayedOperation::Replace {
                    slot: Slot::Key(k),
                    new,
                    ..
                } if k == key => return Ok(Some(Some(new.clone()))),
                DelayedOperation::Remove { slot: Slot::Key(k), .. } if k == key => return Ok(Some(None)),
                _ => {}
            }
        }
        if !self.descriptor.options().extra_lazy {
            return Ok(None);
        }
        let (session, owner_id) = self.live_session()?;
        session.stats.record_probe();
        let probe = session
            .loader
            .element_at(owner_id, self.descriptor.role(), &RowSlot::Key(key.to_value()))?;
        tracing::trace!(role = %self.role(), key = ?key, probe = ?probe, "element probe");
        match probe {
            None => Ok(None),
            Some(ElementProbe::Absent) => Ok(Some(None)),
            Some(ElementProbe::Present(value)) if value.is_null() => Ok(Some(None)),
            Some(ElementProbe::Present(value)) => {
                Ok(Some(Some(self.descriptor.element_type().internalize(&value)?)))
            }
        }
    }

    // ========================================================================
    // Flush support
    // ========================================================================

    /// The in-memory contents without triggering a load.
    pub(crate) fn current(&self) -> &Aggregate<T, K> {
        &self.aggregate
    }

    /// The live session and owner identifier.
    ///
    /// An uninitialized collection whose session is gone becomes unbound.
    pub(crate) fn live_session(&mut self) -> CoreResult<(Arc<SessionShared>, EntityId)> {
        let result = match &self.owner {
            Some(owner) => owner.session().map(|session| (session, owner.owner_id())),
            None => Err(self.unbound_error()),
        };
        if result.is_err() && self.state == CollectionState::Uninitialized {
            self.state = CollectionState::Unbound;
        }
        result
    }

    /// Marks an initialized collection clean without writing.
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Takes a new snapshot after the persister wrote the diff.
    pub(crate) fn after_flush(&mut self, session: &SessionShared, owner_id: EntityId) -> CoreResult<()> {
        let element_type = self.descriptor.element_type();
        self.snapshot = self
            .descriptor
            .options()
            .dirty_checking
            .then(|| self.aggregate.deep_copy(element_type));
        self.dirty = false;
        self.evict_cached(session, owner_id)
    }

    /// Forgets queued operations after the persister wrote them.
    pub(crate) fn after_queue_flush(&mut self, session: &SessionShared, owner_id: EntityId) -> CoreResult<()> {
        self.queue.clear();
        self.cached_size = None;
        self.evict_cached(session, owner_id)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn unbound_error(&self) -> CoreError {
        CoreError::lifecycle(format!("{} is not attached to a session", self.role()))
    }

    fn cache_key(&self, owner_id: EntityId) -> CacheKey {
        CacheKey::new(self.role().as_str(), *owner_id.as_bytes())
    }

    /// Drops the cache entry made stale by a write. Runs in every cache
    /// mode.
    fn evict_cached(&self, session: &SessionShared, owner_id: EntityId) -> CoreResult<()> {
        let Some(region) = session.cache.as_ref().filter(|_| self.descriptor.options().cacheable) else {
            return Ok(());
        };
        if region.evict(&self.cache_key(owner_id))? {
            session.stats.record_cache_eviction();
            tracing::debug!(role = %self.role(), owner = %owner_id, "stale cache entry evicted");
        }
        Ok(())
    }

    fn load_contents(&self, session: &SessionShared, owner_id: EntityId) -> CoreResult<Aggregate<T, K>> {
        let element_type = self.descriptor.element_type();
        let role = self.descriptor.role();
        let region = session
            .cache
            .as_ref()
            .filter(|_| self.descriptor.options().cacheable);
        let key = self.cache_key(owner_id);

        if let Some(region) = region.filter(|_| session.config.cache_mode.reads()) {
            let entry = region.get(&key).map_err(region_unavailable)?;
            match entry {
                Some(bytes) => {
                    match CachedCollection::decode(&bytes).and_then(|c| c.assemble(element_type, self.shape())) {
                        Ok(aggregate) => {
                            session.stats.record_cache_hit();
                            tracing::debug!(role = %role, owner = %owner_id, "cache hit");
                            return Ok(aggregate);
                        }
                        Err(e) => {
                            tracing::warn!(
                                role = %role,
                                owner = %owner_id,
                                error = %e,
                                "evicting unreadable cache entry"
                            );
                            region.evict(&key).map_err(region_unavailable)?;
                            session.stats.record_cache_eviction();
                        }
                    }
                }
                None => {
                    session.stats.record_cache_miss();
                    tracing::debug!(role = %role, owner = %owner_id, "cache miss");
                }
            }
        }

        let mut builder = AggregateBuilder::new(element_type, self.shape());
        session.loader.load(owner_id, role, &mut builder)?;
        let anticipated = builder.anticipated_size();
        let aggregate = builder.finish();
        session.stats.record_collection_loaded();
        tracing::debug!(
            role = %role,
            owner = %owner_id,
            anticipated = ?anticipated,
            rows = aggregate.len(),
            "collection loaded"
        );

        if let Some(region) = region.filter(|_| session.config.cache_mode.writes()) {
            match CachedCollection::disassemble(element_type, &aggregate).and_then(|c| c.encode()) {
                Ok(bytes) => match region.put(key, bytes) {
                    Ok(()) => session.stats.record_cache_put(),
                    Err(e) => tracing::warn!(role = %role, owner = %owner_id, error = %e, "cache put failed"),
                },
                Err(e) => {
                    tracing::warn!(role = %role, owner = %owner_id, error = %e, "contents not cacheable");
                }
            }
        }
        Ok(aggregate)
    }

    /// Snapshots `loaded`, then replays the queue onto it.
    fn replay_onto(
        &self,
        mut loaded: Aggregate<T, K>,
    ) -> CoreResult<(Aggregate<T, K>, Option<Aggregate<T, K>>)> {
        let element_type = self.descriptor.element_type();
        let snapshot = self
            .descriptor
            .options()
            .dirty_checking
            .then(|| loaded.deep_copy(element_type));
        for op in &self.queue {
            op.apply(element_type, &mut loaded)?;
        }
        Ok((loaded, snapshot))
    }

    /// Installs replayed contents. Returns how many operations were replayed.
    fn complete_initialization(&mut self, aggregate: Aggregate<T, K>, snapshot: Option<Aggregate<T, K>>) -> usize {
        let replayed = self.queue.len();
        self.aggregate = aggregate;
        self.snapshot = snapshot;
        self.dirty = replayed > 0;
        self.queue.clear();
        self.cached_size = None;
        self.state = if self.read_only {
            CollectionState::ReadOnlyInitialized
        } else {
            CollectionState::Initialized
        };
        replayed
    }

    fn queued_membership(&self, element: &T::Element) -> Option<Membership> {
        let element_type = self.descriptor.element_type();
        let id = element_type.id_of(element);
        for op in self.queue.iter().rev() {
            let answer = match op {
                DelayedOperation::Clear => Some(Membership::Absent),
                DelayedOperation::Add { value, .. } if element_type.id_of(value) == id => Some(Membership::Present),
                DelayedOperation::Remove { value, .. } if element_type.id_of(value) == id => {
                    Some(Membership::Absent)
                }
                DelayedOperation::Replace { new, .. } if element_type.id_of(new) == id => Some(Membership::Present),
                DelayedOperation::Replace { old, .. } if element_type.id_of(old) == id => Some(Membership::Absent),
                _ => None,
            };
            if let Some(answer) = answer {
                // A list may hold duplicates, so only a clear is conclusive.
                return Some(match (self.shape(), answer) {
                    (ShapeKind::Sequence, Membership::Absent) if !matches!(op, DelayedOperation::Clear) => {
                        Membership::Unknown
                    }
                    (ShapeKind::Sequence, Membership::Present) => Membership::Unknown,
                    (_, answer) => answer,
                });
            }
        }
        None
    }
}

fn region_unavailable(e: ormkit_cache::CacheError) -> CoreError {
    CoreError::source_unavailable(format!("cache region: {e}"))
}

impl<T: ElementType, K: Scalar> Drop for CollectionCore<T, K> {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.release(self.descriptor.role());
        }
    }
}

impl<T: ElementType, K: Scalar> fmt::Debug for CollectionCore<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionCore")
            .field("role", self.role())
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .field("queued", &self.queue.len())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
