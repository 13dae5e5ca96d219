//! Test fixtures and session helpers.
//!
//! [`InMemoryStore`] keeps collection rows per owner and role. It loads
//! collections for a [`Session`], answers extra-lazy probes, and is the
//! storage behind [`crate::StorePersister`].
//!
//! Set rows and unordered list deletions match elements by identity. The
//! store learns a role's identities when it is seeded through a
//! descriptor (or via [`InMemoryStore::register_identity`]); rows of other
//! roles are identified by their whole value.

use ormkit_cache::InMemoryRegion;
use ormkit_codec::Value;
use ormkit_core::{
    CollectionLoader, CoreError, CoreResult, ElementProbe, ElementType, EntityId, OwnerSlot, Role, RoleDescriptor,
    RoleOptions, RowSink, RowSlot, Scalar, Session, SessionConfig, ShapeKind, TextType,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Stored rows of one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRows {
    /// Index-ordered rows; `Value::Null` marks a gap.
    Sequence(Vec<Value>),
    /// Unordered rows.
    Set(Vec<Value>),
    /// `(key, element)` rows.
    Keyed(Vec<(Value, Value)>),
}

impl StoredRows {
    /// No rows of `shape`.
    pub fn empty(shape: ShapeKind) -> Self {
        match shape {
            ShapeKind::Sequence => Self::Sequence(Vec::new()),
            ShapeKind::Set => Self::Set(Vec::new()),
            ShapeKind::Keyed => Self::Keyed(Vec::new()),
        }
    }

    /// Number of rows (gaps included for sequences).
    pub fn len(&self) -> usize {
        match self {
            Self::Sequence(rows) | Self::Set(rows) => rows.len(),
            Self::Keyed(rows) => rows.len(),
        }
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        match self {
            Self::Sequence(rows) | Self::Set(rows) => rows.clear(),
            Self::Keyed(rows) => rows.clear(),
        }
    }

    fn delete(&mut self, slot: &RowSlot, value: &Value, identify: &Identities) {
        let id = identify.of(value);
        match (self, slot) {
            (Self::Sequence(rows), RowSlot::Index(index)) => {
                if let Some(row) = rows.get_mut(*index) {
                    *row = Value::Null;
                }
            }
            (Self::Sequence(rows), _) => {
                if let Some(pos) = rows.iter().position(|r| !r.is_null() && identify.of(r) == id) {
                    rows.remove(pos);
                }
            }
            (Self::Set(rows), _) => rows.retain(|r| identify.of(r) != id),
            (Self::Keyed(rows), RowSlot::Key(key)) => rows.retain(|(k, _)| k != key),
            (Self::Keyed(_), _) => {}
        }
    }

    fn write(&mut self, slot: &RowSlot, value: Value, identify: &Identities) {
        match (self, slot) {
            (Self::Sequence(rows), RowSlot::Index(index)) => {
                if *index >= rows.len() {
                    rows.resize(*index + 1, Value::Null);
                }
                rows[*index] = value;
            }
            (Self::Sequence(rows), _) => rows.push(value),
            (Self::Set(rows), _) => {
                let id = identify.of(&value);
                if !rows.iter().any(|r| identify.of(r) == id) {
                    rows.push(value);
                }
            }
            (Self::Keyed(rows), RowSlot::Key(key)) => match rows.iter_mut().find(|(k, _)| k == key) {
                Some(row) => row.1 = value,
                None => rows.push((key.clone(), value)),
            },
            (Self::Keyed(_), _) => {}
        }
    }

    fn trim(&mut self) {
        if let Self::Sequence(rows) = self {
            while rows.last().is_some_and(Value::is_null) {
                rows.pop();
            }
        }
    }
}

/// Row work in externalized form, as handed to [`InMemoryStore::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowWork {
    /// Delete every row first.
    pub truncate: bool,
    /// Rows to delete.
    pub deletions: Vec<(RowSlot, Value)>,
    /// Rows to rewrite.
    pub updates: Vec<(RowSlot, Value)>,
    /// Rows to insert.
    pub insertions: Vec<(RowSlot, Value)>,
}

impl RowWork {
    /// Total rows touched, truncation not counted.
    pub fn row_count(&self) -> usize {
        self.deletions.len() + self.updates.len() + self.insertions.len()
    }
}

type IdentifyFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// How the rows of one role are identified.
struct Identities(Option<IdentifyFn>);

impl Identities {
    fn of(&self, value: &Value) -> Value {
        self.0
            .as_ref()
            .and_then(|identify| identify(value))
            .unwrap_or_else(|| value.clone())
    }
}

/// In-memory row storage for collections.
pub struct InMemoryStore {
    rows: Mutex<HashMap<(EntityId, Role), StoredRows>>,
    identities: Mutex<HashMap<Role, IdentifyFn>>,
    announced: Mutex<Vec<usize>>,
    offline: AtomicBool,
    probes_enabled: AtomicBool,
    loads: AtomicU64,
    probes: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            identities: Mutex::new(HashMap::new()),
            announced: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            probes_enabled: AtomicBool::new(true),
            loads: AtomicU64::new(0),
            probes: AtomicU64::new(0),
        }
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every load and probe fail with `SourceUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Whether probes return answers. When disabled they report "unknown".
    pub fn set_probes_enabled(&self, enabled: bool) {
        self.probes_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Number of full loads served.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of probes answered.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }

    /// Sizes announced to `before_initialize` by every load, oldest first.
    pub fn announced_sizes(&self) -> Vec<usize> {
        self.announced.lock().clone()
    }

    /// Identifies the rows of `descriptor`'s role through its element type.
    pub fn register_identity<T: ElementType>(&self, descriptor: &Arc<RoleDescriptor<T>>) {
        let role = descriptor.role().clone();
        let descriptor = Arc::clone(descriptor);
        let identify: IdentifyFn = Arc::new(move |value: &Value| {
            let element_type = descriptor.element_type();
            element_type
                .internalize(value)
                .and_then(|element| element_type.externalize_id(&element))
                .ok()
        });
        self.identities.lock().insert(role, identify);
    }

    fn identities(&self, role: &Role) -> Identities {
        Identities(self.identities.lock().get(role).cloned())
    }

    /// Replaces the rows of a collection.
    pub fn seed(&self, owner: EntityId, role: &Role, rows: StoredRows) {
        self.rows.lock().insert((owner, role.clone()), rows);
    }

    /// Seeds a list or set with externalized `elements`.
    pub fn seed_elements<T: ElementType>(
        &self,
        owner: EntityId,
        descriptor: &Arc<RoleDescriptor<T>>,
        elements: &[T::Element],
    ) {
        self.register_identity(descriptor);
        let element_type = descriptor.element_type();
        let values = elements
            .iter()
            .map(|e| element_type.externalize(e).expect("element externalizes"))
            .collect();
        let rows = match descriptor.shape() {
            ShapeKind::Set => StoredRows::Set(values),
            _ => StoredRows::Sequence(values),
        };
        self.seed(owner, descriptor.role(), rows);
    }

    /// Seeds a map with externalized entries.
    pub fn seed_entries<K: Scalar, T: ElementType>(
        &self,
        owner: EntityId,
        descriptor: &Arc<RoleDescriptor<T>>,
        entries: &[(K, T::Element)],
    ) {
        self.register_identity(descriptor);
        let element_type = descriptor.element_type();
        let rows = entries
            .iter()
            .map(|(k, e)| (k.to_value(), element_type.externalize(e).expect("element externalizes")))
            .collect();
        self.seed(owner, descriptor.role(), StoredRows::Keyed(rows));
    }

    /// The stored rows of a collection.
    pub fn rows(&self, owner: EntityId, role: &Role) -> Option<StoredRows> {
        self.rows.lock().get(&(owner, role.clone())).cloned()
    }

    /// Internalized non-null elements of a list or set, in row order.
    pub fn stored_elements<T: ElementType>(&self, owner: EntityId, descriptor: &RoleDescriptor<T>) -> Vec<T::Element> {
        let element_type = descriptor.element_type();
        match self.rows(owner, descriptor.role()) {
            Some(StoredRows::Sequence(rows) | StoredRows::Set(rows)) => rows
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| element_type.internalize(v).expect("stored element internalizes"))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Internalized entries of a map, sorted by key.
    pub fn stored_entries<K: Scalar, T: ElementType>(
        &self,
        owner: EntityId,
        descriptor: &RoleDescriptor<T>,
    ) -> Vec<(K, T::Element)> {
        let element_type = descriptor.element_type();
        let mut entries: Vec<(K, T::Element)> = match self.rows(owner, descriptor.role()) {
            Some(StoredRows::Keyed(rows)) => rows
                .iter()
                .map(|(k, v)| {
                    (
                        K::try_from_value(k).expect("stored key converts"),
                        element_type.internalize(v).expect("stored element internalizes"),
                    )
                })
                .collect(),
            _ => Vec::new(),
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Applies row work in order: truncate, deletions, updates, insertions.
    pub fn apply(&self, owner: EntityId, role: &Role, shape: ShapeKind, work: &RowWork) {
        let identify = self.identities(role);
        let mut rows = self.rows.lock();
        let stored = rows
            .entry((owner, role.clone()))
            .or_insert_with(|| StoredRows::empty(shape));
        if work.truncate {
            stored.clear();
        }
        for (slot, value) in &work.deletions {
            stored.delete(slot, value, &identify);
        }
        for (slot, value) in work.updates.iter().chain(&work.insertions) {
            stored.write(slot, value.clone(), &identify);
        }
        stored.trim();
    }

    fn check_online(&self) -> CoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CoreError::source_unavailable("store is offline"))
        } else {
            Ok(())
        }
    }

    fn probe<R>(&self, owner: EntityId, role: &Role, answer: impl FnOnce(Option<&StoredRows>) -> R) -> CoreResult<Option<R>> {
        self.check_online()?;
        if !self.probes_enabled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.probes.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock();
        Ok(Some(answer(rows.get(&(owner, role.clone())))))
    }
}

impl CollectionLoader for InMemoryStore {
    fn load(&self, owner: EntityId, role: &Role, sink: &mut dyn RowSink) -> CoreResult<()> {
        self.check_online()?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        let stored = self.rows(owner, role);
        let anticipated = stored.as_ref().map_or(0, StoredRows::len);
        self.announced.lock().push(anticipated);
        sink.before_initialize(anticipated);
        match stored {
            None => Ok(()),
            Some(StoredRows::Sequence(rows)) => rows
                .into_iter()
                .enumerate()
                .try_for_each(|(index, value)| sink.read_row(RowSlot::Index(index), value)),
            Some(StoredRows::Set(rows)) => rows
                .into_iter()
                .try_for_each(|value| sink.read_row(RowSlot::Unordered, value)),
            Some(StoredRows::Keyed(rows)) => rows
                .into_iter()
                .try_for_each(|(key, value)| sink.read_row(RowSlot::Key(key), value)),
        }
    }

    fn read_size(&self, owner: EntityId, role: &Role) -> CoreResult<Option<usize>> {
        self.probe(owner, role, |rows| rows.map_or(0, StoredRows::len))
    }

    fn element_exists(&self, owner: EntityId, role: &Role, id: &Value) -> CoreResult<Option<bool>> {
        let identify = self.identities(role);
        self.probe(owner, role, |rows| match rows {
            Some(StoredRows::Sequence(rows) | StoredRows::Set(rows)) => {
                rows.iter().any(|r| !r.is_null() && identify.of(r) == *id)
            }
            Some(StoredRows::Keyed(rows)) => rows.iter().any(|(_, v)| identify.of(v) == *id),
            None => false,
        })
    }

    fn element_at(&self, owner: EntityId, role: &Role, slot: &RowSlot) -> CoreResult<Option<ElementProbe>> {
        let found = self.probe(owner, role, |rows| match (rows, slot) {
            (Some(StoredRows::Keyed(rows)), RowSlot::Key(key)) => {
                rows.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
            }
            (Some(StoredRows::Sequence(rows)), RowSlot::Index(index)) => {
                rows.get(*index).filter(|v| !v.is_null()).cloned()
            }
            _ => None,
        })?;
        Ok(found.map(|value| value.map_or(ElementProbe::Absent, ElementProbe::Present)))
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("collections", &self.rows.lock().len())
            .field("offline", &self.offline.load(Ordering::SeqCst))
            .field("loads", &self.load_count())
            .field("probes", &self.probe_count())
            .finish_non_exhaustive()
    }
}

/// A store, a session over it and an optional cache region.
pub struct Harness {
    /// Row storage.
    pub store: Arc<InMemoryStore>,
    /// Cache region, when built with [`Harness::with_cache`].
    pub cache: Option<Arc<InMemoryRegion>>,
    /// The session under test.
    pub session: Session,
}

impl Harness {
    /// A session with default configuration and no cache.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// A session with `config` and no cache.
    pub fn with_config(config: SessionConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let session = Session::open(config, store.clone());
        Self {
            store,
            cache: None,
            session,
        }
    }

    /// A session with `config` and an in-memory cache region.
    pub fn with_cache(config: SessionConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryRegion::new());
        let session = Session::open_with_cache(config, store.clone(), cache.clone());
        Self {
            store,
            cache: Some(cache),
            session,
        }
    }

    /// A second session over the same store and cache.
    pub fn reopen(&self, config: SessionConfig) -> Session {
        match &self.cache {
            Some(cache) => Session::open_with_cache(config, self.store.clone(), cache.clone()),
            None => Session::open(config, self.store.clone()),
        }
    }

    /// Registers a fresh owner entity.
    pub fn owner(&self) -> OwnerSlot {
        self.session
            .register_owner(EntityId::new())
            .expect("session is open")
    }

    /// Identifier of the owner at `slot`.
    pub fn owner_id(&self, slot: OwnerSlot) -> EntityId {
        self.session.owner_id(slot).expect("owner is registered")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A text list role.
pub fn list_role(name: &str) -> Arc<RoleDescriptor<TextType>> {
    Arc::new(RoleDescriptor::new(name, ShapeKind::Sequence, TextType::new()))
}

/// A text set role.
pub fn set_role(name: &str) -> Arc<RoleDescriptor<TextType>> {
    Arc::new(RoleDescriptor::new(name, ShapeKind::Set, TextType::new()))
}

/// A text-valued map role.
pub fn map_role(name: &str) -> Arc<RoleDescriptor<TextType>> {
    Arc::new(RoleDescriptor::new(name, ShapeKind::Keyed, TextType::new()))
}

/// `descriptor` with `options` applied.
pub fn with_options<T: ElementType>(descriptor: Arc<RoleDescriptor<T>>, options: RoleOptions) -> Arc<RoleDescriptor<T>> {
    match Arc::try_unwrap(descriptor) {
        Ok(descriptor) => Arc::new(descriptor.with_options(options)),
        Err(_) => panic!("role descriptor is already shared"),
    }
}
