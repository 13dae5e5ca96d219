//! In-memory cache region.

use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;
use crate::region::CacheRegion;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

/// A process-local cache region.
///
/// With a capacity set, inserting a new key beyond the bound evicts the
/// oldest inserted entry first.
///
/// # Example
///
/// ```rust
/// use ormkit_cache::{CacheKey, CacheRegion, InMemoryRegion};
///
/// let region = InMemoryRegion::new();
/// let key = CacheKey::new("Order.lines", [1; 16]);
/// region.put(key.clone(), vec![0xa0]).unwrap();
/// assert_eq!(region.get(&key).unwrap(), Some(vec![0xa0]));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRegion {
    inner: RwLock<Entries>,
    max_entries: Option<usize>,
    offline: AtomicBool,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<CacheKey, Vec<u8>>,
    order: VecDeque<CacheKey>,
}

impl InMemoryRegion {
    /// Creates an unbounded region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region holding at most `max_entries` entries.
    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::default()
        }
    }

    /// Simulates an unreachable region: every operation fails with
    /// [`CacheError::Unavailable`] until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Overwrites an entry without any bookkeeping. Useful for planting
    /// corrupt entries in tests.
    pub fn inject(&self, key: CacheKey, entry: Vec<u8>) {
        let mut inner = self.inner.write();
        if inner.map.insert(key.clone(), entry).is_none() {
            inner.order.push_back(key);
        }
    }

    /// Returns whether `key` currently has an entry.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.read().map.contains_key(key)
    }

    fn check_online(&self) -> CacheResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("region offline".into()));
        }
        Ok(())
    }
}

impl CacheRegion for InMemoryRegion {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        self.check_online()?;
        Ok(self.inner.read().map.get(key).cloned())
    }

    fn put(&self, key: CacheKey, entry: Vec<u8>) -> CacheResult<()> {
        self.check_online()?;
        let mut inner = self.inner.write();
        if inner.map.insert(key.clone(), entry).is_some() {
            return Ok(());
        }
        inner.order.push_back(key);
        if let Some(max) = self.max_entries {
            while inner.map.len() > max {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.map.remove(&oldest);
            }
        }
        Ok(())
    }

    fn evict(&self, key: &CacheKey) -> CacheResult<bool> {
        self.check_online()?;
        let mut inner = self.inner.write();
        let removed = inner.map.remove(key).is_some();
        if removed {
            inner.order.retain(|k| k != key);
        }
        Ok(removed)
    }

    fn clear(&self) -> CacheResult<()> {
        self.check_online()?;
        let mut inner = self.inner.write();
        inner.map.clear();
        inner.order.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.read().map.len()
    }
}
