//! Cache region trait definition.

use crate::error::CacheResult;
use crate::key::CacheKey;

/// A second-level cache region shared by every session of a process.
///
/// # Invariants
///
/// - `get` returns exactly the bytes of the last `put` for that key, or `None`
/// - `evict` of an absent key is not an error
/// - Regions must be `Send + Sync`; sessions on different threads share them
pub trait CacheRegion: Send + Sync {
    /// Returns the entry stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be read.
    fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `entry` under `key`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be written.
    fn put(&self, key: CacheKey, entry: Vec<u8>) -> CacheResult<()>;

    /// Removes the entry under `key`. Returns whether an entry was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be written.
    fn evict(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be written.
    fn clear(&self) -> CacheResult<()>;

    /// Number of entries currently held.
    fn len(&self) -> usize;

    /// Whether the region holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
