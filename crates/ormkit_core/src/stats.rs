//! Session statistics.
//!
//! Counters describe how much work the lazy machinery saved or caused:
//! loads versus cache hits, queued operations versus forced loads, and
//! flushes that reached the persister versus those skipped.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-session counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Collections populated through the loader.
    collections_loaded: AtomicU64,
    /// Initializations served from the cache region.
    cache_hits: AtomicU64,
    /// Cache lookups that found nothing.
    cache_misses: AtomicU64,
    /// Entries written to the cache region.
    cache_puts: AtomicU64,
    /// Entries evicted (corrupt or stale).
    cache_evictions: AtomicU64,
    /// Loader probes issued (size, existence, element-at).
    probes: AtomicU64,
    /// Mutations recorded as delayed operations.
    operations_queued: AtomicU64,
    /// Non-empty queues replayed on initialization.
    queues_replayed: AtomicU64,
    /// Flushes that handed changes to a persister.
    collections_flushed: AtomicU64,
    /// Flushes that found nothing to write.
    flushes_skipped: AtomicU64,
}

impl SessionStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_collection_loaded(&self) {
        self.collections_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_put(&self) {
        self.cache_puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_eviction(&self) {
        self.cache_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_operation_queued(&self) {
        self.operations_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_replayed(&self) {
        self.queues_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_collection_flushed(&self) {
        self.collections_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_skipped(&self) {
        self.flushes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of collections populated through the loader.
    pub fn collections_loaded(&self) -> u64 {
        self.collections_loaded.load(Ordering::Relaxed)
    }

    /// Returns the number of initializations served from cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of cache lookups that missed.
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Returns the number of cache writes.
    pub fn cache_puts(&self) -> u64 {
        self.cache_puts.load(Ordering::Relaxed)
    }

    /// Returns the number of cache evictions.
    pub fn cache_evictions(&self) -> u64 {
        self.cache_evictions.load(Ordering::Relaxed)
    }

    /// Returns the number of loader probes.
    pub fn probes(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    /// Returns the number of queued operations.
    pub fn operations_queued(&self) -> u64 {
        self.operations_queued.load(Ordering::Relaxed)
    }

    /// Returns the number of replayed queues.
    pub fn queues_replayed(&self) -> u64 {
        self.queues_replayed.load(Ordering::Relaxed)
    }

    /// Returns the number of flushes that reached a persister.
    pub fn collections_flushed(&self) -> u64 {
        self.collections_flushed.load(Ordering::Relaxed)
    }

    /// Returns the number of skipped flushes.
    pub fn flushes_skipped(&self) -> u64 {
        self.flushes_skipped.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            collections_loaded: self.collections_loaded(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            cache_puts: self.cache_puts(),
            cache_evictions: self.cache_evictions(),
            probes: self.probes(),
            operations_queued: self.operations_queued(),
            queues_replayed: self.queues_replayed(),
            collections_flushed: self.collections_flushed(),
            flushes_skipped: self.flushes_skipped(),
        }
    }
}

/// A point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Collections populated through the loader.
    pub collections_loaded: u64,
    /// Initializations served from cache.
    pub cache_hits: u64,
    /// Cache lookups that missed.
    pub cache_misses: u64,
    /// Cache writes.
    pub cache_puts: u64,
    /// Cache evictions.
    pub cache_evictions: u64,
    /// Loader probes.
    pub probes: u64,
    /// Queued operations.
    pub operations_queued: u64,
    /// Replayed queues.
    pub queues_replayed: u64,
    /// Flushes that reached a persister.
    pub collections_flushed: u64,
    /// Skipped flushes.
    pub flushes_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stats_are_zero() {
        assert_eq!(SessionStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn counters_accumulate() {
        let stats = SessionStats::new();
        stats.record_collection_loaded();
        stats.record_cache_hit();
        stats.record_cache_hit();
        stats.record_operation_queued();
        stats.record_flush_skipped();

        let snap = stats.snapshot();
        assert_eq!(snap.collections_loaded, 1);
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.operations_queued, 1);
        assert_eq!(snap.flushes_skipped, 1);
        assert_eq!(snap.probes, 0);
    }
}
