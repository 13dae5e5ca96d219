//! Unit-of-work configuration.

use serde::{Deserialize, Serialize};

/// How a session interacts with the second-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Read entries and write them after loads.
    #[default]
    Normal,
    /// Read entries, never write.
    Get,
    /// Write entries after loads, never read.
    Put,
    /// Neither read nor write. Flushes still evict stale entries.
    Ignore,
}

impl CacheMode {
    /// Whether initialization may be served from the cache.
    #[must_use]
    pub const fn reads(self) -> bool {
        matches!(self, Self::Normal | Self::Get)
    }

    /// Whether loaded contents are written to the cache.
    #[must_use]
    pub const fn writes(self) -> bool {
        matches!(self, Self::Normal | Self::Put)
    }
}

/// Configuration for a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether uninitialized collections may queue mutations instead of
    /// loading. Each role can further opt out.
    pub queue_operations: bool,

    /// Second-level cache interaction.
    pub cache_mode: CacheMode,

    /// Whether lazily created collections start read-only.
    pub default_read_only: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_operations: true,
            cache_mode: CacheMode::Normal,
            default_read_only: false,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether mutations may be queued.
    #[must_use]
    pub const fn queue_operations(mut self, value: bool) -> Self {
        self.queue_operations = value;
        self
    }

    /// Sets the cache mode.
    #[must_use]
    pub const fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Sets whether lazy collections start read-only.
    #[must_use]
    pub const fn default_read_only(mut self, value: bool) -> Self {
        self.default_read_only = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert!(config.queue_operations);
        assert_eq!(config.cache_mode, CacheMode::Normal);
        assert!(!config.default_read_only);
    }

    #[test]
    fn builder_pattern() {
        let config = SessionConfig::new()
            .queue_operations(false)
            .cache_mode(CacheMode::Get)
            .default_read_only(true);
        assert!(!config.queue_operations);
        assert_eq!(config.cache_mode, CacheMode::Get);
        assert!(config.default_read_only);
    }

    #[test]
    fn cache_mode_directions() {
        assert!(CacheMode::Normal.reads() && CacheMode::Normal.writes());
        assert!(CacheMode::Get.reads() && !CacheMode::Get.writes());
        assert!(!CacheMode::Put.reads() && CacheMode::Put.writes());
        assert!(!CacheMode::Ignore.reads() && !CacheMode::Ignore.writes());
    }
}
