//! Collection lifecycle states.

use std::fmt;

/// Lifecycle state of a persistent collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionState {
    /// Detached from any live unit of work and never initialized.
    Unbound,
    /// Contents not loaded; mutations may be queued.
    Uninitialized,
    /// A load is in progress.
    Initializing,
    /// Contents loaded and writable.
    Initialized,
    /// Contents loaded; writes are rejected and flush skips it.
    ReadOnlyInitialized,
}

impl CollectionState {
    /// Whether the contents are available in memory.
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized | Self::ReadOnlyInitialized)
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbound => "unbound",
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::ReadOnlyInitialized => "read-only",
        };
        f.write_str(name)
    }
}
