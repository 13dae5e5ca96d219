//! Core type definitions for ormkit.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_UNIT_OF_WORK: AtomicU64 = AtomicU64::new(1);

/// Identifier of a unit of work (one [`crate::Session`]).
///
/// Assigned from a process-wide counter; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitOfWorkId(u64);

impl UnitOfWorkId {
    pub(crate) fn next() -> Self {
        Self(NEXT_UNIT_OF_WORK.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitOfWorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uow:{}", self.0)
    }
}

/// Name of a mapped collection association, e.g. `Order.lines`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Role(Arc<str>);

impl Role {
    /// Creates a role from its path.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    /// Returns the role path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for Role {
    fn from(path: String) -> Self {
        Self(Arc::from(path))
    }
}

/// Index of an owner entity in its session's entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerSlot(pub(crate) usize);

impl OwnerSlot {
    /// Returns the raw table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_of_work_ids_increase() {
        let a = UnitOfWorkId::next();
        let b = UnitOfWorkId::next();
        assert!(b > a);
        assert_eq!(format!("{a}"), format!("uow:{}", a.as_u64()));
    }

    #[test]
    fn role_clones_share_storage() {
        let role = Role::from("Order.lines");
        let copy = role.clone();
        assert_eq!(role, copy);
        assert_eq!(copy.as_str(), "Order.lines");
        assert_eq!(Role::from(String::from("Order.lines")), role);
    }
}
