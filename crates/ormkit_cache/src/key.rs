//! Cache entry keys.

use std::fmt;

/// Identifies one collection's cache entry: a role path plus the 16-byte
/// identifier of the owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    role: String,
    owner: [u8; 16],
}

impl CacheKey {
    /// Creates a key for `role` owned by `owner`.
    pub fn new(role: impl Into<String>, owner: [u8; 16]) -> Self {
        Self {
            role: role.into(),
            owner,
        }
    }

    /// The role path, e.g. `Order.lines`.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The owning entity's identifier bytes.
    pub fn owner(&self) -> &[u8; 16] {
        &self.owner
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#", self.role)?;
        for b in &self.owner {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
