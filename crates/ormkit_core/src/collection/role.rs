//! Mapped collection roles.

use crate::element::ElementType;
use crate::error::{CoreError, CoreResult};
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the native aggregate behind a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Index-ordered with nullable slots.
    Sequence,
    /// Unordered, keyed by element identity.
    Set,
    /// Keyed by a scalar.
    Keyed,
}

impl ShapeKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Set => "set",
            Self::Keyed => "keyed",
        }
    }

    /// Parses [`ShapeKind::as_str`] output.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sequence" => Some(Self::Sequence),
            "set" => Some(Self::Set),
            "keyed" => Some(Self::Keyed),
            _ => None,
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping options of one collection role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleOptions {
    /// Whether mutations on an unloaded collection may be queued.
    pub queue_operations: bool,
    /// Whether loader probes (size, existence, element-at) are trusted to
    /// answer without a full load.
    pub extra_lazy: bool,
    /// Whether a snapshot is kept. Without one, every flush recreates the
    /// collection.
    pub dirty_checking: bool,
    /// Whether removed elements are reported as orphans.
    pub orphan_delete: bool,
    /// Whether contents go through the second-level cache.
    pub cacheable: bool,
}

impl Default for RoleOptions {
    fn default() -> Self {
        Self {
            queue_operations: true,
            extra_lazy: false,
            dirty_checking: true,
            orphan_delete: false,
            cacheable: false,
        }
    }
}

impl RoleOptions {
    /// Creates options with default values.
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

    /// Sets whether loader probes are trusted.
    #[must_use]
    pub const fn extra_lazy(mut self, value: bool) -> Self {
        self.extra_lazy = value;
        self
    }

    /// Sets whether a snapshot is kept.
    #[must_use]
    pub const fn dirty_checking(mut self, value: bool) -> Self {
        self.dirty_checking = value;
        self
    }

    /// Sets whether removed elements are orphans.
    #[must_use]
    pub const fn orphan_delete(mut self, value: bool) -> Self {
        self.orphan_delete = value;
        self
    }

    /// Sets whether the role is cached.
    #[must_use]
    pub const fn cacheable(mut self, value: bool) -> Self {
        self.cacheable = value;
        self
    }
}

/// Everything a collection knows about its mapping.
///
/// Built once per mapped association and shared through an `Arc` by every
/// collection of that role.
#[derive(Debug)]
pub struct RoleDescriptor<T: ElementType> {
    role: Role,
    shape: ShapeKind,
    element_type: T,
    options: RoleOptions,
}

impl<T: ElementType> RoleDescriptor<T> {
    /// Creates a descriptor with default options.
    pub fn new(role: impl Into<Role>, shape: ShapeKind, element_type: T) -> Self {
        Self {
            role: role.into(),
            shape,
            element_type,
            options: RoleOptions::default(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: RoleOptions) -> Self {
        self.options = options;
        self
    }

    /// The role name.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// The aggregate shape.
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// The element comparator.
    pub fn element_type(&self) -> &T {
        &self.element_type
    }

    /// The mapping options.
    pub fn options(&self) -> &RoleOptions {
        &self.options
    }

    pub(crate) fn expect_shape(&self, expected: ShapeKind) -> CoreResult<()> {
        if self.shape == expected {
            Ok(())
        } else {
            Err(CoreError::ShapeMismatch {
                expected,
                found: self.shape,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::TextType;

    #[test]
    fn default_options() {
        let options = RoleOptions::default();
        assert!(options.queue_operations);
        assert!(!options.extra_lazy);
        assert!(options.dirty_checking);
        assert!(!options.orphan_delete);
        assert!(!options.cacheable);
    }

    #[test]
    fn shape_names_roundtrip() {
        for shape in [ShapeKind::Sequence, ShapeKind::Set, ShapeKind::Keyed] {
            assert_eq!(ShapeKind::parse(shape.as_str()), Some(shape));
        }
        assert_eq!(ShapeKind::parse("bag"), None);
    }

    #[test]
    fn expect_shape_reports_both_sides() {
        let descriptor = RoleDescriptor::new("Order.tags", ShapeKind::Set, TextType::new());
        assert!(descriptor.expect_shape(ShapeKind::Set).is_ok());
        let err = descriptor.expect_shape(ShapeKind::Keyed).unwrap_err();
        assert_eq!(err.to_string(), "shape mismatch: expected keyed, found set");
    }
}
