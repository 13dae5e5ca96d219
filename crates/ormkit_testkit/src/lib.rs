//! # ormkit Testkit
//!
//! Test utilities for ormkit.
//!
//! This crate provides:
//! - An in-memory row store that acts as collection loader and persister
//! - A sample entity element type with identity and versioned state
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ormkit_testkit::prelude::*;
//!
//! #[test]
//! fn push_is_queued() {
//!     let harness = Harness::new();
//!     let owner = harness.owner();
//!     let role = list_role("Order.lines");
//!     harness.store.seed_elements(harness.owner_id(owner), &role, &["a".into()]);
//!     let mut lines = harness.session.lazy_list(owner, &role).unwrap();
//!     lines.push("b".into()).unwrap();
//!     assert!(!lines.is_initialized());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod elements;
pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod persister;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::elements::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::persister::*;
}

pub use elements::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use persister::*;
