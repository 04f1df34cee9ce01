//! # RiftDB Testkit
//!
//! Test utilities for RiftDB's conflict-resolution engine.
//!
//! This crate provides:
//! - Fixtures: a scripted status oracle, intent seeding helpers, and
//!   lock-batch construction for write batches
//! - A resolution harness wiring store, oracle, stats, and locks together
//!   with synchronous entry points
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use riftdb_testkit::prelude::*;
//!
//! #[test]
//! fn aborts_lower_priority_writer() {
//!     let harness = ResolutionHarness::new();
//!     // ... seed intents, script the oracle, resolve
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
