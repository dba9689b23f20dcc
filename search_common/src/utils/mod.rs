//! # Utilities Module
//!
//! General-purpose helpers that don't belong to a more specific module.

/// Filesystem helpers (existence checks used by the settings loader).
pub mod paths;

pub use paths::path_exists;
