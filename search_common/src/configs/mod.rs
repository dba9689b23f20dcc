//! # Configuration Modules
//!
//! This module aggregates the settings model of the service and the loader
//! that builds it, either from a `config.json` found on a fixed search path
//! or from the in-memory fixture used when running under tests.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Per-backend configuration sections (common, redis, mysql, elastic, logger, jwt).
pub mod sections;

/// The `Settings` root object, its loader and the test fixture.
pub mod settings;

pub use sections::*;
pub use settings::{ConfigError, LoadMode, Settings};
