//! # Connections Module
//!
//! This module handles persistent connections to external services
//! including databases and caching layers. Both handles are built from their
//! settings section and connect lazily, so a service can start while a
//! backend is still down and report it through its health endpoint.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Module for Redis cache operations and connection handling.
pub mod cache_redis;

/// Module for MySQL connection pooling and health checks.
pub mod db_mysql;

pub use cache_redis::{CacheError, CacheHandler};
pub use db_mysql::{Database, DbError};
