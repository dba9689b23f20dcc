//! # Mock Search Backend
//!
//! In-process HTTP servers that stand in for the search engine (and for
//! arbitrary single-endpoint HTTP services) in tests.
//!
//! ## Contained Modules:
//!
//! - **`listener`**: binds an ephemeral loopback port, serves a router and
//!   tears it down on `close()` or drop.
//! - **`registry`**: regex path patterns mapped to handlers, with explicit
//!   priorities.
//! - **`responders`**: fixtures and the handlers that turn them into
//!   protocol-correct responses (search, bulk, scroll).
//! - **`server`**: `MockSearchServer`, tying the above together.
//! - **`http`**: `MockHttp`, a single-endpoint server checking method, path
//!   and query.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use thiserror::Error;

use crate::retrieve::SearchError;

/// Server socket ownership and shutdown.
pub mod listener;
/// Path pattern registry.
pub mod registry;
/// Fixtures and protocol responders.
pub mod responders;
/// The mock search backend.
pub mod server;
/// Single-endpoint mock HTTP servers.
pub mod http;

pub use self::http::{extract_after_protocol, MockHttp};
pub use registry::{PatternRegistry, DEFAULT_PRIORITY, ENDPOINT_PRIORITY};
pub use responders::{HandlerFn, MockRequest, ResponseFixture, ScrollPage, ScrollTable, NEXT_SCROLL_ID};
pub use server::MockSearchServer;

/// Errors raised while setting up a mock server.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("invalid path pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("failed to bind mock listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    #[error("failed to build search client: {0}")]
    Client(#[from] SearchError),
}
