//! # search_common
//!
//! Shared building blocks of the es-search service: settings loading,
//! structured logging, cache and database connections, the search engine
//! client and its wire types, plus the in-process mock search backend used by
//! tests. Every folder is gated behind a cargo feature of the same name.

#[cfg(feature = "utils")]
pub mod utils;

#[cfg(feature = "configs")]
pub mod configs;

#[cfg(feature = "loggers")]
pub mod loggers;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "search")]
pub mod search;

#[cfg(feature = "retrieve")]
pub mod retrieve;

#[cfg(feature = "mock")]
pub mod mock;

// Re-export the types most callers reach for.
#[cfg(feature = "configs")]
pub use configs::settings::{LoadMode, Settings};
#[cfg(feature = "loggers")]
pub use loggers::logger::Logger;
#[cfg(feature = "retrieve")]
pub use retrieve::search_client::SearchClient;
#[cfg(feature = "mock")]
pub use mock::server::MockSearchServer;
