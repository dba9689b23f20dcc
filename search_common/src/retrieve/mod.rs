//! # Data Retrieval Module
//!
//! HTTP access to the search engine. The client is built on `reqwest` and
//! `reqwest-middleware`: transient failures are retried with exponential
//! backoff, and an optional tracing middleware logs every request/response
//! pair, which is handy when pointing the client at the mock backend.
//!
//! ## Contained Modules:
//!
//! - **`search_client`**: `SearchClient` and its builder (search, scroll,
//!   clear-scroll, bulk, ping, node discovery).
//! - **`trace`**: the request/response logging middleware.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Search engine client with retry middleware and node discovery.
pub mod search_client;
/// Request/response logging middleware.
pub mod trace;

pub use search_client::{BulkOperation, ClearScrollResponse, SearchClient, SearchClientBuilder, SearchError};
pub use trace::TraceMiddleware;
