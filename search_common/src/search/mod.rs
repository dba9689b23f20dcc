//! # Search Engine Wire Types
//!
//! The JSON shapes exchanged with the search engine: result envelopes and
//! hits, bulk acknowledgements, and structured engine errors. Both the real
//! client in `retrieve` and the simulator in `mock` speak these types, which
//! keeps what the simulator writes and what the client reads in lockstep.

#![forbid(unsafe_code)]

/// Result envelopes, hits, bulk items and engine errors.
pub mod model;

pub use model::*;
