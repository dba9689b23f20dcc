//! # Pattern Registry
//!
//! Regex path patterns mapped to response handlers.
//!
//! Patterns are searched (not anchored) against the request path, query
//! string excluded. Entries are kept ordered by priority, highest first;
//! within one priority the earliest registration wins. Re-registering a
//! pattern replaces its handler and priority but keeps its place among
//! equals.

use std::cmp::Reverse;
use std::sync::{PoisonError, RwLock};

use axum::response::Response;
use regex::Regex;

use super::responders::{HandlerFn, MockRequest};
use super::MockError;

/// Priority of caller-registered patterns.
pub const DEFAULT_PRIORITY: i32 = 0;
/// Priority of the built-in protocol endpoints (`/_bulk`, `/_search/scroll`),
/// so a broad search pattern never shadows them.
pub const ENDPOINT_PRIORITY: i32 = 100;

struct HandlerEntry {
    pattern: String,
    regex: Regex,
    priority: i32,
    handler: HandlerFn,
}

/// Thread-safe pattern table. Registration takes the write lock, dispatch the
/// read lock; neither is ever held across an `.await`.
#[derive(Default)]
pub struct PatternRegistry {
    entries: RwLock<Vec<HandlerEntry>>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `pattern` at the default priority.
    pub fn register(&self, pattern: &str, handler: HandlerFn) -> Result<(), MockError> {
        self.register_with_priority(pattern, DEFAULT_PRIORITY, handler)
    }

    /// Registers `handler` for `pattern` at `priority`.
    ///
    /// # Errors
    /// `MockError::InvalidPattern` if `pattern` is not a valid regex. Nothing
    /// is stored in that case.
    pub fn register_with_priority(
        &self,
        pattern: &str,
        priority: i32,
        handler: HandlerFn,
    ) -> Result<(), MockError> {
        let regex = Regex::new(pattern).map_err(|source| MockError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|e| e.pattern == pattern) {
            Some(existing) => {
                existing.priority = priority;
                existing.handler = handler;
            }
            None => entries.push(HandlerEntry {
                pattern: pattern.to_string(),
                regex,
                priority,
                handler,
            }),
        }
        // stable: ties keep registration order
        entries.sort_by_key(|e| Reverse(e.priority));

        tracing::debug!(pattern, priority, "mock pattern registered");
        Ok(())
    }

    /// The handler of the first entry matching `path`.
    pub fn lookup(&self, path: &str) -> Option<HandlerFn> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|e| e.regex.is_match(path))
            .map(|e| e.handler.clone())
    }

    /// Runs the first matching handler under the read lock. `None` when no
    /// pattern matches.
    pub fn dispatch(&self, request: &MockRequest) -> Option<Response> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|e| e.regex.is_match(&request.path))
            .map(|e| (e.handler)(request))
    }

    /// Registered patterns in dispatch order.
    pub fn patterns(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|e| e.pattern.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Arc;

    fn status(code: u16) -> HandlerFn {
        Arc::new(move |_: &MockRequest| {
            StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        })
    }

    fn hit(registry: &PatternRegistry, path: &str) -> Option<u16> {
        registry
            .dispatch(&MockRequest::get(path))
            .map(|r| r.status().as_u16())
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let registry = PatternRegistry::new();
        let err = registry.register("([", status(200)).unwrap_err();
        assert!(matches!(err, MockError::InvalidPattern { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = PatternRegistry::new();
        registry.register("^/_search$", status(200)).unwrap();
        registry.register("^/_search$", status(201)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(hit(&registry, "/_search"), Some(201));
    }

    #[test]
    fn test_unanchored_match_ignores_query() {
        let registry = PatternRegistry::new();
        registry.register("_search", status(200)).unwrap();
        assert_eq!(hit(&registry, "/docs/_search"), Some(200));
        assert_eq!(hit(&registry, "/_cat/indices"), None);
    }

    #[test]
    fn test_priority_then_registration_order() {
        let registry = PatternRegistry::new();
        registry.register("/_search", status(200)).unwrap();
        registry.register("/_search/scroll", status(201)).unwrap();
        // earliest registration wins among equals
        assert_eq!(hit(&registry, "/_search/scroll"), Some(200));

        registry
            .register_with_priority("/_search/scroll", ENDPOINT_PRIORITY, status(202))
            .unwrap();
        assert_eq!(hit(&registry, "/_search/scroll"), Some(202));
        assert_eq!(hit(&registry, "/_search"), Some(200));
        assert_eq!(registry.patterns(), vec!["/_search/scroll", "/_search"]);
    }

    #[test]
    fn test_lookup_returns_handler() {
        let registry = PatternRegistry::new();
        registry.register("^/ping$", status(204)).unwrap();
        let handler = registry.lookup("/ping").unwrap();
        assert_eq!(handler(&MockRequest::get("/ping")).status(), StatusCode::NO_CONTENT);
        assert!(registry.lookup("/pong").is_none());
    }
}
