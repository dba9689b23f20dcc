use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

use super::listener::ServerHandle;
use super::registry::{PatternRegistry, ENDPOINT_PRIORITY};
use super::responders::{
    bulk_ack, default_handler, scroll_handler, MockRequest, ResponseFixture, ScrollTable,
};
use super::MockError;
use crate::retrieve::SearchClient;

/// Path of the bulk endpoint.
pub const BULK_PATTERN: &str = "/_bulk";
/// Path of the scroll continuation endpoint.
pub const SCROLL_PATTERN: &str = "/_search/scroll";

/// # Mock Search Server
///
/// An in-process search backend. Register path patterns with fixtures, point
/// a client at `url()` (or take one from `client()`), exercise the code under
/// test, then `close()`.
///
/// ## Example
/// ```no_run
/// # async fn demo() -> Result<(), search_common::mock::MockError> {
/// use search_common::mock::MockSearchServer;
/// use search_common::search::SearchHit;
/// use serde_json::json;
///
/// let server = MockSearchServer::start().await?;
/// server.register("^/_search$", vec![SearchHit::new("1", json!({"name": "example"}))])?;
/// let client = server.client(false).await?;
/// let result = client.search("", &json!({"query": {"match_all": {}}})).await;
/// server.close().await;
/// # let _ = result;
/// # Ok(())
/// # }
/// ```
pub struct MockSearchServer {
    registry: Arc<PatternRegistry>,
    handle: ServerHandle,
}

impl MockSearchServer {
    /// Starts an empty simulator on an ephemeral loopback port.
    pub async fn start() -> Result<Self, MockError> {
        let registry = Arc::new(PatternRegistry::new());
        let router = Router::new()
            .fallback(dispatch)
            .with_state(Arc::clone(&registry));
        let handle = ServerHandle::spawn(router).await?;
        Ok(Self { registry, handle })
    }

    /// Base URL, `http://127.0.0.1:<port>`.
    pub fn url(&self) -> String {
        self.handle.url()
    }

    /// The pattern table backing this server.
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// A search client aimed at this server: discovery and retries off,
    /// request/response tracing when `trace` is set.
    pub async fn client(&self, trace: bool) -> Result<SearchClient, MockError> {
        let client = SearchClient::builder()
            .url(self.url())
            .sniff(false)
            .max_retries(0)
            .trace(trace)
            .build()
            .await?;
        Ok(client)
    }

    /// Serves `fixture` for paths matching `pattern`.
    pub fn register(&self, pattern: &str, fixture: impl Into<ResponseFixture>) -> Result<(), MockError> {
        self.registry.register(pattern, default_handler(fixture.into()))
    }

    /// Like `register`, with an explicit priority.
    pub fn register_with_priority(
        &self,
        pattern: &str,
        priority: i32,
        fixture: impl Into<ResponseFixture>,
    ) -> Result<(), MockError> {
        self.registry
            .register_with_priority(pattern, priority, default_handler(fixture.into()))
    }

    /// Registers a custom handler.
    pub fn register_handler<F>(&self, pattern: &str, priority: i32, handler: F) -> Result<(), MockError>
    where
        F: Fn(&MockRequest) -> Response + Send + Sync + 'static,
    {
        self.registry
            .register_with_priority(pattern, priority, Arc::new(handler))
    }

    /// Acknowledges every `_bulk` request with one indexed and one deleted item.
    pub fn register_bulk(&self) -> Result<(), MockError> {
        self.register_with_priority(BULK_PATTERN, ENDPOINT_PRIORITY, bulk_ack())
    }

    /// Answers scroll continuations from `table`.
    pub fn register_scroll(&self, table: ScrollTable) -> Result<(), MockError> {
        self.registry
            .register_with_priority(SCROLL_PATTERN, ENDPOINT_PRIORITY, scroll_handler(table))
    }

    /// Ends every scroll opened against the default responder with an empty page.
    pub fn register_empty_scroll(&self) -> Result<(), MockError> {
        self.register_scroll(ScrollTable::exhausted())
    }

    /// Shuts the listener down and releases the port.
    pub async fn close(self) {
        self.handle.close().await;
    }
}

async fn dispatch(
    State(registry): State<Arc<PatternRegistry>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = MockRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    match registry.dispatch(&request) {
        Some(resp) => resp,
        None => {
            tracing::debug!(method = %request.method, path = %request.path, "no mock pattern matched");
            (StatusCode::NOT_FOUND, "404 page not found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{ElasticError, SearchHit};
    use crate::retrieve::SearchError;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_through_client() {
        let server = MockSearchServer::start().await.unwrap();
        server
            .register("^/_search$", vec![SearchHit::new("1", json!({"name": "example"}))])
            .unwrap();
        let client = server.client(false).await.unwrap();

        let result = client.search("", &json!({"query": {"match_all": {}}})).await.unwrap();
        assert_eq!(result.total_hits(), 1);
        assert_eq!(result.hits()[0].id, "1");
        assert!(result.scroll_id.is_none());

        server.close().await;
    }

    #[tokio::test]
    async fn test_unmatched_path_is_404() {
        let server = MockSearchServer::start().await.unwrap();
        let client = server.client(false).await.unwrap();
        let err = client.search("docs", &json!({})).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        server.close().await;
    }

    #[tokio::test]
    async fn test_error_fixture_surfaces_as_engine_error() {
        let server = MockSearchServer::start().await.unwrap();
        server
            .register(
                "/broken/_search",
                ElasticError::new(500, "search_phase_execution_exception", "all shards failed"),
            )
            .unwrap();
        let client = server.client(false).await.unwrap();
        let err = client.search("broken", &json!({})).await.unwrap_err();
        match err {
            SearchError::Engine(e) => {
                assert_eq!(e.status, 500);
                assert_eq!(e.error.unwrap().reason, "all shards failed");
            }
            other => panic!("unexpected error: {other}"),
        }
        server.close().await;
    }

    #[tokio::test]
    async fn test_bulk_not_shadowed_by_broad_pattern() {
        let server = MockSearchServer::start().await.unwrap();
        server.register(".*", json!({"acknowledged": true})).unwrap();
        server.register_bulk().unwrap();
        let client = server.client(false).await.unwrap();

        let ack = client
            .bulk(&[crate::retrieve::BulkOperation::delete("test-index", "2")])
            .await
            .unwrap();
        assert_eq!(ack.indexed()[0].id, "1");
        assert_eq!(ack.deleted()[0].result.as_deref(), Some("deleted"));
        server.close().await;
    }
}
