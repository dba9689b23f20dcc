//! # Protocol Responders
//!
//! Fixtures describing what a simulated endpoint returns and the handlers
//! that render them:
//!
//! - the **default responder** serves a `ResponseFixture` for ordinary
//!   search requests, attaching the reserved scroll id when the query
//!   string asks for a scroll;
//! - the **bulk acknowledgement** is a fixed two-item `_bulk` response;
//! - the **scroll responder** resolves `{"scroll_id": ...}` bodies against a
//!   `ScrollTable` and acknowledges clear-scroll `DELETE`s.
//!
//! Handlers are synchronous in-memory builders. Failures become an HTTP
//! status with a JSON engine-error body, never a panic.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::search::{BulkResponse, BulkResponseItem, ElasticError, SearchHit, SearchResult};

/// Scroll id handed out by the default responder when a scroll is requested.
pub const NEXT_SCROLL_ID: &str = "scroll-id-2";

/// Index named in the bulk acknowledgement.
pub const BULK_ACK_INDEX: &str = "test-index";

/// A request as seen by a handler.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockRequest {
    /// A bodiless GET for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the percent-decoded query string mentions `scroll`.
    pub fn wants_scroll(&self) -> bool {
        self.query.as_deref().is_some_and(query_mentions_scroll)
    }
}

fn query_mentions_scroll(query: &str) -> bool {
    url::form_urlencoded::parse(query.as_bytes())
        .any(|(k, v)| k.contains("scroll") || v.contains("scroll"))
}

/// A registered response producer.
pub type HandlerFn = Arc<dyn Fn(&MockRequest) -> Response + Send + Sync>;

/// # Response Fixture
///
/// What the default responder serves.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFixture {
    /// Hits wrapped into a result envelope whose total is the hit count.
    Hits(Vec<SearchHit>),
    /// A bulk acknowledgement served verbatim.
    Bulk(BulkResponse),
    /// Any pre-built JSON served verbatim.
    Raw(Value),
    /// An engine error served with its own status.
    Error(ElasticError),
}

impl From<Vec<SearchHit>> for ResponseFixture {
    fn from(hits: Vec<SearchHit>) -> Self {
        ResponseFixture::Hits(hits)
    }
}

impl From<BulkResponse> for ResponseFixture {
    fn from(ack: BulkResponse) -> Self {
        ResponseFixture::Bulk(ack)
    }
}

impl From<Value> for ResponseFixture {
    fn from(raw: Value) -> Self {
        ResponseFixture::Raw(raw)
    }
}

impl From<ElasticError> for ResponseFixture {
    fn from(err: ElasticError) -> Self {
        ResponseFixture::Error(err)
    }
}

/// One page of a scroll table.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollPage {
    /// Hits wrapped into an envelope.
    Hits(Vec<SearchHit>),
    /// A typed envelope served as is.
    Result(SearchResult),
    /// Serialized envelope bytes, decoded when requested.
    Bytes(Bytes),
}

impl ScrollPage {
    fn resolve(&self) -> Result<SearchResult, serde_json::Error> {
        match self {
            ScrollPage::Hits(hits) => Ok(SearchResult::from_hits(hits.clone())),
            ScrollPage::Result(result) => Ok(result.clone()),
            ScrollPage::Bytes(raw) => serde_json::from_slice(raw),
        }
    }
}

/// Scroll id to page mapping consulted by the scroll responder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollTable {
    pages: HashMap<String, ScrollPage>,
}

impl ScrollTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `insert`.
    pub fn page(mut self, scroll_id: impl Into<String>, page: ScrollPage) -> Self {
        self.insert(scroll_id, page);
        self
    }

    pub fn insert(&mut self, scroll_id: impl Into<String>, page: ScrollPage) {
        self.pages.insert(scroll_id.into(), page);
    }

    pub fn get(&self, scroll_id: &str) -> Option<&ScrollPage> {
        self.pages.get(scroll_id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// A table answering the reserved scroll id with an empty page, which
    /// ends any scroll opened against the default responder.
    pub fn exhausted() -> Self {
        Self::new().page(NEXT_SCROLL_ID, ScrollPage::Result(SearchResult::empty()))
    }
}

/// Serializes `body` as JSON with `status`.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut resp = (status, bytes).into_response();
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            resp
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization_exception", e.to_string()),
    }
}

/// An engine-style JSON error.
pub fn error_response(status: StatusCode, kind: &str, reason: impl Into<String>) -> Response {
    let body = ElasticError::new(status.as_u16(), kind, reason);
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    let mut resp = (status, bytes).into_response();
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

/// Renders `fixture` for `request`.
pub fn respond_default(fixture: &ResponseFixture, request: &MockRequest) -> Response {
    match fixture {
        ResponseFixture::Hits(hits) => {
            let mut result = SearchResult::from_hits(hits.clone());
            if request.wants_scroll() {
                result = result.with_scroll_id(NEXT_SCROLL_ID);
            }
            json_response(StatusCode::OK, &result)
        }
        ResponseFixture::Error(err) => {
            let status = StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            json_response(status, err)
        }
        ResponseFixture::Bulk(ack) => json_response(StatusCode::OK, ack),
        ResponseFixture::Raw(raw) => json_response(StatusCode::OK, raw),
    }
}

/// Handler serving `fixture` through the default responder.
pub fn default_handler(fixture: ResponseFixture) -> HandlerFn {
    Arc::new(move |req: &MockRequest| respond_default(&fixture, req))
}

/// The fixed `_bulk` acknowledgement: one indexed and one deleted item.
pub fn bulk_ack() -> BulkResponse {
    let item = |id: &str, result: &str| BulkResponseItem {
        index: BULK_ACK_INDEX.to_string(),
        doc_type: Some("_doc".to_string()),
        id: id.to_string(),
        version: Some(1),
        result: Some(result.to_string()),
        status: 200,
        error: None,
    };
    BulkResponse {
        took: 0,
        errors: false,
        items: vec![
            [("index".to_string(), item("1", "created"))].into(),
            [("delete".to_string(), item("2", "deleted"))].into(),
        ],
    }
}

#[derive(Debug, Default, Deserialize)]
struct ScrollRequest {
    #[serde(default)]
    scroll_id: String,
}

#[derive(Debug, Deserialize)]
struct ClearScrollRequest {
    #[serde(default)]
    scroll_id: Option<Value>,
}

/// Resolves a scroll continuation against `table`.
///
/// 1. undecodable body: 400, the table is not consulted;
/// 2. unknown scroll id: 404;
/// 3. page bytes that do not decode: 500.
pub fn respond_scroll(table: &ScrollTable, request: &MockRequest) -> Response {
    if request.method == Method::DELETE {
        return respond_clear_scroll(request);
    }

    // `null` decodes to an empty request
    let scroll: ScrollRequest = match serde_json::from_slice::<Option<ScrollRequest>>(&request.body) {
        Ok(s) => s.unwrap_or_default(),
        Err(e) => {
            tracing::debug!(error = %e, "undecodable scroll body");
            return error_response(StatusCode::BAD_REQUEST, "parse_exception", "invalid request body");
        }
    };
    tracing::debug!(scroll_id = %scroll.scroll_id, "scroll continuation");

    let Some(page) = table.get(&scroll.scroll_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "search_context_missing_exception",
            "unknown scroll_id",
        );
    };

    match page.resolve() {
        Ok(result) => json_response(StatusCode::OK, &result),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "illegal_state_exception", e.to_string()),
    }
}

fn respond_clear_scroll(request: &MockRequest) -> Response {
    let num_freed = if request.body.is_empty() {
        0
    } else {
        match serde_json::from_slice::<ClearScrollRequest>(&request.body) {
            Ok(ClearScrollRequest { scroll_id: Some(Value::Array(ids)) }) => ids.len(),
            Ok(ClearScrollRequest { scroll_id: Some(Value::String(_)) }) => 1,
            Ok(_) => 0,
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, "parse_exception", "invalid request body");
            }
        }
    };
    json_response(
        StatusCode::OK,
        &serde_json::json!({"succeeded": true, "num_freed": num_freed}),
    )
}

/// Handler serving `table` through the scroll responder.
pub fn scroll_handler(table: ScrollTable) -> HandlerFn {
    Arc::new(move |req: &MockRequest| respond_scroll(&table, req))
}
