//! # Search Engine Client
//!
//! A small asynchronous client for the subset of the search engine's REST
//! protocol the service uses: `_search` (optionally opening a scroll),
//! `_search/scroll` continuation and clearing, `_bulk` and a root ping.
//!
//! Node discovery ("sniffing") asks the seed URLs for `/_nodes/http` and
//! replaces the node list with the published HTTP addresses. It must be
//! disabled when no real cluster exists, e.g. against the mock backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use super::trace::TraceMiddleware;
use crate::configs::ElasticSettings;
use crate::search::{BulkResponse, ElasticError, SearchHit, SearchResult};

/// Seed used when the builder is given no URL.
pub const DEFAULT_URL: &str = "http://127.0.0.1:9200";

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_NDJSON: &str = "application/x-ndjson";

/// Custom error types for search engine operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A seed or discovered node address is not a URL.
    #[error("invalid node url {url}: {source}")]
    InvalidUrl {
        /// The offending address.
        url: String,
        /// Parser failure.
        source: url::ParseError,
    },

    /// The underlying HTTP client could not be created.
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),

    /// Connection or middleware failure, after retries.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// The response body could not be read.
    #[error("failed to read response: {0}")]
    Body(#[from] reqwest::Error),

    /// A request or response body is not the expected JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine answered with a decodable error body.
    #[error("{0}")]
    Engine(ElasticError),

    /// Non-success status without an engine error body.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Node discovery left no usable node.
    #[error("no search engine node available")]
    NoNodes,
}

impl SearchError {
    /// HTTP status of a failed response, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SearchError::Engine(e) => Some(e.status),
            SearchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One action of a `_bulk` request.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Index (create or replace) `document`. A missing id lets the engine pick one.
    Index {
        /// Target index.
        index: String,
        /// Document id.
        id: Option<String>,
        /// Document source.
        document: Value,
    },
    /// Delete the document `id`.
    Delete {
        /// Target index.
        index: String,
        /// Document id.
        id: String,
    },
}

impl BulkOperation {
    /// Index `document` under `id`.
    pub fn index(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        BulkOperation::Index {
            index: index.into(),
            id: Some(id.into()),
            document,
        }
    }

    /// Delete document `id`.
    pub fn delete(index: impl Into<String>, id: impl Into<String>) -> Self {
        BulkOperation::Delete {
            index: index.into(),
            id: id.into(),
        }
    }

    fn write_ndjson(&self, out: &mut String) -> Result<(), serde_json::Error> {
        match self {
            BulkOperation::Index { index, id, document } => {
                let meta = match id {
                    Some(id) => json!({"index": {"_index": index, "_id": id}}),
                    None => json!({"index": {"_index": index}}),
                };
                out.push_str(&serde_json::to_string(&meta)?);
                out.push('\n');
                out.push_str(&serde_json::to_string(document)?);
                out.push('\n');
            }
            BulkOperation::Delete { index, id } => {
                let meta = json!({"delete": {"_index": index, "_id": id}});
                out.push_str(&serde_json::to_string(&meta)?);
                out.push('\n');
            }
        }
        Ok(())
    }
}

/// Acknowledgement of a clear-scroll request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearScrollResponse {
    /// Whether the engine released the contexts.
    #[serde(default)]
    pub succeeded: bool,
    /// Number of scroll contexts freed.
    #[serde(default)]
    pub num_freed: u64,
}

#[derive(Debug, Deserialize)]
struct NodesInfo {
    #[serde(default)]
    nodes: HashMap<String, NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    http: Option<NodeHttp>,
}

#[derive(Debug, Deserialize)]
struct NodeHttp {
    publish_address: String,
}

enum Payload {
    Json(Vec<u8>),
    Ndjson(String),
}

/// # Search Client Builder
///
/// Collects seed URLs and transport options. Defaults mirror a production
/// cluster: sniffing on, three retries, no tracing.
#[derive(Debug, Clone)]
pub struct SearchClientBuilder {
    urls: Vec<String>,
    credentials: Option<(String, String)>,
    sniff: bool,
    trace: bool,
    max_retries: u32,
    timeout: Option<Duration>,
}

impl Default for SearchClientBuilder {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            credentials: None,
            sniff: true,
            trace: false,
            max_retries: 3,
            timeout: None,
        }
    }
}

impl SearchClientBuilder {
    /// Adds a seed URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Sends HTTP basic auth with every request.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Enables or disables node discovery.
    pub fn sniff(mut self, enabled: bool) -> Self {
        self.sniff = enabled;
        self
    }

    /// Logs every request and response through `tracing`.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Retries on transient failures; 0 disables retrying.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client, running node discovery first when enabled.
    ///
    /// # Errors
    /// `InvalidUrl` for an unparsable seed, `Build` when the HTTP client
    /// cannot be created, `NoNodes` when discovery finds nothing.
    pub async fn build(self) -> Result<SearchClient, SearchError> {
        let raw_urls = if self.urls.is_empty() {
            vec![DEFAULT_URL.to_string()]
        } else {
            self.urls
        };
        let seeds = raw_urls
            .iter()
            .map(|u| {
                Url::parse(u).map_err(|source| SearchError::InvalidUrl {
                    url: u.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build().map_err(SearchError::Build)?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(self.max_retries);
        let mut builder =
            ClientBuilder::new(http).with(RetryTransientMiddleware::new_with_policy(retry_policy));
        if self.trace {
            builder = builder.with(TraceMiddleware);
        }
        let inner = builder.build();

        let nodes = if self.sniff {
            discover_nodes(&inner, &seeds, self.credentials.as_ref()).await?
        } else {
            seeds
        };
        tracing::debug!(nodes = ?nodes.iter().map(Url::as_str).collect::<Vec<_>>(), "search client ready");

        Ok(SearchClient {
            inner,
            nodes,
            cursor: AtomicUsize::new(0),
            credentials: self.credentials,
        })
    }
}

async fn discover_nodes(
    http: &ClientWithMiddleware,
    seeds: &[Url],
    credentials: Option<&(String, String)>,
) -> Result<Vec<Url>, SearchError> {
    for seed in seeds {
        let url = match seed.join("/_nodes/http") {
            Ok(url) => url,
            Err(_) => continue,
        };
        let mut req = http.get(url);
        if let Some((user, pass)) = credentials {
            req = req.basic_auth(user, Some(pass));
        }
        let info = match req.send().await {
            Ok(resp) if resp.status().is_success() => resp.json::<NodesInfo>().await,
            Ok(resp) => {
                tracing::warn!(seed = %seed, status = %resp.status(), "node discovery rejected");
                continue;
            }
            Err(e) => {
                tracing::warn!(seed = %seed, error = %e, "node discovery failed");
                continue;
            }
        };
        let Ok(info) = info else { continue };

        let found: Vec<Url> = info
            .nodes
            .values()
            .filter_map(|n| n.http.as_ref())
            .filter_map(|h| publish_address_url(seed.scheme(), &h.publish_address))
            .collect();
        if !found.is_empty() {
            return Ok(found);
        }
    }
    Err(SearchError::NoNodes)
}

/// Turns a published address (`ip:port`, `host/ip:port` or `inet[/ip:port]`)
/// into a URL with the seed's scheme.
fn publish_address_url(scheme: &str, address: &str) -> Option<Url> {
    let trimmed = address
        .trim()
        .trim_start_matches("inet[")
        .trim_end_matches(']');
    let host_port = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if host_port.is_empty() {
        return None;
    }
    Url::parse(&format!("{}://{}", scheme, host_port)).ok()
}

/// # Search Client
///
/// Round-robins requests over its node list. Cheap to share behind an `Arc`.
pub struct SearchClient {
    inner: ClientWithMiddleware,
    nodes: Vec<Url>,
    cursor: AtomicUsize,
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("nodes", &self.nodes)
            .field("auth", &self.credentials.is_some())
            .finish()
    }
}

impl SearchClient {
    /// Starts a builder.
    pub fn builder() -> SearchClientBuilder {
        SearchClientBuilder::default()
    }

    /// A builder seeded from the `elastic` settings section.
    pub fn from_settings(settings: &ElasticSettings) -> SearchClientBuilder {
        let mut builder = Self::builder().url(settings.url()).sniff(settings.sniff);
        if !settings.username.is_empty() {
            builder = builder.basic_auth(&settings.username, &settings.password);
        }
        builder
    }

    /// The nodes requests are spread over.
    pub fn nodes(&self) -> &[Url] {
        &self.nodes
    }

    fn next_node(&self) -> &Url {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.nodes[i % self.nodes.len()]
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        payload: Option<Payload>,
    ) -> Result<reqwest::Response, SearchError> {
        let node = self.next_node();
        let url = node.join(path).map_err(|source| SearchError::InvalidUrl {
            url: format!("{}{}", node, path),
            source,
        })?;

        let mut req = self.inner.request(method, url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some((user, pass)) = &self.credentials {
            req = req.basic_auth(user, Some(pass));
        }
        req = match payload {
            Some(Payload::Json(bytes)) => req.header(CONTENT_TYPE, CONTENT_TYPE_JSON).body(bytes),
            Some(Payload::Ndjson(text)) => req.header(CONTENT_TYPE, CONTENT_TYPE_NDJSON).body(text),
            None => req,
        };

        let resp = req.send().await?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(status_error(resp).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<T, SearchError> {
        let payload = body.map(serde_json::to_vec).transpose()?.map(Payload::Json);
        let resp = self.send(method, path, query, payload).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Runs `query` against `index` (all indices when empty).
    pub async fn search(&self, index: &str, query: &Value) -> Result<SearchResult, SearchError> {
        self.send_json(Method::POST, &search_path(index), &[], Some(query))
            .await
    }

    /// Runs `query` and opens a scroll kept alive for `keep_alive`.
    pub async fn search_with_scroll(
        &self,
        index: &str,
        query: &Value,
        keep_alive: &str,
    ) -> Result<SearchResult, SearchError> {
        self.send_json(
            Method::POST,
            &search_path(index),
            &[("scroll", keep_alive)],
            Some(query),
        )
        .await
    }

    /// Fetches the page following `scroll_id`.
    pub async fn scroll(&self, scroll_id: &str, keep_alive: &str) -> Result<SearchResult, SearchError> {
        let body = json!({"scroll": keep_alive, "scroll_id": scroll_id});
        self.send_json(Method::POST, "/_search/scroll", &[], Some(&body))
            .await
    }

    /// Releases server-side scroll contexts.
    pub async fn clear_scroll(&self, scroll_ids: &[String]) -> Result<ClearScrollResponse, SearchError> {
        let body = json!({ "scroll_id": scroll_ids });
        self.send_json(Method::DELETE, "/_search/scroll", &[], Some(&body))
            .await
    }

    /// Drains a scroll: opens it, follows cursors until an empty page, then
    /// clears the last cursor. Clearing is best-effort.
    pub async fn scroll_all(
        &self,
        index: &str,
        query: &Value,
        keep_alive: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let mut page = self.search_with_scroll(index, query, keep_alive).await?;
        let mut hits = Vec::new();
        let mut last_cursor = None;

        loop {
            if page.hits().is_empty() {
                break;
            }
            hits.extend_from_slice(page.hits());
            let Some(cursor) = page.scroll_id.clone() else {
                break;
            };
            page = self.scroll(&cursor, keep_alive).await?;
            last_cursor = Some(cursor);
        }

        if let Some(cursor) = page.scroll_id.or(last_cursor) {
            if let Err(e) = self.clear_scroll(&[cursor]).await {
                tracing::warn!(error = %e, "failed to clear scroll");
            }
        }
        Ok(hits)
    }

    /// Submits `operations` as one `_bulk` request.
    pub async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse, SearchError> {
        if operations.is_empty() {
            return Ok(BulkResponse::default());
        }
        let mut body = String::new();
        for op in operations {
            op.write_ndjson(&mut body)?;
        }
        let resp = self
            .send(Method::POST, "/_bulk", &[], Some(Payload::Ndjson(body)))
            .await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Checks that a node answers on its root endpoint.
    pub async fn ping(&self) -> Result<(), SearchError> {
        self.send(Method::GET, "/", &[], None).await?;
        Ok(())
    }
}

fn search_path(index: &str) -> String {
    let index = index.trim_matches('/');
    if index.is_empty() {
        "/_search".to_string()
    } else {
        format!("/{}/_search", index)
    }
}

async fn status_error(resp: reqwest::Response) -> SearchError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ElasticError>(&body) {
        Ok(mut engine) if engine.error.is_some() => {
            if engine.status == 0 {
                engine.status = status;
            }
            SearchError::Engine(engine)
        }
        _ => SearchError::Status { status, body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_path() {
        assert_eq!(search_path(""), "/_search");
        assert_eq!(search_path("docs"), "/docs/_search");
        assert_eq!(search_path("/docs/"), "/docs/_search");
        assert_eq!(search_path("a,b"), "/a,b/_search");
    }

    #[test]
    fn test_publish_address_forms() {
        let plain = publish_address_url("http", "10.0.0.5:9200").unwrap();
        assert_eq!(plain.as_str(), "http://10.0.0.5:9200/");

        let named = publish_address_url("https", "es-node-1/10.0.0.6:9201").unwrap();
        assert_eq!(named.as_str(), "https://10.0.0.6:9201/");

        let legacy = publish_address_url("http", "inet[/10.0.0.7:9200]").unwrap();
        assert_eq!(legacy.as_str(), "http://10.0.0.7:9200/");

        assert!(publish_address_url("http", "").is_none());
    }

    #[test]
    fn test_bulk_ndjson_layout() {
        let mut body = String::new();
        BulkOperation::index("docs", "1", json!({"name": "a"}))
            .write_ndjson(&mut body)
            .unwrap();
        BulkOperation::delete("docs", "2").write_ndjson(&mut body).unwrap();

        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["index"]["_id"], "1");
        assert_eq!(lines[1]["name"], "a");
        assert_eq!(lines[2]["delete"]["_index"], "docs");
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_from_settings_maps_credentials_and_sniff() {
        let settings = ElasticSettings {
            address: "es.local".into(),
            port: 9200,
            username: "elastic".into(),
            password: "changeme".into(),
            sniff: false,
        };
        let builder = SearchClient::from_settings(&settings);
        assert_eq!(builder.urls, vec!["http://es.local:9200".to_string()]);
        assert_eq!(
            builder.credentials,
            Some(("elastic".to_string(), "changeme".to_string()))
        );
        assert!(!builder.sniff);
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_seed() {
        let err = SearchClient::builder()
            .url("not a url")
            .sniff(false)
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_round_robin_over_seeds() {
        let client = SearchClient::builder()
            .url("http://10.0.0.1:9200")
            .url("http://10.0.0.2:9200")
            .sniff(false)
            .build()
            .await
            .unwrap();
        assert_eq!(client.next_node().host_str(), Some("10.0.0.1"));
        assert_eq!(client.next_node().host_str(), Some("10.0.0.2"));
        assert_eq!(client.next_node().host_str(), Some("10.0.0.1"));
    }
}
