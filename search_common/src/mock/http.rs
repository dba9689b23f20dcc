use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

use super::listener::ServerHandle;
use super::MockError;

struct Endpoint {
    path: String,
    method: Method,
    expected_query: Vec<(String, String)>,
    headers: HeaderMap,
    body: String,
}

/// # Mock HTTP
///
/// A throwaway HTTP server for code that talks to plain HTTP services.
///
/// - `start` answers one endpoint: when method and path match, every query
///   parameter given in `path_with_query` must be present with the same
///   value (else 400 `query parameter mismatch`); then the configured headers
///   and body are returned with 200. Anything else is 404.
/// - `with_status` answers every request with a fixed status and body.
pub struct MockHttp {
    handle: ServerHandle,
}

impl MockHttp {
    /// Serves `body` at `path_with_query` (e.g. `/api/items?page=1`) for `method`.
    ///
    /// # Errors
    /// `MockError::InvalidHeader` when a header name or value is not valid
    /// HTTP, `MockError::Bind` when no port can be bound.
    pub async fn start(
        path_with_query: &str,
        method: Method,
        headers: &[(&str, &str)],
        body: impl Into<String>,
    ) -> Result<Self, MockError> {
        let (path, query) = match path_with_query.split_once('?') {
            Some((path, query)) => (path, query),
            None => (path_with_query, ""),
        };
        let expected_query = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let invalid = || MockError::InvalidHeader {
                name: (*name).to_string(),
            };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            header_map.insert(name, value);
        }

        let endpoint = Arc::new(Endpoint {
            path: path.to_string(),
            method,
            expected_query,
            headers: header_map,
            body: body.into(),
        });
        let router = Router::new().fallback(serve_endpoint).with_state(endpoint);
        Ok(Self {
            handle: ServerHandle::spawn(router).await?,
        })
    }

    /// Answers every request with `status` and `body`.
    pub async fn with_status(body: impl Into<String>, status: StatusCode) -> Result<Self, MockError> {
        let body: Arc<str> = Arc::from(body.into());
        let router = Router::new().fallback(move || {
            let body = Arc::clone(&body);
            async move { (status, body.to_string()) }
        });
        Ok(Self {
            handle: ServerHandle::spawn(router).await?,
        })
    }

    /// Base URL, `http://127.0.0.1:<port>`.
    pub fn url(&self) -> String {
        self.handle.url()
    }

    /// `host:port` of the listener.
    pub fn host_port(&self) -> String {
        extract_after_protocol(&self.url()).to_string()
    }

    pub async fn close(self) {
        self.handle.close().await;
    }
}

async fn serve_endpoint(
    State(endpoint): State<Arc<Endpoint>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if uri.path() != endpoint.path || method != endpoint.method {
        return StatusCode::NOT_FOUND.into_response();
    }
    let mismatch = endpoint
        .expected_query
        .iter()
        .any(|(k, v)| query.get(k) != Some(v));
    if mismatch {
        return (StatusCode::BAD_REQUEST, "query parameter mismatch").into_response();
    }

    let mut resp = (StatusCode::OK, endpoint.body.clone()).into_response();
    for (name, value) in &endpoint.headers {
        resp.headers_mut().insert(name.clone(), value.clone());
    }
    resp
}

/// Strips a leading `http://`, leaving `host:port/...`.
pub fn extract_after_protocol(url: &str) -> &str {
    url.strip_prefix("http://").unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_after_protocol() {
        assert_eq!(extract_after_protocol("http://127.0.0.1:8080"), "127.0.0.1:8080");
        assert_eq!(extract_after_protocol("https://a.b"), "https://a.b");
        assert_eq!(extract_after_protocol("a.b/c"), "a.b/c");
    }

    #[tokio::test]
    async fn test_invalid_header_rejected() {
        let err = MockHttp::start("/", Method::GET, &[("bad header", "x")], "")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MockError::InvalidHeader { .. }));
    }
}
