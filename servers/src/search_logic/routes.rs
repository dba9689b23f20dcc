//! # HTTP Routes
//!
//! - `GET /ping`: liveness.
//! - `GET /version`: product name, version and copyright from `common`.
//! - `GET /health`: pings every backend; 503 when one is down.
//! - `POST /api/v1/search/{index}`: forwards a JSON query to the search
//!   engine and returns the total plus the hit sources.
//!
//! In `debug` mode every request is logged with its status and latency.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use search_common::retrieve::SearchError;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::state::AppState;

/// # Application Error
///
/// Failures of the API handlers, rendered as JSON error bodies.
#[derive(Debug)]
pub enum AppError {
    /// The search engine rejected the query or could not be reached.
    Search(SearchError),
    /// The request body is not a JSON document.
    InvalidBody(JsonRejection),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_json) = match self {
            AppError::Search(SearchError::Engine(engine)) => {
                warn!("Search engine error: {}", engine);
                let status = StatusCode::from_u16(engine.status)
                    .ok()
                    .filter(|s| s.is_client_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    json!({
                        "error_type": "SearchEngineError",
                        "message": engine.error.as_ref().map(|d| d.reason.clone()).unwrap_or_default(),
                        "engine_status": engine.status,
                        "engine_error": engine.error.map(|d| d.kind),
                    }),
                )
            }
            AppError::Search(e) => {
                error!("Search request failed: {}", e);
                let status = match e.status() {
                    Some(404) => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (
                    status,
                    json!({
                        "error_type": "SearchUnavailable",
                        "message": "The search engine could not serve the request.",
                        "detail": e.to_string()
                    }),
                )
            }
            AppError::InvalidBody(rejection) => {
                warn!("Invalid request body: {}", rejection);
                (
                    rejection.status(),
                    json!({
                        "error_type": "InvalidRequestBody",
                        "message": "Request body must be a JSON search query.",
                        "detail": rejection.body_text()
                    }),
                )
            }
        };
        (status, Json(error_json)).into_response()
    }
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        AppError::Search(e)
    }
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    let debug = state.settings.common.is_debug();
    let router = Router::new()
        .route("/ping", get(ping))
        .route("/version", get(version))
        .route("/health", get(health))
        .route("/api/v1/search/{index}", post(search))
        .with_state(state);

    if debug {
        router.layer(middleware::from_fn(log_request))
    } else {
        router
    }
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let resp = next.run(req).await;

    info!(
        method = %method,
        uri = %uri,
        status = resp.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    resp
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

async fn version(State(state): State<AppState>) -> Json<Value> {
    let common = state.settings.common();
    Json(json!({
        "app_name": common.sys_name,
        "version": common.version,
        "copyright": common.copyright,
    }))
}

#[derive(Debug, Serialize)]
struct HealthReport {
    search: &'static str,
    cache: &'static str,
    database: &'static str,
}

fn backend_status<E: std::fmt::Display>(name: &str, outcome: Option<Result<(), E>>) -> &'static str {
    match outcome {
        None => "disabled",
        Some(Ok(())) => "up",
        Some(Err(e)) => {
            warn!(backend = name, error = %e, "health check failed");
            "down"
        }
    }
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let search = async { Some(state.search.ping().await) };
    let cache = async {
        match &state.cache {
            Some(cache) => Some(cache.ping().await),
            None => None,
        }
    };
    let database = async {
        match &state.db {
            Some(db) => Some(db.ping().await),
            None => None,
        }
    };
    let (search, cache, database) = tokio::join!(search, cache, database);

    let report = HealthReport {
        search: backend_status("search", search),
        cache: backend_status("cache", cache),
        database: backend_status("database", database),
    };
    let any_down = [report.search, report.cache, report.database].contains(&"down");
    let status = if any_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

async fn search(
    State(state): State<AppState>,
    Path(index): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(query) = payload.map_err(AppError::InvalidBody)?;
    let result = state.search.search(&index, &query).await?;

    let items: Vec<Value> = result
        .hits()
        .iter()
        .filter_map(|h| h.source.clone())
        .collect();
    info!(index = %index, total = result.total_hits(), returned = items.len(), "search served");

    Ok(Json(json!({
        "total": result.total_hits(),
        "took": result.took,
        "items": items,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_common::mock::MockSearchServer;
    use search_common::search::{ElasticError, SearchHit};
    use search_common::Settings;
    use std::sync::Arc;

    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        format!("http://{}", addr)
    }

    async fn state_for(mock: &MockSearchServer) -> AppState {
        let client = mock.client(false).await.unwrap();
        AppState::with_backends(Arc::new(Settings::test_fixture()), client, None, None)
    }

    #[tokio::test]
    async fn test_ping_and_version() {
        let mock = MockSearchServer::start().await.unwrap();
        let base = serve(state_for(&mock).await).await;

        let pong: Value = reqwest::get(format!("{base}/ping")).await.unwrap().json().await.unwrap();
        assert_eq!(pong["message"], "pong");

        let version: Value = reqwest::get(format!("{base}/version")).await.unwrap().json().await.unwrap();
        assert_eq!(version["app_name"], "es-search");

        mock.close().await;
    }

    #[tokio::test]
    async fn test_search_returns_sources() {
        let mock = MockSearchServer::start().await.unwrap();
        mock.register(
            "^/docs/_search$",
            vec![
                SearchHit::new("1", json!({"name": "alpha"})),
                SearchHit::new("2", json!({"name": "beta"})),
            ],
        )
        .unwrap();
        let base = serve(state_for(&mock).await).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/search/docs"))
            .json(&json!({"query": {"match_all": {}}}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"][1]["name"], "beta");

        mock.close().await;
    }

    #[tokio::test]
    async fn test_engine_client_error_is_passed_through() {
        let mock = MockSearchServer::start().await.unwrap();
        mock.register(
            "/missing/_search",
            ElasticError::new(404, "index_not_found_exception", "no such index [missing]"),
        )
        .unwrap();
        let base = serve(state_for(&mock).await).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/search/missing"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["engine_error"], "index_not_found_exception");

        mock.close().await;
    }

    #[tokio::test]
    async fn test_invalid_body_rejected() {
        let mock = MockSearchServer::start().await.unwrap();
        let base = serve(state_for(&mock).await).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/search/docs"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error_type"], "InvalidRequestBody");

        mock.close().await;
    }

    #[tokio::test]
    async fn test_health_reflects_search_backend() {
        let mock = MockSearchServer::start().await.unwrap();
        let base = serve(state_for(&mock).await).await;

        // no root pattern yet: the ping gets a 404
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 503);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["search"], "down");
        assert_eq!(body["cache"], "disabled");

        mock.register("^/$", json!({"tagline": "You Know, for Search"})).unwrap();
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        mock.close().await;
    }
}
