use std::time::Instant;

use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

/// # Trace Middleware
///
/// Logs the method, path, full URL and headers of every outgoing request and
/// the status of its response. Sits inside the retry middleware, so each
/// attempt is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceMiddleware;

#[async_trait::async_trait]
impl Middleware for TraceMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        tracing::debug!(
            method = %req.method(),
            path = req.url().path(),
            url = %req.url(),
            headers = ?req.headers(),
            "search request"
        );

        let started = Instant::now();
        let res = next.run(req, extensions).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &res {
            Ok(resp) => tracing::debug!(status = %resp.status(), elapsed_ms, "search response"),
            Err(e) => tracing::warn!(error = %e, elapsed_ms, "search request failed"),
        }
        res
    }
}
