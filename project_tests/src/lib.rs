//! # Project Test Helpers
//!
//! Fixtures shared by the integration tests under `tests/`.

use search_common::search::SearchHit;
use serde_json::json;

/// `n` hits with ids `"1"..="n"` and a `name` field in their source.
pub fn numbered_hits(n: usize) -> Vec<SearchHit> {
    (1..=n)
        .map(|i| SearchHit::new(i.to_string(), json!({ "name": format!("doc-{i}"), "rank": i })))
        .collect()
}

/// Sends a raw request and returns the status and body text.
pub async fn raw_request(
    method: reqwest::Method,
    url: &str,
    body: impl Into<reqwest::Body>,
) -> anyhow::Result<(u16, String)> {
    let resp = reqwest::Client::new()
        .request(method, url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await?;
    let status = resp.status().as_u16();
    Ok((status, resp.text().await?))
}
