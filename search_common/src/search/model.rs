use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relation reported with an exact hit count.
pub const RELATION_EQ: &str = "eq";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// # Search Result
///
/// The result envelope of `_search` and `_search/scroll`.
pub struct SearchResult {
    /// Milliseconds the engine spent on the query.
    #[serde(default)]
    pub took: i64,
    /// Whether the query hit its timeout.
    #[serde(default)]
    pub timed_out: bool,
    /// Cursor for the next page when the request opened a scroll.
    #[serde(rename = "_scroll_id", default, skip_serializing_if = "Option::is_none")]
    pub scroll_id: Option<String>,
    /// The hits section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<SearchHits>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: i64,
    pub relation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// # Search Hit
///
/// One matched document: its identity and the opaque `_source` payload.
pub struct SearchHit {
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

impl SearchHit {
    /// A hit with an id and a source document.
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source: Some(source),
            ..Default::default()
        }
    }

    /// Sets the index the hit belongs to.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl SearchResult {
    /// Wraps `hits` into an envelope whose total equals the hit count.
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        SearchResult {
            hits: Some(SearchHits {
                total: Some(TotalHits {
                    value: hits.len() as i64,
                    relation: RELATION_EQ.to_string(),
                }),
                max_score: None,
                hits,
            }),
            ..Default::default()
        }
    }

    /// An envelope with zero hits; the usual last page of a scroll.
    pub fn empty() -> Self {
        Self::from_hits(Vec::new())
    }

    /// Attaches a scroll cursor.
    pub fn with_scroll_id(mut self, scroll_id: impl Into<String>) -> Self {
        self.scroll_id = Some(scroll_id.into());
        self
    }

    /// The reported total, 0 when absent.
    pub fn total_hits(&self) -> i64 {
        self.hits
            .as_ref()
            .and_then(|h| h.total.as_ref())
            .map_or(0, |t| t.value)
    }

    /// The hits of this page.
    pub fn hits(&self) -> &[SearchHit] {
        self.hits
            .as_ref()
            .map(|h| h.hits.as_slice())
            .unwrap_or_default()
    }

    /// Decodes every `_source` into `T`, skipping hits without a source.
    pub fn sources<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        self.hits()
            .iter()
            .filter_map(|h| h.source.clone())
            .map(serde_json::from_value)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// # Bulk Response
///
/// Per-item acknowledgement of a `_bulk` request. Each item is a one-entry
/// map from the operation name (`index`, `create`, `update`, `delete`) to its
/// outcome.
pub struct BulkResponse {
    #[serde(default)]
    pub took: i64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BTreeMap<String, BulkResponseItem>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponseItem {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

impl BulkResponse {
    /// Items acknowledged for the operation `op`.
    pub fn by_operation(&self, op: &str) -> Vec<&BulkResponseItem> {
        self.items.iter().filter_map(|item| item.get(op)).collect()
    }

    /// Outcomes of `index` operations.
    pub fn indexed(&self) -> Vec<&BulkResponseItem> {
        self.by_operation("index")
    }

    /// Outcomes of `delete` operations.
    pub fn deleted(&self) -> Vec<&BulkResponseItem> {
        self.by_operation("delete")
    }

    /// Items whose status is outside the 2xx range.
    pub fn failed(&self) -> Vec<&BulkResponseItem> {
        self.items
            .iter()
            .flat_map(|item| item.values())
            .filter(|i| !(200..300).contains(&i.status))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// # Engine Error
///
/// The body the engine returns with a non-2xx status.
pub struct ElasticError {
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root_cause: Vec<ErrorDetails>,
}

impl ElasticError {
    /// An error with a status, an error type and a reason.
    pub fn new(status: u16, kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(ErrorDetails {
                kind: kind.into(),
                reason: reason.into(),
                ..Default::default()
            }),
        }
    }

    /// Sets the index the error refers to.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        if let Some(details) = self.error.as_mut() {
            details.index = Some(index.into());
        }
        self
    }
}

impl fmt::Display for ElasticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(d) => write!(
                f,
                "elastic: Error {} ({}): {} [type={}]",
                self.status,
                status_text(self.status),
                d.reason,
                d.kind
            ),
            None => write!(f, "elastic: Error {} ({})", self.status, status_text(self.status)),
        }
    }
}

impl std::error::Error for ElasticError {}

fn status_text(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_hits_counts_and_keeps_order() {
        let result = SearchResult::from_hits(vec![
            SearchHit::new("b", json!({"n": 2})),
            SearchHit::new("a", json!({"n": 1})),
        ]);
        assert_eq!(result.total_hits(), 2);
        let ids: Vec<_> = result.hits().iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_envelope_json_shape() {
        let result = SearchResult::from_hits(vec![SearchHit::new("1", json!({"name": "a"}))])
            .with_scroll_id("scroll-id-2");
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["_scroll_id"], "scroll-id-2");
        assert_eq!(v["hits"]["total"]["value"], 1);
        assert_eq!(v["hits"]["total"]["relation"], "eq");
        assert_eq!(v["hits"]["hits"][0]["_id"], "1");
        assert_eq!(v["hits"]["hits"][0]["_source"]["name"], "a");
    }

    #[test]
    fn test_null_hit_list_decodes_as_empty() {
        let raw = r#"{"hits":{"total":{"value":0,"relation":"eq"},"hits":null}}"#;
        let result: SearchResult = serde_json::from_str(raw).unwrap();
        assert!(result.hits().is_empty());
        assert_eq!(result.total_hits(), 0);
        assert!(result.scroll_id.is_none());
    }

    #[test]
    fn test_sources_decode() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Doc {
            name: String,
        }
        let result = SearchResult::from_hits(vec![
            SearchHit::new("1", json!({"name": "a"})),
            SearchHit {
                id: "2".into(),
                ..Default::default()
            },
        ]);
        let docs: Vec<Doc> = result.sources().unwrap();
        assert_eq!(docs, vec![Doc { name: "a".into() }]);
    }

    #[test]
    fn test_bulk_response_accessors() {
        let raw = json!({
            "items": [
                {"index": {"_index": "i", "_id": "1", "status": 201, "result": "created"}},
                {"delete": {"_index": "i", "_id": "2", "status": 404, "result": "not_found"}}
            ]
        });
        let resp: BulkResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.indexed().len(), 1);
        assert_eq!(resp.deleted()[0].id, "2");
        assert_eq!(resp.failed().len(), 1);
        assert!(!resp.errors);
    }

    #[test]
    fn test_elastic_error_display() {
        let err = ElasticError::new(404, "index_not_found_exception", "no such index [docs]")
            .with_index("docs");
        assert_eq!(
            err.to_string(),
            "elastic: Error 404 (Not Found): no such index [docs] [type=index_not_found_exception]"
        );
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["error"]["type"], "index_not_found_exception");
        assert_eq!(v["error"]["index"], "docs");
    }
}
