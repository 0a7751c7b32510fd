//! Document search abstraction.
//!
//! The [`DocumentSearch`] trait is the seam between the matching pipeline
//! and the grant index. Its request and response types mirror the
//! OpenSearch `_search` body so the same query works against either
//! backend:
//!
//! ```json
//! { "size": 10,
//!   "query": { "multi_match": { "query": "solar farm",
//!                               "fields": ["title^3", "sector_tags^3", "body"] } } }
//! ```
//!
//! Backends:
//! - [`SqliteGrantIndex`]: local FTS5 index with column-weighted BM25.
//! - [`OpenSearchClient`]: HTTP client for an OpenSearch/Elasticsearch index.

pub mod opensearch;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use opensearch::OpenSearchClient;
pub use sqlite::SqliteGrantIndex;

/// A ranked multi-field text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub size: usize,
    pub query: QueryClause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClause {
    pub multi_match: MultiMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMatch {
    pub query: String,
    /// Field names with optional `^boost` suffixes, e.g. `"title^3"`.
    pub fields: Vec<String>,
}

impl SearchQuery {
    pub fn multi_match(query: impl Into<String>, fields: &[&str], size: usize) -> Self {
        Self {
            size,
            query: QueryClause {
                multi_match: MultiMatch {
                    query: query.into(),
                    fields: fields.iter().map(|f| f.to_string()).collect(),
                },
            },
        }
    }

    pub fn text(&self) -> &str {
        &self.query.multi_match.query
    }

    /// Fields split into `(name, boost)` pairs; missing boosts are `1.0`.
    pub fn weighted_fields(&self) -> Vec<(&str, f64)> {
        self.query
            .multi_match
            .fields
            .iter()
            .map(|f| match f.split_once('^') {
                Some((name, boost)) => (name, boost.parse().unwrap_or(1.0)),
                None => (f.as_str(), 1.0),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: HitsEnvelope,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl SearchResponse {
    pub fn from_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits: HitsEnvelope { hits },
        }
    }

    pub fn into_hits(self) -> Vec<SearchHit> {
        self.hits.hits
    }
}

/// A searchable grant index.
///
/// `search` is what the matching pipeline consumes; `index` is used by
/// grant ingestion to make new grants retrievable; `get` supplies grant
/// passages for question answering.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Run a ranked query, returning at most `query.size` hits, best first.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse>;

    /// Insert or replace the document stored under `id`.
    async fn index(&self, id: &str, doc: &Value) -> Result<()>;

    /// The document stored under `id`. Backends without point lookups
    /// report every document as absent.
    async fn get(&self, _id: &str) -> Result<Option<Value>> {
        Ok(None)
    }
}
