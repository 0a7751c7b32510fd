//! OpenSearch / Elasticsearch backend.
//!
//! Sends the [`SearchQuery`] body verbatim to `POST {url}/{index}/_search`
//! and indexes documents with `PUT {url}/{index}/_doc/{id}`. Point lookups
//! use `GET {url}/{index}/_doc/{id}`. Basic auth is used when
//! `OPENSEARCH_USER` and `OPENSEARCH_PASS` are both set.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::{DocumentSearch, SearchQuery, SearchResponse};
use crate::config::SearchConfig;

pub struct OpenSearchClient {
    client: reqwest::Client,
    url: String,
    index: String,
    auth: Option<(String, String)>,
}

impl OpenSearchClient {
    /// Client with credentials taken from the environment.
    pub fn new(config: &SearchConfig, timeout: std::time::Duration) -> Result<Self> {
        let auth = match (
            std::env::var("OPENSEARCH_USER"),
            std::env::var("OPENSEARCH_PASS"),
        ) {
            (Ok(user), Ok(pass)) => Some((user, pass)),
            _ => None,
        };
        Self::with_credentials(config, timeout, auth)
    }

    pub fn with_credentials(
        config: &SearchConfig,
        timeout: std::time::Duration,
        auth: Option<(String, String)>,
    ) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("search.url required for opensearch backend"))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            auth,
        })
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }
}

#[async_trait]
impl DocumentSearch for OpenSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        debug!(index = %self.index, query = %query.text(), size = query.size, "OpenSearch query");

        let resp = self
            .with_auth(
                self.client
                    .post(format!("{}/{}/_search", self.url, self.index))
                    .json(query),
            )
            .send()
            .await
            .with_context(|| format!("OpenSearch request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            bail!("OpenSearch error {}: {}", status, body_text);
        }

        Ok(resp.json().await?)
    }

    async fn index(&self, id: &str, doc: &Value) -> Result<()> {
        let resp = self
            .with_auth(
                self.client
                    .put(format!("{}/{}/_doc/{}", self.url, self.index, id))
                    .json(doc),
            )
            .send()
            .await
            .with_context(|| format!("OpenSearch request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            bail!("OpenSearch index error {}: {}", status, body_text);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>> {
        let resp = self
            .with_auth(
                self.client
                    .get(format!("{}/{}/_doc/{}", self.url, self.index, id)),
            )
            .send()
            .await
            .with_context(|| format!("OpenSearch request to {} failed", self.url))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            bail!("OpenSearch get error {}: {}", status, body_text);
        }

        let body: Value = resp.json().await?;
        Ok(body.get("_source").cloned())
    }
}
