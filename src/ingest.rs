//! Grant ingestion.
//!
//! Turns a grant document into a stored [`Grant`] record and a search
//! document:
//!
//! ```text
//! bytes ──► extract text ──► summarize (model) ──► put grant ──► index doc
//!   ▲                             │
//!   │                    fallback summary on failure
//! http(s) URL (page fetched, paragraphs kept)
//! ```
//!
//! The summarizer is best-effort. A reply that fails or does not parse
//! yields a minimal summary built from the text itself, so every document
//! that can be read ends up searchable.

use anyhow::{bail, Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::completion::{parse_json_reply, CompletionProvider};
use crate::extract::{extract_text, MIME_HTML};
use crate::intent::StageError;
use crate::matcher::MatchContext;
use crate::models::{now_ts, null_as_default, EligibilityRule, Grant};
use crate::prompts::{grant_summarizer_prompt, truncate_chars, SUMMARY_MAX_TOKENS};
use crate::store::put_grant;

/// Characters of the summary fallback's `purpose`.
const FALLBACK_PURPOSE_CHARS: usize = 400;
/// Characters of raw text appended to the indexed body.
const INDEXED_TEXT_CHARS: usize = 4000;

/// Structured metadata the summarizer extracts from grant text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantSummary {
    #[serde(default)]
    pub grant_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sector_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub eligibility_rules: Vec<EligibilityRule>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_documents: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub deadlines: Vec<String>,
}

impl GrantSummary {
    /// Minimal summary used when the model reply is unusable.
    pub fn fallback(text: &str) -> Self {
        Self {
            title: Some("Unknown grant".to_string()),
            issuer: Some("Unknown".to_string()),
            purpose: Some(truncate_chars(text, FALLBACK_PURPOSE_CHARS).to_string()),
            ..Default::default()
        }
    }
}

/// Result of one ingestion, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub grant_id: String,
    pub status: String,
    pub title: Option<String>,
}

pub async fn summarize_grant(
    provider: &dyn CompletionProvider,
    text: &str,
    call_timeout: Duration,
) -> Result<GrantSummary, StageError> {
    let prompt = grant_summarizer_prompt(text);
    let reply = tokio::time::timeout(call_timeout, provider.complete(&prompt, SUMMARY_MAX_TOKENS))
        .await
        .map_err(|_| StageError::Timeout(call_timeout))?
        .map_err(StageError::Completion)?;
    Ok(parse_json_reply(&reply)?)
}

pub async fn summarize_or_fallback(
    provider: &dyn CompletionProvider,
    text: &str,
    call_timeout: Duration,
) -> GrantSummary {
    match summarize_grant(provider, text, call_timeout).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "Grant summarization failed; using fallback metadata");
            GrantSummary::fallback(text)
        }
    }
}

/// `grant_` followed by the first 8 hex digits of a random UUID.
pub fn new_grant_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("grant_{}", &hex[..8])
}

pub fn build_grant(summary: GrantSummary, created_at: String) -> Grant {
    let grant_id = summary
        .grant_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_grant_id);

    Grant {
        grant_id,
        title: summary.title,
        issuer: summary.issuer,
        purpose: summary.purpose,
        sector_tags: summary.sector_tags,
        eligibility_rules: summary.eligibility_rules,
        required_documents: summary.required_documents,
        deadlines: summary.deadlines,
        created_at,
    }
}

/// The search document for a grant: its metadata plus a body made of the
/// purpose and the start of the source text.
pub fn search_document(grant: &Grant, text: &str) -> Value {
    let body = format!(
        "{}\n\n{}",
        grant.purpose.as_deref().unwrap_or(""),
        truncate_chars(text, INDEXED_TEXT_CHARS)
    );
    json!({
        "grant_id": grant.grant_id,
        "title": grant.title,
        "issuer": grant.issuer,
        "sector_tags": grant.sector_tags,
        "required_documents": grant.required_documents,
        "eligibility_rules": grant.eligibility_rules,
        "body": body,
        "created_at": grant.created_at,
    })
}

/// Summarize, store, and index grant text. `title` overrides the
/// summarizer's title when given.
pub async fn ingest_text(ctx: &MatchContext, text: &str, title: Option<&str>) -> Result<IngestOutcome> {
    if text.trim().is_empty() {
        bail!("grant text must not be empty");
    }

    let mut summary =
        summarize_or_fallback(ctx.completion.as_ref(), text, ctx.settings.call_timeout).await;
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        summary.title = Some(title.to_string());
    }

    let grant = build_grant(summary, now_ts());
    put_grant(ctx.store.as_ref(), &grant)
        .await
        .with_context(|| format!("Failed to store grant {}", grant.grant_id))?;
    ctx.search
        .index(&grant.grant_id, &search_document(&grant, text))
        .await
        .with_context(|| format!("Failed to index grant {}", grant.grant_id))?;

    info!(
        grant_id = %grant.grant_id,
        title = grant.title.as_deref().unwrap_or(""),
        sectors = ?grant.sector_tags,
        rules = grant.eligibility_rules.len(),
        "Grant ingested"
    );

    Ok(IngestOutcome {
        grant_id: grant.grant_id,
        status: "ok".to_string(),
        title: grant.title,
    })
}

/// Extract text from a document and ingest it.
pub async fn ingest_document(
    ctx: &MatchContext,
    bytes: &[u8],
    content_type: &str,
    title: Option<&str>,
) -> Result<IngestOutcome> {
    let text = extract_text(bytes, content_type)?;
    ingest_text(ctx, &text, title).await
}

/// Parse a grant page URL, accepting only absolute `http`/`https` URLs.
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("Unsupported URL scheme '{}': only http and https are fetched", other),
    }
}

/// Fetch a page and extract its text. HTML responses keep only paragraph
/// text; PDF and plain-text responses go through the usual extractors.
pub async fn fetch_page_text(url: &Url, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    let status = resp.status();
    if !status.is_success() {
        bail!("HTTP {} for {}", status, url);
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(MIME_HTML)
        .to_string();
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))?;

    let text = extract_text(&bytes, &content_type)
        .with_context(|| format!("Failed to extract text from {}", url))?;
    if text.trim().is_empty() {
        bail!("No paragraph text found at {}", url);
    }
    Ok(text)
}

/// Fetch a grant page and ingest its text.
pub async fn ingest_url(ctx: &MatchContext, url: &str, title: Option<&str>) -> Result<IngestOutcome> {
    let url = parse_http_url(url)?;
    let text = fetch_page_text(&url, ctx.settings.call_timeout).await?;
    info!(url = %url, chars = text.len(), "Fetched grant page");
    ingest_text(ctx, &text, title).await
}
