//! Question answering over a single grant.
//!
//! Passages come from the stored grant record and the grant's indexed
//! search document. The model answers from those passages, and any quoted
//! text in the answer that appears in a passage is returned as a citation.
//!
//! ```text
//! grant record ─┐
//!               ├─► passages ──► rag prompt ──► complete ──► answer + citations
//! search doc  ──┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::completion::CompletionProvider;
use crate::matcher::MatchContext;
use crate::models::Grant;
use crate::prompts::{rag_prompt, render_passage, truncate_chars, ASK_MAX_TOKENS, PASSAGE_CHARS};
use crate::search::DocumentSearch;
use crate::store::load_grant;

/// Shortest quoted span treated as a citation.
const MIN_QUOTE_CHARS: usize = 12;

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub grant_id: String,
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub quote: String,
    /// `"Summary"` for the stored grant record, `"Document"` for the
    /// indexed grant text.
    pub section: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub grant_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("grant not found: {0}")]
    GrantNotFound(String),
    #[error("failed to load grant passages: {0:#}")]
    Lookup(anyhow::Error),
    #[error("completion call failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("completion call timed out after {0:?}")]
    Timeout(Duration),
}

/// A block of grant text the model may quote from.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub section: &'static str,
    pub title: Option<String>,
    pub text: String,
}

impl Passage {
    fn rendered(&self) -> String {
        render_passage(self.title.as_deref(), &self.text)
    }
}

/// Passages for a grant: a summary of the stored record, then the indexed
/// document body.
pub fn grant_passages(grant: Option<&Grant>, doc: Option<&serde_json::Value>) -> Vec<Passage> {
    let mut passages = Vec::new();

    if let Some(grant) = grant {
        let mut lines = Vec::new();
        if let Some(issuer) = grant.issuer.as_deref() {
            lines.push(format!("Issuer: {}", issuer));
        }
        if let Some(purpose) = grant.purpose.as_deref() {
            lines.push(format!("Purpose: {}", purpose));
        }
        if !grant.sector_tags.is_empty() {
            lines.push(format!("Sectors: {}", grant.sector_tags.join(", ")));
        }
        if !grant.eligibility_rules.is_empty() {
            lines.push("Eligibility:".to_string());
            for rule in &grant.eligibility_rules {
                lines.push(format!("- {}: {}", rule.key, rule.value));
            }
        }
        if !grant.required_documents.is_empty() {
            lines.push(format!(
                "Required documents: {}",
                grant.required_documents.join(", ")
            ));
        }
        if !grant.deadlines.is_empty() {
            lines.push(format!("Deadlines: {}", grant.deadlines.join(", ")));
        }
        passages.push(Passage {
            section: "Summary",
            title: grant.title.clone(),
            text: truncate_chars(&lines.join("\n"), PASSAGE_CHARS).to_string(),
        });
    }

    if let Some(doc) = doc {
        let body = doc.get("body").and_then(|b| b.as_str()).unwrap_or("").trim();
        if !body.is_empty() {
            let title = doc
                .get("title")
                .and_then(|t| t.as_str())
                .map(str::to_string)
                .or_else(|| grant.and_then(|g| g.title.clone()));
            passages.push(Passage {
                section: "Document",
                title,
                text: truncate_chars(body, PASSAGE_CHARS).to_string(),
            });
        }
    }

    passages
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Spans between straight or curly double quotes.
fn quoted_spans(answer: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    for (i, c) in answer.char_indices() {
        match (c, open) {
            ('"' | '\u{201c}', None) => open = Some(i + c.len_utf8()),
            ('"' | '\u{201d}', Some(start)) => {
                spans.push(&answer[start..i]);
                open = None;
            }
            _ => {}
        }
    }
    spans
}

/// Quoted spans of `answer` that occur in one of `passages`, in answer
/// order, without duplicates.
pub fn extract_citations(answer: &str, passages: &[Passage]) -> Vec<Citation> {
    let haystacks: Vec<String> = passages.iter().map(|p| normalize(&p.text)).collect();
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for span in quoted_spans(answer) {
        let quote = span.trim().trim_end_matches(['.', ',']).trim();
        if quote.chars().count() < MIN_QUOTE_CHARS {
            continue;
        }
        let needle = normalize(quote);
        if !seen.insert(needle.clone()) {
            continue;
        }
        if let Some(i) = haystacks.iter().position(|h| h.contains(&needle)) {
            citations.push(Citation {
                quote: quote.to_string(),
                section: passages[i].section.to_string(),
            });
        }
    }
    citations
}

/// Answer a question about one stored grant.
pub async fn answer_question(
    ctx: &MatchContext,
    request: &AskRequest,
) -> Result<AskResponse, AskError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AskError::EmptyQuestion);
    }

    let grant = load_grant(ctx.store.as_ref(), &request.grant_id)
        .await
        .map_err(AskError::Lookup)?;
    let doc = ctx
        .search
        .get(&request.grant_id)
        .await
        .map_err(AskError::Lookup)?;
    let passages = grant_passages(grant.as_ref(), doc.as_ref());
    if passages.is_empty() {
        return Err(AskError::GrantNotFound(request.grant_id.clone()));
    }

    let rendered: Vec<String> = passages.iter().map(Passage::rendered).collect();
    let prompt = rag_prompt(&rendered, question);
    let call_timeout = ctx.settings.call_timeout;
    let reply = tokio::time::timeout(call_timeout, ctx.completion.complete(&prompt, ASK_MAX_TOKENS))
        .await
        .map_err(|_| AskError::Timeout(call_timeout))?
        .map_err(AskError::Completion)?;

    let answer = reply.trim().to_string();
    let citations = extract_citations(&answer, &passages);
    info!(
        grant_id = %request.grant_id,
        passages = passages.len(),
        citations = citations.len(),
        "Answered grant question"
    );

    Ok(AskResponse {
        grant_id: request.grant_id.clone(),
        answer,
        citations,
    })
}
