//! The matching pipeline.
//!
//! [`run_match`] takes a company profile and free-text goals through every
//! stage and returns the top-ranked grants:
//!
//! ```text
//! goal text ──► intent ──► search ──► judge ×N ──► score ──► rank ──► persist
//!                 │                     │
//!              default               default
//!             on failure            on failure
//! ```
//!
//! Intent extraction and eligibility judgment recover with defaults.
//! Retrieval and persistence failures, and exceeding the overall request
//! deadline, fail the request with a [`MatchError`].
//!
//! Judge calls are fanned out with bounded parallelism. Results come back
//! in retrieval order, so score ties rank deterministically.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::completion::{create_provider, CompletionProvider};
use crate::config::Config;
use crate::db;
use crate::intent::extract_intent_or_default;
use crate::judge::judge_or_default;
use crate::migrate::apply_schema;
use crate::models::{MatchRequest, MatchResponse, MatchResult};
use crate::rank::{persist_matches, rank, to_result};
use crate::retrieve::{build_query_terms, retrieve_candidates};
use crate::score::score_candidate;
use crate::search::{DocumentSearch, OpenSearchClient, SqliteGrantIndex};
use crate::store::{RecordStore, SqliteRecordStore};

/// Request-fatal pipeline failures.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("grant retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),
    #[error("storing match records failed: {0:#}")]
    Persistence(anyhow::Error),
    #[error("match request exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

/// Tunables for one pipeline run.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub candidate_limit: usize,
    pub top_n: usize,
    pub judge_concurrency: usize,
    /// Applied to each completion call.
    pub call_timeout: Duration,
    /// Applied to the whole request.
    pub request_timeout: Duration,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            candidate_limit: 10,
            top_n: 3,
            judge_concurrency: 4,
            call_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl MatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            candidate_limit: config.retrieval.candidate_limit,
            top_n: config.matching.top_n,
            judge_concurrency: config.matching.judge_concurrency,
            call_timeout: config.completion.call_timeout(),
            request_timeout: Duration::from_secs(config.matching.request_timeout_secs),
        }
    }
}

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct MatchContext {
    pub completion: Arc<dyn CompletionProvider>,
    pub search: Arc<dyn DocumentSearch>,
    pub store: Arc<dyn RecordStore>,
    pub settings: MatchSettings,
}

impl MatchContext {
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        search: Arc<dyn DocumentSearch>,
        store: Arc<dyn RecordStore>,
        settings: MatchSettings,
    ) -> Self {
        Self {
            completion,
            search,
            store,
            settings,
        }
    }

    /// Open the database, ensure its schema, and build the configured
    /// completion provider and search backend.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        apply_schema(&pool).await?;

        let completion = create_provider(&config.completion)?;
        let search: Arc<dyn DocumentSearch> = match config.search.backend.as_str() {
            "opensearch" => Arc::new(OpenSearchClient::new(
                &config.search,
                config.completion.call_timeout(),
            )?),
            _ => Arc::new(SqliteGrantIndex::new(pool.clone())),
        };
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(pool));

        info!(
            completion = completion.model_name(),
            search = %config.search.backend,
            "Match context ready"
        );

        Ok(Self::new(
            completion,
            search,
            store,
            MatchSettings::from_config(config),
        ))
    }
}

/// Pipeline progress, logged as each stage completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Received,
    IntentsExtracted,
    CandidatesRetrieved,
    Judging,
    Scored,
    Ranked,
    Persisted,
    Responded,
}

impl MatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStage::Received => "RECEIVED",
            MatchStage::IntentsExtracted => "INTENTS_EXTRACTED",
            MatchStage::CandidatesRetrieved => "CANDIDATES_RETRIEVED",
            MatchStage::Judging => "JUDGING",
            MatchStage::Scored => "SCORED",
            MatchStage::Ranked => "RANKED",
            MatchStage::Persisted => "PERSISTED",
            MatchStage::Responded => "RESPONDED",
        }
    }
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run the full pipeline for one request under the overall deadline.
pub async fn run_match(ctx: &MatchContext, request: &MatchRequest) -> Result<MatchResponse, MatchError> {
    let deadline = ctx.settings.request_timeout;
    tokio::time::timeout(deadline, run_stages(ctx, request))
        .await
        .map_err(|_| MatchError::DeadlineExceeded(deadline))?
}

async fn run_stages(ctx: &MatchContext, request: &MatchRequest) -> Result<MatchResponse, MatchError> {
    let settings = &ctx.settings;
    let company = &request.company;
    let company_id = company.company_id();
    info!(company_id = %company_id, stage = %MatchStage::Received, "Match request");

    let intent = extract_intent_or_default(
        ctx.completion.as_ref(),
        &request.goal_text,
        settings.call_timeout,
    )
    .await;
    debug!(stage = %MatchStage::IntentsExtracted, keywords = ?intent.keywords);

    let terms = build_query_terms(&intent, company.sector());
    let candidates = retrieve_candidates(ctx.search.as_ref(), &terms, settings.candidate_limit)
        .await
        .map_err(MatchError::Retrieval)?;
    info!(
        stage = %MatchStage::CandidatesRetrieved,
        query = %terms,
        count = candidates.len()
    );

    debug!(stage = %MatchStage::Judging, concurrency = settings.judge_concurrency);
    let provider = ctx.completion.as_ref();
    let call_timeout = settings.call_timeout;
    let judged: Vec<_> = stream::iter(candidates.into_iter().map(|candidate| async move {
        let judgment = judge_or_default(provider, company, &candidate, call_timeout).await;
        (candidate, judgment)
    }))
    .buffered(settings.judge_concurrency.max(1))
    .collect()
    .await;

    let scored: Vec<MatchResult> = judged
        .into_iter()
        .map(|(candidate, judgment)| {
            let breakdown = score_candidate(
                &judgment.verdicts,
                company.sector(),
                &candidate.sector_tags,
                &candidate.required_documents,
            );
            debug!(
                grant_id = %candidate.grant_id,
                eligibility = breakdown.eligibility,
                fit = breakdown.fit,
                readiness = breakdown.readiness,
                score = breakdown.score,
                "Scored candidate"
            );
            to_result(candidate, judgment, &breakdown)
        })
        .collect();
    let failed = scored.iter().filter(|r| r.judgment_failed).count();
    debug!(stage = %MatchStage::Scored, count = scored.len(), judgment_failed = failed);

    let results = rank(scored, settings.top_n);
    debug!(stage = %MatchStage::Ranked, kept = results.len());

    persist_matches(ctx.store.as_ref(), &company_id, &results)
        .await
        .map_err(MatchError::Persistence)?;
    debug!(stage = %MatchStage::Persisted, count = results.len());

    info!(
        company_id = %company_id,
        stage = %MatchStage::Responded,
        results = results.len(),
        judgment_failed = failed,
        "Match complete"
    );
    Ok(MatchResponse { results })
}
