//! Eligibility judgment.
//!
//! One completion call per candidate asks the model to evaluate each of the
//! grant's eligibility rules against the company profile. [`judge`] reports
//! failures as [`JudgmentError`]; [`judge_or_default`] is the pipeline's
//! recovery policy.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::completion::{parse_json_reply, CompletionProvider};
use crate::models::{CompanyProfile, GrantCandidate, VerdictSet};
use crate::prompts::{eligibility_judge_prompt, JUDGE_MAX_TOKENS};

#[derive(Debug, Error)]
pub enum JudgmentError {
    #[error("judge call failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("judge call timed out after {0:?}")]
    Timeout(Duration),
    #[error("judge reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Verdicts for one candidate, and whether they were substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub verdicts: VerdictSet,
    pub failed: bool,
}

pub async fn judge(
    provider: &dyn CompletionProvider,
    company: &CompanyProfile,
    grant: &GrantCandidate,
    call_timeout: Duration,
) -> Result<VerdictSet, JudgmentError> {
    let prompt = eligibility_judge_prompt(company, grant)?;
    let reply = tokio::time::timeout(call_timeout, provider.complete(&prompt, JUDGE_MAX_TOKENS))
        .await
        .map_err(|_| JudgmentError::Timeout(call_timeout))?
        .map_err(JudgmentError::Completion)?;

    let verdicts: VerdictSet = parse_json_reply(&reply)?;
    debug!(
        grant_id = %grant.grant_id,
        rules = verdicts.rule_results.len(),
        overall = %verdicts.overall,
        missing = verdicts.missing_docs.len(),
        "Eligibility judged"
    );
    Ok(verdicts)
}

/// Judge a candidate, substituting [`VerdictSet::fallback`] on any failure
/// and flagging the judgment as failed.
pub async fn judge_or_default(
    provider: &dyn CompletionProvider,
    company: &CompanyProfile,
    grant: &GrantCandidate,
    call_timeout: Duration,
) -> Judgment {
    match judge(provider, company, grant, call_timeout).await {
        Ok(verdicts) => Judgment {
            verdicts,
            failed: false,
        },
        Err(e) => {
            warn!(grant_id = %grant.grant_id, error = %e, "Eligibility judgment failed; using POSSIBLE");
            Judgment {
                verdicts: VerdictSet::fallback(),
                failed: true,
            }
        }
    }
}
