//! Goal-intent extraction.
//!
//! One completion call turns an SME's free-text goals into an [`Intent`].
//! [`extract_intent`] reports failures; [`extract_intent_or_default`] is the
//! pipeline's policy of continuing with an empty intent.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::completion::{parse_json_reply, CompletionProvider};
use crate::models::Intent;
use crate::prompts::{goal_intent_prompt, INTENT_MAX_TOKENS};

/// Failure of an AI-backed pipeline stage other than judgment.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("completion call failed: {0:#}")]
    Completion(anyhow::Error),
    #[error("completion call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub async fn extract_intent(
    provider: &dyn CompletionProvider,
    goal_text: &str,
    call_timeout: Duration,
) -> Result<Intent, StageError> {
    let prompt = goal_intent_prompt(goal_text);
    let reply = tokio::time::timeout(call_timeout, provider.complete(&prompt, INTENT_MAX_TOKENS))
        .await
        .map_err(|_| StageError::Timeout(call_timeout))?
        .map_err(StageError::Completion)?;

    let intent: Intent = parse_json_reply(&reply)?;
    debug!(
        keywords = intent.keywords.len(),
        purposes = intent.purposes.len(),
        implied_sector = intent.implied_sector.as_deref().unwrap_or("none"),
        "Extracted goal intent"
    );
    Ok(intent)
}

/// Extract an intent, substituting the empty intent on any failure.
pub async fn extract_intent_or_default(
    provider: &dyn CompletionProvider,
    goal_text: &str,
    call_timeout: Duration,
) -> Intent {
    match extract_intent(provider, goal_text, call_timeout).await {
        Ok(intent) => intent,
        Err(e) => {
            warn!(error = %e, "Intent extraction failed; continuing with empty intent");
            Intent::default()
        }
    }
}
