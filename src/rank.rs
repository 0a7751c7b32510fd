//! Ranking and persistence of scored matches.

use anyhow::{Context, Result};
use tracing::debug;

use crate::judge::Judgment;
use crate::models::{now_ts, GrantCandidate, MatchRecord, MatchResult};
use crate::score::ScoreBreakdown;
use crate::store::{put_match, RecordStore};

/// Build the response row for a judged and scored candidate.
pub fn to_result(candidate: GrantCandidate, judgment: Judgment, breakdown: &ScoreBreakdown) -> MatchResult {
    MatchResult {
        grant_id: candidate.grant_id,
        title: candidate.title,
        score: breakdown.score,
        why: judgment.verdicts.overall.as_str().to_string(),
        missing_docs: judgment.verdicts.missing_docs,
        citations: Vec::new(),
        judgment_failed: judgment.failed,
    }
}

/// Order results by descending score and keep the first `top_n`.
///
/// The sort is stable, so equal scores keep their retrieval order.
pub fn rank(mut results: Vec<MatchResult>, top_n: usize) -> Vec<MatchResult> {
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(top_n);
    results
}

pub fn to_record(company_id: &str, result: &MatchResult, created_at: &str) -> MatchRecord {
    MatchRecord {
        company_id: company_id.to_string(),
        grant_id: result.grant_id.clone(),
        score: result.score,
        missing_docs: result.missing_docs.clone(),
        rationale: result.why.clone(),
        created_at: created_at.to_string(),
    }
}

/// Append one match record per result, in rank order.
///
/// Stops at the first failed write. Records written before the failure are
/// kept, so a retried request may store duplicates.
pub async fn persist_matches(
    store: &dyn RecordStore,
    company_id: &str,
    results: &[MatchResult],
) -> Result<()> {
    for result in results {
        let record = to_record(company_id, result, &now_ts());
        put_match(store, &record).await.with_context(|| {
            format!(
                "Failed to store match {} for company {}",
                result.grant_id, company_id
            )
        })?;
    }
    debug!(company_id, count = results.len(), "Persisted match records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Overall, VerdictSet};
    use crate::store::{load_matches, InMemoryRecordStore};

    fn row(id: &str, score: u8) -> MatchResult {
        MatchResult {
            grant_id: id.to_string(),
            title: None,
            score,
            why: "POSSIBLE".to_string(),
            missing_docs: vec![],
            citations: vec![],
            judgment_failed: false,
        }
    }

    fn ids(results: &[MatchResult]) -> Vec<&str> {
        results.iter().map(|r| r.grant_id.as_str()).collect()
    }

    #[test]
    fn sorts_descending_and_truncates() {
        let ranked = rank(vec![row("a", 10), row("b", 90), row("c", 50), row("d", 70)], 3);
        assert_eq!(ids(&ranked), vec!["b", "d", "c"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank(vec![row("a", 50), row("b", 80), row("c", 50), row("d", 50)], 3);
        assert_eq!(ids(&ranked), vec!["b", "a", "c"]);
    }

    #[test]
    fn fewer_than_top_n_returns_all() {
        assert_eq!(rank(vec![row("a", 1)], 3).len(), 1);
        assert!(rank(vec![], 3).is_empty());
    }

    #[test]
    fn ranking_is_idempotent() {
        let once = rank(vec![row("a", 40), row("b", 40), row("c", 90), row("d", 10)], 3);
        let twice = rank(once.clone(), 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn result_carries_overall_and_flag() {
        let candidate = GrantCandidate {
            grant_id: "g1".to_string(),
            title: Some("Fund".to_string()),
            sector_tags: vec![],
            body: String::new(),
            required_documents: vec![],
            eligibility_rules: vec![],
        };
        let judgment = Judgment {
            verdicts: VerdictSet {
                overall: Overall::Fail,
                missing_docs: vec!["doc1".to_string()],
                ..Default::default()
            },
            failed: true,
        };
        let breakdown = ScoreBreakdown {
            eligibility: 0.0,
            fit: 1.0,
            readiness: 0.0,
            composite: 0.3,
            score: 30,
        };
        let r = to_result(candidate, judgment, &breakdown);
        assert_eq!(r.why, "FAIL");
        assert_eq!(r.score, 30);
        assert_eq!(r.missing_docs, vec!["doc1"]);
        assert!(r.citations.is_empty());
        assert!(r.judgment_failed);
    }

    #[tokio::test]
    async fn persists_one_record_per_result() {
        let store = InMemoryRecordStore::new();
        let mut first = row("g1", 88);
        first.why = "PASS".to_string();
        persist_matches(&store, "acme", &[first, row("g2", 40)]).await.unwrap();

        let records = load_matches(&store, "acme").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].grant_id, "g1");
        assert_eq!(records[0].score, 88);
        assert_eq!(records[0].rationale, "PASS");
        assert!(records[0].created_at.ends_with('Z'));
    }
}
