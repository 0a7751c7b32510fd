//! Deterministic fit scoring.
//!
//! ```text
//! composite = 0.6 × eligibility + 0.3 × fit + 0.1 × readiness
//! score     = round(100 × composite)          ∈ [0, 100]
//! ```
//!
//! Eligibility dominates, sector fit is secondary, document readiness is a
//! tiebreaker. No external calls are made here.

use std::collections::HashSet;

use crate::models::{RuleVerdict, Verdict, VerdictSet};

pub const ELIGIBILITY_WEIGHT: f64 = 0.6;
pub const FIT_WEIGHT: f64 = 0.3;
pub const READINESS_WEIGHT: f64 = 0.1;

/// Readiness assumed when a grant declares no required documents.
pub const NEUTRAL_READINESS: f64 = 0.5;

/// The three component scores and the resulting integer score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub eligibility: f64,
    pub fit: f64,
    pub readiness: f64,
    pub composite: f64,
    pub score: u8,
}

pub fn verdict_value(verdict: Verdict) -> f64 {
    match verdict {
        Verdict::Pass => 1.0,
        Verdict::Uncertain => 0.5,
        Verdict::Fail | Verdict::Unknown => 0.0,
    }
}

/// Mean verdict value; an empty list averages to 0.
pub fn eligibility_average(rule_results: &[RuleVerdict]) -> f64 {
    let total: f64 = rule_results.iter().map(|r| verdict_value(r.result)).sum();
    total / rule_results.len().max(1) as f64
}

/// Jaccard similarity between the company's sector and the grant's tags,
/// compared case-insensitively. Empty on either side gives 0.
pub fn sector_fit(company_sector: &str, grant_tags: &[String]) -> f64 {
    let company: HashSet<String> = std::iter::once(company_sector)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect();
    let grant: HashSet<String> = grant_tags.iter().map(|t| t.to_lowercase()).collect();

    jaccard(&company, &grant)
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union.max(1) as f64
}

/// Fraction of required documents not flagged missing, clamped to `[0, 1]`.
/// Grants without required documents get [`NEUTRAL_READINESS`].
pub fn readiness(missing_docs: &[String], required_documents: &[String]) -> f64 {
    if required_documents.is_empty() {
        return NEUTRAL_READINESS;
    }
    let ratio = missing_docs.len() as f64 / required_documents.len().max(1) as f64;
    (1.0 - ratio).clamp(0.0, 1.0)
}

pub fn composite(eligibility: f64, fit: f64, readiness: f64) -> f64 {
    ELIGIBILITY_WEIGHT * eligibility + FIT_WEIGHT * fit + READINESS_WEIGHT * readiness
}

/// Scale a composite in `[0, 1]` to an integer percentage, rounding half
/// away from zero.
pub fn to_percent(composite: f64) -> u8 {
    (100.0 * composite).round().clamp(0.0, 100.0) as u8
}

pub fn score_candidate(
    verdicts: &VerdictSet,
    company_sector: &str,
    sector_tags: &[String],
    required_documents: &[String],
) -> ScoreBreakdown {
    let eligibility = eligibility_average(&verdicts.rule_results);
    let fit = sector_fit(company_sector, sector_tags);
    let readiness = readiness(&verdicts.missing_docs, required_documents);
    let composite = composite(eligibility, fit, readiness);

    ScoreBreakdown {
        eligibility,
        fit,
        readiness,
        composite,
        score: to_percent(composite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rv(result: Verdict) -> RuleVerdict {
        RuleVerdict {
            rule: None,
            result,
            quote: None,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn eligibility_mixes_verdicts() {
        let rules = vec![rv(Verdict::Pass), rv(Verdict::Uncertain), rv(Verdict::Fail), rv(Verdict::Unknown)];
        assert!((eligibility_average(&rules) - 0.375).abs() < 1e-9);
    }

    #[test]
    fn eligibility_empty_is_zero() {
        assert_eq!(eligibility_average(&[]), 0.0);
    }

    #[test]
    fn fit_is_case_insensitive() {
        assert_eq!(sector_fit("Manufacturing", &strings(&["manufacturing"])), 1.0);
        assert!((sector_fit("manufacturing", &strings(&["MANUFACTURING", "digital"])) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn fit_empty_sides_are_zero() {
        assert_eq!(sector_fit("", &strings(&["manufacturing"])), 0.0);
        assert_eq!(sector_fit("manufacturing", &[]), 0.0);
    }

    #[test]
    fn jaccard_is_symmetric_and_bounded() {
        let cases = [
            (set(&["a"]), set(&["a", "b"])),
            (set(&["a", "b", "c"]), set(&["c", "d"])),
            (set(&["x"]), set(&["y"])),
            (set(&["a", "b"]), set(&["a", "b"])),
        ];
        for (a, b) in &cases {
            let ab = jaccard(a, b);
            assert_eq!(ab, jaccard(b, a));
            assert!((0.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn readiness_neutral_without_requirements() {
        assert_eq!(readiness(&[], &[]), 0.5);
        assert_eq!(readiness(&strings(&["a", "b", "c"]), &[]), 0.5);
    }

    #[test]
    fn readiness_ratio() {
        let required = strings(&["a", "b", "c", "d"]);
        assert_eq!(readiness(&[], &required), 1.0);
        assert!((readiness(&strings(&["a"]), &required) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn readiness_clamped_when_overreported() {
        assert_eq!(readiness(&strings(&["a", "b", "c"]), &strings(&["a"])), 0.0);
    }

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(to_percent(0.0), 0);
        assert_eq!(to_percent(0.555), 56);
        assert_eq!(to_percent(0.125), 13);
        assert_eq!(to_percent(0.9999999999999999), 100);
        assert_eq!(to_percent(1.2), 100);
        assert_eq!(to_percent(-0.1), 0);
    }

    #[test]
    fn perfect_match_scores_100() {
        let verdicts = VerdictSet {
            rule_results: vec![rv(Verdict::Pass)],
            ..Default::default()
        };
        let b = score_candidate(&verdicts, "manufacturing", &strings(&["manufacturing"]), &strings(&["doc1"]));
        assert_eq!(b.eligibility, 1.0);
        assert_eq!(b.fit, 1.0);
        assert_eq!(b.readiness, 1.0);
        assert_eq!(b.score, 100);
    }

    #[test]
    fn failed_rule_and_missing_doc_scores_30() {
        let verdicts = VerdictSet {
            rule_results: vec![rv(Verdict::Fail)],
            missing_docs: strings(&["doc1"]),
            ..Default::default()
        };
        let b = score_candidate(&verdicts, "manufacturing", &strings(&["manufacturing"]), &strings(&["doc1"]));
        assert_eq!(b.score, 30);
    }

    #[test]
    fn fallback_verdicts_score_from_fit_and_readiness_only() {
        let b = score_candidate(&VerdictSet::fallback(), "retail", &strings(&["retail"]), &[]);
        // 0.3 × 1.0 + 0.1 × 0.5
        assert_eq!(b.score, 35);
    }

    #[test]
    fn scores_always_in_range() {
        let verdict_sets = [
            VerdictSet::fallback(),
            VerdictSet {
                rule_results: vec![rv(Verdict::Pass); 5],
                ..Default::default()
            },
            VerdictSet {
                rule_results: vec![rv(Verdict::Uncertain), rv(Verdict::Fail)],
                missing_docs: strings(&["x", "y", "z", "w"]),
                ..Default::default()
            },
        ];
        let tag_sets = [vec![], strings(&["a"]), strings(&["a", "b", "c"])];
        let required_sets = [vec![], strings(&["x"]), strings(&["x", "y"])];

        for v in &verdict_sets {
            for tags in &tag_sets {
                for req in &required_sets {
                    for sector in ["", "a", "B"] {
                        let b = score_candidate(v, sector, tags, req);
                        assert!(b.score <= 100);
                        assert!((0.0..=1.0).contains(&b.composite));
                    }
                }
            }
        }
    }
}
