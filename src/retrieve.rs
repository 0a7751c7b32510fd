//! Candidate retrieval.
//!
//! Builds a keyword/sector query from an [`Intent`] and runs it against a
//! [`DocumentSearch`], reducing each hit to a [`GrantCandidate`]. Search
//! failures are returned to the caller; there is no local recovery.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::models::{EligibilityRule, GrantCandidate, Intent};
use crate::search::{DocumentSearch, SearchHit, SearchQuery};

/// Searched fields and their boosts.
pub const SEARCH_FIELDS: [&str; 3] = ["title^3", "sector_tags^3", "body"];

/// Space-join the intent keywords and implied sector, falling back to the
/// company's own sector when that yields nothing.
pub fn build_query_terms(intent: &Intent, company_sector: &str) -> String {
    let mut terms: Vec<&str> = intent.keywords.iter().map(String::as_str).collect();
    if let Some(sector) = intent.implied_sector.as_deref() {
        if !sector.trim().is_empty() {
            terms.push(sector);
        }
    }

    let joined = terms.join(" ");
    if joined.trim().is_empty() {
        company_sector.to_string()
    } else {
        joined
    }
}

pub fn build_search_query(terms: &str, limit: usize) -> SearchQuery {
    SearchQuery::multi_match(terms, &SEARCH_FIELDS, limit)
}

/// Read `field` from a hit source, using the default for absent, null, or
/// mistyped values.
fn source_field<T: DeserializeOwned + Default>(source: &Value, field: &str) -> T {
    source
        .get(field)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Reduce a search hit to a candidate. `grant_id` falls back to the hit id.
pub fn candidate_from_hit(hit: SearchHit) -> GrantCandidate {
    let source = &hit.source;
    let grant_id = source
        .get("grant_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| hit.id.clone());

    GrantCandidate {
        grant_id,
        title: source_field::<Option<String>>(source, "title"),
        sector_tags: source_field::<Vec<String>>(source, "sector_tags"),
        body: source_field::<String>(source, "body"),
        required_documents: source_field::<Vec<String>>(source, "required_documents"),
        eligibility_rules: source_field::<Vec<EligibilityRule>>(source, "eligibility_rules"),
    }
}

pub async fn retrieve_candidates(
    search: &dyn DocumentSearch,
    terms: &str,
    limit: usize,
) -> Result<Vec<GrantCandidate>> {
    let query = build_search_query(terms, limit);
    let response = search
        .search(&query)
        .await
        .with_context(|| format!("Grant search failed for query '{}'", terms))?;

    let candidates: Vec<GrantCandidate> = response
        .into_hits()
        .into_iter()
        .take(limit)
        .map(candidate_from_hit)
        .collect();

    debug!(query = terms, count = candidates.len(), "Retrieved grant candidates");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent(keywords: &[&str], sector: Option<&str>) -> Intent {
        Intent {
            purposes: vec![],
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            implied_sector: sector.map(|s| s.to_string()),
        }
    }

    #[test]
    fn terms_join_keywords_then_sector() {
        let terms = build_query_terms(&intent(&["solar", "panels"], Some("energy")), "retail");
        assert_eq!(terms, "solar panels energy");
    }

    #[test]
    fn terms_fall_back_to_company_sector() {
        assert_eq!(build_query_terms(&Intent::default(), "manufacturing"), "manufacturing");
        assert_eq!(build_query_terms(&intent(&[" "], Some("")), "agritech"), "agritech");
    }

    #[test]
    fn terms_empty_without_any_source() {
        assert_eq!(build_query_terms(&Intent::default(), ""), "");
    }

    #[test]
    fn query_uses_weighted_fields() {
        let q = build_search_query("solar", 10);
        assert_eq!(q.size, 10);
        assert_eq!(
            q.query.multi_match.fields,
            vec!["title^3", "sector_tags^3", "body"]
        );
    }

    #[test]
    fn hit_without_grant_id_uses_doc_id() {
        let hit = SearchHit {
            id: "doc-7".to_string(),
            score: None,
            source: json!({"title": "Green Fund", "grant_id": null}),
        };
        let c = candidate_from_hit(hit);
        assert_eq!(c.grant_id, "doc-7");
        assert_eq!(c.title.as_deref(), Some("Green Fund"));
        assert!(c.sector_tags.is_empty());
        assert_eq!(c.body, "");
    }

    #[test]
    fn hit_fields_are_read() {
        let hit = SearchHit {
            id: "x".to_string(),
            score: Some(2.0),
            source: json!({
                "grant_id": "g1",
                "sector_tags": ["Manufacturing"],
                "body": "text",
                "required_documents": ["SSM cert"],
                "eligibility_rules": ["headcount_max:200"]
            }),
        };
        let c = candidate_from_hit(hit);
        assert_eq!(c.grant_id, "g1");
        assert_eq!(c.title, None);
        assert_eq!(c.sector_tags, vec!["Manufacturing"]);
        assert_eq!(c.required_documents, vec!["SSM cert"]);
        assert_eq!(c.eligibility_rules[0].key, "headcount_max");
    }
}
