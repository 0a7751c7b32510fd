//! SQLite FTS5 grant index.
//!
//! Grants are stored as JSON in `grant_docs` and mirrored into the
//! `grants_fts` virtual table (columns `grant_id UNINDEXED, title,
//! sector_tags, body`). Queries are ranked with `bm25()` using the boosts
//! carried by the [`SearchQuery`] fields, so `title^3` weighs title hits
//! three times as heavily as body hits.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::{DocumentSearch, SearchHit, SearchQuery, SearchResponse};

/// Indexed text columns of `grants_fts`, in declaration order after `grant_id`.
const FTS_COLUMNS: [&str; 3] = ["title", "sector_tags", "body"];

pub struct SqliteGrantIndex {
    pool: SqlitePool,
}

impl SqliteGrantIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Turn free text into an FTS5 `OR` query of quoted terms.
///
/// Punctuation is dropped so that user text can never produce an FTS5
/// syntax error. Returns `None` when no searchable term remains.
pub fn fts_match_expr(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Per-column `bm25()` weights for `grants_fts`; unlisted columns get 0.
fn column_weights(query: &SearchQuery) -> [f64; 3] {
    let fields = query.weighted_fields();
    let mut weights = [0.0; 3];
    for (i, col) in FTS_COLUMNS.iter().enumerate() {
        if let Some((_, boost)) = fields.iter().find(|(name, _)| name == col) {
            weights[i] = *boost;
        }
    }
    weights
}

fn field_text(doc: &Value, field: &str) -> String {
    match doc.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

#[async_trait]
impl DocumentSearch for SqliteGrantIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let Some(expr) = fts_match_expr(query.text()) else {
            return Ok(SearchResponse::default());
        };
        let [w_title, w_tags, w_body] = column_weights(query);

        let rows = sqlx::query(
            r#"
            SELECT d.grant_id, d.source_json,
                   bm25(grants_fts, 0.0, ?, ?, ?) AS bm25_score
            FROM grants_fts
            JOIN grant_docs d ON d.grant_id = grants_fts.grant_id
            WHERE grants_fts MATCH ?
            ORDER BY bm25_score
            LIMIT ?
            "#,
        )
        .bind(w_title)
        .bind(w_tags)
        .bind(w_body)
        .bind(&expr)
        .bind(query.size as i64)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let source_json: String = row.get("source_json");
                let rank: f64 = row.get("bm25_score");
                SearchHit {
                    id: row.get("grant_id"),
                    score: Some(-rank), // negate so higher = better
                    source: serde_json::from_str(&source_json).unwrap_or(Value::Null),
                }
            })
            .collect();

        Ok(SearchResponse::from_hits(hits))
    }

    async fn index(&self, id: &str, doc: &Value) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO grant_docs (grant_id, source_json, indexed_at)
            VALUES (?, ?, ?)
            ON CONFLICT(grant_id) DO UPDATE SET
                source_json = excluded.source_json,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(id)
        .bind(doc.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM grants_fts WHERE grant_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO grants_fts (grant_id, title, sector_tags, body) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(field_text(doc, "title"))
            .bind(field_text(doc, "sector_tags"))
            .bind(field_text(doc, "body"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT source_json FROM grant_docs WHERE grant_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let source_json: String = row.get("source_json");
                Ok(Some(serde_json::from_str(&source_json)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn match_expr_quotes_and_ors_terms() {
        assert_eq!(
            fts_match_expr("Solar farm, expansion!").as_deref(),
            Some(r#""solar" OR "farm" OR "expansion""#)
        );
    }

    #[test]
    fn match_expr_empty_for_punctuation_only() {
        assert_eq!(fts_match_expr("  -- ?? "), None);
        assert_eq!(fts_match_expr(""), None);
    }

    #[test]
    fn weights_follow_query_fields() {
        let q = SearchQuery::multi_match("x", &["title^3", "sector_tags^3", "body"], 10);
        assert_eq!(column_weights(&q), [3.0, 3.0, 1.0]);

        let q = SearchQuery::multi_match("x", &["body^2"], 10);
        assert_eq!(column_weights(&q), [0.0, 0.0, 2.0]);
    }

    #[test]
    fn field_text_joins_arrays() {
        let doc = json!({"title": "T", "sector_tags": ["agri", "tech"], "body": 5});
        assert_eq!(field_text(&doc, "title"), "T");
        assert_eq!(field_text(&doc, "sector_tags"), "agri tech");
        assert_eq!(field_text(&doc, "body"), "");
    }
}
