//! Integration tests against an on-disk SQLite database: schema creation,
//! the FTS5 grant index, the record store, and ingestion followed by
//! matching with the completion provider disabled.

use grant_match::config::{parse_config, Config};
use grant_match::db;
use grant_match::ingest::ingest_text;
use grant_match::matcher::{run_match, MatchContext};
use grant_match::migrate::{apply_schema, run_migrations};
use grant_match::models::MatchRequest;
use grant_match::search::{DocumentSearch, SearchQuery, SqliteGrantIndex};
use grant_match::store::{load_grant, load_grants, load_matches, RecordStore, SqliteRecordStore};
use serde_json::json;
use tempfile::TempDir;

fn test_config(tmp: &TempDir) -> Config {
    parse_config(&format!(
        r#"
[db]
path = "{}/data/grantmatch.sqlite"

[server]
bind = "127.0.0.1:0"
"#,
        tmp.path().display()
    ))
    .unwrap()
}

async fn index_with(tmp: &TempDir) -> SqliteGrantIndex {
    let pool = db::connect(&test_config(tmp)).await.unwrap();
    apply_schema(&pool).await.unwrap();
    SqliteGrantIndex::new(pool)
}

fn query(text: &str, size: usize) -> SearchQuery {
    SearchQuery::multi_match(text, &["title^3", "sector_tags^3", "body"], size)
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);

    run_migrations(&config).await.unwrap();
    run_migrations(&config).await.unwrap();

    assert!(config.db.path.exists());
}

#[tokio::test]
async fn title_and_sector_hits_outrank_body_hits() {
    let tmp = TempDir::new().unwrap();
    let index = index_with(&tmp).await;

    index
        .index(
            "body_only",
            &json!({"grant_id": "body_only", "title": "General Fund", "sector_tags": ["retail"],
                    "body": "Can also be used for solar rooftops in some cases"}),
        )
        .await
        .unwrap();
    index
        .index(
            "solar",
            &json!({"grant_id": "solar", "title": "Solar Adoption Grant", "sector_tags": ["energy"],
                    "body": "Supports installation costs"}),
        )
        .await
        .unwrap();
    index
        .index(
            "unrelated",
            &json!({"grant_id": "unrelated", "title": "Export Market Grant", "sector_tags": ["trade"],
                    "body": "Trade missions"}),
        )
        .await
        .unwrap();

    let hits = index.search(&query("solar", 10)).await.unwrap().into_hits();

    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["solar", "body_only"]);
    assert_eq!(hits[0].source["title"], "Solar Adoption Grant");
    assert!(hits[0].score.unwrap() >= hits[1].score.unwrap());
}

#[tokio::test]
async fn reindexing_replaces_the_document() {
    let tmp = TempDir::new().unwrap();
    let index = index_with(&tmp).await;

    index
        .index("g1", &json!({"grant_id": "g1", "title": "Agritech Seed Fund", "body": ""}))
        .await
        .unwrap();
    index
        .index("g1", &json!({"grant_id": "g1", "title": "Aquaculture Fund", "body": ""}))
        .await
        .unwrap();

    assert!(index.search(&query("agritech", 10)).await.unwrap().into_hits().is_empty());
    let hits = index.search(&query("aquaculture", 10)).await.unwrap().into_hits();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn indexed_documents_are_fetched_by_id() {
    let tmp = TempDir::new().unwrap();
    let index = index_with(&tmp).await;
    let doc = json!({"grant_id": "g1", "title": "Aquaculture Fund", "body": "Fish farms"});

    index.index("g1", &doc).await.unwrap();

    assert_eq!(index.get("g1").await.unwrap(), Some(doc));
    assert_eq!(index.get("g2").await.unwrap(), None);
}

#[tokio::test]
async fn search_respects_size_and_blank_queries() {
    let tmp = TempDir::new().unwrap();
    let index = index_with(&tmp).await;
    for i in 0..5 {
        let id = format!("g{}", i);
        index
            .index(&id, &json!({"grant_id": id, "title": "Manufacturing Grant", "body": ""}))
            .await
            .unwrap();
    }

    assert_eq!(index.search(&query("manufacturing", 3)).await.unwrap().into_hits().len(), 3);
    assert!(index.search(&query("  ", 3)).await.unwrap().into_hits().is_empty());
    // Punctuation never reaches FTS5 as syntax.
    assert!(index.search(&query("\"AND (OR", 3)).await.is_ok());
}

#[tokio::test]
async fn records_round_trip_in_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&test_config(&tmp)).await.unwrap();
    apply_schema(&pool).await.unwrap();
    let store = SqliteRecordStore::new(pool);

    store.put("matches", &json!({"company_id": "acme", "n": 1})).await.unwrap();
    store.put("matches", &json!({"company_id": "other", "n": 2})).await.unwrap();
    store.put("grants", &json!({"grant_id": "g1"})).await.unwrap();
    store.put("matches", &json!({"company_id": "acme", "n": 3})).await.unwrap();

    let all = store.scan("matches").await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0]["n"], 1);

    let acme = store.find("matches", "company_id", "acme").await.unwrap();
    let ns: Vec<i64> = acme.iter().map(|v| v["n"].as_i64().unwrap()).collect();
    assert_eq!(ns, vec![1, 3]);

    assert!(store.find("matches", "bad field", "x").await.is_err());
}

#[tokio::test]
async fn ingest_then_match_with_provider_disabled() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let ctx = MatchContext::from_config(&config).await.unwrap();

    let outcome = ingest_text(
        &ctx,
        "The Manufacturing Digitalisation Grant funds automation equipment for SMEs.",
        Some("MDV Tech Upgrade"),
    )
    .await
    .unwrap();
    assert_eq!(outcome.status, "ok");
    assert_eq!(outcome.title.as_deref(), Some("MDV Tech Upgrade"));
    assert!(outcome.grant_id.starts_with("grant_"));

    let grant = load_grant(ctx.store.as_ref(), &outcome.grant_id).await.unwrap().unwrap();
    assert_eq!(grant.issuer.as_deref(), Some("Unknown"));
    assert!(grant.purpose.as_deref().unwrap().starts_with("The Manufacturing"));
    assert_eq!(load_grants(ctx.store.as_ref()).await.unwrap().len(), 1);

    // Intent extraction fails, so the query falls back to the sector, which
    // appears in the indexed body.
    let request = MatchRequest {
        company: serde_json::from_value(json!({"name": "Acme Tissue", "sector": "manufacturing"})).unwrap(),
        goal_text: "automate".to_string(),
    };
    let response = run_match(&ctx, &request).await.unwrap();

    assert_eq!(response.results.len(), 1);
    let r = &response.results[0];
    assert_eq!(r.grant_id, outcome.grant_id);
    assert_eq!(r.why, "POSSIBLE");
    assert!(r.judgment_failed);
    // No rules judged, no sector tags, no required documents: 0.1 × 0.5
    assert_eq!(r.score, 5);

    let records = load_matches(ctx.store.as_ref(), "acme_tissue").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rationale, "POSSIBLE");
}

#[tokio::test]
async fn empty_grant_text_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let ctx = MatchContext::from_config(&test_config(&tmp)).await.unwrap();

    let err = ingest_text(&ctx, "   ", None).await.unwrap_err();
    assert!(err.to_string().contains("must not be empty"));
}
