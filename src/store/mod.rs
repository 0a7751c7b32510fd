//! Key-value record persistence.
//!
//! The [`RecordStore`] trait is a minimal put/scan capability over named
//! tables of JSON items. Grants and match records are both stored through
//! it; the typed helpers in this module handle (de)serialization.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{Grant, MatchRecord};

pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// Table holding ingested grant records.
pub const GRANTS_TABLE: &str = "grants";
/// Table holding match records. Append-only.
pub const MATCHES_TABLE: &str = "matches";

/// Abstract append-only record storage.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put`](RecordStore::put) | Append an item to a table |
/// | [`scan`](RecordStore::scan) | Read every item of a table, in insertion order |
/// | [`find`](RecordStore::find) | Items whose top-level `field` equals `value` |
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append `item` to `table`. Items are never updated or deleted.
    async fn put(&self, table: &str, item: &Value) -> Result<()>;

    /// Return all items in `table`, oldest first.
    async fn scan(&self, table: &str) -> Result<Vec<Value>>;

    /// Return the items in `table` whose string field `field` equals `value`.
    ///
    /// The default implementation filters [`scan`](RecordStore::scan).
    async fn find(&self, table: &str, field: &str, value: &str) -> Result<Vec<Value>> {
        Ok(self
            .scan(table)
            .await?
            .into_iter()
            .filter(|item| item.get(field).and_then(|v| v.as_str()) == Some(value))
            .collect())
    }
}

pub async fn put_grant(store: &dyn RecordStore, grant: &Grant) -> Result<()> {
    store.put(GRANTS_TABLE, &serde_json::to_value(grant)?).await
}

/// Latest stored version of a grant, if any.
pub async fn load_grant(store: &dyn RecordStore, grant_id: &str) -> Result<Option<Grant>> {
    let items = store.find(GRANTS_TABLE, "grant_id", grant_id).await?;
    match items.into_iter().last() {
        Some(item) => Ok(Some(
            serde_json::from_value(item).context("Stored grant record is malformed")?,
        )),
        None => Ok(None),
    }
}

/// All stored grants; malformed items are skipped.
pub async fn load_grants(store: &dyn RecordStore) -> Result<Vec<Grant>> {
    Ok(store
        .scan(GRANTS_TABLE)
        .await?
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Latest version of each stored grant, newest first, optionally only
/// those from one issuer.
pub async fn list_grants(store: &dyn RecordStore, issuer: Option<&str>) -> Result<Vec<Grant>> {
    let mut latest: Vec<Grant> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for grant in load_grants(store).await? {
        match positions.get(&grant.grant_id) {
            Some(&i) => latest[i] = grant,
            None => {
                positions.insert(grant.grant_id.clone(), latest.len());
                latest.push(grant);
            }
        }
    }

    let mut grants: Vec<Grant> = latest
        .into_iter()
        .filter(|g| issuer.map_or(true, |want| g.issuer.as_deref() == Some(want)))
        .collect();
    grants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(grants)
}

pub async fn put_match(store: &dyn RecordStore, record: &MatchRecord) -> Result<()> {
    store.put(MATCHES_TABLE, &serde_json::to_value(record)?).await
}

/// Match records for one company, oldest first; malformed items are skipped.
pub async fn load_matches(store: &dyn RecordStore, company_id: &str) -> Result<Vec<MatchRecord>> {
    Ok(store
        .find(MATCHES_TABLE, "company_id", company_id)
        .await?
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
