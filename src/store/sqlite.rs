//! SQLite-backed [`RecordStore`].
//!
//! Every table lives in the single `records` table, keyed by `table_name`
//! and ordered by an autoincrement id. `find` pushes the field comparison
//! down to SQLite with `json_extract`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::RecordStore;

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn decode_items(rows: &[sqlx::sqlite::SqliteRow]) -> Vec<Value> {
    rows.iter()
        .filter_map(|row| {
            let item_json: String = row.get("item_json");
            serde_json::from_str(&item_json).ok()
        })
        .collect()
}

/// Field names are spliced into a JSON path, so only identifiers are accepted.
fn is_plain_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn put(&self, table: &str, item: &Value) -> Result<()> {
        sqlx::query("INSERT INTO records (table_name, item_json, created_at) VALUES (?, ?, ?)")
            .bind(table)
            .bind(item.to_string())
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query("SELECT item_json FROM records WHERE table_name = ? ORDER BY id")
            .bind(table)
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_items(&rows))
    }

    async fn find(&self, table: &str, field: &str, value: &str) -> Result<Vec<Value>> {
        if !is_plain_field(field) {
            bail!("invalid record field name: {}", field);
        }
        let rows = sqlx::query(
            r#"
            SELECT item_json FROM records
            WHERE table_name = ? AND json_extract(item_json, ?) = ?
            ORDER BY id
            "#,
        )
        .bind(table)
        .bind(format!("$.{}", field))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_items(&rows))
    }
}
