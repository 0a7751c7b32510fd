//! In-memory [`RecordStore`] implementation for testing and demos.
//!
//! Uses a `HashMap` of tables behind `std::sync::RwLock` for thread safety.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::RecordStore;

/// In-memory record store.
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Number of items currently stored in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .map(|items| items.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put(&self, table: &str, item: &Value) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        tables
            .entry(table.to_string())
            .or_default()
            .push(item.clone());
        Ok(())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Value>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.get(table).cloned().unwrap_or_default())
    }
}
