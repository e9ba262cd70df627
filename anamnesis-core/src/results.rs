//! Persisted per-subject results.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::aggregate::Aggregate;

/// Errors from a result store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result store backend error: {0}")]
    Backend(String),

    #[error("invalid result row: {0}")]
    InvalidRow(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One subject's outcome, keyed by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub identifier: String,
    pub total: u32,
    pub classification: String,
    /// Final score per topic, in scale order.
    pub items: Vec<u32>,
}

impl ResultRow {
    pub fn new(identifier: impl Into<String>, aggregate: &Aggregate) -> Self {
        Self {
            identifier: identifier.into(),
            total: aggregate.overall,
            classification: aggregate.classification.clone(),
            items: aggregate.items(),
        }
    }

    /// Items padded with zeros to `width`.
    pub fn items_padded(&self, width: usize) -> Vec<u32> {
        let mut items = self.items.clone();
        items.resize(width.max(items.len()), 0);
        items
    }
}

/// Durable store of result rows. Writes are idempotent by identifier.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Whether a row exists for `identifier`.
    async fn exists(&self, identifier: &str) -> Result<bool>;

    async fn get(&self, identifier: &str) -> Result<Option<ResultRow>>;

    /// Insert the row, or replace the existing row with the same identifier.
    async fn upsert(&self, row: &ResultRow) -> Result<()>;

    /// All rows, ordered by identifier.
    async fn list(&self) -> Result<Vec<ResultRow>>;
}

/// In-memory result store.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    rows: Mutex<BTreeMap<String, ResultRow>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `rows`.
    pub fn with_rows(rows: impl IntoIterator<Item = ResultRow>) -> Self {
        Self {
            rows: Mutex::new(
                rows.into_iter()
                    .map(|row| (row.identifier.clone(), row))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn exists(&self, identifier: &str) -> Result<bool> {
        Ok(self.rows.lock().await.contains_key(identifier))
    }

    async fn get(&self, identifier: &str) -> Result<Option<ResultRow>> {
        Ok(self.rows.lock().await.get(identifier).cloned())
    }

    async fn upsert(&self, row: &ResultRow) -> Result<()> {
        if row.identifier.is_empty() {
            return Err(StoreError::InvalidRow("empty identifier".into()));
        }
        self.rows
            .lock()
            .await
            .insert(row.identifier.clone(), row.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResultRow>> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }
}
