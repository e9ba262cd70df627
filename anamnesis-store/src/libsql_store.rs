//! libSQL implementation of [`ResultStore`].

use std::path::Path;

use anamnesis_core::results::Result as StoreResult;
use anamnesis_core::{ResultRow, ResultStore};
use async_trait::async_trait;
use libsql::{Builder, Connection, Database, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::{Error, Result};

/// SQL schema for the results table, without item columns.
const SCHEMA_RESULTS: &str = r#"
CREATE TABLE IF NOT EXISTS results (
    identifier TEXT PRIMARY KEY,
    total INTEGER NOT NULL,
    classification TEXT NOT NULL
)
"#;

/// Result rows in a libSQL database.
///
/// The table has one `itemK` column per scale topic. Opening a database
/// created for a shorter scale adds the missing columns.
pub struct LibsqlResultStore {
    // Keeps the database open for the lifetime of the connection.
    _db: Database,
    conn: Mutex<Connection>,
    item_count: usize,
}

impl LibsqlResultStore {
    /// Open (or create) an embedded database file.
    pub async fn new_local(path: &Path, item_count: usize) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        let store = Self::open(db, item_count).await?;
        info!(path = %path.display(), item_count, "result store opened");
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub async fn new_memory(item_count: usize) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::open(db, item_count).await
    }

    async fn open(db: Database, item_count: usize) -> Result<Self> {
        let conn = db.connect()?;
        let store = Self {
            _db: db,
            conn: Mutex::new(conn),
            item_count,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Number of item columns rows are written with.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Ensure the table exists with at least `item_count` item columns.
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(SCHEMA_RESULTS, ()).await?;

        let mut columns = Vec::new();
        {
            let mut rows = conn.query("PRAGMA table_info(results)", ()).await?;
            while let Some(row) = rows.next().await? {
                columns.push(row.get::<String>(1)?);
            }
        }
        for column in item_columns(self.item_count) {
            if !columns.contains(&column) {
                debug!(%column, "adding item column");
                conn.execute(
                    &format!("ALTER TABLE results ADD COLUMN {column} INTEGER NOT NULL DEFAULT 0"),
                    (),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Parse a result row from a database row.
    fn parse_row(&self, row: &libsql::Row) -> Result<ResultRow> {
        let identifier: String = row.get(0)?;
        let total = to_u32(row.get::<i64>(1)?, &identifier)?;
        let classification: String = row.get(2)?;
        let items = (0..self.item_count)
            .map(|i| {
                let value: Option<i64> = row.get(3 + i as i32)?;
                to_u32(value.unwrap_or(0), &identifier)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ResultRow {
            identifier,
            total,
            classification,
            items,
        })
    }

    async fn fetch(&self, identifier: Option<&str>) -> Result<Vec<ResultRow>> {
        let conn = self.conn.lock().await;
        let mut rows = match identifier {
            Some(id) => {
                let sql = format!("{} WHERE identifier = ?1", select_sql(self.item_count));
                conn.query(&sql, [id.to_string()]).await?
            }
            None => {
                let sql = format!("{} ORDER BY identifier", select_sql(self.item_count));
                conn.query(&sql, ()).await?
            }
        };
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(self.parse_row(&row)?);
        }
        Ok(out)
    }

    async fn write(&self, row: &ResultRow) -> Result<()> {
        if row.identifier.trim().is_empty() {
            return Err(Error::InvalidData("empty identifier".into()));
        }
        if row.items.len() > self.item_count {
            return Err(Error::InvalidData(format!(
                "{} has {} items, table holds {}",
                row.identifier,
                row.items.len(),
                self.item_count
            )));
        }
        let mut values = vec![
            Value::Text(row.identifier.clone()),
            Value::Integer(i64::from(row.total)),
            Value::Text(row.classification.clone()),
        ];
        values.extend(
            row.items_padded(self.item_count)
                .into_iter()
                .map(|item| Value::Integer(i64::from(item))),
        );
        let conn = self.conn.lock().await;
        conn.execute(&upsert_sql(self.item_count), libsql::params_from_iter(values))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for LibsqlResultStore {
    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, identifier: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT 1 FROM results WHERE identifier = ?1",
                [identifier.to_string()],
            )
            .await
            .map_err(Error::from)?;
        Ok(rows.next().await.map_err(Error::from)?.is_some())
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, identifier: &str) -> StoreResult<Option<ResultRow>> {
        Ok(self.fetch(Some(identifier)).await?.into_iter().next())
    }

    #[instrument(skip(self, row), fields(identifier = %row.identifier), level = "debug")]
    async fn upsert(&self, row: &ResultRow) -> StoreResult<()> {
        self.write(row).await?;
        debug!(total = row.total, "result row written");
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<ResultRow>> {
        Ok(self.fetch(None).await?)
    }
}

fn item_columns(count: usize) -> impl Iterator<Item = String> {
    (1..=count).map(|i| format!("item{i}"))
}

fn all_columns(item_count: usize) -> Vec<String> {
    let mut columns = vec!["identifier".to_string(), "total".into(), "classification".into()];
    columns.extend(item_columns(item_count));
    columns
}

fn select_sql(item_count: usize) -> String {
    format!("SELECT {} FROM results", all_columns(item_count).join(", "))
}

fn upsert_sql(item_count: usize) -> String {
    let columns = all_columns(item_count);
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns[1..]
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO results ({}) VALUES ({}) ON CONFLICT(identifier) DO UPDATE SET {}",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

fn to_u32(value: i64, identifier: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidData(format!("{identifier}: negative or oversized score {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, items: &[u32]) -> ResultRow {
        ResultRow {
            identifier: id.into(),
            total: items.iter().sum(),
            classification: "mild".into(),
            items: items.to_vec(),
        }
    }

    #[test]
    fn upsert_statement_updates_every_non_key_column() {
        let sql = upsert_sql(2);
        assert!(sql.starts_with(
            "INSERT INTO results (identifier, total, classification, item1, item2) VALUES (?1, ?2, ?3, ?4, ?5)"
        ));
        assert!(sql.ends_with(
            "DO UPDATE SET total = excluded.total, classification = excluded.classification, item1 = excluded.item1, item2 = excluded.item2"
        ));
    }

    #[test]
    fn zero_items_selects_fixed_columns() {
        assert_eq!(select_sql(0), "SELECT identifier, total, classification FROM results");
    }

    #[tokio::test]
    async fn store_returns_none_for_unknown_identifier() {
        let store = LibsqlResultStore::new_memory(3).await.unwrap();

        assert!(store.get("S404").await.unwrap().is_none());
        assert!(!store.exists("S404").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let store = LibsqlResultStore::new_memory(2).await.unwrap();

        store.upsert(&row("S001", &[1, 2])).await.unwrap();
        store.upsert(&row("S001", &[4, 3])).await.unwrap();

        let rows = store.list().await.unwrap();
        assert_eq!(rows, vec![row("S001", &[4, 3])]);
        assert!(store.exists("S001").await.unwrap());
    }

    #[tokio::test]
    async fn short_rows_are_padded_with_zeros() {
        let store = LibsqlResultStore::new_memory(3).await.unwrap();

        store.upsert(&row("S002", &[2])).await.unwrap();

        let stored = store.get("S002").await.unwrap().unwrap();
        assert_eq!(stored.items, vec![2, 0, 0]);
        assert_eq!(stored.total, 2);
    }

    #[tokio::test]
    async fn too_many_items_is_invalid() {
        let store = LibsqlResultStore::new_memory(1).await.unwrap();

        let err = store.upsert(&row("S003", &[1, 2])).await.unwrap_err();

        assert!(matches!(err, anamnesis_core::StoreError::InvalidRow(_)));
        assert!(!store.exists("S003").await.unwrap());
    }

    #[tokio::test]
    async fn empty_identifier_is_invalid() {
        let store = LibsqlResultStore::new_memory(1).await.unwrap();
        assert!(store.upsert(&row(" ", &[1])).await.is_err());
    }

    #[tokio::test]
    async fn list_is_ordered_by_identifier() {
        let store = LibsqlResultStore::new_memory(1).await.unwrap();
        for id in ["S3", "S1", "S2"] {
            store.upsert(&row(id, &[1])).await.unwrap();
        }

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
    }
}
