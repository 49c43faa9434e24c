//! Append-only monitor result ledger.
//!
//! One row per monitor per cycle in `sonic_monitor_ledger`, holding the
//! monitor's full result payload as JSON for audit and debugging. Entries
//! are never rewritten.

use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tokio::sync::OnceCell;

use crate::StoreError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sonic_monitor_ledger (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    cycle_id TEXT NOT NULL,
    name     TEXT NOT NULL,
    payload  TEXT NOT NULL
)
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sonic_monitor_ledger_cycle ON sonic_monitor_ledger(cycle_id)";

/// One persisted ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub cycle_id: String,
    pub name: String,
    pub payload: Value,
}

impl LedgerEntry {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let payload_raw: String = row.try_get("payload")?;
        Ok(Self {
            id: row.try_get("id")?,
            cycle_id: row.try_get("cycle_id")?,
            name: row.try_get("name")?,
            payload: serde_json::from_str(&payload_raw).unwrap_or(Value::Null),
        })
    }
}

/// Append-only store for per-monitor result payloads.
#[derive(Debug)]
pub struct LedgerStore {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

impl LedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
                sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
                Ok::<_, StoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Append a monitor's result payload for a cycle.
    pub async fn append(&self, cycle_id: &str, name: &str, payload: &Value) -> Result<(), StoreError> {
        self.ensure_schema().await?;
        sqlx::query("INSERT INTO sonic_monitor_ledger (cycle_id, name, payload) VALUES (?1, ?2, ?3)")
            .bind(cycle_id)
            .bind(name)
            .bind(payload.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent entry for a monitor name, if any.
    pub async fn latest(&self, name: &str) -> Result<Option<LedgerEntry>, StoreError> {
        self.ensure_schema().await?;
        let row = sqlx::query(
            "SELECT id, cycle_id, name, payload FROM sonic_monitor_ledger \
             WHERE name = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(LedgerEntry::from_row).transpose().map_err(Into::into)
    }

    /// All entries for a cycle, in append order.
    pub async fn for_cycle(&self, cycle_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        self.ensure_schema().await?;
        let rows = sqlx::query(
            "SELECT id, cycle_id, name, payload FROM sonic_monitor_ledger \
             WHERE cycle_id = ?1 ORDER BY id ASC",
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(LedgerEntry::from_row(row)?);
        }
        Ok(out)
    }
}
