//! Liveness heartbeat store.

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::sync::OnceCell;

use crate::StoreError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sonic_heartbeats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL
)
"#;

/// Append-only heartbeat pulses, one row per completed cycle.
///
/// External dashboards read the latest row to decide whether the watchdog
/// is alive; the engine treats write failures as best-effort.
#[derive(Debug)]
pub struct HeartbeatStore {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

impl HeartbeatStore {
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
                Ok::<_, StoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Append a pulse with the current UTC timestamp.
    pub async fn touch(&self) -> Result<(), StoreError> {
        self.ensure_schema().await?;
        sqlx::query("INSERT INTO sonic_heartbeats (ts) VALUES (?1)")
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Timestamp of the most recent pulse, if any.
    pub async fn latest_ts(&self) -> Result<Option<String>, StoreError> {
        self.ensure_schema().await?;
        let row = sqlx::query("SELECT ts FROM sonic_heartbeats ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("ts")?),
            None => None,
        })
    }
}
