//! Per-phase cycle activity recording.
//!
//! Every engine phase (service, monitor, heartbeat, reporting) ends as one
//! append-only row in `cycle_activities`: machine phase key, human label,
//! outcome, notes and timing. Rows for a cycle are written in execution
//! order and never rewritten.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tokio::sync::OnceCell;

use crate::StoreError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cycle_activities (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    cycle_id    TEXT NOT NULL,
    phase       TEXT NOT NULL,
    label       TEXT NOT NULL,
    outcome     TEXT NOT NULL,
    notes       TEXT NOT NULL DEFAULT '',
    duration_ms INTEGER NOT NULL DEFAULT 0,
    ts_start    TEXT NOT NULL,
    ts_end      TEXT NOT NULL,
    details     TEXT NOT NULL DEFAULT '{}'
)
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_cycle_activities_cycle ON cycle_activities(cycle_id)";

/// Terminal outcome of a recorded phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityOutcome {
    Ok,
    Warn,
    Error,
    Skip,
}

impl ActivityOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for ActivityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-flight phase marker returned by [`ActivityStore::begin`].
///
/// Carries the wall-clock start for the persisted row and a monotonic
/// instant for the duration; nothing is written until the phase finishes.
#[derive(Debug)]
pub struct ActivityToken {
    pub cycle_id: String,
    pub phase: String,
    pub label: String,
    pub ts_start: DateTime<Utc>,
    started: Instant,
}

/// One persisted `cycle_activities` row.
#[derive(Debug, Clone, Serialize)]
pub struct CycleActivity {
    pub id: i64,
    pub cycle_id: String,
    pub phase: String,
    pub label: String,
    pub outcome: String,
    pub notes: String,
    pub duration_ms: i64,
    pub ts_start: String,
    pub ts_end: String,
    pub details: Value,
}

impl CycleActivity {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let details_raw: String = row.try_get("details")?;
        Ok(Self {
            id: row.try_get("id")?,
            cycle_id: row.try_get("cycle_id")?,
            phase: row.try_get("phase")?,
            label: row.try_get("label")?,
            outcome: row.try_get("outcome")?,
            notes: row.try_get("notes")?,
            duration_ms: row.try_get("duration_ms")?,
            ts_start: row.try_get("ts_start")?,
            ts_end: row.try_get("ts_end")?,
            details: serde_json::from_str(&details_raw).unwrap_or(Value::Null),
        })
    }
}

/// Append-only store for per-phase activity rows.
#[derive(Debug)]
pub struct ActivityStore {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

impl ActivityStore {
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

    /// Mark a phase as started. Pure bookkeeping, no I/O.
    pub fn begin(&self, cycle_id: &str, phase: &str, label: &str) -> ActivityToken {
        ActivityToken {
            cycle_id: cycle_id.to_string(),
            phase: phase.to_string(),
            label: label.to_string(),
            ts_start: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Finish a phase: append one row with outcome, notes and timing.
    pub async fn finish(
        &self,
        token: ActivityToken,
        outcome: ActivityOutcome,
        notes: &str,
        details: &Value,
    ) -> Result<(), StoreError> {
        self.ensure_schema().await?;
        let ts_end = Utc::now();
        let duration_ms = i64::try_from(token.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            INSERT INTO cycle_activities
                (cycle_id, phase, label, outcome, notes, duration_ms, ts_start, ts_end, details)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&token.cycle_id)
        .bind(&token.phase)
        .bind(&token.label)
        .bind(outcome.as_str())
        .bind(notes)
        .bind(duration_ms)
        .bind(token.ts_start.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(ts_end.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(details.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All rows for a cycle, in execution (insertion) order.
    pub async fn for_cycle(&self, cycle_id: &str) -> Result<Vec<CycleActivity>, StoreError> {
        self.ensure_schema().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, cycle_id, phase, label, outcome, notes, duration_ms,
                   ts_start, ts_end, details
            FROM cycle_activities
            WHERE cycle_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(CycleActivity::from_row(row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreHandle;
    use serde_json::json;

    async fn store() -> ActivityStore {
        let handle = StoreHandle::open_in_memory().await.unwrap();
        ActivityStore::new(handle.pool())
    }

    #[test]
    fn outcome_strings_are_machine_keys() {
        assert_eq!(ActivityOutcome::Ok.as_str(), "ok");
        assert_eq!(ActivityOutcome::Warn.as_str(), "warn");
        assert_eq!(ActivityOutcome::Error.as_str(), "error");
        assert_eq!(ActivityOutcome::Skip.as_str(), "skip");
    }

    #[tokio::test]
    async fn records_phases_in_execution_order() {
        let store = store().await;

        let first = store.begin("c1", "svc_positions", "Positions");
        store
            .finish(first, ActivityOutcome::Ok, "2 positions", &json!({"count": 2}))
            .await
            .unwrap();

        let second = store.begin("c1", "mon_liquid", "Liquidation");
        store
            .finish(
                second,
                ActivityOutcome::Error,
                "boom",
                &Value::Null,
            )
            .await
            .unwrap();

        let rows = store.for_cycle("c1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].phase, "svc_positions");
        assert_eq!(rows[0].outcome, "ok");
        assert_eq!(rows[0].details, json!({"count": 2}));
        assert_eq!(rows[1].phase, "mon_liquid");
        assert_eq!(rows[1].outcome, "error");
        assert_eq!(rows[1].notes, "boom");
    }

    #[tokio::test]
    async fn cycles_are_isolated() {
        let store = store().await;
        let token = store.begin("c1", "heartbeat", "Heartbeat");
        store
            .finish(token, ActivityOutcome::Ok, "", &Value::Null)
            .await
            .unwrap();
        assert!(store.for_cycle("c2").await.unwrap().is_empty());
    }
}
