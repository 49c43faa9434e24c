//! Key/value runtime-variable store.
//!
//! Small JSON values keyed by name: config overlays written by front-ends,
//! channel cooldown timestamps written by the dispatcher, last-dispatch
//! summaries. Values are upserted whole; last writer wins.

use std::collections::HashMap;

use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::sync::OnceCell;

use crate::StoreError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS runtime_vars (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

/// Generic runtime-variable store over the `runtime_vars` table.
#[derive(Debug)]
pub struct VarStore {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

impl VarStore {
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

    /// Fetch one variable. Rows that are not valid JSON come back as
    /// plain string values rather than failing the read.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_schema().await?;
        let row = sqlx::query("SELECT value FROM runtime_vars WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|row| row.try_get::<String, _>("value"))
            .transpose()?
            .map(|raw| parse_var(&raw)))
    }

    /// Upsert one variable, replacing any previous value.
    pub async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.ensure_schema().await?;
        sqlx::query(
            "INSERT INTO runtime_vars (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Snapshot of every variable, taken once per cycle for the resolver.
    pub async fn snapshot(&self) -> Result<HashMap<String, Value>, StoreError> {
        self.ensure_schema().await?;
        let rows = sqlx::query("SELECT key, value FROM runtime_vars")
            .fetch_all(&self.pool)
            .await?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            out.insert(key, parse_var(&raw));
        }
        Ok(out)
    }
}

fn parse_var(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreHandle;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_roundtrip_and_overwrite() {
        let handle = StoreHandle::open_in_memory().await.unwrap();
        let store = VarStore::new(handle.pool());

        assert!(store.get("missing").await.unwrap().is_none());

        store.set("liquid_threshold_btc", &json!(5.5)).await.unwrap();
        assert_eq!(store.get("liquid_threshold_btc").await.unwrap(), Some(json!(5.5)));

        store.set("liquid_threshold_btc", &json!("7.25")).await.unwrap();
        assert_eq!(
            store.get("liquid_threshold_btc").await.unwrap(),
            Some(json!("7.25"))
        );
    }

    #[tokio::test]
    async fn snapshot_contains_all_keys() {
        let handle = StoreHandle::open_in_memory().await.unwrap();
        let store = VarStore::new(handle.pool());

        store
            .set("channel_cooldowns", &json!({"liquid|voice": 1700000000}))
            .await
            .unwrap();
        store.set("profit_position_profit_usd", &json!(12)).await.unwrap();

        let snap = store.snapshot().await.unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["profit_position_profit_usd"], json!(12));
        assert_eq!(snap["channel_cooldowns"]["liquid|voice"], json!(1700000000_i64));
    }

    #[tokio::test]
    async fn non_json_rows_degrade_to_strings() {
        let handle = StoreHandle::open_in_memory().await.unwrap();
        let store = VarStore::new(handle.pool());
        store.ensure_schema().await.unwrap();

        sqlx::query("INSERT INTO runtime_vars (key, value) VALUES ('note', 'not json at all')")
            .execute(&handle.pool())
            .await
            .unwrap();

        assert_eq!(
            store.get("note").await.unwrap(),
            Some(Value::String("not json at all".into()))
        );
    }
}
