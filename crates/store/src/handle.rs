//! SQLite store handle.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::StoreError;

/// Shared SQLite handle the individual stores are built from.
///
/// Opening the handle is the only persistence step allowed to abort
/// startup; everything downstream degrades to logged best-effort writes.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    pool: SqlitePool,
}

impl StoreHandle {
    /// Open the database file at `path`, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!(path = %path.as_ref().display(), "opened monitor database");
        Ok(Self { pool })
    }

    /// Open an in-memory database. Single connection, since each SQLite
    /// in-memory connection is otherwise its own database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Clone of the underlying pool.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }
}
