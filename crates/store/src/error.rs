//! Persistence error type.

use thiserror::Error;

/// Errors produced by the persistence layer.
///
/// The cycle engine treats these as best-effort failures: logged and
/// swallowed at the phase boundary. Only `StoreHandle::open` failures
/// abort startup.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
