//! Persistence layer for the sonic monitor.
//!
//! This crate provides:
//! - A SQLite store handle (the only fatal-at-startup surface)
//! - Append-only activity, ledger and heartbeat stores with lazy schema
//! - A key/value runtime-variable store for overlays and cooldown state
//! - Position/price snapshot traits plus SQL-backed providers
//!
//! Every store takes its pool by constructor injection; there is no
//! process-wide handle. Store failures are surfaced as `StoreError` and
//! treated as best-effort by the cycle engine.

mod activity;
mod error;
mod handle;
mod heartbeat;
mod ledger;
mod snapshot;
mod vars;

pub use activity::{ActivityOutcome, ActivityStore, ActivityToken, CycleActivity};
pub use error::StoreError;
pub use handle::StoreHandle;
pub use heartbeat::HeartbeatStore;
pub use ledger::{LedgerEntry, LedgerStore};
pub use snapshot::{
    Position, PositionProvider, PositionSide, PriceProvider, SqlPositionProvider,
    SqlPriceProvider,
};
pub use vars::VarStore;
