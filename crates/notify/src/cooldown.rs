//! Persistent per-(monitor, channel) cooldowns.
//!
//! Last-fired timestamps live in the runtime-variable store under one
//! `channel_cooldowns` JSON object keyed `"<monitor>|<channel>"`. The mark
//! is written at fire decision time, before the send: a crash after marking
//! costs one suppressed window, never a duplicate fire (at-most-once per
//! window).

use chrono::Utc;
use serde_json::{json, Value};
use sonic_store::{StoreError, VarStore};
use tracing::debug;

use crate::Channel;

const VAR_KEY: &str = "channel_cooldowns";

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    /// Window clear; the mark has been written. Send now.
    Fire,
    /// Inside the window; the existing mark was left untouched.
    Held { remaining_seconds: u64 },
}

/// Read-then-conditional-write cooldown ledger over the variable store.
/// Last writer wins; dispatch cadence is tens of seconds, not milliseconds.
#[derive(Debug)]
pub struct CooldownLedger {
    vars: VarStore,
}

impl CooldownLedger {
    pub fn new(vars: VarStore) -> Self {
        Self { vars }
    }

    /// Check the window for `(monitor, channel)` and, when clear, mark it
    /// as fired now.
    pub async fn try_mark(
        &self,
        monitor: &str,
        channel: Channel,
        window_seconds: u64,
    ) -> Result<CooldownDecision, StoreError> {
        let key = format!("{monitor}|{channel}");
        let now = Utc::now().timestamp();

        let mut map = match self.vars.get(VAR_KEY).await? {
            Some(Value::Object(map)) => map,
            Some(other) => {
                debug!(value = %other, "resetting malformed cooldown map");
                serde_json::Map::new()
            }
            None => serde_json::Map::new(),
        };

        if let Some(last) = map.get(&key).and_then(Value::as_i64) {
            let elapsed = now.saturating_sub(last);
            if (elapsed as u64) < window_seconds {
                return Ok(CooldownDecision::Held {
                    remaining_seconds: window_seconds - elapsed as u64,
                });
            }
        }

        map.insert(key, json!(now));
        self.vars.set(VAR_KEY, &Value::Object(map)).await?;
        Ok(CooldownDecision::Fire)
    }
}
