//! Normalized monitor status records.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OK/BREACH determination for one monitored metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorState {
    Ok,
    Breach,
}

impl MonitorState {
    pub fn from_breach(breach: bool) -> Self {
        if breach {
            Self::Breach
        } else {
            Self::Ok
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Breach => "BREACH",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison direction a monitor applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOp {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl ThresholdOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for ThresholdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The threshold a value was compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    pub op: ThresholdOp,
    pub value: f64,
    pub unit: String,
}

impl ThresholdSpec {
    pub fn new(op: ThresholdOp, value: f64, unit: &str) -> Self {
        Self {
            op,
            value,
            unit: unit.to_string(),
        }
    }

    /// Human rendering, e.g. `<= 5%`.
    pub fn render(&self) -> String {
        format!("{} {}{}", self.op, trim_num(self.value), self.unit)
    }
}

/// One normalized status row a monitor emitted for one metric.
///
/// Produced fresh every cycle and written once to the ledger; never kept
/// as mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachRecord {
    pub monitor: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub value: Option<f64>,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdSpec>,
    pub state: MonitorState,
    pub meta: Value,
    pub source: String,
    pub ts: String,
}

impl BreachRecord {
    pub fn is_breach(&self) -> bool {
        self.state == MonitorState::Breach
    }
}

/// Current UTC time in the ISO-8601 form the ledger stores.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn trim_num(v: f64) -> String {
    let rendered = format!("{v:.2}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
