//! Threshold monitors.
//!
//! Monitors are pure evaluators: they read the cycle context and emit a
//! fresh list of normalized status rows plus the threshold-resolution
//! traces that produced them. All I/O (snapshot collection, persistence,
//! dispatch) happens outside, in the services and the engine.

mod blast;
mod liquidation;
mod market;
mod profit;

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use sonic_store::{Position, PositionSide};

use crate::context::CycleContext;
use crate::resolver::{Resolved, TraceCandidate};
use crate::status::{now_iso, BreachRecord, MonitorState, ThresholdSpec};

pub use blast::BlastMonitor;
pub use liquidation::LiquidationMonitor;
pub use market::{MarketMonitor, MARKET_WINDOWS};
pub use profit::ProfitMonitor;

/// One resolved threshold with its audit trail, kept per report so the
/// ledger shows why each comparison used the value it did.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub candidates: Vec<TraceCandidate>,
}

/// What one monitor produced for one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub source: String,
    pub statuses: Vec<BreachRecord>,
    pub traces: Vec<TraceRecord>,
}

impl MonitorReport {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            statuses: Vec::new(),
            traces: Vec::new(),
        }
    }

    pub fn breach_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_breach()).count()
    }

    /// Records a resolution trace; silent misses (no hit anywhere) are
    /// not worth a ledger line.
    pub fn push_trace(&mut self, metric: impl Into<String>, resolved: &Resolved) {
        if resolved.trace.is_empty() {
            return;
        }
        self.traces.push(TraceRecord {
            metric: metric.into(),
            value: resolved.value,
            candidates: resolved.trace.clone(),
        });
    }

    /// Ledger payload for this report.
    pub fn payload(&self) -> Value {
        json!({
            "source": self.source,
            "statuses": self.statuses,
            "traces": self.traces,
        })
    }
}

/// A pure threshold evaluator, run once per cycle.
pub trait MonitorRunner: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn label(&self) -> &'static str;
    fn run(&self, ctx: &CycleContext) -> MonitorReport;
}

/// Builds one normalized status row.
#[allow(clippy::too_many_arguments)]
pub(crate) fn status_row(
    monitor: &str,
    label: String,
    asset: Option<String>,
    value: Option<f64>,
    unit: &str,
    threshold: Option<ThresholdSpec>,
    breach: bool,
    meta: Value,
    source: &str,
) -> BreachRecord {
    BreachRecord {
        monitor: monitor.to_string(),
        label,
        asset,
        value,
        unit: unit.to_string(),
        threshold,
        state: MonitorState::from_breach(breach),
        meta,
        source: source.to_string(),
        ts: now_iso(),
    }
}

/// Signed liquidation-distance percentage for one position.
///
/// Long positions measure `(mark - entry) / entry`, shorts the inverse,
/// both floored at -100. Once the mark has crossed the liquidation price
/// the distance is exactly -100 no matter what the ratio says. Positions
/// without a usable entry or mark yield `None`.
pub(crate) fn liquidation_distance(position: &Position) -> Option<f64> {
    if position.entry_price <= 0.0 || position.mark_price <= 0.0 {
        return None;
    }
    let entry = position.entry_price;
    let mark = position.mark_price;
    let raw = match position.side {
        PositionSide::Long => (mark - entry) / entry * 100.0,
        PositionSide::Short => (entry - mark) / entry * 100.0,
    };
    let mut distance = raw.max(-100.0);
    if let Some(liq) = position.liquidation_price.filter(|liq| *liq > 0.0) {
        let crossed = match position.side {
            PositionSide::Long => mark <= liq,
            PositionSide::Short => mark >= liq,
        };
        if crossed {
            distance = -100.0;
        }
    }
    Some(distance)
}

/// Worst (minimum) distance across an asset's open positions, with the
/// position that produced it.
pub(crate) fn min_liquidation_distance<'a>(
    positions: &[&'a Position],
) -> Option<(f64, &'a Position)> {
    let mut worst: Option<(f64, &'a Position)> = None;
    for &position in positions {
        let Some(distance) = liquidation_distance(position) else {
            continue;
        };
        match worst {
            Some((current, _)) if current <= distance => {}
            _ => worst = Some((distance, position)),
        }
    }
    worst
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use serde_json::Value;
    use sonic_store::{Position, PositionSide};

    use crate::config::build_bundle;
    use crate::context::CycleContext;
    use crate::resolver::ThresholdResolver;

    pub(crate) fn context(raw: Value) -> CycleContext {
        let bundle = Arc::new(build_bundle(&raw, None));
        let resolver = ThresholdResolver::new(Arc::clone(&bundle), Default::default());
        CycleContext::new("20260101T000000000-0001".to_string(), bundle, resolver)
    }

    pub(crate) fn long(asset: &str, entry: f64, mark: f64, liq: Option<f64>, pnl: f64) -> Position {
        Position {
            asset: asset.to_string(),
            side: PositionSide::Long,
            entry_price: entry,
            mark_price: mark,
            liquidation_price: liq,
            value_usd: mark * 10.0,
            pnl_usd: pnl,
            size: 10.0,
        }
    }

    pub(crate) fn short(asset: &str, entry: f64, mark: f64, liq: Option<f64>, pnl: f64) -> Position {
        Position {
            side: PositionSide::Short,
            ..long(asset, entry, mark, liq, pnl)
        }
    }
}
