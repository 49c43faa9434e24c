//! Blast-radius monitor.
//!
//! A blast radius is a configured distance buffer (same percentage units
//! as the liquidation distance). The monitor reports how much of that
//! buffer price action has already eaten.

use std::collections::BTreeSet;

use serde_json::{json, Value};

use super::{min_liquidation_distance, status_row, MonitorReport, MonitorRunner};
use crate::config::coerce::coerce_f64;
use crate::context::CycleContext;
use crate::status::{ThresholdOp, ThresholdSpec};

const DEFAULT_ALERT_PCT: f64 = 50.0;

#[derive(Debug, Default)]
pub struct BlastMonitor;

impl BlastMonitor {
    /// Radius for one asset: the blast monitor's own `blast` map first,
    /// then the legacy placement under the liquid block.
    fn radius_for(ctx: &CycleContext, asset: &str) -> Option<f64> {
        for owner in ["blast", "liquid"] {
            let def = ctx.bundle.monitor_or_default(owner);
            let Some(map) = def.param("blast").and_then(Value::as_object) else {
                continue;
            };
            for spelling in [asset.to_string(), asset.to_uppercase()] {
                if let Some(radius) = map.get(&spelling).and_then(coerce_f64) {
                    return Some(radius);
                }
            }
        }
        None
    }

    /// Alert percentage: per-asset map when `alert_pct` is an object,
    /// otherwise the resolver's monitor-level value, otherwise 50.
    fn alert_pct_for(ctx: &CycleContext, asset: &str) -> f64 {
        let def = ctx.bundle.monitor_or_default("blast");
        if let Some(map) = def.param("alert_pct").and_then(Value::as_object) {
            for spelling in [asset.to_string(), asset.to_uppercase()] {
                if let Some(pct) = map.get(&spelling).and_then(coerce_f64) {
                    return pct;
                }
            }
        }
        ctx.resolver
            .param("blast", "alert_pct")
            .or_default(DEFAULT_ALERT_PCT)
    }
}

impl MonitorRunner for BlastMonitor {
    fn name(&self) -> &'static str {
        "blast"
    }

    fn label(&self) -> &'static str {
        "Blast radius"
    }

    fn run(&self, ctx: &CycleContext) -> MonitorReport {
        let mut report = MonitorReport::new("blast");
        report.push_trace("alert_pct", &ctx.resolver.param("blast", "alert_pct"));

        let assets: BTreeSet<&str> = ctx
            .snapshot
            .positions
            .iter()
            .map(|p| p.asset.as_str())
            .collect();

        for asset in assets {
            let Some(radius) = Self::radius_for(ctx, asset).filter(|r| *r > 0.0) else {
                continue;
            };
            let positions = ctx.snapshot.positions_for(asset);
            let Some((distance, _)) = min_liquidation_distance(&positions) else {
                continue;
            };

            let alert_pct = Self::alert_pct_for(ctx, asset);
            let encroached = ((radius - distance) / radius * 100.0).clamp(0.0, 100.0);
            let breach = encroached >= alert_pct;
            let meta = json!({
                "radius": radius,
                "distance": distance,
                "positions": positions.len(),
            });
            report.statuses.push(status_row(
                self.name(),
                format!("{asset} blast radius"),
                Some(asset.to_string()),
                Some(encroached),
                "%",
                Some(ThresholdSpec::new(ThresholdOp::Ge, alert_pct, "%")),
                breach,
                meta,
                "blast",
            ));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{context, long};
    use super::*;
    use crate::status::MonitorState;

    #[test]
    fn distance_inside_the_buffer_stays_ok() {
        // Radius 10, distance 8: only 20% of the buffer is gone.
        let mut ctx = context(json!({"liquid": {"blast": {"BTC": 10}}}));
        ctx.snapshot.positions.push(long("BTC", 100.0, 108.0, None, 0.0));

        let report = BlastMonitor.run(&ctx);
        assert_eq!(report.statuses.len(), 1);
        let status = &report.statuses[0];
        assert!((status.value.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(status.state, MonitorState::Ok);
    }

    #[test]
    fn majority_encroachment_breaches() {
        // Radius 10, distance 4: 60% of the buffer is gone.
        let mut ctx = context(json!({"liquid": {"blast": {"BTC": 10}}}));
        ctx.snapshot.positions.push(long("BTC", 100.0, 104.0, None, 0.0));

        let report = BlastMonitor.run(&ctx);
        let status = &report.statuses[0];
        assert!((status.value.unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(status.state, MonitorState::Breach);
        assert_eq!(status.threshold.as_ref().unwrap().render(), ">= 50%");
    }

    #[test]
    fn encroachment_clamps_to_the_unit_range() {
        let mut ctx = context(json!({"blast": {"blast": {"BTC": 10}}}));
        ctx.snapshot.positions.push(long("BTC", 100.0, 85.0, None, 0.0));

        let report = BlastMonitor.run(&ctx);
        // Distance -15 would be 250% of the buffer; the row caps at 100.
        assert_eq!(report.statuses[0].value, Some(100.0));
        assert_eq!(report.statuses[0].state, MonitorState::Breach);
    }

    #[test]
    fn assets_without_a_radius_are_skipped() {
        let mut ctx = context(json!({"liquid": {"blast": {"BTC": 10}}}));
        ctx.snapshot.positions.push(long("ETH", 100.0, 90.0, None, 0.0));

        let report = BlastMonitor.run(&ctx);
        assert!(report.statuses.is_empty());
    }

    #[test]
    fn zero_radius_is_treated_as_unconfigured() {
        let mut ctx = context(json!({"blast": {"blast": {"BTC": 0}}}));
        ctx.snapshot.positions.push(long("BTC", 100.0, 90.0, None, 0.0));

        assert!(BlastMonitor.run(&ctx).statuses.is_empty());
    }

    #[test]
    fn alert_pct_overrides_apply_per_asset() {
        let mut ctx = context(json!({
            "blast": {"blast": {"BTC": 10}, "alert_pct": {"BTC": "70"}}
        }));
        ctx.snapshot.positions.push(long("BTC", 100.0, 104.0, None, 0.0));

        let report = BlastMonitor.run(&ctx);
        // 60% encroached sits below the per-asset 70% bar.
        assert_eq!(report.statuses[0].state, MonitorState::Ok);
    }
}
