//! Liquidation-proximity monitor.

use std::collections::BTreeSet;

use serde_json::json;

use super::{min_liquidation_distance, status_row, MonitorReport, MonitorRunner};
use crate::context::CycleContext;
use crate::status::{ThresholdOp, ThresholdSpec};

/// Alerts when any asset's worst open position sits within the configured
/// distance of its liquidation price.
#[derive(Debug, Default)]
pub struct LiquidationMonitor;

impl MonitorRunner for LiquidationMonitor {
    fn name(&self) -> &'static str {
        "liquid"
    }

    fn label(&self) -> &'static str {
        "Liquidation proximity"
    }

    fn run(&self, ctx: &CycleContext) -> MonitorReport {
        let mut report = MonitorReport::new("liq");
        let assets: BTreeSet<&str> = ctx
            .snapshot
            .positions
            .iter()
            .map(|p| p.asset.as_str())
            .collect();

        for asset in assets {
            let resolved = ctx.resolver.asset_threshold("liquid", asset);
            report.push_trace(format!("threshold.{asset}"), &resolved);
            // No threshold anywhere means this asset is not watched.
            let Some(threshold) = resolved.value else {
                continue;
            };

            let positions = ctx.snapshot.positions_for(asset);
            let Some((distance, worst)) = min_liquidation_distance(&positions) else {
                continue;
            };

            let breach = distance <= threshold;
            let meta = json!({
                "side": worst.side.as_str(),
                "entry_price": worst.entry_price,
                "mark_price": worst.mark_price,
                "liquidation_price": worst.liquidation_price,
                "positions": positions.len(),
            });
            report.statuses.push(status_row(
                self.name(),
                format!("{asset} liquidation"),
                Some(asset.to_string()),
                Some(distance),
                "%",
                Some(ThresholdSpec::new(ThresholdOp::Le, threshold, "%")),
                breach,
                meta,
                "liq",
            ));
        }
        report
    }
}
