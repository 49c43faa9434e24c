//! Profit monitor.
//!
//! Good-news alerting: fires when PnL climbs over a configured take-profit
//! level. Portfolio and per-asset metrics are independent; a metric with
//! no resolvable threshold is skipped entirely.

use std::collections::BTreeSet;

use serde_json::json;

use super::{status_row, MonitorReport, MonitorRunner};
use crate::context::CycleContext;
use crate::status::{ThresholdOp, ThresholdSpec};

#[derive(Debug, Default)]
pub struct ProfitMonitor;

impl MonitorRunner for ProfitMonitor {
    fn name(&self) -> &'static str {
        "profit"
    }

    fn label(&self) -> &'static str {
        "Profit"
    }

    fn run(&self, ctx: &CycleContext) -> MonitorReport {
        let mut report = MonitorReport::new("profit");

        let portfolio = ctx.resolver.param("profit", "portfolio_profit_usd");
        report.push_trace("portfolio_profit_usd", &portfolio);
        if let Some(threshold) = portfolio.value {
            let pnl: f64 = ctx.snapshot.positions.iter().map(|p| p.pnl_usd).sum();
            report.statuses.push(status_row(
                self.name(),
                "portfolio pnl".to_string(),
                None,
                Some(pnl),
                "$",
                Some(ThresholdSpec::new(ThresholdOp::Ge, threshold, "$")),
                pnl >= threshold,
                json!({"positions": ctx.snapshot.positions.len()}),
                "profit",
            ));
        }

        let per_position = ctx.resolver.param("profit", "position_profit_usd");
        report.push_trace("position_profit_usd", &per_position);
        if let Some(threshold) = per_position.value {
            let assets: BTreeSet<&str> = ctx
                .snapshot
                .positions
                .iter()
                .map(|p| p.asset.as_str())
                .collect();
            for asset in assets {
                let positions = ctx.snapshot.positions_for(asset);
                let pnl: f64 = positions.iter().map(|p| p.pnl_usd).sum();
                report.statuses.push(status_row(
                    self.name(),
                    format!("{asset} pnl"),
                    Some(asset.to_string()),
                    Some(pnl),
                    "$",
                    Some(ThresholdSpec::new(ThresholdOp::Ge, threshold, "$")),
                    pnl >= threshold,
                    json!({"positions": positions.len()}),
                    "profit",
                ));
            }
        }
        report
    }
}
