//! Market-movement monitor.

use serde_json::{json, Value};

use super::{status_row, MonitorReport, MonitorRunner};
use crate::config::coerce::coerce_f64;
use crate::context::CycleContext;
use crate::status::{ThresholdOp, ThresholdSpec};

/// Lookback windows every cycle samples.
pub const MARKET_WINDOWS: &[(&str, u64)] = &[("1h", 3_600), ("6h", 21_600), ("24h", 86_400)];

const DEFAULT_MOVE_PCT: f64 = 5.0;

/// Direction filter for move alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Up,
    Down,
    Either,
}

impl Mode {
    fn parse(raw: Option<&Value>) -> Self {
        match raw.and_then(Value::as_str).map(|s| s.trim().to_ascii_lowercase()) {
            Some(mode) if mode == "up" => Self::Up,
            Some(mode) if mode == "down" => Self::Down,
            _ => Self::Either,
        }
    }

    fn allows(self, pct: f64) -> bool {
        match self {
            Self::Up => pct > 0.0,
            Self::Down => pct < 0.0,
            Self::Either => true,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Either => "either",
        }
    }
}

#[derive(Debug, Default)]
pub struct MarketMonitor;

impl MonitorRunner for MarketMonitor {
    fn name(&self) -> &'static str {
        "market"
    }

    fn label(&self) -> &'static str {
        "Market movement"
    }

    fn run(&self, ctx: &CycleContext) -> MonitorReport {
        let mut report = MonitorReport::new("market");
        let def = ctx.bundle.monitor_or_default("market");
        let mode = Mode::parse(def.param("mode"));
        let windows = def.param("windows").and_then(Value::as_object);

        for asset in ctx.snapshot.assets() {
            let Some(current) = ctx.snapshot.current_price(&asset) else {
                continue;
            };
            let resolved = ctx.resolver.asset_threshold("market", &asset);
            report.push_trace(format!("threshold.{asset}"), &resolved);

            for (window, seconds) in MARKET_WINDOWS {
                let threshold = resolved
                    .value
                    .or_else(|| windows.and_then(|w| w.get(*window)).and_then(coerce_f64))
                    .unwrap_or(DEFAULT_MOVE_PCT);

                let previous = ctx.snapshot.price_at(&asset, *seconds);
                // A missing or zero sample is a 0% move, not an error.
                let pct = match previous {
                    Some(prev) if prev > 0.0 => (current - prev) / prev * 100.0,
                    _ => 0.0,
                };
                let breach = mode.allows(pct) && pct.abs() >= threshold;
                let meta = json!({
                    "window_seconds": seconds,
                    "previous": previous,
                    "current": current,
                    "mode": mode.as_str(),
                });
                report.statuses.push(status_row(
                    self.name(),
                    format!("{asset} {window} move"),
                    Some(asset.clone()),
                    Some(pct),
                    "%",
                    Some(ThresholdSpec::new(ThresholdOp::Ge, threshold, "%")),
                    breach,
                    meta,
                    "market",
                ));
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::context;
    use super::*;
    use crate::status::MonitorState;

    fn priced(raw: Value, asset: &str, current: f64, samples: &[(u64, Option<f64>)]) -> crate::context::CycleContext {
        let mut ctx = context(raw);
        ctx.snapshot.prices.insert(asset.to_string(), current);
        for (seconds, price) in samples {
            ctx.snapshot
                .history
                .insert((asset.to_string(), *seconds), *price);
        }
        ctx
    }

    fn row<'a>(report: &'a MonitorReport, label: &str) -> &'a crate::status::BreachRecord {
        report
            .statuses
            .iter()
            .find(|s| s.label == label)
            .unwrap_or_else(|| panic!("no row labeled {label}"))
    }

    #[test]
    fn eight_percent_day_move_trips_a_five_percent_window() {
        let ctx = priced(
            json!({"market": {"windows": {"24h": 5}}}),
            "BTC",
            108.0,
            &[(86_400, Some(100.0))],
        );
        let report = MarketMonitor.run(&ctx);
        let day = row(&report, "BTC 24h move");
        assert!((day.value.unwrap() - 8.0).abs() < 1e-9);
        assert_eq!(day.state, MonitorState::Breach);
        assert_eq!(day.threshold.as_ref().unwrap().render(), ">= 5%");
    }

    #[test]
    fn missing_or_zero_history_is_a_flat_move() {
        let ctx = priced(
            json!({}),
            "BTC",
            108.0,
            &[(3_600, None), (21_600, Some(0.0))],
        );
        let report = MarketMonitor.run(&ctx);
        assert_eq!(report.statuses.len(), MARKET_WINDOWS.len());
        for status in &report.statuses {
            assert_eq!(status.value, Some(0.0));
            assert_eq!(status.state, MonitorState::Ok);
        }
    }

    #[test]
    fn down_mode_ignores_rallies() {
        let ctx = priced(
            json!({"market": {"mode": "down", "windows": {"24h": 5}}}),
            "BTC",
            108.0,
            &[(86_400, Some(100.0))],
        );
        let report = MarketMonitor.run(&ctx);
        let day = row(&report, "BTC 24h move");
        assert_eq!(day.state, MonitorState::Ok);
        assert_eq!(day.meta["mode"], json!("down"));
    }

    #[test]
    fn down_mode_still_catches_drops() {
        let ctx = priced(
            json!({"market": {"mode": "down", "windows": {"24h": 5}}}),
            "BTC",
            92.0,
            &[(86_400, Some(100.0))],
        );
        let report = MarketMonitor.run(&ctx);
        assert_eq!(row(&report, "BTC 24h move").state, MonitorState::Breach);
    }

    #[test]
    fn per_asset_threshold_beats_window_settings() {
        let ctx = priced(
            json!({
                "market": {"thresholds": {"BTC": 10}, "windows": {"24h": 5}}
            }),
            "BTC",
            108.0,
            &[(86_400, Some(100.0))],
        );
        let report = MarketMonitor.run(&ctx);
        let day = row(&report, "BTC 24h move");
        // 8% is under the asset's 10% bar even though the window says 5%.
        assert_eq!(day.state, MonitorState::Ok);
        assert!(!report.traces.is_empty());
    }

    #[test]
    fn unpriced_assets_are_skipped() {
        let mut ctx = context(json!({}));
        ctx.snapshot
            .history
            .insert(("BTC".to_string(), 3_600), Some(100.0));
        let report = MarketMonitor.run(&ctx);
        assert!(report.statuses.is_empty());
    }
}
