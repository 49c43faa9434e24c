//! Per-cycle working state shared by service and monitor phases.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sonic_store::Position;

use crate::config::MonitorConfigBundle;
use crate::resolver::ThresholdResolver;

/// Position and price data the service phases collected this cycle.
///
/// Monitors read it, services write it. Built empty at cycle start and
/// discarded at cycle end.
#[derive(Debug, Default)]
pub struct CycleSnapshot {
    pub positions: Vec<Position>,
    /// Latest price per asset.
    pub prices: HashMap<String, f64>,
    /// Historical samples keyed by (asset, seconds_ago); `None` records a
    /// lookup that came back empty so monitors can tell "not fetched"
    /// from "fetched, nothing there".
    pub history: HashMap<(String, u64), Option<f64>>,
}

impl CycleSnapshot {
    pub fn current_price(&self, asset: &str) -> Option<f64> {
        self.prices.get(asset).copied()
    }

    pub fn price_at(&self, asset: &str, seconds_ago: u64) -> Option<f64> {
        if seconds_ago == 0 {
            return self.current_price(asset);
        }
        self.history
            .get(&(asset.to_string(), seconds_ago))
            .copied()
            .flatten()
    }

    /// Every asset this cycle knows about: positions plus priced assets.
    pub fn assets(&self) -> BTreeSet<String> {
        let mut assets: BTreeSet<String> =
            self.positions.iter().map(|p| p.asset.clone()).collect();
        assets.extend(self.prices.keys().cloned());
        assets
    }

    pub fn positions_for(&self, asset: &str) -> Vec<&Position> {
        self.positions.iter().filter(|p| p.asset == asset).collect()
    }
}

/// Everything one cycle's phases share: identity, config, resolver and the
/// snapshot under construction.
#[derive(Debug)]
pub struct CycleContext {
    pub cycle_id: String,
    pub started_at: DateTime<Utc>,
    pub bundle: Arc<MonitorConfigBundle>,
    pub resolver: ThresholdResolver,
    pub snapshot: CycleSnapshot,
}

impl CycleContext {
    pub fn new(
        cycle_id: String,
        bundle: Arc<MonitorConfigBundle>,
        resolver: ThresholdResolver,
    ) -> Self {
        Self {
            cycle_id,
            started_at: Utc::now(),
            bundle,
            resolver,
            snapshot: CycleSnapshot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonic_store::PositionSide;

    fn position(asset: &str) -> Position {
        Position {
            asset: asset.to_string(),
            side: PositionSide::Long,
            entry_price: 100.0,
            mark_price: 100.0,
            liquidation_price: None,
            value_usd: 1000.0,
            pnl_usd: 0.0,
            size: 10.0,
        }
    }

    #[test]
    fn assets_unions_positions_and_prices() {
        let mut snapshot = CycleSnapshot::default();
        snapshot.positions.push(position("BTC"));
        snapshot.prices.insert("ETH".to_string(), 3000.0);
        let assets: Vec<String> = snapshot.assets().into_iter().collect();
        assert_eq!(assets, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn price_at_zero_reads_current() {
        let mut snapshot = CycleSnapshot::default();
        snapshot.prices.insert("BTC".to_string(), 50_000.0);
        snapshot
            .history
            .insert(("BTC".to_string(), 3600), Some(49_000.0));
        snapshot.history.insert(("BTC".to_string(), 86_400), None);

        assert_eq!(snapshot.price_at("BTC", 0), Some(50_000.0));
        assert_eq!(snapshot.price_at("BTC", 3600), Some(49_000.0));
        assert_eq!(snapshot.price_at("BTC", 86_400), None);
        assert_eq!(snapshot.price_at("BTC", 21_600), None);
    }
}
