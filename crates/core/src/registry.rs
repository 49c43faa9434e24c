//! Explicit phase registry.
//!
//! Phases run in registration order; the config bundle decides which are
//! enabled each cycle. Unknown names run with default settings, so adding
//! a phase never requires a config change.

use std::sync::Arc;

use sonic_store::{PositionProvider, PriceProvider};

use crate::config::MonitorConfigBundle;
use crate::monitors::{
    BlastMonitor, LiquidationMonitor, MarketMonitor, MonitorRunner, ProfitMonitor,
};
use crate::services::{PositionsService, PricesService, ServiceRunner};

#[derive(Debug, Default)]
pub struct MonitorRegistry {
    services: Vec<Arc<dyn ServiceRunner>>,
    monitors: Vec<Arc<dyn MonitorRunner>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock lineup: position/price snapshots, then every shipped
    /// monitor.
    pub fn standard(
        positions: Arc<dyn PositionProvider>,
        prices: Arc<dyn PriceProvider>,
    ) -> Self {
        Self::new()
            .with_service(Arc::new(PositionsService::new(positions)))
            .with_service(Arc::new(PricesService::new(prices)))
            .with_monitor(Arc::new(LiquidationMonitor))
            .with_monitor(Arc::new(ProfitMonitor))
            .with_monitor(Arc::new(MarketMonitor))
            .with_monitor(Arc::new(BlastMonitor))
    }

    pub fn with_service(mut self, service: Arc<dyn ServiceRunner>) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn MonitorRunner>) -> Self {
        self.monitors.push(monitor);
        self
    }

    pub fn services_for(&self, bundle: &MonitorConfigBundle) -> Vec<Arc<dyn ServiceRunner>> {
        self.services
            .iter()
            .filter(|s| bundle.is_enabled(s.name()))
            .cloned()
            .collect()
    }

    pub fn monitors_for(&self, bundle: &MonitorConfigBundle) -> Vec<Arc<dyn MonitorRunner>> {
        self.monitors
            .iter()
            .filter(|m| bundle.is_enabled(m.name()))
            .cloned()
            .collect()
    }

    pub fn monitor_names(&self) -> Vec<&'static str> {
        self.monitors.iter().map(|m| m.name()).collect()
    }
}
