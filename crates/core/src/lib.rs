//! Sonic monitor core logic.
//!
//! This crate provides the monitoring engine:
//! - Typed config bundles with legacy/normalized shape detection
//! - Layered threshold resolution (file > env > runtime store) with traces
//! - Pure threshold monitors (liquidation, profit, market, blast radius)
//! - Snapshot services feeding a per-cycle context
//! - A sequential cycle engine with per-phase isolation and activity logs
//!
//! Persistence lives in `sonic-store`, notification delivery in
//! `sonic-notify`; this crate wires both into the cycle loop.

pub mod config;
mod context;
mod engine;
mod monitors;
mod registry;
mod resolver;
mod services;
mod shutdown;
mod status;

pub use config::{
    build_bundle, ConfigStore, MonitorConfigBundle, MonitorDefinition, MonitorGlobalConfig,
    MonitorNotifications, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, KNOWN_MONITORS,
};
pub use context::{CycleContext, CycleSnapshot};
pub use engine::{CycleSummary, MonitorEngine, PhaseOutcome};
pub use monitors::{
    BlastMonitor, LiquidationMonitor, MarketMonitor, MonitorReport, MonitorRunner, ProfitMonitor,
    TraceRecord, MARKET_WINDOWS,
};
pub use registry::MonitorRegistry;
pub use resolver::{Resolved, ThresholdResolver, TraceCandidate};
pub use services::{PositionsService, PricesService, ServiceReport, ServiceRunner};
pub use shutdown::ShutdownToken;
pub use status::{BreachRecord, MonitorState, ThresholdOp, ThresholdSpec};
