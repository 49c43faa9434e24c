//! Data-refresh services that fill the cycle snapshot before monitors run.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sonic_store::{PositionProvider, PriceProvider};
use tracing::debug;

use crate::context::CycleContext;
use crate::monitors::MARKET_WINDOWS;

/// What one service phase reports back to the activity log.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub notes: String,
    pub details: Value,
}

/// An async snapshot-collection phase. Unlike monitors, services perform
/// I/O and may fail; the engine isolates those failures per phase.
#[async_trait]
pub trait ServiceRunner: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
    fn label(&self) -> &'static str;
    async fn run(&self, ctx: &mut CycleContext) -> Result<ServiceReport>;
}

/// Loads open positions into the snapshot.
#[derive(Debug)]
pub struct PositionsService {
    provider: Arc<dyn PositionProvider>,
}

impl PositionsService {
    pub fn new(provider: Arc<dyn PositionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ServiceRunner for PositionsService {
    fn name(&self) -> &'static str {
        "positions"
    }

    fn label(&self) -> &'static str {
        "Position snapshot"
    }

    async fn run(&self, ctx: &mut CycleContext) -> Result<ServiceReport> {
        let positions = self
            .provider
            .open_positions()
            .await
            .context("loading open positions")?;
        let count = positions.len();
        ctx.snapshot.positions = positions;
        Ok(ServiceReport {
            notes: format!("{count} positions"),
            details: json!({"positions": count}),
        })
    }
}

/// Loads current prices plus the lookback samples the market monitor uses.
///
/// The asset universe is the open positions plus any asset named in the
/// market monitor's threshold map, so price alerts work without a position.
#[derive(Debug)]
pub struct PricesService {
    provider: Arc<dyn PriceProvider>,
}

impl PricesService {
    pub fn new(provider: Arc<dyn PriceProvider>) -> Self {
        Self { provider }
    }

    fn universe(ctx: &CycleContext) -> BTreeSet<String> {
        let mut assets: BTreeSet<String> = ctx
            .snapshot
            .positions
            .iter()
            .map(|p| p.asset.clone())
            .collect();
        let market = ctx.bundle.monitor_or_default("market");
        if let Some(thresholds) = market.param("thresholds").and_then(Value::as_object) {
            assets.extend(thresholds.keys().cloned());
        }
        assets
    }
}

#[async_trait]
impl ServiceRunner for PricesService {
    fn name(&self) -> &'static str {
        "prices"
    }

    fn label(&self) -> &'static str {
        "Price snapshot"
    }

    async fn run(&self, ctx: &mut CycleContext) -> Result<ServiceReport> {
        let assets = Self::universe(ctx);
        let mut priced = 0usize;
        for asset in &assets {
            let current = self
                .provider
                .price_at(asset, 0)
                .await
                .with_context(|| format!("fetching current price for {asset}"))?;
            let Some(current) = current else {
                debug!(asset = %asset, "no current price");
                continue;
            };
            ctx.snapshot.prices.insert(asset.clone(), current);
            priced += 1;

            for (_, seconds) in MARKET_WINDOWS {
                let sample = self
                    .provider
                    .price_at(asset, *seconds)
                    .await
                    .with_context(|| format!("fetching {seconds}s-old price for {asset}"))?;
                ctx.snapshot.history.insert((asset.clone(), *seconds), sample);
            }
        }
        Ok(ServiceReport {
            notes: format!("{priced} of {} assets priced", assets.len()),
            details: json!({"assets": assets.len(), "priced": priced}),
        })
    }
}
