//! Position/price snapshot access.
//!
//! The engine never talks to exchanges or RPC nodes. It consumes two narrow
//! traits, [`PositionProvider`] and [`PriceProvider`]; the SQL-backed
//! implementations here read the `positions` and `prices` tables an external
//! pipeline maintains, and degrade to empty results when those tables do not
//! exist yet.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, instrument};

/// Direction of a leveraged position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Lenient parse of upstream side labels. Anything not recognizably
    /// short is treated as long.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "short" | "sell" | "s" => Self::Short,
            _ => Self::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// One open leveraged position as the upstream pipeline reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub asset: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub mark_price: f64,
    pub liquidation_price: Option<f64>,
    pub value_usd: f64,
    pub pnl_usd: f64,
    pub size: f64,
}

impl Position {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let side: Option<String> = row.try_get("side")?;
        Ok(Self {
            asset: row.try_get("asset")?,
            side: side
                .as_deref()
                .map(PositionSide::parse)
                .unwrap_or(PositionSide::Long),
            entry_price: row.try_get::<Option<f64>, _>("entry_price")?.unwrap_or(0.0),
            mark_price: row.try_get::<Option<f64>, _>("mark_price")?.unwrap_or(0.0),
            liquidation_price: row.try_get("liquidation_price")?,
            value_usd: row.try_get::<Option<f64>, _>("value")?.unwrap_or(0.0),
            pnl_usd: row.try_get::<Option<f64>, _>("pnl")?.unwrap_or(0.0),
            size: row.try_get::<Option<f64>, _>("size")?.unwrap_or(0.0),
        })
    }
}

/// Source of open positions for a cycle snapshot.
#[async_trait]
pub trait PositionProvider: Send + Sync + fmt::Debug {
    async fn open_positions(&self) -> Result<Vec<Position>>;
}

/// Source of price samples for a cycle snapshot.
#[async_trait]
pub trait PriceProvider: Send + Sync + fmt::Debug {
    /// Price of `asset` as of `seconds_ago` seconds in the past;
    /// `seconds_ago == 0` means the latest sample. `None` when no sample
    /// exists in range.
    async fn price_at(&self, asset: &str, seconds_ago: u64) -> Result<Option<f64>>;
}

fn missing_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("no such table"))
}

/// Positions read from the pipeline-maintained `positions` table.
#[derive(Debug)]
pub struct SqlPositionProvider {
    pool: SqlitePool,
}

impl SqlPositionProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PositionProvider for SqlPositionProvider {
    async fn open_positions(&self) -> Result<Vec<Position>> {
        let rows = sqlx::query(
            "SELECT asset, side, entry_price, mark_price, liquidation_price, value, pnl, size \
             FROM positions WHERE status = 'open'",
        )
        .fetch_all(&self.pool)
        .await;
        let rows = match rows {
            Ok(rows) => rows,
            Err(err) if missing_table(&err) => {
                debug!("positions table not present yet");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match Position::from_row(row) {
                Ok(position) => out.push(position),
                Err(err) => debug!(error = %err, "skipping unreadable position row"),
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    fetched: Instant,
    price: f64,
}

/// Prices read from the pipeline-maintained `prices` table.
///
/// Latest-price lookups are cached briefly since several monitors ask for
/// the same assets within one cycle; historical lookups go to the table
/// every time.
#[derive(Debug)]
pub struct SqlPriceProvider {
    pool: SqlitePool,
    cache: DashMap<String, CachedPrice>,
    cache_ttl: Duration,
}

impl SqlPriceProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_cache_ttl(pool, Duration::from_secs(10))
    }

    pub fn with_cache_ttl(pool: SqlitePool, cache_ttl: Duration) -> Self {
        Self {
            pool,
            cache: DashMap::new(),
            cache_ttl,
        }
    }

    #[instrument(skip(self))]
    async fn fetch_price(&self, asset: &str, seconds_ago: u64) -> Result<Option<f64>> {
        // RFC 3339 UTC timestamps compare lexicographically.
        let query = if seconds_ago == 0 {
            sqlx::query(
                "SELECT price FROM prices WHERE asset = ?1 ORDER BY ts DESC LIMIT 1",
            )
            .bind(asset.to_string())
        } else {
            let cutoff = Utc::now() - chrono::Duration::seconds(seconds_ago as i64);
            sqlx::query(
                "SELECT price FROM prices WHERE asset = ?1 AND ts <= ?2 \
                 ORDER BY ts DESC LIMIT 1",
            )
            .bind(asset.to_string())
            .bind(cutoff.to_rfc3339_opts(SecondsFormat::Millis, true))
        };
        let row = match query.fetch_optional(&self.pool).await {
            Ok(row) => row,
            Err(err) if missing_table(&err) => {
                debug!("prices table not present yet");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(match row {
            Some(row) => Some(row.try_get::<f64, _>("price")?),
            None => None,
        })
    }
}

#[async_trait]
impl PriceProvider for SqlPriceProvider {
    async fn price_at(&self, asset: &str, seconds_ago: u64) -> Result<Option<f64>> {
        if seconds_ago == 0 {
            if let Some(cached) = self.cache.get(asset) {
                if cached.fetched.elapsed() < self.cache_ttl {
                    return Ok(Some(cached.price));
                }
            }
            let price = self.fetch_price(asset, 0).await?;
            if let Some(price) = price {
                self.cache.insert(
                    asset.to_string(),
                    CachedPrice {
                        fetched: Instant::now(),
                        price,
                    },
                );
            }
            return Ok(price);
        }
        self.fetch_price(asset, seconds_ago).await
    }
}
