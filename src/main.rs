//! Sonic Monitor
//!
//! Trading-position watchdog: a periodic engine that polls position/price
//! state from the shared SQLite pipeline, evaluates risk thresholds
//! (liquidation proximity, profit, market movement, blast radius) and
//! dispatches deduplicated notifications across system/voice/sms/tts
//! channels.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sonic_core::{ConfigStore, MonitorEngine, MonitorRegistry};
use sonic_notify::{
    CooldownLedger, CredentialResolver, EnvCredentialResolver, NotificationDispatcher,
    WebhookSender,
};
use sonic_store::{SqlPositionProvider, SqlPriceProvider, StoreHandle, VarStore};

/// Environment variable names.
mod env {
    pub const DB_PATH: &str = "SONIC_DB_PATH";
    pub const CONFIG_PATH: &str = "SONIC_CONFIG_PATH";
    pub const INTERVAL_SECONDS: &str = "SONIC_INTERVAL_SECONDS";
    pub const DEBUG: &str = "SONIC_DEBUG";
    pub const LIVE: &str = "SONIC_LIVE";
}

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter()))
        .init();

    let settings = Settings::from_env();
    settings.log();

    info!("Starting Sonic Monitor");

    let engine = Arc::new(initialize_components(&settings).await?);

    // Wire ctrl-c to the engine's shutdown token
    let token = engine.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            token.cancel();
        }
    });

    let interval = settings
        .interval_seconds
        .unwrap_or_else(|| engine.monitor_bundle().global.loop_seconds);

    info!("Starting monitor loop...");
    engine.run_forever(interval).await;

    Ok(())
}

/// Settings loaded from environment.
struct Settings {
    db_path: PathBuf,
    config_path: Option<PathBuf>,
    interval_seconds: Option<u64>,
    live: bool,
}

impl Settings {
    fn from_env() -> Self {
        let get = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            db_path: get(env::DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("sonic_monitor.db")),
            config_path: get(env::CONFIG_PATH).map(PathBuf::from),
            interval_seconds: get(env::INTERVAL_SECONDS).and_then(|v| v.parse().ok()),
            live: get(env::LIVE).map(|v| truthy(&v)).unwrap_or(false),
        }
    }

    fn log(&self) {
        info!(
            db_path = %self.db_path.display(),
            config_path = ?self.config_path,
            interval_override = ?self.interval_seconds,
            live = self.live,
            "Resolved settings"
        );
    }
}

fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_filter() -> EnvFilter {
    let debug = std::env::var(env::DEBUG)
        .map(|v| truthy(&v))
        .unwrap_or(false);
    if debug {
        EnvFilter::new("info,sonic_core=debug,sonic_store=debug,sonic_notify=debug")
    } else {
        EnvFilter::new("info")
    }
}

async fn initialize_components(settings: &Settings) -> Result<MonitorEngine> {
    info!("Initializing components...");

    // The persistence handle is the only fatal startup dependency.
    let store = StoreHandle::open(&settings.db_path).await.with_context(|| {
        format!(
            "opening monitor database at {}",
            settings.db_path.display()
        )
    })?;

    // Snapshot providers read the pipeline-maintained tables.
    let positions = Arc::new(SqlPositionProvider::new(store.pool()));
    let prices = Arc::new(SqlPriceProvider::new(store.pool()));
    let registry = MonitorRegistry::standard(positions, prices);
    info!("Snapshot providers initialized");

    // Notification stack
    let credentials: Arc<dyn CredentialResolver> = Arc::new(EnvCredentialResolver::new());
    let sender = Arc::new(WebhookSender::new(Arc::clone(&credentials)));
    let cooldowns = CooldownLedger::new(VarStore::new(store.pool()));
    let dispatcher = NotificationDispatcher::new(sender, credentials, cooldowns);
    info!("Notification dispatcher initialized");

    let config = ConfigStore::new(settings.config_path.clone());
    info!(config_path = %config.path().display(), "Config store ready");

    let engine = MonitorEngine::new(config, registry, &store, dispatcher);
    info!("All components initialized");

    Ok(engine)
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╔═╗╔═╗╔╗╔╦╔═╗  ╔╦╗╔═╗╔╗╔╦╔╦╗╔═╗╦═╗
    ╚═╗║ ║║║║║║    ║║║║ ║║║║║ ║ ║ ║╠╦╝
    ╚═╝╚═╝╝╚╝╩╚═╝  ╩ ╩╚═╝╝╚╝╩ ╩ ╚═╝╩╚═
    Position Watchdog v0.1.0
    "#
    );
}
