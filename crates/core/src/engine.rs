//! Cycle scheduler.
//!
//! One engine drives strictly sequential cycles. Every cycle reloads the
//! config, rebuilds the resolver, runs the enabled service phases, then
//! the enabled monitor phases, touches the heartbeat and reports. Each
//! phase is isolated: its failure is logged and recorded, never fatal to
//! the cycle. Persistence failures are logged and swallowed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sonic_notify::{Alert, ChannelFlags, DispatchRequest, NotificationDispatcher};
use sonic_store::{
    ActivityOutcome, ActivityStore, ActivityToken, HeartbeatStore, LedgerStore, StoreHandle,
    VarStore,
};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigStore, MonitorConfigBundle, MonitorNotifications};
use crate::context::CycleContext;
use crate::registry::MonitorRegistry;
use crate::resolver::ThresholdResolver;
use crate::shutdown::ShutdownToken;
use crate::status::{now_iso, BreachRecord, ThresholdSpec};

const LAST_DISPATCH_VAR: &str = "last_dispatch";

/// How one phase of a cycle went.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    pub phase: String,
    pub label: String,
    pub outcome: ActivityOutcome,
    pub notes: String,
    pub duration_ms: u64,
}

/// What `run_once` hands back to callers and the reporting log.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub cycle_id: String,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub phases: Vec<PhaseOutcome>,
    pub statuses: usize,
    pub breaches: usize,
    pub notifications: usize,
    pub interrupted: bool,
}

pub struct MonitorEngine {
    config: ConfigStore,
    registry: MonitorRegistry,
    activity: ActivityStore,
    ledger: LedgerStore,
    heartbeat: HeartbeatStore,
    vars: VarStore,
    dispatcher: NotificationDispatcher,
    shutdown: ShutdownToken,
    cycle_seq: AtomicU64,
}

impl MonitorEngine {
    pub fn new(
        config: ConfigStore,
        registry: MonitorRegistry,
        store: &StoreHandle,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            config,
            registry,
            activity: ActivityStore::new(store.pool()),
            ledger: LedgerStore::new(store.pool()),
            heartbeat: HeartbeatStore::new(store.pool()),
            vars: VarStore::new(store.pool()),
            dispatcher,
            shutdown: ShutdownToken::new(),
            cycle_seq: AtomicU64::new(1),
        }
    }

    /// Token the binary wires to ctrl-c.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn reload_config(&self, force: bool) -> Arc<MonitorConfigBundle> {
        self.config.reload(force)
    }

    pub fn monitor_bundle(&self) -> Arc<MonitorConfigBundle> {
        self.config.current()
    }

    pub fn list_monitors(&self) -> Vec<String> {
        self.config.current().list_monitors()
    }

    fn next_cycle_id(&self) -> String {
        let seq = self.cycle_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq:04}", Utc::now().format("%Y%m%dT%H%M%S%3f"))
    }

    /// Runs one full cycle and returns its summary.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> CycleSummary {
        let cycle_id = self.next_cycle_id();
        let cycle_start = Instant::now();
        debug!(cycle_id = %cycle_id, "cycle starting");

        let bundle = self.config.reload(true);
        let store_vars = match self.vars.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "runtime vars unavailable, resolver skips the store layer");
                HashMap::new()
            }
        };
        let resolver = ThresholdResolver::new(Arc::clone(&bundle), store_vars);
        let mut ctx = CycleContext::new(cycle_id.clone(), Arc::clone(&bundle), resolver);

        let mut summary = CycleSummary {
            cycle_id: cycle_id.clone(),
            started_at: ctx.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            elapsed_ms: 0,
            phases: Vec::new(),
            statuses: 0,
            breaches: 0,
            notifications: 0,
            interrupted: false,
        };
        let mut dispatches: Vec<Value> = Vec::new();

        for service in self.registry.services_for(&bundle) {
            if self.shutdown.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            let phase = format!("svc_{}", service.name());
            let token = self.activity.begin(&cycle_id, &phase, service.label());
            let started = Instant::now();
            let (outcome, notes, details) = match service.run(&mut ctx).await {
                Ok(report) => (ActivityOutcome::Ok, report.notes, report.details),
                Err(err) => {
                    let chain = format!("{err:#}");
                    error!(cycle_id = %cycle_id, phase = %phase, error = %chain, "service phase failed");
                    (ActivityOutcome::Error, chain, Value::Null)
                }
            };
            self.finish_phase(&mut summary, token, started, outcome, notes, details)
                .await;
        }

        if !summary.interrupted {
            for monitor in self.registry.monitors_for(&bundle) {
                if self.shutdown.is_cancelled() {
                    summary.interrupted = true;
                    break;
                }
                let phase = format!("mon_{}", monitor.name());
                let token = self.activity.begin(&cycle_id, &phase, monitor.label());
                let started = Instant::now();

                let report = monitor.run(&ctx);
                let statuses = report.statuses.len();
                let breaches = report.breach_count();
                summary.statuses += statuses;
                summary.breaches += breaches;

                let mut outcome = ActivityOutcome::Ok;
                let mut notes = format!("{statuses} statuses, {breaches} breaches");
                if let Err(err) = self
                    .ledger
                    .append(&cycle_id, monitor.name(), &report.payload())
                    .await
                {
                    warn!(cycle_id = %cycle_id, monitor = monitor.name(), error = %err, "ledger append failed");
                    outcome = ActivityOutcome::Warn;
                    notes = format!("{notes}; ledger append failed: {err}");
                }

                let def = bundle.monitor_or_default(monitor.name());
                let request = DispatchRequest {
                    monitor: monitor.name().to_string(),
                    alerts: report.statuses.iter().map(to_alert).collect(),
                    channels: channel_flags(&def.notifications),
                    snooze_seconds: def.snooze_seconds,
                    global_snooze_seconds: bundle.global.global_snooze_seconds,
                    live: bundle.global.xcom_live,
                };
                let dispatched = self.dispatcher.dispatch(&request).await;
                summary.notifications += dispatched.sent_count();
                dispatches.push(json!({
                    "monitor": monitor.name(),
                    "channels": dispatched.channels,
                }));

                let details = json!({
                    "statuses": statuses,
                    "breaches": breaches,
                    "dispatch": dispatched.channels,
                });
                self.finish_phase(&mut summary, token, started, outcome, notes, details)
                    .await;
            }
        }

        if !dispatches.is_empty() {
            let record = json!({
                "cycle_id": cycle_id,
                "ts": now_iso(),
                "dispatches": dispatches,
            });
            if let Err(err) = self.vars.set(LAST_DISPATCH_VAR, &record).await {
                debug!(error = %err, "last_dispatch var not updated");
            }
        }

        if !summary.interrupted {
            let token = self.activity.begin(&cycle_id, "heartbeat", "Heartbeat");
            let started = Instant::now();
            let (outcome, notes) = match self.heartbeat.touch().await {
                Ok(()) => (ActivityOutcome::Ok, "heartbeat recorded".to_string()),
                Err(err) => {
                    warn!(cycle_id = %cycle_id, error = %err, "heartbeat touch failed");
                    (ActivityOutcome::Error, err.to_string())
                }
            };
            self.finish_phase(&mut summary, token, started, outcome, notes, Value::Null)
                .await;
        }

        if !summary.interrupted {
            let token = self.activity.begin(&cycle_id, "report", "Cycle summary");
            let started = Instant::now();
            let notes = format!(
                "{} statuses, {} breaches, {} notifications",
                summary.statuses, summary.breaches, summary.notifications
            );
            let details = json!({
                "statuses": summary.statuses,
                "breaches": summary.breaches,
                "notifications": summary.notifications,
                "phases": summary.phases.len(),
            });
            self.finish_phase(
                &mut summary,
                token,
                started,
                ActivityOutcome::Ok,
                notes,
                details,
            )
            .await;
        }

        summary.elapsed_ms = u64::try_from(cycle_start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            cycle_id = %summary.cycle_id,
            elapsed_ms = summary.elapsed_ms,
            statuses = summary.statuses,
            breaches = summary.breaches,
            notifications = summary.notifications,
            interrupted = summary.interrupted,
            "cycle complete"
        );
        summary
    }

    /// Drives cycles until the shutdown token is cancelled. A cycle that
    /// overruns the interval rolls straight into the next one.
    pub async fn run_forever(&self, interval_seconds: u64) {
        let interval = Duration::from_secs(interval_seconds.max(1));
        info!(interval_seconds = interval.as_secs(), "monitor engine starting");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let summary = self.run_once().await;
            if self.shutdown.is_cancelled() {
                break;
            }
            let sleep_for = interval.saturating_sub(Duration::from_millis(summary.elapsed_ms));
            if sleep_for.is_zero() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }
        info!("monitor engine stopped");
    }

    async fn finish_phase(
        &self,
        summary: &mut CycleSummary,
        token: ActivityToken,
        started: Instant,
        outcome: ActivityOutcome,
        notes: String,
        details: Value,
    ) {
        let phase = token.phase.clone();
        let label = token.label.clone();
        if let Err(err) = self.activity.finish(token, outcome, &notes, &details).await {
            warn!(phase = %phase, error = %err, "failed to record cycle activity");
        }
        summary.phases.push(PhaseOutcome {
            phase,
            label,
            outcome,
            notes,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
    }
}

fn to_alert(status: &BreachRecord) -> Alert {
    Alert {
        label: status.label.clone(),
        breach: status.is_breach(),
        value: status.value,
        unit: status.unit.clone(),
        threshold: status.threshold.as_ref().map(ThresholdSpec::render),
        source: status.source.clone(),
    }
}

fn channel_flags(notifications: &MonitorNotifications) -> ChannelFlags {
    ChannelFlags {
        system: notifications.system,
        voice: notifications.voice,
        sms: notifications.sms,
        tts: notifications.tts,
    }
}
