//! Effective-threshold resolution across layered sources.
//!
//! A threshold can live in the config file (several legacy aliases), in an
//! environment variable, or in the runtime var store. The file wins, then
//! the environment, then the store. Every hit is recorded in a trace so a
//! cycle's ledger entry shows exactly why a threshold took the value it
//! did.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::coerce::coerce_f64;
use crate::config::MonitorConfigBundle;

/// One probed alias that was present in its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceCandidate {
    /// `file`, `env` or `store`.
    pub source: &'static str,
    /// The alias that hit: a dotted config path, an env var name, or a
    /// store key.
    pub key: String,
    pub value: Value,
    pub used: bool,
}

/// Resolution result: the winning numeric value plus the full trace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolved {
    pub value: Option<f64>,
    pub trace: Vec<TraceCandidate>,
}

impl Resolved {
    pub fn or_default(&self, default: f64) -> f64 {
        self.value.unwrap_or(default)
    }
}

/// Bound to one cycle's config bundle and one snapshot of runtime vars.
#[derive(Debug)]
pub struct ThresholdResolver {
    bundle: Arc<MonitorConfigBundle>,
    store_vars: HashMap<String, Value>,
}

impl ThresholdResolver {
    pub fn new(bundle: Arc<MonitorConfigBundle>, store_vars: HashMap<String, Value>) -> Self {
        Self { bundle, store_vars }
    }

    /// Resolves `<monitor>`'s threshold for one asset.
    pub fn asset_threshold(&self, monitor: &str, asset: &str) -> Resolved {
        let mirror = format!("{monitor}_monitor");
        let mut probe = Probe::new(self);

        for base in [
            vec!["monitors", monitor, "params", "thresholds"],
            vec![monitor, "thresholds"],
            vec![mirror.as_str(), "thresholds"],
        ] {
            for spelling in asset_spellings(asset) {
                let mut path = base.clone();
                path.push(spelling.as_str());
                probe.file(&path);
            }
        }

        probe.env(&format!(
            "{}_THRESHOLD_{}",
            monitor.to_uppercase(),
            asset.to_uppercase()
        ));

        let lower = asset.to_lowercase();
        let upper = asset.to_uppercase();
        probe.store(&format!("{monitor}_threshold_{lower}"));
        if upper != lower {
            probe.store(&format!("{monitor}_threshold_{upper}"));
        }
        probe.store(&format!("{monitor}_threshold"));

        probe.finish()
    }

    /// Resolves a named numeric parameter of one monitor.
    pub fn param(&self, monitor: &str, key: &str) -> Resolved {
        let mirror = format!("{monitor}_monitor");
        let mut probe = Probe::new(self);

        probe.file(&["monitors", monitor, "params", key]);
        probe.file(&[monitor, key]);
        probe.file(&[mirror.as_str(), key]);

        probe.env(&format!(
            "{}_{}",
            monitor.to_uppercase(),
            key.to_uppercase()
        ));

        probe.store(&format!("{monitor}_{key}"));

        probe.finish()
    }
}

fn asset_spellings(asset: &str) -> Vec<String> {
    let mut spellings = vec![asset.to_string()];
    let upper = asset.to_uppercase();
    if upper != asset {
        spellings.push(upper);
    }
    spellings
}

fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

/// Accumulates hits in priority order; the first numeric hit wins.
struct Probe<'a> {
    resolver: &'a ThresholdResolver,
    selected: Option<f64>,
    trace: Vec<TraceCandidate>,
}

impl<'a> Probe<'a> {
    fn new(resolver: &'a ThresholdResolver) -> Self {
        Self {
            resolver,
            selected: None,
            trace: Vec::new(),
        }
    }

    fn file(&mut self, path: &[&str]) {
        if let Some(value) = lookup(&self.resolver.bundle.raw, path) {
            self.record("file", path.join("."), value.clone());
        }
    }

    fn env(&mut self, name: &str) {
        if let Ok(raw) = std::env::var(name) {
            self.record("env", name.to_string(), Value::String(raw));
        }
    }

    fn store(&mut self, key: &str) {
        if let Some(value) = self.resolver.store_vars.get(key) {
            self.record("store", key.to_string(), value.clone());
        }
    }

    fn record(&mut self, source: &'static str, key: String, value: Value) {
        let numeric = coerce_f64(&value);
        let used = self.selected.is_none() && numeric.is_some();
        if used {
            self.selected = numeric;
        }
        self.trace.push(TraceCandidate {
            source,
            key,
            value,
            used,
        });
    }

    fn finish(self) -> Resolved {
        Resolved {
            value: self.selected,
            trace: self.trace,
        }
    }
}
