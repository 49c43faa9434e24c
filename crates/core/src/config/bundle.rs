//! Typed monitor configuration.
//!
//! A [`MonitorConfigBundle`] is the parsed, immutable view of one config
//! read. The engine swaps in a fresh bundle at the top of every cycle, so
//! a cycle never observes a half-applied edit.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Monitors every deployment is expected to know about, present in the
/// bundle even when the file never mentions them.
pub const KNOWN_MONITORS: &[&str] = &["positions", "prices", "liquid", "profit", "market", "blast"];

fn default_true() -> bool {
    true
}

fn default_loop_seconds() -> u64 {
    30
}

/// Per-monitor notification channel switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorNotifications {
    #[serde(default = "default_true")]
    pub system: bool,
    #[serde(default)]
    pub voice: bool,
    #[serde(default)]
    pub sms: bool,
    #[serde(default)]
    pub tts: bool,
}

impl Default for MonitorNotifications {
    fn default() -> Self {
        Self {
            system: true,
            voice: false,
            sms: false,
            tts: false,
        }
    }
}

/// One monitor's settings after shape normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorDefinition {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub notifications: MonitorNotifications,
    #[serde(default)]
    pub snooze_seconds: Option<u64>,
    /// Monitor-specific knobs (threshold maps, blast radii, window
    /// settings) kept as raw JSON for the resolver to probe.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl MonitorDefinition {
    /// Definition for a monitor the config never mentions.
    pub fn defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            notifications: MonitorNotifications::default(),
            snooze_seconds: None,
            params: Map::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorGlobalConfig {
    #[serde(default = "default_loop_seconds")]
    pub loop_seconds: u64,
    #[serde(default)]
    pub global_snooze_seconds: Option<u64>,
    /// Master switch for external notification channels. Off means voice,
    /// sms and tts are skipped everywhere regardless of per-monitor flags.
    #[serde(default)]
    pub xcom_live: bool,
}

impl Default for MonitorGlobalConfig {
    fn default() -> Self {
        Self {
            loop_seconds: 30,
            global_snooze_seconds: None,
            xcom_live: false,
        }
    }
}

/// Fully parsed configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorConfigBundle {
    pub global: MonitorGlobalConfig,
    pub monitors: BTreeMap<String, MonitorDefinition>,
    /// The JSON the bundle was built from, kept verbatim so threshold
    /// resolution can probe aliases the typed view flattened away.
    pub raw: Value,
    pub source_path: Option<PathBuf>,
}

impl Default for MonitorConfigBundle {
    fn default() -> Self {
        Self {
            global: MonitorGlobalConfig::default(),
            monitors: BTreeMap::new(),
            raw: Value::Object(Map::new()),
            source_path: None,
        }
    }
}

impl MonitorConfigBundle {
    pub fn get_monitor(&self, name: &str) -> Option<&MonitorDefinition> {
        self.monitors.get(name)
    }

    /// Definition for `name`, falling back to defaults when the config
    /// never mentions it. Unknown monitors run with stock settings.
    pub fn monitor_or_default(&self, name: &str) -> MonitorDefinition {
        self.monitors
            .get(name)
            .cloned()
            .unwrap_or_else(|| MonitorDefinition::defaults(name))
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.monitors.get(name).map(|m| m.enabled).unwrap_or(true)
    }

    pub fn list_monitors(&self) -> Vec<String> {
        self.monitors.keys().cloned().collect()
    }
}
