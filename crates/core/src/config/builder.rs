//! Raw JSON to [`MonitorConfigBundle`] normalization.
//!
//! Two on-disk shapes are accepted:
//!
//! * normalized: `{"global": {...}, "monitors": {"liquid": {...}}}`
//! * legacy flat: `{"monitor": {"enabled": {...}, ...}, "liquid": {...},
//!   "liquid_monitor": {...}}` where `<name>_monitor` blocks mirror the
//!   primary `<name>` block and lose on key conflicts.
//!
//! Both shapes funnel into the same typed bundle. Parsing never fails;
//! unusable nodes degrade to defaults.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::{Map, Value};

use super::bundle::{
    MonitorConfigBundle, MonitorDefinition, MonitorGlobalConfig, MonitorNotifications,
    KNOWN_MONITORS,
};
use super::coerce::{coerce_bool, coerce_u64};

/// Keys of a monitor block that are settings, not monitor params.
const RESERVED_KEYS: &[&str] = &["enabled", "notifications", "snooze_seconds"];

pub fn build_bundle(raw: &Value, source_path: Option<PathBuf>) -> MonitorConfigBundle {
    let mut bundle = MonitorConfigBundle {
        raw: raw.clone(),
        source_path,
        ..MonitorConfigBundle::default()
    };

    let Some(root) = raw.as_object() else {
        seed_known(&mut bundle);
        return bundle;
    };

    if root.contains_key("global") || root.contains_key("monitors") {
        parse_normalized(root, &mut bundle);
    } else {
        parse_legacy(root, &mut bundle);
    }
    seed_known(&mut bundle);
    bundle
}

fn seed_known(bundle: &mut MonitorConfigBundle) {
    for name in KNOWN_MONITORS {
        bundle
            .monitors
            .entry((*name).to_string())
            .or_insert_with(|| MonitorDefinition::defaults(name));
    }
}

fn parse_normalized(root: &Map<String, Value>, bundle: &mut MonitorConfigBundle) {
    bundle.global = parse_global(root.get("global"));

    let Some(monitors) = root.get("monitors").and_then(Value::as_object) else {
        return;
    };
    for (name, node) in monitors {
        let mut def = MonitorDefinition::defaults(name);
        if let Some(obj) = node.as_object() {
            def.enabled = coerce_bool(obj.get("enabled"), true);
            def.notifications = parse_notifications(obj.get("notifications"));
            def.snooze_seconds = coerce_u64(obj.get("snooze_seconds"));
            if let Some(params) = obj.get("params").and_then(Value::as_object) {
                def.params = params.clone();
            }
        }
        bundle.monitors.insert(name.clone(), def);
    }
}

fn parse_legacy(root: &Map<String, Value>, bundle: &mut MonitorConfigBundle) {
    let monitor_block = root.get("monitor").and_then(Value::as_object);
    bundle.global = parse_global(root.get("monitor"));

    let enabled_map = monitor_block
        .and_then(|block| block.get("enabled"))
        .and_then(Value::as_object);

    let mut candidates: BTreeSet<String> =
        KNOWN_MONITORS.iter().map(|name| (*name).to_string()).collect();
    if let Some(enabled) = enabled_map {
        candidates.extend(enabled.keys().cloned());
    }

    for name in candidates {
        let primary = root.get(&name).and_then(Value::as_object);
        let mirror = root
            .get(&format!("{name}_monitor"))
            .and_then(Value::as_object);

        // Shallow merge; a key in the primary block shadows the mirror's
        // whole value for that key.
        let mut merged = Map::new();
        if let Some(mirror) = mirror {
            merged.extend(mirror.clone());
        }
        if let Some(primary) = primary {
            merged.extend(primary.clone());
        }

        let mut def = MonitorDefinition::defaults(&name);
        def.enabled = match enabled_map.and_then(|m| m.get(name.as_str())) {
            Some(flag) => coerce_bool(Some(flag), true),
            None => coerce_bool(merged.get("enabled"), true),
        };
        def.notifications = parse_notifications(merged.get("notifications"));
        def.snooze_seconds = coerce_u64(merged.get("snooze_seconds"));
        def.params = merged
            .into_iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .collect();
        bundle.monitors.insert(name, def);
    }
}

fn parse_global(node: Option<&Value>) -> MonitorGlobalConfig {
    let mut global = MonitorGlobalConfig::default();
    let Some(obj) = node.and_then(Value::as_object) else {
        return global;
    };
    global.loop_seconds = coerce_u64(obj.get("loop_seconds"))
        .filter(|secs| *secs > 0)
        .unwrap_or(global.loop_seconds);
    global.global_snooze_seconds = coerce_u64(obj.get("global_snooze_seconds"))
        .or_else(|| coerce_u64(obj.get("snooze_seconds")));
    global.xcom_live = coerce_bool(obj.get("xcom_live"), global.xcom_live);
    global
}

fn parse_notifications(node: Option<&Value>) -> MonitorNotifications {
    let mut flags = MonitorNotifications::default();
    let Some(obj) = node.and_then(Value::as_object) else {
        return flags;
    };
    flags.system = coerce_bool(obj.get("system"), flags.system);
    flags.voice = coerce_bool(obj.get("voice"), flags.voice);
    flags.sms = coerce_bool(obj.get("sms"), flags.sms);
    flags.tts = coerce_bool(obj.get("tts"), flags.tts);
    flags
}
