//! Monitor configuration system.
//!
//! This module provides:
//! - Typed config records (global settings, per-monitor definitions)
//! - Shape normalization for both accepted file layouts
//! - Lenient scalar coercion for hand-edited values
//! - A config store with forced reload and atomic bundle swap

mod builder;
mod bundle;
pub(crate) mod coerce;
mod store;

pub use builder::build_bundle;
pub use bundle::{
    MonitorConfigBundle, MonitorDefinition, MonitorGlobalConfig, MonitorNotifications,
    KNOWN_MONITORS,
};
pub use store::{ConfigStore, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
