//! Config file loading with cached, atomically swapped bundles.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::builder::build_bundle;
use super::bundle::MonitorConfigBundle;

pub const CONFIG_PATH_ENV: &str = "SONIC_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "sonic_monitor.json";

/// Owns the config file path and the currently active bundle.
///
/// Readers get an `Arc` snapshot; [`ConfigStore::reload`] builds a new
/// bundle off to the side and swaps it in whole, so concurrent readers
/// always see either the old or the new config, never a mix.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Option<Arc<MonitorConfigBundle>>>,
}

impl ConfigStore {
    /// Explicit path wins, then `SONIC_CONFIG_PATH`, then the default
    /// file next to the working directory.
    pub fn new(path: Option<PathBuf>) -> Self {
        let path = path
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self {
            path,
            current: RwLock::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Active bundle, loading the file on first access.
    pub fn current(&self) -> Arc<MonitorConfigBundle> {
        self.reload(false)
    }

    /// Returns the cached bundle, or rebuilds from disk when `force` is
    /// set or nothing is cached yet.
    pub fn reload(&self, force: bool) -> Arc<MonitorConfigBundle> {
        if !force {
            if let Some(bundle) = self.current.read().as_ref() {
                return Arc::clone(bundle);
            }
        }
        let (raw, loaded) = self.load_raw();
        let source_path = loaded.then(|| self.path.clone());
        let bundle = Arc::new(build_bundle(&raw, source_path));
        *self.current.write() = Some(Arc::clone(&bundle));
        bundle
    }

    /// Reads and parses the file. A missing or unparsable file degrades
    /// to an empty object so monitoring keeps running on defaults.
    fn load_raw(&self) -> (Value, bool) {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "config file unreadable, using defaults");
                return (Value::Object(Map::new()), false);
            }
        };
        match serde_json::from_str(&text) {
            Ok(raw) => (raw, true),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "config file is not valid JSON, using defaults");
                (Value::Object(Map::new()), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("sonic_monitor.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_file_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(Some(dir.path().join("absent.json")));
        let bundle = store.current();
        assert_eq!(bundle.global.loop_seconds, 30);
        assert!(bundle.source_path.is_none());
    }

    #[test]
    fn invalid_json_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "{not json");
        let store = ConfigStore::new(Some(path));
        let bundle = store.current();
        assert!(bundle.monitors.contains_key("liquid"));
        assert!(bundle.source_path.is_none());
    }

    #[test]
    fn identical_file_reloads_to_equal_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"{"global": {"loop_seconds": 5}, "monitors": {"liquid": {"params": {"thresholds": {"BTC": 5}}}}}"#,
        );
        let store = ConfigStore::new(Some(path.clone()));
        let first = store.reload(true);
        let second = store.reload(true);
        assert_eq!(*first, *second);
        assert_eq!(first.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn unforced_reload_serves_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, r#"{"global": {"loop_seconds": 7}}"#);
        let store = ConfigStore::new(Some(path.clone()));
        let first = store.current();
        assert_eq!(first.global.loop_seconds, 7);

        write_config(&dir, r#"{"global": {"loop_seconds": 8}}"#);
        assert_eq!(store.reload(false).global.loop_seconds, 7);
        assert_eq!(store.reload(true).global.loop_seconds, 8);
    }
}
