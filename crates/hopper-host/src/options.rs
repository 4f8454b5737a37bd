use crate::error::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

pub const KEY_AUTO_UPCAST: &str = "hopper.autoUpcast";
pub const KEY_NORMALCASE_THRESHOLD: &str = "hopper.normalcaseThreshold";
pub const KEY_OPTIONAL_THRESHOLD: &str = "hopper.optionalThreshold";
pub const KEY_RUNTIME_LIBRARY: &str = "hopper.runTimeLibrary";
pub const KEY_PARTITION_SIZE: &str = "hopper.partitionSize";
pub const KEY_CSV_MAX_DETECTION_ROWS: &str = "hopper.csv.maxDetectionRows";

/// Key/value option store for a context.
///
/// Everything is kept as strings, like the configuration files it is loaded
/// from; the typed accessors parse on demand and fall back to the default
/// when a value does not parse.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    store: BTreeMap<String, String>,
}

impl ContextOptions {
    /// The built-in defaults.
    pub fn defaults() -> ContextOptions {
        let mut store = BTreeMap::new();
        store.insert(KEY_AUTO_UPCAST.to_string(), "false".to_string());
        store.insert(KEY_NORMALCASE_THRESHOLD.to_string(), "0.9".to_string());
        store.insert(KEY_OPTIONAL_THRESHOLD.to_string(), "0.9".to_string());
        store.insert(KEY_RUNTIME_LIBRARY.to_string(), String::new());
        store.insert(KEY_PARTITION_SIZE.to_string(), "1MB".to_string());
        store.insert(KEY_CSV_MAX_DETECTION_ROWS.to_string(), "100".to_string());
        ContextOptions { store }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.store.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.store.insert(key.into(), value.into());
    }

    /// Snapshot of the whole store.
    pub fn store(&self) -> &BTreeMap<String, String> {
        &self.store
    }

    /// Apply overrides from a JSON dictionary. Keys are accepted either in
    /// full or without the `hopper.` prefix; anything else is not an option
    /// of this engine and only produces a warning.
    pub fn update_from_json(&mut self, options: &str) -> Result<()> {
        if options.trim().is_empty() {
            return Ok(());
        }
        let parsed: BTreeMap<String, Value> = serde_json::from_str(options)?;
        let defaults = ContextOptions::defaults();
        for (key, value) in parsed {
            let value = json_value_to_string(&value);
            if defaults.contains_key(&key) {
                self.set(key, value);
            } else {
                let prefixed = format!("hopper.{}", key);
                if defaults.contains_key(&prefixed) {
                    self.set(prefixed, value);
                } else {
                    warn!(
                        "key '{}' with value '{}' is not a valid option, ignoring it",
                        key, value
                    );
                }
            }
        }
        Ok(())
    }

    /// Whether encoders may widen bools and ints into wider numeric slots.
    pub fn auto_upcast_numbers(&self) -> bool {
        self.parse_or_default(KEY_AUTO_UPCAST, false)
    }

    /// Acceptance ratio for mapping keys in the column projector.
    pub fn normalcase_threshold(&self) -> f64 {
        self.parse_or_default(KEY_NORMALCASE_THRESHOLD, 0.9)
    }

    /// Band parameter for option lifting in the inferencer.
    pub fn optional_threshold(&self) -> f64 {
        self.parse_or_default(KEY_OPTIONAL_THRESHOLD, 0.9)
    }

    /// Path of the runtime library validated at context startup.
    pub fn runtime_library(&self) -> PathBuf {
        PathBuf::from(self.get(KEY_RUNTIME_LIBRARY).unwrap_or_default())
    }

    /// Default partition payload size for the driver.
    pub fn partition_size(&self) -> usize {
        self.get(KEY_PARTITION_SIZE)
            .and_then(crate::util::parse_size)
            .unwrap_or(hopper_core::DEFAULT_PARTITION_SIZE)
    }

    /// Upper bound on rows the csv reader samples while detecting types.
    pub fn csv_max_detection_rows(&self) -> usize {
        self.parse_or_default(KEY_CSV_MAX_DETECTION_ROWS, 100)
    }

    fn parse_or_default<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self::defaults()
    }
}

fn json_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
