//! String key/value settings consumed by the discovery engine.
//!
//! Keys are dotted (`network.scan-range`). Values are always strings; callers
//! parse them and fall back to their own defaults on garbage.

use std::collections::HashMap;
use std::sync::RwLock;

pub const SCAN_RANGE: &str = "network.scan-range";
pub const SCANNER_TOOL: &str = "network.scanner-tool";
pub const SCAN_TIMEOUT: &str = "network.scan-timeout";
pub const SCHEDULER_ENABLED: &str = "scheduler.enabled";

/// Read-only view over application settings.
pub trait Settings: Send + Sync {
    fn get(&self, key: &str, default: &str) -> String;
}

/// Mutable in-process settings.
#[derive(Debug, Default)]
pub struct MapSettings {
    values: RwLock<HashMap<String, String>>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

impl Settings for MapSettings {
    fn get(&self, key: &str, default: &str) -> String {
        self.values
            .read()
            .ok()
            .and_then(|v| v.get(key).cloned())
            .unwrap_or_else(|| default.to_string())
    }
}

/// Settings loaded once from the `[settings]` table of a `config::Config`.
///
/// Both nested tables (`[settings.network] scan-range = ...`) and quoted
/// dotted keys (`"network.scan-range" = ...`) are flattened to dotted keys.
#[derive(Debug, Default, Clone)]
pub struct ConfigSettings {
    values: HashMap<String, String>,
}

impl ConfigSettings {
    pub fn from_config(cfg: &config::Config) -> Self {
        let mut values = HashMap::new();
        if let Ok(table) = cfg.get_table("settings") {
            for (key, value) in table {
                flatten(&key, value, &mut values);
            }
        }
        tracing::debug!(keys = values.len(), "Loaded settings");
        Self { values }
    }
}

fn flatten(prefix: &str, value: config::Value, out: &mut HashMap<String, String>) {
    match value.clone().into_table() {
        Ok(table) => {
            for (key, nested) in table {
                flatten(&format!("{prefix}.{key}"), nested, out);
            }
        }
        Err(_) => {
            if let Ok(s) = value.into_string() {
                out.insert(prefix.to_string(), s);
            }
        }
    }
}

impl Settings for ConfigSettings {
    fn get(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_settings_falls_back_to_default() {
        let settings = MapSettings::new().with(SCAN_RANGE, "10.0.0.0/24");
        assert_eq!(settings.get(SCAN_RANGE, "192.168.1.0/24"), "10.0.0.0/24");
        assert_eq!(settings.get(SCANNER_TOOL, "arp-scan"), "arp-scan");
    }

    #[test]
    fn config_settings_flattens_nested_tables() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
[settings.network]
scan-range = "10.1.0.0/16"
scan-timeout = 60

[settings.scheduler]
enabled = false
"#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let settings = ConfigSettings::from_config(&cfg);
        assert_eq!(settings.get(SCAN_RANGE, ""), "10.1.0.0/16");
        assert_eq!(settings.get(SCAN_TIMEOUT, "120"), "60");
        assert_eq!(settings.get(SCHEDULER_ENABLED, "true"), "false");
        assert_eq!(settings.get(SCANNER_TOOL, "arp-scan"), "arp-scan");
    }

    #[test]
    fn missing_settings_table_is_empty() {
        let cfg = config::Config::builder().build().unwrap();
        let settings = ConfigSettings::from_config(&cfg);
        assert_eq!(settings.get(SCAN_RANGE, "192.168.1.0/24"), "192.168.1.0/24");
    }
}
