use crate::alerts::DEFAULT_CACHE_TIMEOUT_SECS;
use crate::importer::DEFAULT_GAP_MINUTES;
use crate::model::AlertRule;
use anyhow::{Context, Result};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_LOG_FILE_PATH: &str = "logs/telemetry_sentinel.log";

/// Process settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_file_path: String,
    pub trip_gap_minutes: u32,
    pub alert_cache_timeout_secs: i64,
    pub skip_invalid_rows: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_file_path: DEFAULT_LOG_FILE_PATH.to_string(),
            trip_gap_minutes: DEFAULT_GAP_MINUTES,
            alert_cache_timeout_secs: DEFAULT_CACHE_TIMEOUT_SECS,
            skip_invalid_rows: true,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Unset keys and values that do
    /// not parse keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            log_file_path: lookup("LOG_FILE_PATH").unwrap_or(defaults.log_file_path),
            trip_gap_minutes: parse_or(&lookup, "TRIP_GAP_MINUTES", defaults.trip_gap_minutes),
            alert_cache_timeout_secs: parse_or(
                &lookup,
                "ALERT_CACHE_TIMEOUT_SECS",
                defaults.alert_cache_timeout_secs,
            ),
            skip_invalid_rows: parse_or(&lookup, "SKIP_INVALID_ROWS", defaults.skip_invalid_rows),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, ?default, "Invalid setting, using default");
            default
        }
    }
}

/// Operator-supplied alert rules.
///
/// Stored as a JSON array on disk:
/// ```json
/// [
///   { "id": 1, "parameter": "coolant_temp", "condition": ">", "threshold": 95,
///     "severity": "high", "message_template": "Coolant at {value}" }
/// ]
/// ```
pub struct RuleConfig {
    rules: Vec<AlertRule>,
}

impl RuleConfig {
    /// Loads the rules from a JSON file at `path`.
    ///
    /// The file must hold a JSON array. Entries that do not describe a valid
    /// rule are logged and skipped.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading rules file {path}"))?;
        let entries: Vec<Value> = serde_json::from_str(&content)
            .with_context(|| format!("parsing rules file {path}"))?;

        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            let rule_id = entry.get("id").cloned();
            match serde_json::from_value::<AlertRule>(entry) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(path, ?rule_id, error = %e, "Skipping invalid alert rule"),
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<AlertRule> {
        self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comparator, Field, Severity};
    use std::collections::HashMap;
    use std::env;
    use std::fs;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.log_file_path, DEFAULT_LOG_FILE_PATH);
    }

    #[test]
    fn test_values_are_read() {
        let settings = Settings::from_lookup(lookup(&[
            ("LOG_FILE_PATH", "/tmp/x.log"),
            ("TRIP_GAP_MINUTES", "45"),
            ("ALERT_CACHE_TIMEOUT_SECS", "60"),
            ("SKIP_INVALID_ROWS", "false"),
        ]));
        assert_eq!(settings.log_file_path, "/tmp/x.log");
        assert_eq!(settings.trip_gap_minutes, 45);
        assert_eq!(settings.alert_cache_timeout_secs, 60);
        assert!(!settings.skip_invalid_rows);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let settings = Settings::from_lookup(lookup(&[
            ("TRIP_GAP_MINUTES", "half an hour"),
            ("ALERT_CACHE_TIMEOUT_SECS", "-"),
        ]));
        assert_eq!(settings.trip_gap_minutes, 30);
        assert_eq!(settings.alert_cache_timeout_secs, 300);
    }

    #[test]
    fn test_rule_config_load() {
        let path = env::temp_dir().join("telemetry_sentinel_rules.json");
        fs::write(
            &path,
            r#"[{"id": 4, "parameter": "rpm", "condition": ">=", "threshold": 6000, "severity": "critical"}]"#,
        )
        .unwrap();

        let config = RuleConfig::load(path.to_str().unwrap()).unwrap();
        let rule = &config.rules()[0];
        assert_eq!(rule.parameter, Field::Rpm);
        assert_eq!(rule.comparator, Comparator::Ge);
        assert_eq!(rule.severity, Severity::Critical);
        assert!(rule.enabled);
        assert!(rule.vehicle_id.is_none());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rule_config_skips_invalid_rule() {
        let path = env::temp_dir().join("telemetry_sentinel_rules_mixed.json");
        fs::write(
            &path,
            r#"[
                {"id": 1, "parameter": "coolant_temp", "condition": ">", "threshold": 95, "severity": "high"},
                {"id": 2, "parameter": "rpm", "condition": "=>", "threshold": 6000, "severity": "high"}
            ]"#,
        )
        .unwrap();

        let config = RuleConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.rules().len(), 1);
        assert_eq!(config.rules()[0].id, 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rule_config_rejects_non_array() {
        let path = env::temp_dir().join("telemetry_sentinel_rules_object.json");
        fs::write(&path, r#"{"id": 1}"#).unwrap();
        assert!(RuleConfig::load(path.to_str().unwrap()).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rule_config_missing_file() {
        assert!(RuleConfig::load("/nonexistent/rules.json").is_err());
    }
}
