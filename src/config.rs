//! Bridge configuration.
//!
//! Configuration is supplied by whoever installs the bridge, either as a flat
//! string map (environment-style) or as a TOML document:
//!
//! ```toml
//! enabled = true
//! emit_timeout_millis = 5
//! diagnostic_context_key_prefix = "trace_"
//! module_name = "orders-log-bridge"
//! instrumented_targets = ["orders", "payments::gateway"]
//! follow_tracing_spans = true
//! xray_trace_key = "AWS-XRAY-TRACE-ID"
//! trace_level = "info"
//! ```
//!
//! Parsing never fails on a bad *value*. Bad values are kept as faults and
//! reported once by [`BridgeConfig::validate`] at install time, which also
//! swaps each of them for its default.

use crate::domain::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default hand-off timeout in milliseconds.
pub const DEFAULT_EMIT_TIMEOUT_MILLIS: u64 = 5;

/// Largest accepted hand-off timeout. Anything longer stalls logging threads.
pub const MAX_EMIT_TIMEOUT_MILLIS: u64 = 1000;

/// Default diagnostic-context key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "trace_";

/// Default instrumentation source name stamped on records.
pub const DEFAULT_MODULE_NAME: &str = "log-trace-bridge";

const TRACE_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Master switch. When `false` the bridge installs but passes every call
    /// through. Default: `true`
    pub enabled: bool,

    /// Longest time an application thread may wait on the pipeline per record.
    /// Default: `5`
    pub emit_timeout_millis: u64,

    /// Prefix of the diagnostic-context keys this module writes and claims.
    /// Default: `"trace_"`
    pub diagnostic_context_key_prefix: String,

    /// Instrumentation source name written into every record.
    /// Default: `"log-trace-bridge"`
    pub module_name: String,

    /// Logger targets to instrument, matched as `target == t` or
    /// `target` starting with `t::`. Empty means every target.
    pub instrumented_targets: Vec<String>,

    /// Fall back to the current `tracing` span's context when no carrier
    /// scope is open. Default: `true`
    pub follow_tracing_spans: bool,

    /// Extra diagnostic-context key that receives the X-Ray formatted trace id.
    pub xray_trace_key: Option<String>,

    /// Level filter for the bridge's own `tracing` output. Default: `"info"`
    pub trace_level: Option<String>,

    /// Raw values that failed to parse, reported by [`Self::validate`].
    #[serde(skip)]
    pub parse_faults: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            emit_timeout_millis: DEFAULT_EMIT_TIMEOUT_MILLIS,
            diagnostic_context_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            module_name: DEFAULT_MODULE_NAME.to_string(),
            instrumented_targets: Vec::new(),
            follow_tracing_spans: true,
            xray_trace_key: None,
            trace_level: None,
            parse_faults: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Parses configuration from a flat string map.
    ///
    /// # Parsing Rules
    ///
    /// - `enabled`, `follow_tracing_spans`: `true`/`false`/`1`/`0`/`yes`/`no`
    /// - `emit_timeout_millis`: unsigned integer
    /// - `instrumented_targets`: comma-separated, empty entries ignored
    /// - `diagnostic_context_key_prefix`, `module_name`, `xray_trace_key`,
    ///   `trace_level`: taken verbatim
    ///
    /// Unknown keys are ignored. Unparseable values keep the default and are
    /// remembered as faults.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use log_trace_bridge::BridgeConfig;
    ///
    /// let mut map = BTreeMap::new();
    /// map.insert("emit_timeout_millis".to_string(), "10".to_string());
    /// map.insert("instrumented_targets".to_string(), "orders, payments".to_string());
    ///
    /// let config = BridgeConfig::from_map(&map);
    /// assert_eq!(config.emit_timeout_millis, 10);
    /// assert_eq!(config.instrumented_targets, vec!["orders", "payments"]);
    /// ```
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = map.get("enabled") {
            match parse_bool(raw) {
                Some(v) => config.enabled = v,
                None => config.parse_faults.push(format!("enabled: `{raw}` is not a boolean")),
            }
        }

        if let Some(raw) = map.get("follow_tracing_spans") {
            match parse_bool(raw) {
                Some(v) => config.follow_tracing_spans = v,
                None => config
                    .parse_faults
                    .push(format!("follow_tracing_spans: `{raw}` is not a boolean")),
            }
        }

        if let Some(raw) = map.get("emit_timeout_millis") {
            match raw.trim().parse::<u64>() {
                Ok(v) => config.emit_timeout_millis = v,
                Err(_) => config
                    .parse_faults
                    .push(format!("emit_timeout_millis: `{raw}` is not an unsigned integer")),
            }
        }

        if let Some(raw) = map.get("instrumented_targets") {
            config.instrumented_targets = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(prefix) = map.get("diagnostic_context_key_prefix") {
            config.diagnostic_context_key_prefix = prefix.clone();
        }
        if let Some(name) = map.get("module_name") {
            config.module_name = name.clone();
        }
        config.xray_trace_key = map.get("xray_trace_key").cloned();
        config.trace_level = map.get("trace_level").cloned();

        config
    }

    /// Parses configuration from a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Toml`] if the document is not valid TOML or a
    /// value has the wrong type.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the file cannot be read, or
    /// [`BridgeError::Toml`] if it cannot be parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks every value, replacing each bad one with its default.
    ///
    /// Returns the corrected configuration and one
    /// [`BridgeError::Configuration`] per replaced value (parse faults
    /// included).
    #[must_use]
    pub fn validate(&self) -> (Self, Vec<BridgeError>) {
        let mut config = self.clone();
        let mut faults: Vec<BridgeError> = config
            .parse_faults
            .drain(..)
            .map(BridgeError::Configuration)
            .collect();

        if config.emit_timeout_millis == 0 || config.emit_timeout_millis > MAX_EMIT_TIMEOUT_MILLIS {
            faults.push(BridgeError::Configuration(format!(
                "emit_timeout_millis must be within 1..={MAX_EMIT_TIMEOUT_MILLIS}, got {}",
                config.emit_timeout_millis
            )));
            config.emit_timeout_millis = DEFAULT_EMIT_TIMEOUT_MILLIS;
        }

        if !is_valid_key(&config.diagnostic_context_key_prefix) {
            faults.push(BridgeError::Configuration(format!(
                "diagnostic_context_key_prefix `{}` must be non-empty and use [A-Za-z0-9_.-]",
                config.diagnostic_context_key_prefix
            )));
            config.diagnostic_context_key_prefix = DEFAULT_KEY_PREFIX.to_string();
        }

        if config.module_name.trim().is_empty() {
            faults.push(BridgeError::Configuration(
                "module_name must not be empty".to_string(),
            ));
            config.module_name = DEFAULT_MODULE_NAME.to_string();
        }

        if let Some(key) = &config.xray_trace_key {
            if !is_valid_key(key) {
                faults.push(BridgeError::Configuration(format!(
                    "xray_trace_key `{key}` must be non-empty and use [A-Za-z0-9_.-]"
                )));
                config.xray_trace_key = None;
            }
        }

        if let Some(level) = &config.trace_level {
            if !TRACE_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                faults.push(BridgeError::Configuration(format!(
                    "trace_level `{level}` is not one of {TRACE_LEVELS:?}"
                )));
                config.trace_level = None;
            }
        }

        (config, faults)
    }

    /// The hand-off timeout as a `Duration`.
    #[must_use]
    pub const fn emit_timeout(&self) -> Duration {
        Duration::from_millis(self.emit_timeout_millis)
    }

    /// Whether records from `target` should be instrumented.
    #[must_use]
    pub fn instruments(&self, target: &str) -> bool {
        self.instrumented_targets.is_empty()
            || self.instrumented_targets.iter().any(|t| {
                target == t
                    || target
                        .strip_prefix(t.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.enabled);
        assert_eq!(config.emit_timeout(), Duration::from_millis(5));
        assert_eq!(config.diagnostic_context_key_prefix, "trace_");
        assert!(config.validate().1.is_empty());
    }

    #[test]
    fn test_from_map_parses_values() {
        let config = BridgeConfig::from_map(&map(&[
            ("enabled", "no"),
            ("emit_timeout_millis", "12"),
            ("diagnostic_context_key_prefix", "otel_"),
            ("xray_trace_key", "AWS-XRAY-TRACE-ID"),
        ]));

        assert!(!config.enabled);
        assert_eq!(config.emit_timeout_millis, 12);
        assert_eq!(config.diagnostic_context_key_prefix, "otel_");
        assert_eq!(config.xray_trace_key.as_deref(), Some("AWS-XRAY-TRACE-ID"));
        assert!(config.validate().1.is_empty());
    }

    #[test]
    fn test_bad_values_become_faults_and_defaults() {
        let config = BridgeConfig::from_map(&map(&[
            ("enabled", "maybe"),
            ("emit_timeout_millis", "soon"),
            ("diagnostic_context_key_prefix", "has space"),
            ("trace_level", "loud"),
        ]));

        let (fixed, faults) = config.validate();
        assert_eq!(faults.len(), 4);
        assert!(faults
            .iter()
            .all(|f| matches!(f, BridgeError::Configuration(_))));
        assert!(fixed.enabled);
        assert_eq!(fixed.emit_timeout_millis, DEFAULT_EMIT_TIMEOUT_MILLIS);
        assert_eq!(fixed.diagnostic_context_key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(fixed.trace_level, None);
    }

    #[test]
    fn test_timeout_bounds() {
        let config = BridgeConfig {
            emit_timeout_millis: 0,
            ..BridgeConfig::default()
        };
        let (fixed, faults) = config.validate();
        assert_eq!(faults.len(), 1);
        assert_eq!(fixed.emit_timeout_millis, DEFAULT_EMIT_TIMEOUT_MILLIS);

        let config = BridgeConfig {
            emit_timeout_millis: MAX_EMIT_TIMEOUT_MILLIS + 1,
            ..BridgeConfig::default()
        };
        assert_eq!(config.validate().1.len(), 1);
    }

    #[test]
    fn test_from_toml() {
        let config = BridgeConfig::from_toml_str(
            r#"
            emit_timeout_millis = 3
            module_name = "orders-bridge"
            instrumented_targets = ["orders"]
            "#,
        )
        .unwrap();

        assert_eq!(config.emit_timeout_millis, 3);
        assert_eq!(config.module_name, "orders-bridge");
        assert!(config.follow_tracing_spans);
        assert!(BridgeConfig::from_toml_str("emit_timeout_millis = \"x\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "enabled = false\n").unwrap();

        assert!(!BridgeConfig::from_file(&path).unwrap().enabled);
        assert!(matches!(
            BridgeConfig::from_file(dir.path().join("missing.toml")),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn test_target_matching() {
        let config = BridgeConfig {
            instrumented_targets: vec!["orders".to_string()],
            ..BridgeConfig::default()
        };
        assert!(config.instruments("orders"));
        assert!(config.instruments("orders::db"));
        assert!(!config.instruments("ordersx"));
        assert!(!config.instruments("payments"));
        assert!(BridgeConfig::default().instruments("anything"));
    }
}
