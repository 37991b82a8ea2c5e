//! Configuration schema.
//!
//! ```yaml
//! service:
//!   name: com.webos.service.beacon
//!   hub_socket: /var/run/beacon/hub.sock
//!   plugin_dir: /usr/lib/beacon/plugins
//!   localization_path: /usr/share/localization/beacon
//!
//! logging:
//!   level: debug
//!   format: pretty
//!   filters:
//!     beacon_core: trace
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BeaconConfig {
    /// Bus identity and filesystem environment of the service.
    pub service: ServiceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Bus identity and filesystem environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// The bus name this service registers under; prefixes every served
    /// method URL.
    pub name: String,

    /// Unix socket of the bus hub.
    pub hub_socket: PathBuf,

    /// Directory plugins are provisioned into.
    pub plugin_dir: PathBuf,

    /// Root of the localization resource bundles handed to plugins.
    pub localization_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "com.webos.service.beacon".to_string(),
            hub_socket: PathBuf::from("/var/run/beacon/hub.sock"),
            plugin_dir: PathBuf::from("/usr/lib/beacon/plugins"),
            localization_path: PathBuf::from("/usr/share/localization/beacon"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level.
    pub level: LogLevel,

    /// Output format.
    pub format: LogFormat,

    /// Output target.
    pub output: LogOutput,

    /// Per-module level overrides, e.g. `beacon_core: trace`.
    pub filters: HashMap<String, LogLevel>,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BeaconConfig::default();
        assert_eq!(config.service.name, "com.webos.service.beacon");
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: BeaconConfig = serde_yaml::from_str("logging:\n  level: debug\n").unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.service.name, "com.webos.service.beacon");
    }
}
