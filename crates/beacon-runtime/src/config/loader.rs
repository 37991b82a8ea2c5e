//! Configuration file loader.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::schema::BeaconConfig;
use super::validation::validate_config;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with support for multiple search paths.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a new configuration loader with no search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Adds a search path for configuration files.
    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.add_search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the system config directory (`/etc/beacon`) to search paths.
    pub fn with_system_config_dir(self) -> Self {
        self.add_search_path("/etc/beacon")
    }

    /// Adds the user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.add_search_path(config_dir.join("beacon"))
        } else {
            self
        }
    }

    /// Loads configuration from the first available source, falling back to
    /// defaults when no file is found.
    pub fn load(&self) -> ConfigResult<BeaconConfig> {
        if let Some(path) = self.find_config_file() {
            return self.load_from_file(&path);
        }

        info!("No configuration file found, using defaults");
        Ok(BeaconConfig::default())
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<BeaconConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        self.load_from_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<BeaconConfig> {
        let expanded = expand_env_vars(yaml);
        let config: BeaconConfig = serde_yaml::from_str(&expanded)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Finds the first available configuration file.
    fn find_config_file(&self) -> Option<PathBuf> {
        const CONFIG_NAMES: &[&str] = &["beacon.yaml", "beacon.yml", ".beacon.yaml"];

        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                debug!("Checking for config file: {}", path.display());
                if path.exists() {
                    info!("Found configuration file: {}", path.display());
                    return Some(path);
                }
            }
        }

        None
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
            .with_current_dir()
            .with_user_config_dir()
            .with_system_config_dir()
    }
}

/// Expands environment variables in the format `${VAR}` or `${VAR:-default}`.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-([^}]*))?\}").unwrap();

    for capture in re.captures_iter(content) {
        let full_match = capture.get(0).unwrap().as_str();
        let var_name = capture.get(1).unwrap().as_str();
        let default_value = capture.get(3).map(|m| m.as_str());

        let value = std::env::var(var_name)
            .ok()
            .or_else(|| default_value.map(String::from))
            .unwrap_or_default();

        result = result.replace(full_match, &value);
    }

    result
}

/// Convenience function to load configuration with default search paths.
pub fn load_config() -> ConfigResult<BeaconConfig> {
    ConfigLoader::default().load()
}

/// Convenience function to load configuration from a specific file.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<BeaconConfig> {
    ConfigLoader::new().load_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;

    #[test]
    fn test_parse_empty_yaml_yields_defaults() {
        let loader = ConfigLoader::new();
        let config = loader.load_from_str("").unwrap();
        assert_eq!(config.service.name, "com.webos.service.beacon");
    }

    #[test]
    fn test_parse_minimal_config() {
        let yaml = "
logging:
  level: debug
";
        let loader = ConfigLoader::new();
        let config = loader.load_from_str(yaml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: tests in this module do not race on this variable.
        unsafe { std::env::set_var("BEACON_TEST_SOCKET", "/tmp/hub.sock") };
        let yaml = "
service:
  hub_socket: ${BEACON_TEST_SOCKET}
";
        let config = ConfigLoader::new().load_from_str(yaml).unwrap();
        assert_eq!(
            config.service.hub_socket,
            std::path::PathBuf::from("/tmp/hub.sock")
        );
        // SAFETY: see above.
        unsafe { std::env::remove_var("BEACON_TEST_SOCKET") };
    }

    #[test]
    fn test_env_var_default_value() {
        let yaml = "
service:
  name: ${BEACON_NO_SUCH_VAR:-com.example.monitor}
";
        let config = ConfigLoader::new().load_from_str(yaml).unwrap();
        assert_eq!(config.service.name, "com.example.monitor");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = ConfigLoader::new();
        let result = loader.load_from_file("/nonexistent/beacon.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
