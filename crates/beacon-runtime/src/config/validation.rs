//! Configuration validation.

use super::schema::BeaconConfig;
use crate::error::{ConfigError, ConfigResult};

/// Checks a loaded configuration for values the service cannot run with.
pub fn validate_config(config: &BeaconConfig) -> ConfigResult<()> {
    let name = &config.service.name;
    if name.is_empty() {
        return Err(ConfigError::Invalid(
            "service.name must not be empty".to_string(),
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!(
            "service.name must not contain whitespace: '{name}'"
        )));
    }
    if !name.contains('.') {
        return Err(ConfigError::Invalid(format!(
            "service.name must be a reverse-domain bus name: '{name}'"
        )));
    }

    if config.service.hub_socket.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(
            "service.hub_socket must not be empty".to_string(),
        ));
    }

    Ok(())
}
