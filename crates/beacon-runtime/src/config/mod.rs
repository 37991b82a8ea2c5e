//! Configuration for the beacon service.
//!
//! YAML-based, with environment-variable expansion and a validation pass.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{BeaconConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ServiceConfig};
pub use validation::validate_config;

pub use crate::error::{ConfigError, ConfigResult};
