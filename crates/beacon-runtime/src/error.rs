//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

use beacon_api::ApiError;
use beacon_core::TransportError;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the configuration file.
    #[error("failed to read configuration file: {0}")]
    Read(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("configuration parse error: {0}")]
    Parse(String),

    /// The configuration is structurally valid but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that end the service with a non-zero exit.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Could not create the background I/O runtime.
    #[error("failed to create I/O runtime: {0}")]
    RuntimeCreation(std::io::Error),

    /// Could not attach to the bus hub.
    #[error(transparent)]
    BusAttach(#[from] TransportError),

    /// The service monitor could not establish its locale subscription.
    #[error("failed to start service monitor: {0}")]
    Monitor(#[from] ApiError),

    /// The bus connection dropped while running.
    #[error("bus connection lost")]
    BusLost,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
