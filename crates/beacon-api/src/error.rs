//! Error types shared between the service and its plugins.

use thiserror::Error;

/// Errors surfaced to plugins by [`Manager`](crate::Manager) operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// A bus call could not be issued or dispatched.
    #[error("bus transport failure: {0}")]
    Transport(String),

    /// A checked subscription was rejected: the acknowledgement reply was
    /// missing, unparseable, or carried `returnValue: false`.
    #[error("subscription rejected: {0}")]
    SubscriptionRejected(String),

    /// The operation violates plugin policy: subscribing to a service outside
    /// the declared required list, registering a method owned by another
    /// plugin, or a malformed category/name/URL.
    #[error("policy violation: {0}")]
    Policy(String),

    /// The notification service refused the request or returned an unusable
    /// response.
    #[error("notification failure: {0}")]
    Notification(String),
}

/// Result type for [`Manager`](crate::Manager) operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error type returned by plugin code.
///
/// Any `Err` escaping a plugin entry point or timer callback is logged with
/// the plugin's identity and marks the plugin for unload.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PluginError(pub String);

impl PluginError {
    /// Creates a plugin error from any displayable value.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ApiError> for PluginError {
    fn from(err: ApiError) -> Self {
        Self(err.to_string())
    }
}

/// Result type for plugin entry points.
pub type PluginResult<T> = Result<T, PluginError>;
