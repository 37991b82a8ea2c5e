//! Well-known bus addresses consumed by the service.

/// Settings service: system settings, streamed. Queried with
/// `{"keys": ["localeInfo"]}` for locale tracking.
pub const SETTINGS_GET_SYSTEM_SETTINGS: &str =
    "luna://com.webos.settingsservice/getSystemSettings";

/// Bus hub: per-service up/down notifications, streamed. Queried with
/// `{"serviceName": "<svc>"}`; replies are shaped
/// `{serviceName, connected: bool}`.
pub const SIGNAL_REGISTER_SERVER_STATUS: &str =
    "luna://com.webos.service.bus/signal/registerServerStatus";

/// Bus hub: signal match registration. Queried with `{category, method?}`.
pub const SIGNAL_ADDMATCH: &str = "luna://com.webos.service.bus/signal/addmatch";

/// Notification service: toasts, fire-and-forget.
pub const NOTIFICATION_CREATE_TOAST: &str = "luna://com.webos.notification/createToast";

/// Notification service: alerts, synchronous. Replies carry
/// `{returnValue: bool, alertId: string}`.
pub const NOTIFICATION_CREATE_ALERT: &str = "luna://com.webos.notification/createAlert";

/// Notification service: closes an alert by its external id, synchronous.
pub const NOTIFICATION_CLOSE_ALERT: &str = "luna://com.webos.notification/closeAlert";
