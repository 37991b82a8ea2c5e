//! The service side of the contract: the capability set handed to a plugin.

use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ApiResult, PluginResult};
use crate::schema::PayloadSchema;

/// Conventional timeout for synchronous bus calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Callback for subscription replies.
///
/// `previous` is the reply delivered by the immediately preceding invocation
/// of the same subscription, or `None` on the first delivery.
pub type SubscribeCallback = Rc<dyn Fn(Option<&Value>, &Value)>;

/// Callback for the single reply of an asynchronous call.
pub type CallCallback = Rc<dyn Fn(&Value)>;

/// Callback invoked when a named timer fires. Receives the timer id.
pub type TimerCallback = Rc<dyn Fn(&str) -> PluginResult<()>>;

/// Handler for an incoming request on a registered bus method. The returned
/// value is serialized and sent as the response.
pub type MethodHandler = Rc<dyn Fn(&Value) -> Value>;

/// The capability set exposed to a plugin.
///
/// Every method must be called from the event-loop thread; the plugin
/// receives an `Rc<dyn Manager>` at instantiation and keeps it for its
/// lifetime. Method and signal subscriptions share one id namespace: a
/// subscription registered under an id replaces any earlier subscription —
/// method or signal — with the same id.
pub trait Manager {
    /// The current UI locale, e.g. `"en-US"`.
    fn ui_locale(&self) -> String;

    /// The full structured locale value as last reported by the settings
    /// service.
    fn locale_info(&self) -> Value;

    /// Request this plugin's unload. The plugin keeps running until the
    /// current callback frame returns; it is then torn down and dropped.
    fn unload_plugin(&self);

    /// Synchronous bus call.
    ///
    /// Returns `Ok(None)` when there is no reply within `timeout` or the
    /// reply is not a JSON object. Bus errors are returned as
    /// [`ApiError::Transport`](crate::ApiError::Transport).
    fn call(&self, url: &str, params: Value, timeout: Duration) -> ApiResult<Option<Value>>;

    /// Asynchronous bus call. Fire-and-forget when `callback` is `None`;
    /// otherwise `callback` receives the first reply.
    fn call_async(&self, url: &str, params: Value, callback: Option<CallCallback>)
    -> ApiResult<()>;

    /// Subscribes to a bus method.
    ///
    /// `subscribe: true` is added to `params` automatically. The second path
    /// segment of `url` must name a service in this plugin's required list;
    /// anything else fails with [`ApiError::Policy`](crate::ApiError::Policy).
    /// Replies failing `schema` are logged and dropped; the subscription
    /// stays live.
    fn subscribe_to_method(
        &self,
        id: &str,
        url: &str,
        params: Value,
        callback: SubscribeCallback,
        schema: PayloadSchema,
    ) -> ApiResult<()>;

    /// Cancels the subscription registered under `id`, if any. Returns
    /// whether one was present. After this returns, no further callbacks for
    /// that subscription fire.
    fn unsubscribe_from_method(&self, id: &str) -> bool;

    /// Subscribes to a bus signal identified by `category` and, when
    /// non-empty, `method`.
    ///
    /// The signal service acknowledges the match registration in its first
    /// reply; that reply is consumed as the acknowledgement and a negative or
    /// missing one fails the whole subscription synchronously.
    fn subscribe_to_signal(
        &self,
        id: &str,
        category: &str,
        method: &str,
        callback: SubscribeCallback,
        schema: PayloadSchema,
    ) -> ApiResult<()>;

    /// Alias of [`unsubscribe_from_method`](Self::unsubscribe_from_method):
    /// both kinds of subscription live in one namespace.
    fn unsubscribe_from_signal(&self, id: &str) -> bool;

    /// Schedules a named timer. An existing timer with the same id is
    /// cancelled first. One-shot timers are removed before their callback
    /// runs, so the callback may re-register the same id.
    fn set_timeout(&self, id: &str, after: Duration, repeat: bool, callback: TimerCallback);

    /// Cancels a named timer. Returns whether one was present. A cancelled
    /// timer never fires again.
    fn cancel_timeout(&self, id: &str) -> bool;

    /// Registers a method on the bus under this service's name.
    ///
    /// `category` must start with `/`; `name` must be non-empty. Calling
    /// again with the same category and name updates the handler and schema
    /// and returns the existing URL. Registering over a method owned by a
    /// different plugin fails with
    /// [`ApiError::Policy`](crate::ApiError::Policy).
    ///
    /// Returns the public method URL, e.g.
    /// `luna://com.webos.service.beacon/myPlugin/getStatus`.
    fn register_method(
        &self,
        category: &str,
        name: &str,
        handler: MethodHandler,
        schema: PayloadSchema,
    ) -> ApiResult<String>;

    /// Raises a toast notification with an optional icon and on-click action.
    fn create_toast(
        &self,
        message: &str,
        icon_url: Option<&str>,
        on_click: Option<Value>,
    ) -> ApiResult<()>;

    /// Raises an alert. An open alert with the same `alert_id` is closed
    /// first. Fails when the notification service refuses or returns no
    /// usable alert id.
    #[allow(clippy::too_many_arguments)]
    fn create_alert(
        &self,
        alert_id: &str,
        title: &str,
        message: &str,
        modal: bool,
        icon_url: Option<&str>,
        buttons: Value,
        on_close: Option<Value>,
    ) -> ApiResult<()>;

    /// Closes the alert registered under `alert_id`, if open. Returns whether
    /// one was open.
    fn close_alert(&self, alert_id: &str) -> ApiResult<bool>;
}
