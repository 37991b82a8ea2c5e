//! The per-plugin adapter.
//!
//! One [`PluginAdapter`] exists per live plugin. It implements the
//! [`Manager`] capability set the plugin calls into, owns every resource the
//! plugin acquires — subscriptions, timers, alerts, registered methods — and
//! releases all of them when the plugin unloads.
//!
//! # Lifecycle
//!
//! ```text
//! Empty ──plugin_loaded(Some)──► Instantiated ──start_monitoring──► Monitoring
//!   Monitoring ──notify_plugin_should_unload──► Stopping (stop returned Unload)
//!   Monitoring ──notify_plugin_should_unload──► Monitoring (stop returned Cancel)
//!   any ──begin_unload──► needs_unload set; reaped by the manager once the
//!                         current callback frame has returned
//! ```
//!
//! Two flags drive the transitions. `unload_notified` records that the
//! plugin has been told to stop (or has not yet started); it gates restarting
//! monitoring when services come back. `needs_unload` records a pending
//! teardown; it is honoured by [`PluginManager::process_unload`] after every
//! callback frame, never inside one — a callback frame may itself be plugin
//! code that requested the unload.
//!
//! [`PluginManager::process_unload`]: crate::manager::PluginManager::process_unload

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, error, info_span};

use beacon_api::{
    ApiError, ApiResult, CallCallback, DEFAULT_CALL_TIMEOUT, Manager, MethodHandler,
    PayloadSchema, Plugin, SubscribeCallback, TimerCallback, UnloadDecision,
};
use beacon_core::address;
use beacon_core::{AdapterId, BusGateway, PluginDescriptor, StreamToken};

use crate::manager::PluginManager;
use crate::timer::{TimerHandle, TimerKey, TimerService};

struct TimerRecord {
    handle: TimerHandle,
    repeat: bool,
    callback: TimerCallback,
}

/// Per-plugin implementation of the [`Manager`] capability set.
pub struct PluginAdapter {
    id: AdapterId,
    descriptor: PluginDescriptor,
    manager: Weak<PluginManager>,
    gateway: Rc<BusGateway>,
    timers: Rc<TimerService>,

    instance: RefCell<Option<Box<dyn Plugin>>>,
    /// Instance present and not yet torn down. Kept outside `instance` so
    /// state checks never touch the `RefCell` while a plugin call is active.
    live: Cell<bool>,
    needs_unload: Cell<bool>,
    unload_notified: Cell<bool>,

    subscriptions: RefCell<HashMap<String, StreamToken>>,
    timeouts: RefCell<HashMap<String, TimerRecord>>,
    alerts: RefCell<HashMap<String, String>>,

    span: tracing::Span,
}

impl PluginAdapter {
    pub(crate) fn new(
        id: AdapterId,
        descriptor: PluginDescriptor,
        manager: Weak<PluginManager>,
        gateway: Rc<BusGateway>,
        timers: Rc<TimerService>,
    ) -> Rc<Self> {
        let span = info_span!("plugin", name = descriptor.name);
        Rc::new(Self {
            id,
            descriptor,
            manager,
            gateway,
            timers,
            instance: RefCell::new(None),
            live: Cell::new(false),
            needs_unload: Cell::new(false),
            unload_notified: Cell::new(false),
            subscriptions: RefCell::new(HashMap::new()),
            timeouts: RefCell::new(HashMap::new()),
            alerts: RefCell::new(HashMap::new()),
            span,
        })
    }

    pub(crate) fn id(&self) -> AdapterId {
        self.id
    }

    pub(crate) fn identity(&self) -> &'static str {
        self.descriptor.identity
    }

    pub(crate) fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Whether a deferred unload is pending.
    pub fn unload_pending(&self) -> bool {
        self.needs_unload.get()
    }

    fn with_instance<R>(&self, f: impl FnOnce(&mut dyn Plugin) -> R) -> Option<R> {
        let mut instance = self.instance.borrow_mut();
        instance.as_mut().map(|plugin| f(plugin.as_mut()))
    }

    /// Accepts the freshly created instance, or — with `None` — restarts
    /// monitoring on an already-live plugin that was previously told to stop.
    pub(crate) fn plugin_loaded(&self, instance: Option<Box<dyn Plugin>>) {
        let _enter = self.span.enter();

        match instance {
            Some(instance) => {
                *self.instance.borrow_mut() = Some(instance);
                self.live.set(true);
                // Counts as unloaded until start_monitoring has run.
                self.unload_notified.set(true);
            }
            None => {
                if !self.unload_notified.get() {
                    return;
                }
            }
        }

        self.unload_notified.set(false);

        debug!("Calling start_monitoring");
        if let Some(Err(err)) = self.with_instance(|plugin| plugin.start_monitoring()) {
            error!(%err, "Plugin failed in start_monitoring");
            self.begin_unload();
        }
        debug!("Done start_monitoring");
    }

    /// Tells the plugin that `service` went offline. A plugin answering
    /// [`UnloadDecision::Cancel`] stays live and must unload itself later.
    pub(crate) fn notify_plugin_should_unload(&self, service: &str) {
        let _enter = self.span.enter();

        if !self.live.get() {
            // Nothing to stop.
            return;
        }

        self.unload_notified.set(true);

        debug!(service, "Calling stop_monitoring");
        let decision = match self.with_instance(|plugin| plugin.stop_monitoring(service)) {
            Some(Ok(decision)) => decision,
            Some(Err(err)) => {
                error!(%err, "Plugin failed in stop_monitoring");
                UnloadDecision::Unload
            }
            None => UnloadDecision::Unload,
        };

        if decision == UnloadDecision::Unload {
            self.begin_unload();
        }
        debug!(service, "Done stop_monitoring");
    }

    /// Tells the plugin the UI locale changed.
    pub(crate) fn notify_locale_changed(&self, ui_locale: &str) {
        let _enter = self.span.enter();

        if !self.live.get() {
            return;
        }

        if let Some(Err(err)) = self.with_instance(|plugin| plugin.ui_locale_changed(ui_locale)) {
            error!(%err, "Plugin failed in ui_locale_changed");
            self.begin_unload();
        }
    }

    /// Releases every resource the plugin holds and marks the adapter for
    /// teardown. The instance itself is freed later, by the manager, once no
    /// callback frame references it.
    pub(crate) fn begin_unload(&self) {
        if !self.live.get() {
            return;
        }
        let _enter = self.span.enter();
        debug!("Preparing to unload plugin");

        self.gateway.cleanup_adapter(self.id);
        self.subscriptions.borrow_mut().clear();

        loop {
            let next = self.alerts.borrow().keys().next().cloned();
            match next {
                Some(alert_id) => {
                    let _ = self.close_alert(&alert_id);
                }
                None => break,
            }
        }

        loop {
            let next = self.timeouts.borrow().keys().next().cloned();
            match next {
                Some(timer_id) => {
                    let _ = self.cancel_timeout(&timer_id);
                }
                None => break,
            }
        }

        self.needs_unload.set(true);
    }

    /// Drops the plugin instance. Called by the manager only, after the last
    /// callback frame into this plugin has returned.
    pub(crate) fn teardown(&self) {
        let _enter = self.span.enter();
        self.live.set(false);
        self.needs_unload.set(false);
        self.instance.borrow_mut().take();
    }

    /// Runs the callback of a fired timer. Stale fires — for a timer since
    /// cancelled or re-registered — are dropped.
    pub(crate) fn handle_timer_fired(&self, key: &TimerKey) {
        let callback = {
            let mut timeouts = self.timeouts.borrow_mut();
            let Some(record) = timeouts.get(&key.timer) else {
                return;
            };
            if record.handle.generation() != key.generation {
                return;
            }
            let callback = Rc::clone(&record.callback);
            let repeat = record.repeat;
            if !repeat {
                // Removed before the callback runs, so the callback may
                // re-register the same id.
                timeouts.remove(&key.timer);
            }
            callback
        };

        let _enter = self.span.enter();
        debug!(timer = %key.timer, "Timer fired");

        if let Err(err) = callback(&key.timer) {
            error!(timer = %key.timer, %err, "Plugin failed in timer callback");
            self.begin_unload();
        }
    }
}

impl Manager for PluginAdapter {
    fn ui_locale(&self) -> String {
        match self.manager.upgrade() {
            Some(manager) => manager.ui_locale(),
            None => beacon_core::DEFAULT_UI_LOCALE.to_string(),
        }
    }

    fn locale_info(&self) -> Value {
        match self.manager.upgrade() {
            Some(manager) => manager.locale_info(),
            None => Value::Null,
        }
    }

    fn unload_plugin(&self) {
        self.begin_unload();
    }

    fn call(&self, url: &str, params: Value, timeout: Duration) -> ApiResult<Option<Value>> {
        self.gateway.call(url, &params, timeout)
    }

    fn call_async(
        &self,
        url: &str,
        params: Value,
        callback: Option<CallCallback>,
    ) -> ApiResult<()> {
        self.gateway.call_async(url, &params, callback, Some(self.id))
    }

    fn subscribe_to_method(
        &self,
        id: &str,
        url: &str,
        params: Value,
        callback: SubscribeCallback,
        schema: PayloadSchema,
    ) -> ApiResult<()> {
        let _enter = self.span.enter();
        let _ = self.unsubscribe_from_method(id);

        debug!(subscription = id, url, "Subscribing to method");

        if !self.descriptor.requires_service(url)? {
            error!(
                url,
                "Can only subscribe to services that are in the required list"
            );
            return Err(ApiError::Policy(
                "can only subscribe to services that are in the required list".to_string(),
            ));
        }

        let token = self
            .gateway
            .subscribe(url, params, callback, schema, Some(self.id), false)?;
        self.subscriptions.borrow_mut().insert(id.to_string(), token);
        Ok(())
    }

    fn unsubscribe_from_method(&self, id: &str) -> bool {
        let token = self.subscriptions.borrow_mut().remove(id);
        match token {
            Some(token) => {
                self.gateway.unsubscribe(token);
                true
            }
            None => false,
        }
    }

    fn subscribe_to_signal(
        &self,
        id: &str,
        category: &str,
        method: &str,
        callback: SubscribeCallback,
        schema: PayloadSchema,
    ) -> ApiResult<()> {
        let _enter = self.span.enter();
        let _ = self.unsubscribe_from_signal(id);

        debug!(subscription = id, category, method, "Subscribing to signal");

        let mut params = json!({ "category": category });
        if !method.is_empty() {
            params["method"] = json!(method);
        }

        // The signal service acknowledges the addmatch in its first reply.
        let token = self.gateway.subscribe(
            address::SIGNAL_ADDMATCH,
            params,
            callback,
            schema,
            Some(self.id),
            true,
        )?;
        self.subscriptions.borrow_mut().insert(id.to_string(), token);
        Ok(())
    }

    fn unsubscribe_from_signal(&self, id: &str) -> bool {
        self.unsubscribe_from_method(id)
    }

    fn set_timeout(&self, id: &str, after: Duration, repeat: bool, callback: TimerCallback) {
        let _enter = self.span.enter();
        let _ = self.cancel_timeout(id);

        debug!(timer = id, ?after, repeat, "Setting timeout");

        let handle = self.timers.schedule(self.id, id, after, repeat);
        self.timeouts.borrow_mut().insert(
            id.to_string(),
            TimerRecord {
                handle,
                repeat,
                callback,
            },
        );
    }

    fn cancel_timeout(&self, id: &str) -> bool {
        // Dropping the record cancels the underlying task; a fire already
        // queued finds no record and is discarded.
        self.timeouts.borrow_mut().remove(id).is_some()
    }

    fn register_method(
        &self,
        category: &str,
        name: &str,
        handler: MethodHandler,
        schema: PayloadSchema,
    ) -> ApiResult<String> {
        if name.is_empty() {
            return Err(ApiError::Policy("method name must not be empty".to_string()));
        }
        if !category.starts_with('/') {
            return Err(ApiError::Policy(
                "method category must start with '/'".to_string(),
            ));
        }
        self.gateway
            .register_method(self.id, category, name, handler, schema)
    }

    fn create_toast(
        &self,
        message: &str,
        icon_url: Option<&str>,
        on_click: Option<Value>,
    ) -> ApiResult<()> {
        let mut params = json!({
            "message": message,
            "sourceId": format!("{}-{}", self.gateway.service_path(), self.descriptor.name),
        });
        if let Some(icon_url) = icon_url.filter(|url| !url.is_empty()) {
            params["iconUrl"] = json!(icon_url);
        }
        if let Some(on_click) = on_click.filter(|action| !action.is_null()) {
            params["onclick"] = on_click;
        }

        self.gateway
            .call_async(address::NOTIFICATION_CREATE_TOAST, &params, None, Some(self.id))
    }

    fn create_alert(
        &self,
        alert_id: &str,
        title: &str,
        message: &str,
        modal: bool,
        icon_url: Option<&str>,
        buttons: Value,
        on_close: Option<Value>,
    ) -> ApiResult<()> {
        let _enter = self.span.enter();
        let _ = self.close_alert(alert_id)?;

        let mut params = json!({
            "title": title,
            "modal": modal,
            "message": message,
            "buttons": buttons,
        });
        if let Some(on_close) = on_close.filter(|action| !action.is_null()) {
            params["onclose"] = on_close;
        }
        if let Some(icon_url) = icon_url.filter(|url| !url.is_empty()) {
            params["iconUrl"] = json!(icon_url);
        }

        let reply = self.gateway.call(
            address::NOTIFICATION_CREATE_ALERT,
            &params,
            DEFAULT_CALL_TIMEOUT,
        )?;

        let external_id = reply.as_ref().and_then(|reply| {
            let ok = reply.get("returnValue").and_then(Value::as_bool)?;
            let id = reply.get("alertId").and_then(Value::as_str)?;
            (ok && !id.is_empty()).then(|| id.to_string())
        });

        let Some(external_id) = external_id else {
            error!(alert = alert_id, ?reply, "Failed to create alert");
            return Err(ApiError::Notification("failed to create alert".to_string()));
        };

        self.alerts
            .borrow_mut()
            .insert(alert_id.to_string(), external_id);
        Ok(())
    }

    fn close_alert(&self, alert_id: &str) -> ApiResult<bool> {
        let external_id = self.alerts.borrow_mut().remove(alert_id);
        let Some(external_id) = external_id else {
            return Ok(false);
        };

        self.gateway.call(
            address::NOTIFICATION_CLOSE_ALERT,
            &json!({ "alertId": external_id }),
            DEFAULT_CALL_TIMEOUT,
        )?;
        Ok(true)
    }
}
