//! Service availability tracking.
//!
//! [`ServiceMonitor`] is the top-level driver. On start it subscribes to the
//! settings service for locale information; only after the first locale reply
//! does it begin monitoring server status, so plugins are never instantiated
//! with an unknown locale. From then on, every status change recomputes each
//! plugin's dependency satisfaction and asks the manager to load or unload.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::{Value, json};
use tracing::{error, info, warn};

use beacon_api::{ApiResult, PayloadSchema, SubscribeCallback};
use beacon_core::{BusGateway, PluginDescriptor, address};

use crate::manager::PluginManager;

/// Tracks the up/down state of every service the plugins require and drives
/// plugin lifecycle from it.
pub struct ServiceMonitor {
    manager: Rc<PluginManager>,
    gateway: Rc<BusGateway>,
    plugins: RefCell<Vec<PluginDescriptor>>,
    /// Service name → currently connected. Every monitored service starts
    /// out down.
    service_status: RefCell<HashMap<String, bool>>,
    /// One-shot guard around the server-status subscriptions.
    monitor_started: Cell<bool>,
    weak_self: Weak<ServiceMonitor>,
}

impl ServiceMonitor {
    pub fn new(manager: Rc<PluginManager>, gateway: Rc<BusGateway>) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            manager,
            gateway,
            plugins: RefCell::new(Vec::new()),
            service_status: RefCell::new(HashMap::new()),
            monitor_started: Cell::new(false),
            weak_self: weak_self.clone(),
        })
    }

    /// Subscribes to locale information. Per-service monitoring begins once
    /// the first locale reply has been seen.
    pub fn start(&self, plugins: Vec<PluginDescriptor>) -> ApiResult<()> {
        info!(plugins = plugins.len(), "Starting service monitor");
        *self.plugins.borrow_mut() = plugins;

        let weak = self.weak_self.clone();
        let callback: SubscribeCallback = Rc::new(move |_previous, value| {
            if let Some(monitor) = weak.upgrade() {
                monitor.locale_callback(value);
            }
        });

        self.gateway.subscribe(
            address::SETTINGS_GET_SYSTEM_SETTINGS,
            json!({ "keys": ["localeInfo"] }),
            callback,
            PayloadSchema::any(),
            None,
            false,
        )?;
        Ok(())
    }

    fn locale_callback(&self, value: &Value) {
        let Some(locale) = value.pointer("/settings/localeInfo") else {
            error!(payload = %value, "settings/localeInfo not found in payload");
            return;
        };

        self.manager.notify_locale_changed(locale.clone());

        if !self.monitor_started.get() {
            let descriptors = self.plugins.borrow().clone();
            for descriptor in &descriptors {
                self.watch_plugin_services(descriptor);
            }
            self.monitor_started.set(true);

            // Plugins without service requirements are satisfied already.
            self.update_plugins("");
        }
    }

    fn watch_plugin_services(&self, descriptor: &PluginDescriptor) {
        info!(plugin = descriptor.identity, "Adding plugin");

        for service in descriptor.required_services {
            if self.service_status.borrow().contains_key(*service) {
                continue;
            }

            info!(service, "Monitoring service");
            self.service_status
                .borrow_mut()
                .insert(service.to_string(), false);

            let weak = self.weak_self.clone();
            let callback: SubscribeCallback = Rc::new(move |_previous, value| {
                if let Some(monitor) = weak.upgrade() {
                    monitor.service_status_callback(value);
                }
            });

            let subscribed = self.gateway.subscribe(
                address::SIGNAL_REGISTER_SERVER_STATUS,
                json!({ "serviceName": service }),
                callback,
                PayloadSchema::any(),
                None,
                false,
            );
            if let Err(err) = subscribed {
                error!(service, %err, "Failed to subscribe to server status");
            }
        }
    }

    fn service_status_callback(&self, value: &Value) {
        let service_name = value.get("serviceName").and_then(Value::as_str);
        let connected = value.get("connected").and_then(Value::as_bool);
        let (Some(service_name), Some(connected)) = (service_name, connected) else {
            error!(payload = %value, "Could not parse registerServerStatus response");
            return;
        };

        let was_connected = match self.service_status.borrow().get(service_name) {
            Some(state) => *state,
            None => {
                warn!(payload = %value, "Service status response for an unmonitored service");
                return;
            }
        };

        self.service_status
            .borrow_mut()
            .insert(service_name.to_string(), connected);

        if connected {
            info!(service = service_name, "Service is now online");
        } else {
            info!(service = service_name, "Service is now offline");
        }

        if was_connected != connected {
            self.update_plugins(service_name);
        }
    }

    /// Recomputes dependency satisfaction for every plugin and asks the
    /// manager to load or unload accordingly.
    fn update_plugins(&self, triggering_service: &str) {
        // Decide first, act after: loading runs plugin code, which must not
        // observe the status map mid-borrow.
        let decisions: Vec<(PluginDescriptor, bool)> = {
            let status = self.service_status.borrow();
            self.plugins
                .borrow()
                .iter()
                .map(|descriptor| {
                    let satisfied = descriptor
                        .required_services
                        .iter()
                        .all(|service| status.get(*service).copied().unwrap_or(false));
                    (*descriptor, satisfied)
                })
                .collect()
        };

        for (descriptor, satisfied) in &decisions {
            if *satisfied {
                self.manager.load_plugin(descriptor, triggering_service);
            } else {
                self.manager
                    .notify_plugin_should_unload(descriptor, triggering_service);
            }
        }
    }
}
