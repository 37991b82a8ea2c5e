//! Plugin lifecycle management.
//!
//! [`PluginManager`] owns the set of live adapters — at most one per
//! descriptor identity — and performs the load/unload transitions the
//! [`ServiceMonitor`](crate::monitor::ServiceMonitor) requests. It also
//! caches the system locale and broadcasts locale changes to every live
//! plugin.
//!
//! Teardown is always two-phase: plugin code (or a failure in it) marks the
//! adapter with a pending unload, and [`process_unload`] — called after every
//! callback frame — performs the removal and frees the instance. `Rc` clones
//! held by in-flight frames keep the adapter's memory valid until the frames
//! unwind.
//!
//! [`process_unload`]: PluginManager::process_unload

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, error, info};

use beacon_api::Manager;
use beacon_core::{AdapterId, BusGateway, LocaleState, PluginDescriptor, PluginRegistry};

use crate::adapter::PluginAdapter;
use crate::timer::{TimerKey, TimerService};

/// Central owner of all live plugin adapters.
pub struct PluginManager {
    gateway: Rc<BusGateway>,
    timers: Rc<TimerService>,
    registry: Rc<dyn PluginRegistry>,
    adapters: RefCell<HashMap<&'static str, Rc<PluginAdapter>>>,
    locale: RefCell<LocaleState>,
    next_adapter_id: Cell<AdapterId>,
    weak_self: Weak<PluginManager>,
}

impl PluginManager {
    pub fn new(
        gateway: Rc<BusGateway>,
        timers: Rc<TimerService>,
        registry: Rc<dyn PluginRegistry>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            gateway,
            timers,
            registry,
            adapters: RefCell::new(HashMap::new()),
            locale: RefCell::new(LocaleState::new()),
            next_adapter_id: Cell::new(0),
            weak_self: weak_self.clone(),
        })
    }

    /// Number of live adapters.
    pub fn active_count(&self) -> usize {
        self.adapters.borrow().len()
    }

    /// Whether the plugin with this identity is live.
    pub fn is_loaded(&self, identity: &str) -> bool {
        self.adapters.borrow().contains_key(identity)
    }

    /// The current UI locale string.
    pub fn ui_locale(&self) -> String {
        self.locale.borrow().ui_locale()
    }

    /// The full structured locale value.
    pub fn locale_info(&self) -> Value {
        self.locale.borrow().info().clone()
    }

    /// Loads the plugin, or — when it is already live — restarts monitoring
    /// if it had been told to stop and has not been reaped.
    pub fn load_plugin(&self, descriptor: &PluginDescriptor, triggering_service: &str) {
        let existing = self.adapters.borrow().get(descriptor.identity).cloned();
        if let Some(adapter) = existing {
            adapter.plugin_loaded(None);
            self.process_unload(&adapter);
            return;
        }

        debug!(
            plugin = descriptor.identity,
            service = triggering_service,
            "Loading plugin"
        );

        let id = self.next_adapter_id.get() + 1;
        self.next_adapter_id.set(id);
        let adapter = PluginAdapter::new(
            id,
            *descriptor,
            self.weak_self.clone(),
            Rc::clone(&self.gateway),
            Rc::clone(&self.timers),
        );

        let instance = self
            .registry
            .instantiate(descriptor, Rc::clone(&adapter) as Rc<dyn Manager>);
        let Some(instance) = instance else {
            // Most likely an API version mismatch.
            error!(
                plugin = descriptor.identity,
                "Plugin instantiation produced no instance"
            );
            self.registry.release(descriptor);
            return;
        };

        self.adapters
            .borrow_mut()
            .insert(descriptor.identity, Rc::clone(&adapter));
        adapter.plugin_loaded(Some(instance));
        self.process_unload(&adapter);
    }

    /// Tells a live plugin that a required service went away. No-op when the
    /// plugin is not loaded.
    pub fn notify_plugin_should_unload(&self, descriptor: &PluginDescriptor, service: &str) {
        let adapter = self.adapters.borrow().get(descriptor.identity).cloned();
        if let Some(adapter) = adapter {
            adapter.notify_plugin_should_unload(service);
            self.process_unload(&adapter);
        }
    }

    /// Stores the new locale and broadcasts its UI string to every live
    /// plugin.
    pub fn notify_locale_changed(&self, locale_info: Value) {
        self.locale.borrow_mut().update(locale_info);
        let ui_locale = self.locale.borrow().ui_locale();
        info!(locale = %ui_locale, "Locale changed");

        // Snapshot first: a plugin may unload inside its locale callback,
        // which removes it from the live map mid-broadcast.
        let adapters: Vec<Rc<PluginAdapter>> = self.adapters.borrow().values().cloned().collect();
        for adapter in adapters {
            adapter.notify_locale_changed(&ui_locale);
            self.process_unload(&adapter);
        }
    }

    /// Honours a pending unload: removes the adapter from the live map,
    /// releases its remaining resources, frees the plugin instance, and
    /// returns the descriptor to the registry.
    ///
    /// Must only be called when no callback frame into this plugin is on the
    /// stack; every dispatch site calls it after its callback returns.
    pub fn process_unload(&self, adapter: &Rc<PluginAdapter>) {
        if !adapter.unload_pending() {
            return;
        }

        self.adapters.borrow_mut().remove(adapter.identity());
        adapter.begin_unload();
        adapter.teardown();
        self.registry.release(adapter.descriptor());
        info!(plugin = adapter.identity(), "Plugin unloaded");
    }

    /// [`process_unload`](Self::process_unload) by adapter identity, for
    /// dispatch sites that only know the owner id of the callback they ran.
    pub fn process_unload_by_id(&self, id: AdapterId) {
        if let Some(adapter) = self.adapter_by_id(id) {
            self.process_unload(&adapter);
        }
    }

    /// Routes a fired timer to its adapter, then processes any unload the
    /// callback requested.
    pub fn dispatch_timer(&self, key: &TimerKey) {
        if let Some(adapter) = self.adapter_by_id(key.owner) {
            adapter.handle_timer_fired(key);
            self.process_unload(&adapter);
        }
    }

    /// Force-unloads every live plugin.
    pub fn shutdown(&self) {
        loop {
            let next = self.adapters.borrow().values().next().cloned();
            let Some(adapter) = next else {
                break;
            };
            adapter.begin_unload();
            if adapter.unload_pending() {
                self.process_unload(&adapter);
            } else {
                self.adapters.borrow_mut().remove(adapter.identity());
                adapter.teardown();
                self.registry.release(adapter.descriptor());
            }
        }
    }

    fn adapter_by_id(&self, id: AdapterId) -> Option<Rc<PluginAdapter>> {
        self.adapters
            .borrow()
            .values()
            .find(|adapter| adapter.id() == id)
            .cloned()
    }
}
