//! The plugin side of the contract.

use crate::error::PluginResult;

/// A plugin's answer when asked to stop because a required service went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    /// Ok to unload: active alerts are closed, resources are released, and
    /// the plugin instance is dropped.
    Unload,
    /// The plugin still has unfinished work and will unload itself later by
    /// calling [`Manager::unload_plugin`](crate::Manager::unload_plugin).
    ///
    /// The plugin keeps receiving callbacks from its remaining resources, but
    /// it will NOT be restarted if the service comes back online before it
    /// has unloaded itself.
    Cancel,
}

/// Lifecycle entry points implemented by a plugin.
///
/// The service calls these on the event-loop thread, strictly in the order
/// `start_monitoring` → callbacks → `stop_monitoring` → (drop). A plugin
/// never sees a callback after its teardown has completed.
pub trait Plugin {
    /// Called once every required service is online. Subscribe to methods and
    /// signals here.
    ///
    /// Also called again after a `stop_monitoring` that returned
    /// [`UnloadDecision::Cancel`] was superseded by the services coming back,
    /// provided the plugin has not unloaded itself in between.
    fn start_monitoring(&mut self) -> PluginResult<()>;

    /// Called when a required service goes offline. `service` names the
    /// service that went away.
    fn stop_monitoring(&mut self, service: &str) -> PluginResult<UnloadDecision>;

    /// Called when the system UI locale changes. Use to reload the plugin's
    /// resource bundle.
    fn ui_locale_changed(&mut self, ui_locale: &str) -> PluginResult<()>;
}
