//! The plugin enumeration and instantiation port.

use std::rc::Rc;

use beacon_api::{Manager, Plugin};
use linkme::distributed_slice;

use crate::descriptor::PluginDescriptor;

/// Registry of plugin descriptors contributed by statically linked plugin
/// crates:
///
/// ```rust,ignore
/// use beacon_core::{PLUGIN_DESCRIPTORS, PluginDescriptor};
/// use linkme::distributed_slice;
///
/// #[distributed_slice(PLUGIN_DESCRIPTORS)]
/// static BATTERY_WATCH: PluginDescriptor = PluginDescriptor {
///     api_version: beacon_api::API_VERSION,
///     identity: "com.webos.beacon.battery",
///     name: "batteryWatch",
///     required_services: &["com.webos.service.battery"],
///     create: battery_watch::instantiate,
/// };
/// ```
#[distributed_slice]
pub static PLUGIN_DESCRIPTORS: [PluginDescriptor];

/// Enumerates available plugins and produces live instances.
///
/// Implementations must not call back into the plugin manager; instantiation
/// failures are reported by returning `None`.
pub trait PluginRegistry {
    /// Every known plugin descriptor. Descriptors are `Copy`; the returned
    /// vector is a snapshot.
    fn descriptors(&self) -> Vec<PluginDescriptor>;

    /// Produces a live plugin for `descriptor`, or `None` on version
    /// mismatch or initialisation failure.
    fn instantiate(
        &self,
        descriptor: &PluginDescriptor,
        manager: Rc<dyn Manager>,
    ) -> Option<Box<dyn Plugin>>;

    /// Releases any resources held for `descriptor` after its plugin has been
    /// torn down.
    fn release(&self, descriptor: &PluginDescriptor);
}
