//! The statically linked plugin registry.
//!
//! Plugin crates contribute a [`PluginDescriptor`] to the
//! [`PLUGIN_DESCRIPTORS`](beacon_core::PLUGIN_DESCRIPTORS) distributed slice
//! at link time; this registry collects them at startup. The core stays
//! agnostic: it only ever sees the [`PluginRegistry`] port, so a
//! dynamic-loading registry can replace this one without touching the
//! framework.

use std::rc::Rc;

use tracing::{debug, error, warn};

use beacon_api::{API_VERSION, Manager, Plugin};
use beacon_core::{PLUGIN_DESCRIPTORS, PluginDescriptor, PluginRegistry};

/// Registry over the link-time descriptor slice.
pub struct StaticPluginRegistry {
    descriptors: Vec<PluginDescriptor>,
}

impl StaticPluginRegistry {
    /// Collects every descriptor registered at link time.
    pub fn collect() -> Self {
        Self::from_descriptors(PLUGIN_DESCRIPTORS.iter().copied())
    }

    /// Builds a registry from explicit descriptors. Duplicate identities are
    /// dropped with a warning; the first registration wins.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = PluginDescriptor>) -> Self {
        let mut collected: Vec<PluginDescriptor> = Vec::new();
        for descriptor in descriptors {
            if let Some(existing) = collected
                .iter()
                .find(|seen| seen.identity == descriptor.identity)
            {
                warn!(
                    identity = descriptor.identity,
                    kept = existing.name,
                    "Duplicate plugin identity, keeping the first registration"
                );
                continue;
            }
            debug!(
                identity = descriptor.identity,
                services = ?descriptor.required_services,
                "Found plugin"
            );
            collected.push(descriptor);
        }
        Self {
            descriptors: collected,
        }
    }
}

impl PluginRegistry for StaticPluginRegistry {
    fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.descriptors.clone()
    }

    fn instantiate(
        &self,
        descriptor: &PluginDescriptor,
        manager: Rc<dyn Manager>,
    ) -> Option<Box<dyn Plugin>> {
        if !descriptor.is_compatible(API_VERSION) {
            error!(
                plugin = descriptor.identity,
                plugin_version = descriptor.api_version,
                host_version = API_VERSION,
                "Plugin API version mismatch"
            );
            return None;
        }
        (descriptor.create)(API_VERSION, manager)
    }

    fn release(&self, descriptor: &PluginDescriptor) {
        // Statically linked code has nothing to unload.
        debug!(plugin = descriptor.identity, "Released plugin descriptor");
    }
}
