//! Plugin descriptors — the static, `Copy` handle to a plugin.

use std::rc::Rc;

use beacon_api::{ApiError, ApiResult, Manager, Plugin};

/// A static descriptor identifying a plugin and naming the bus services it
/// requires.
///
/// Descriptors are immutable: created at startup, never mutated. The service
/// loads a plugin when every service in `required_services` is online and
/// asks it to stop as soon as any of them goes away.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    /// Plugin API version this descriptor was compiled against.
    pub api_version: u32,

    /// Stable identity; keys the live-plugin map.
    pub identity: &'static str,

    /// Human-readable name, used in logs and notification source ids.
    pub name: &'static str,

    /// Bus services this plugin depends on.
    pub required_services: &'static [&'static str],

    /// Factory producing the live plugin. Receives the host's API version and
    /// the manager capability handle; returns `None` when it cannot serve
    /// that version or fails to initialise.
    pub create: fn(u32, Rc<dyn Manager>) -> Option<Box<dyn Plugin>>,
}

impl PluginDescriptor {
    /// Whether this descriptor's API version matches the host's.
    pub fn is_compatible(&self, host_version: u32) -> bool {
        self.api_version == host_version
    }

    /// Whether `url` addresses a service in the required list.
    ///
    /// `url` must be of the form `luna://<service>/<path>`; anything else is
    /// a policy error.
    pub fn requires_service(&self, url: &str) -> ApiResult<bool> {
        let service = service_name_of(url)?;
        Ok(self.required_services.contains(&service))
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("identity", &self.identity)
            .field("name", &self.name)
            .field("api_version", &self.api_version)
            .field("required_services", &self.required_services)
            .finish()
    }
}

/// Extracts the service name (second path segment) from a `luna://` URL.
fn service_name_of(url: &str) -> ApiResult<&str> {
    let mut parts = url.split('/');
    let scheme = parts.next().unwrap_or("");
    let empty = parts.next();
    let service = parts.next().unwrap_or("");

    if scheme != "luna:" || empty != Some("") || service.is_empty() {
        return Err(ApiError::Policy(format!("bad luna URL: {url}")));
    }

    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> PluginDescriptor {
        PluginDescriptor {
            api_version: beacon_api::API_VERSION,
            identity: "test.plugin",
            name: "test",
            required_services: &["com.webos.applicationManager", "com.webos.notification"],
            create: |_, _| None,
        }
    }

    #[test]
    fn test_requires_service_matches_required_list() {
        let desc = descriptor();
        assert!(
            desc.requires_service("luna://com.webos.notification/createToast")
                .unwrap()
        );
        assert!(
            !desc
                .requires_service("luna://com.webos.settingsservice/getSystemSettings")
                .unwrap()
        );
    }

    #[test]
    fn test_requires_service_rejects_malformed_urls() {
        let desc = descriptor();
        assert!(desc.requires_service("com.webos.notification").is_err());
        assert!(desc.requires_service("luna://").is_err());
        assert!(desc.requires_service("http://example.com/x").is_err());
    }

    #[test]
    fn test_version_gate() {
        let desc = descriptor();
        assert!(desc.is_compatible(beacon_api::API_VERSION));
        assert!(!desc.is_compatible(beacon_api::API_VERSION + 1));
    }
}
