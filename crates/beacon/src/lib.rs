//! # beacon
//!
//! A device-resident event-monitor service for a luna-style service bus.
//!
//! ## Overview
//!
//! beacon sits between the bus and a set of plugins. It tracks the up/down
//! state of every bus service a plugin declares it requires, instantiates
//! the plugin once all of them are online, and tears it down as soon as any
//! goes away. Live plugins get a capability surface for bus calls,
//! subscriptions, signals, timers, toasts, alerts, and served bus methods —
//! every resource is owned by the plugin's adapter and released atomically
//! on unload.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐    ┌────────────┐    ┌───────────────┐    ┌─────────┐
//! │ ServiceMonitor│───►│PluginManager│──►│ PluginAdapter │───►│ Plugin  │
//! │ (availability)│    │ (lifecycle) │   │ (capabilities)│    │  code   │
//! └───────┬───────┘    └────────────┘    └───────┬───────┘    └─────────┘
//!         │                                      │
//!         └────────────► BusGateway ◄────────────┘
//!                            │
//!                        BusClient (hub transport)
//! ```
//!
//! - **beacon-api** — the plugin contract: `Plugin`, `Manager`, schemas.
//! - **beacon-core** — the bus port, the gateway bookkeeping, descriptors.
//! - **beacon-framework** — adapters, manager, monitor, timers, event loop.
//! - **beacon-transport** — the unix-socket hub client.
//! - **beacon-runtime** — config, logging, registry, signals, the binary.

pub use beacon_api as api;
pub use beacon_core as core;
pub use beacon_framework as framework;
pub use beacon_runtime as runtime;
pub use beacon_transport as transport;

/// Prelude for plugin crates and embedders.
pub mod prelude {
    pub use beacon_api::{
        API_VERSION, ApiError, ApiResult, FieldKind, Manager, PayloadSchema, Plugin, PluginError,
        PluginResult, UnloadDecision,
    };
    pub use beacon_core::{PLUGIN_DESCRIPTORS, PluginDescriptor};
    pub use beacon_runtime::{ServiceRuntime, load_config, load_config_from_file};
}
