//! Plugin-facing API for the beacon event-monitor service.
//!
//! A plugin is a module that reacts to system events (service availability,
//! locale changes, bus signals) and raises user-visible notifications. The
//! service instantiates a plugin when every bus service it requires is online
//! and asks it to stop when any of them goes away.
//!
//! Two traits form the contract:
//!
//! - [`Plugin`] — implemented by the plugin; lifecycle entry points called by
//!   the service.
//! - [`Manager`] — implemented by the service; the capability set a plugin
//!   uses to talk to the bus, schedule timers, and raise notifications.
//!
//! Everything here is single-threaded: the service runs one event loop, every
//! callback fires on it, and a plugin that blocks blocks the service. Shared
//! callback state therefore uses `Rc`/`RefCell`, never locks.
//!
//! ```rust,ignore
//! use beacon_api::{Manager, Plugin, PluginResult, UnloadDecision};
//!
//! struct BatteryWatch {
//!     manager: Rc<dyn Manager>,
//! }
//!
//! impl Plugin for BatteryWatch {
//!     fn start_monitoring(&mut self) -> PluginResult<()> {
//!         let manager = Rc::clone(&self.manager);
//!         self.manager.subscribe_to_signal(
//!             "battery",
//!             "/com/palm/power",
//!             "batteryStatus",
//!             Rc::new(move |_prev, value| {
//!                 if value["percent"].as_u64() < Some(5) {
//!                     let _ = manager.create_toast("Battery critically low", None, None);
//!                 }
//!             }),
//!             PayloadSchema::any(),
//!         )?;
//!         Ok(())
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod manager;
pub mod plugin;
pub mod schema;

pub use error::{ApiError, ApiResult, PluginError, PluginResult};
pub use manager::{
    CallCallback, DEFAULT_CALL_TIMEOUT, Manager, MethodHandler, SubscribeCallback, TimerCallback,
};
pub use plugin::{Plugin, UnloadDecision};
pub use schema::{FieldKind, PayloadSchema, SchemaViolation};

/// Current plugin API version.
///
/// Negotiated through the plugin factory: the factory receives the host's
/// version and returns `None` when it cannot serve it.
pub const API_VERSION: u32 = 3;
