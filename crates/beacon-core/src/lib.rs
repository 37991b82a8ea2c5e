//! Core ports and bus bookkeeping for the beacon event-monitor service.
//!
//! This crate defines the seams the rest of the service is built against:
//!
//! - [`BusClient`] — the abstract bus transport the service consumes. The
//!   concrete implementation lives in `beacon-transport`; tests substitute
//!   scriptable fakes.
//! - [`BusGateway`] — the bookkeeping and policy layer over a [`BusClient`]:
//!   it owns every outstanding subscription and registered method, validates
//!   payloads, and routes replies to their owners.
//! - [`PluginDescriptor`] / [`PluginRegistry`] — plugin metadata and the
//!   enumeration/instantiation port. The core is agnostic to how plugin code
//!   gets into the process.
//! - [`LocaleState`] — the cached system locale and its UI-locale string.

pub mod address;
pub mod bus;
pub mod descriptor;
pub mod error;
pub mod gateway;
pub mod locale;
pub mod registry;

pub use bus::{BusClient, BusEvent, BusSink, Responder, StreamToken};
pub use descriptor::PluginDescriptor;
pub use error::{TransportError, TransportResult};
pub use gateway::{AdapterId, BusGateway};
pub use locale::{DEFAULT_UI_LOCALE, LocaleState};
pub use registry::{PLUGIN_DESCRIPTORS, PluginRegistry};
