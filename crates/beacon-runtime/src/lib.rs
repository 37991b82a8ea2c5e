//! Runtime assembly for the beacon event-monitor service.
//!
//! This crate wires the pieces together: it loads configuration, initialises
//! logging, collects the statically registered plugins, attaches to the bus
//! hub, and runs the event loop until a termination signal or loss of the
//! bus.
//!
//! ```rust,ignore
//! use beacon_runtime::{ServiceRuntime, config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ServiceRuntime::new(config)?.run()?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod runtime;

pub use config::{BeaconConfig, load_config, load_config_from_file};
pub use error::{RuntimeError, RuntimeResult};
pub use registry::StaticPluginRegistry;
pub use runtime::ServiceRuntime;
