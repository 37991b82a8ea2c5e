//! Plugin lifecycle machinery for the beacon event-monitor service.
//!
//! # Architecture
//!
//! The service is a single-threaded state machine fed by one channel:
//!
//! ```text
//!  bus reader task ──┐
//!  timer tasks ──────┤  LoopEvent channel   ┌──► BusGateway ──► subscription
//!  signal handler ───┴──────► EventLoop ────┤      callbacks / method handlers
//!                                           └──► PluginManager ──► adapters
//! ```
//!
//! - [`ServiceMonitor`] drives everything: it tracks the system locale and
//!   the up/down state of every bus service any plugin requires, and asks
//!   [`PluginManager`] to load or unload plugins as dependencies are met or
//!   lost.
//! - [`PluginManager`] owns the live [`PluginAdapter`]s and executes
//!   deferred unloads after every callback frame.
//! - [`PluginAdapter`] is the per-plugin implementation of the
//!   [`Manager`](beacon_api::Manager) capability set: it owns that plugin's
//!   subscriptions, timers, alerts, and registered methods, and tears them
//!   all down when the plugin goes away.
//! - [`TimerService`] schedules named timers on the background runtime and
//!   marshals expirations into the loop.
//!
//! # Deferred unload
//!
//! A callback may request its own plugin's unload; the adapter is never
//! freed while one of its callback frames is on the stack. Every site that
//! invokes plugin code hands the adapter to
//! [`PluginManager::process_unload`] after the callback returns — that call
//! performs the actual removal and teardown once it is safe.

pub mod adapter;
pub mod event_loop;
pub mod manager;
pub mod monitor;
pub mod timer;

pub use adapter::PluginAdapter;
pub use event_loop::{EventLoop, LoopEvent, LoopExit, LoopHandle, loop_channel};
pub use manager::PluginManager;
pub use monitor::ServiceMonitor;
pub use timer::{TimerHandle, TimerKey, TimerService};
