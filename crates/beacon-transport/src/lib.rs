//! Concrete bus transport for the beacon event-monitor service.
//!
//! [`HubClient`] implements the [`BusClient`](beacon_core::BusClient) port
//! over a unix-domain socket to the bus hub, speaking newline-delimited JSON
//! frames. Reading and writing run as tasks on the background tokio runtime;
//! synchronous waits (one-shot calls, checked-subscription acknowledgements)
//! block the calling thread against a bounded rendezvous with the reader
//! task. Loss of the connection is delivered once as
//! [`BusEvent::Disconnected`](beacon_core::BusEvent::Disconnected) — there is
//! no reconnect; the service treats a lost bus as fatal.

pub mod frame;
pub mod hub;

pub use frame::Frame;
pub use hub::HubClient;
