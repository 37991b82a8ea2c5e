//! The abstract bus transport consumed by the gateway.
//!
//! A [`BusClient`] issues calls on behalf of the event loop and delivers
//! every asynchronous completion — subscription replies, incoming method
//! requests, loss of the connection — to the [`BusSink`] it was constructed
//! with. The sink marshals events into the loop's channel, so the core never
//! sees a completion on a foreign thread.

use std::time::Duration;

use crate::error::TransportResult;

/// Identifies one open multi-reply call on the bus.
pub type StreamToken = u64;

/// One-shot reply channel for an incoming method request.
///
/// Dropping an unanswered responder is allowed; the request then simply goes
/// unanswered, as with a crashed bus peer.
pub struct Responder(Option<Box<dyn FnOnce(String) + Send>>);

impl Responder {
    /// Wraps the transport's send-response hook.
    pub fn new(send: impl FnOnce(String) + Send + 'static) -> Self {
        Self(Some(Box::new(send)))
    }

    /// Sends `payload` as the response. Subsequent calls are no-ops.
    pub fn respond(&mut self, payload: &str) {
        if let Some(send) = self.0.take() {
            send(payload.to_string());
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("answered", &self.0.is_none())
            .finish()
    }
}

/// An asynchronous completion delivered by the transport.
#[derive(Debug)]
pub enum BusEvent {
    /// A reply arrived on an open stream.
    Reply {
        /// The stream the reply belongs to.
        token: StreamToken,
        /// Raw reply payload.
        payload: String,
    },
    /// A request arrived on a registered method.
    MethodCall {
        /// Method category, e.g. `/myPlugin`.
        category: String,
        /// Method name.
        name: String,
        /// Raw request payload.
        payload: String,
        /// Channel for the response.
        responder: Responder,
    },
    /// The bus connection dropped. Delivered at most once; the service treats
    /// this as fatal.
    Disconnected,
}

/// Receives every asynchronous completion produced by a [`BusClient`].
pub type BusSink = Box<dyn Fn(BusEvent) + Send + Sync>;

/// Abstract bidirectional bus client.
///
/// Reply delivery is single-threaded from the consumer's perspective: the
/// sink is invoked in the order completions occur, and the loop dispatches
/// them serially.
pub trait BusClient {
    /// Issues a one-shot call and waits for its reply.
    ///
    /// Returns `Ok(None)` when no reply arrives within `timeout`. Blocks the
    /// calling thread for at most `timeout`.
    fn call_once(
        &self,
        url: &str,
        payload: &str,
        timeout: Duration,
    ) -> TransportResult<Option<String>>;

    /// Issues a one-shot call and drops whatever reply it produces.
    fn post(&self, url: &str, payload: &str) -> TransportResult<()>;

    /// Opens a multi-reply call producing 0..N replies until cancelled.
    ///
    /// With `first_reply: Some(budget)`, the transport consumes the first
    /// reply itself — blocking up to `budget` — and returns it instead of
    /// forwarding it to the sink; `Ok((token, None))` then means the budget
    /// elapsed without a reply. With `first_reply: None`, every reply goes to
    /// the sink.
    fn open_stream(
        &self,
        url: &str,
        payload: &str,
        first_reply: Option<Duration>,
    ) -> TransportResult<(StreamToken, Option<String>)>;

    /// Cancels an open stream. Replies still in flight are dropped.
    fn cancel_stream(&self, token: StreamToken);

    /// Registers a served method on the bus. Idempotent; requests arrive as
    /// [`BusEvent::MethodCall`].
    fn register_method(&self, category: &str, name: &str) -> TransportResult<()>;
}
