//! Bookkeeping and policy layer over the bus client.
//!
//! [`BusGateway`] tracks every outstanding subscription and registered method,
//! routes replies and requests to their owners, and validates payloads. Owners
//! are identified by [`AdapterId`] — a plain identity back-reference, so the
//! gateway never keeps the owning adapter alive. When an adapter is torn down
//! it calls [`cleanup_adapter`](BusGateway::cleanup_adapter), which cancels
//! its subscriptions and detaches its methods.
//!
//! Dispatch runs on the event-loop thread. No interior borrow is held while a
//! callback runs, so callbacks may freely subscribe, unsubscribe, or request
//! their plugin's unload. [`dispatch`](BusGateway::dispatch) returns the owner
//! whose callback ran; the loop is responsible for processing any unload that
//! callback requested.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info};

use beacon_api::{ApiError, ApiResult, CallCallback, MethodHandler, PayloadSchema, SubscribeCallback};

use crate::bus::{BusClient, BusEvent, Responder, StreamToken};

/// Identity of a plugin adapter, used as the owner back-reference in gateway
/// records.
pub type AdapterId = u64;

/// How long to wait for the acknowledgement reply of a checked subscription.
pub const FIRST_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Response sent when a request arrives for a method whose plugin is gone.
const METHOD_REMOVED_RESPONSE: &str =
    r#"{"returnValue":false, "errorCode":1, "errorMessage":"Method removed."}"#;

/// Response sent when a request fails its method's schema.
const SCHEMA_ERROR_RESPONSE: &str =
    r#"{"returnValue":false, "errorCode":2, "errorMessage":"Failed to validate request against schema"}"#;

enum ReplySink {
    /// Single-reply call: the first reply triggers the callback, then the
    /// stream is cancelled.
    Once(CallCallback),
    /// Multi-reply subscription.
    Stream {
        callback: SubscribeCallback,
        schema: PayloadSchema,
        previous: Option<Value>,
        delivered: u64,
    },
}

struct SubscriptionRecord {
    service_url: String,
    owner: Option<AdapterId>,
    sink: ReplySink,
}

struct MethodRecord {
    /// `None` once the owning adapter has been torn down; requests then
    /// answer "method removed".
    owner: Option<AdapterId>,
    handler: Option<MethodHandler>,
    schema: PayloadSchema,
    url: String,
}

/// The bookkeeping wrapper around a [`BusClient`].
pub struct BusGateway {
    client: Rc<dyn BusClient>,
    service_path: String,
    subscriptions: RefCell<HashMap<StreamToken, SubscriptionRecord>>,
    methods: RefCell<HashMap<(String, String), MethodRecord>>,
}

impl BusGateway {
    /// Creates a gateway over `client`. `service_path` is the bus name this
    /// service registered under; it prefixes every served method URL.
    pub fn new(client: Rc<dyn BusClient>, service_path: impl Into<String>) -> Self {
        Self {
            client,
            service_path: service_path.into(),
            subscriptions: RefCell::new(HashMap::new()),
            methods: RefCell::new(HashMap::new()),
        }
    }

    /// The bus name this service registered under.
    pub fn service_path(&self) -> &str {
        &self.service_path
    }

    /// Synchronous bus call.
    ///
    /// Non-object `params` are sent as `{}`. Returns `Ok(None)` when no reply
    /// arrives within `timeout` or the reply is not a JSON object.
    pub fn call(&self, url: &str, params: &Value, timeout: Duration) -> ApiResult<Option<Value>> {
        let payload = stringify_params(params);
        debug!(url, payload = %payload, "Bus call");

        let reply = match self.client.call_once(url, &payload, timeout) {
            Ok(reply) => reply,
            Err(err) => {
                error!(url, %err, "Failed to issue bus call");
                return Err(err.into());
            }
        };

        let Some(reply) = reply else {
            error!(url, ?timeout, "Bus call got no reply within timeout");
            return Ok(None);
        };

        debug!(url, reply = %reply, "Call result");
        match serde_json::from_str::<Value>(&reply) {
            Ok(value) if value.is_object() => Ok(Some(value)),
            Ok(_) => {
                error!(url, reply = %reply, "Bus reply is not a JSON object");
                Ok(None)
            }
            Err(err) => {
                error!(url, %err, reply = %reply, "Failed to parse bus reply");
                Ok(None)
            }
        }
    }

    /// Asynchronous bus call. Fire-and-forget without a callback; with one, a
    /// single-reply record is created and the first reply triggers it.
    pub fn call_async(
        &self,
        url: &str,
        params: &Value,
        callback: Option<CallCallback>,
        owner: Option<AdapterId>,
    ) -> ApiResult<()> {
        let payload = stringify_params(params);
        debug!(url, payload = %payload, "Async bus call");

        match callback {
            None => self.client.post(url, &payload).map_err(|err| {
                error!(url, %err, "Failed to issue async bus call");
                ApiError::from(err)
            }),
            Some(callback) => {
                let (token, _) = self.client.open_stream(url, &payload, None).map_err(|err| {
                    error!(url, %err, "Failed to issue async bus call");
                    ApiError::from(err)
                })?;
                self.subscriptions.borrow_mut().insert(
                    token,
                    SubscriptionRecord {
                        service_url: url.to_string(),
                        owner,
                        sink: ReplySink::Once(callback),
                    },
                );
                Ok(())
            }
        }
    }

    /// Opens a multi-reply subscription. `subscribe: true` is injected into
    /// `params`.
    ///
    /// With `check_first_response`, the first reply is consumed as the
    /// subscription acknowledgement: a missing reply (1000 ms budget), an
    /// unreadable `returnValue`, or `returnValue: false` fails the whole
    /// subscription and leaves no record behind. Later replies are validated
    /// against `schema`; failures are logged and dropped while the
    /// subscription stays live.
    pub fn subscribe(
        &self,
        url: &str,
        params: Value,
        callback: SubscribeCallback,
        schema: PayloadSchema,
        owner: Option<AdapterId>,
        check_first_response: bool,
    ) -> ApiResult<StreamToken> {
        let payload = match params {
            Value::Object(mut map) => {
                map.insert("subscribe".to_string(), Value::Bool(true));
                Value::Object(map).to_string()
            }
            _ => r#"{"subscribe":true}"#.to_string(),
        };
        debug!(url, payload = %payload, "Subscribing");

        let first_budget = check_first_response.then_some(FIRST_RESPONSE_TIMEOUT);
        let (token, first) = self
            .client
            .open_stream(url, &payload, first_budget)
            .map_err(|err| {
                error!(url, %err, "Failed to subscribe");
                ApiError::from(err)
            })?;

        if check_first_response {
            // The acknowledgement is not validated against the schema: it is
            // frequently shaped differently from the subscription replies.
            let Some(first) = first else {
                self.client.cancel_stream(token);
                error!(url, timeout = ?FIRST_RESPONSE_TIMEOUT, "No subscription acknowledgement within timeout");
                return Err(ApiError::SubscriptionRejected(
                    "no acknowledgement within 1000 ms".to_string(),
                ));
            };
            debug!(url, reply = %first, "Subscription acknowledgement");

            let return_value = serde_json::from_str::<Value>(&first)
                .ok()
                .and_then(|v| v.get("returnValue").and_then(Value::as_bool));
            match return_value {
                Some(true) => debug!(url, "Subscription acknowledged"),
                Some(false) => {
                    self.client.cancel_stream(token);
                    error!(url, reply = %first, "Subscription acknowledgement negative");
                    return Err(ApiError::SubscriptionRejected(
                        "acknowledgement returned failure".to_string(),
                    ));
                }
                None => {
                    self.client.cancel_stream(token);
                    error!(url, reply = %first, "Could not read returnValue from acknowledgement");
                    return Err(ApiError::SubscriptionRejected(
                        "acknowledgement carried no returnValue".to_string(),
                    ));
                }
            }
        }

        self.subscriptions.borrow_mut().insert(
            token,
            SubscriptionRecord {
                service_url: url.to_string(),
                owner,
                sink: ReplySink::Stream {
                    callback,
                    schema,
                    previous: None,
                    delivered: 0,
                },
            },
        );
        Ok(token)
    }

    /// Cancels a subscription. After this returns, no further callbacks for
    /// it fire; replies already in flight are dropped on arrival.
    pub fn unsubscribe(&self, token: StreamToken) {
        if let Some(record) = self.subscriptions.borrow_mut().remove(&token) {
            debug!(url = %record.service_url, "Cancelling subscription");
            self.client.cancel_stream(token);
        }
    }

    /// Registers a served method. Re-registration by the same owner updates
    /// handler and schema; a different owner fails with a policy error and
    /// the table is left untouched.
    pub fn register_method(
        &self,
        owner: AdapterId,
        category: &str,
        name: &str,
        handler: MethodHandler,
        schema: PayloadSchema,
    ) -> ApiResult<String> {
        let key = (category.to_string(), name.to_string());
        let mut methods = self.methods.borrow_mut();

        match methods.get_mut(&key) {
            Some(record) => {
                if let Some(existing) = record.owner
                    && existing != owner
                {
                    return Err(ApiError::Policy(format!(
                        "method {category}/{name} is already registered by a different plugin"
                    )));
                }
                record.owner = Some(owner);
                record.handler = Some(handler);
                record.schema = schema;
                Ok(record.url.clone())
            }
            None => {
                self.client.register_method(category, name)?;
                let url = format!("luna://{}{}/{}", self.service_path, category, name);
                info!(category, name, url = %url, "Registered bus method");
                methods.insert(
                    key,
                    MethodRecord {
                        owner: Some(owner),
                        handler: Some(handler),
                        schema,
                        url: url.clone(),
                    },
                );
                Ok(url)
            }
        }
    }

    /// Cancels every subscription owned by `owner` and detaches its methods.
    ///
    /// Registered bus paths are not withdrawn: the hub keeps a stable method
    /// surface and requests for a detached method answer "method removed".
    pub fn cleanup_adapter(&self, owner: AdapterId) {
        let owned: Vec<StreamToken> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|(_, record)| record.owner == Some(owner))
            .map(|(token, _)| *token)
            .collect();
        for token in owned {
            self.unsubscribe(token);
        }

        for record in self.methods.borrow_mut().values_mut() {
            if record.owner == Some(owner) {
                record.owner = None;
                record.handler = None;
            }
        }
    }

    /// Routes one bus event. Returns the adapter whose callback or handler
    /// ran, so the caller can process a deferred unload it may have requested.
    pub fn dispatch(&self, event: BusEvent) -> Option<AdapterId> {
        match event {
            BusEvent::Reply { token, payload } => self.dispatch_reply(token, &payload),
            BusEvent::MethodCall {
                category,
                name,
                payload,
                mut responder,
            } => self.dispatch_method_call(&category, &name, &payload, &mut responder),
            BusEvent::Disconnected => {
                debug!("Disconnect event reached the gateway");
                None
            }
        }
    }

    fn dispatch_reply(&self, token: StreamToken, payload: &str) -> Option<AdapterId> {
        let url = match self.subscriptions.borrow().get(&token) {
            Some(record) => record.service_url.clone(),
            None => {
                debug!(token, "Reply for an unknown or cancelled subscription, dropping");
                return None;
            }
        };

        debug!(url = %url, payload, "Subscription reply");

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                error!(url = %url, %err, payload, "Failed to parse bus reply");
                return None;
            }
        };
        if !value.is_object() {
            error!(url = %url, payload, "Bus reply is not a JSON object");
            return None;
        }

        enum Delivery {
            Once(CallCallback),
            Stream(SubscribeCallback, Option<Value>),
        }

        let (delivery, owner) = {
            let mut subscriptions = self.subscriptions.borrow_mut();
            let Some(record) = subscriptions.get_mut(&token) else {
                return None;
            };
            let owner = record.owner;
            match &mut record.sink {
                ReplySink::Once(callback) => (Delivery::Once(Rc::clone(callback)), owner),
                ReplySink::Stream {
                    callback,
                    schema,
                    previous,
                    delivered,
                } => {
                    if let Err(violation) = schema.validate(&value) {
                        error!(url = %url, %violation, payload, "Reply failed schema validation, dropping");
                        return None;
                    }
                    *delivered += 1;
                    debug!(url = %url, delivered = *delivered, "Delivering subscription reply");
                    let prev = previous.replace(value.clone());
                    (Delivery::Stream(Rc::clone(callback), prev), owner)
                }
            }
        };

        // No gateway borrow is held past this point: the callback may
        // subscribe, unsubscribe, or unload its plugin.
        match delivery {
            Delivery::Once(callback) => {
                self.subscriptions.borrow_mut().remove(&token);
                self.client.cancel_stream(token);
                callback(&value);
            }
            Delivery::Stream(callback, previous) => {
                callback(previous.as_ref(), &value);
            }
        }

        owner
    }

    fn dispatch_method_call(
        &self,
        category: &str,
        name: &str,
        payload: &str,
        responder: &mut Responder,
    ) -> Option<AdapterId> {
        debug!(category, name, payload, "Bus method called");

        let key = (category.to_string(), name.to_string());
        let looked_up = {
            let methods = self.methods.borrow();
            methods.get(&key).and_then(|record| match (&record.handler, record.owner) {
                (Some(handler), Some(owner)) => {
                    Some((Rc::clone(handler), record.schema.clone(), owner))
                }
                _ => None,
            })
        };

        let Some((handler, schema, owner)) = looked_up else {
            debug!(category, name, "No handler for method call");
            responder.respond(METHOD_REMOVED_RESPONSE);
            return None;
        };

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                error!(category, name, %err, payload, "Failed to parse method request");
                responder.respond(SCHEMA_ERROR_RESPONSE);
                return None;
            }
        };
        if let Err(violation) = schema.validate(&value) {
            error!(category, name, %violation, payload, "Method request failed schema validation");
            responder.respond(SCHEMA_ERROR_RESPONSE);
            return None;
        }

        debug!(category, name, "Calling method handler");
        let result = handler(&value);
        responder.respond(&result.to_string());
        Some(owner)
    }

    /// Number of live subscription records.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Number of live subscription records owned by `owner`.
    pub fn owned_subscription_count(&self, owner: AdapterId) -> usize {
        self.subscriptions
            .borrow()
            .values()
            .filter(|record| record.owner == Some(owner))
            .count()
    }

    /// Whether a served method currently has a live owner.
    pub fn method_is_live(&self, category: &str, name: &str) -> bool {
        self.methods
            .borrow()
            .get(&(category.to_string(), name.to_string()))
            .is_some_and(|record| record.owner.is_some())
    }
}

impl Drop for BusGateway {
    fn drop(&mut self) {
        for token in self.subscriptions.borrow().keys() {
            self.client.cancel_stream(*token);
        }
    }
}

fn stringify_params(params: &Value) -> String {
    if params.is_object() {
        params.to_string()
    } else {
        "{}".to_string()
    }
}
