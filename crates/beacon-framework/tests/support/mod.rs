//! Shared fixtures: a scriptable bus, a recording plugin, and a harness
//! wiring gateway, manager, and monitor together the way the runtime does.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use beacon_api::{Manager, Plugin, PluginResult, UnloadDecision};
use beacon_core::{
    BusClient, BusEvent, BusGateway, PluginDescriptor, PluginRegistry, StreamToken,
    TransportResult,
};
use beacon_framework::{
    EventLoop, LoopEvent, LoopHandle, PluginManager, ServiceMonitor, TimerService, loop_channel,
};

/// What the scriptable bus answers as the acknowledgement of a checked
/// subscription.
#[derive(Clone)]
pub enum Ack {
    Granted,
    Denied,
    Silent,
}

/// A scriptable in-process bus.
pub struct MockBus {
    next_token: Cell<StreamToken>,
    pub streams: RefCell<HashMap<StreamToken, (String, String)>>,
    pub cancelled: RefCell<Vec<StreamToken>>,
    pub calls: RefCell<Vec<(String, String)>>,
    pub posts: RefCell<Vec<(String, String)>>,
    pub registered: RefCell<Vec<(String, String)>>,
    call_replies: RefCell<HashMap<String, String>>,
    ack: RefCell<Ack>,
}

impl MockBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            next_token: Cell::new(0),
            streams: RefCell::new(HashMap::new()),
            cancelled: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            posts: RefCell::new(Vec::new()),
            registered: RefCell::new(Vec::new()),
            call_replies: RefCell::new(HashMap::new()),
            ack: RefCell::new(Ack::Granted),
        })
    }

    /// Scripts the reply for synchronous calls to `url`.
    pub fn script_call_reply(&self, url: &str, reply: &str) {
        self.call_replies
            .borrow_mut()
            .insert(url.to_string(), reply.to_string());
    }

    /// Scripts the acknowledgement behaviour for checked subscriptions.
    pub fn script_ack(&self, ack: Ack) {
        *self.ack.borrow_mut() = ack;
    }

    /// The most recently opened stream whose URL contains `url_fragment`.
    pub fn token_for(&self, url_fragment: &str) -> StreamToken {
        self.streams
            .borrow()
            .iter()
            .filter(|(_, (url, _))| url.contains(url_fragment))
            .map(|(token, _)| *token)
            .max()
            .unwrap_or_else(|| panic!("no open stream for {url_fragment}"))
    }

    /// The server-status stream watching `service`.
    pub fn status_token(&self, service: &str) -> StreamToken {
        self.streams
            .borrow()
            .iter()
            .filter(|(_, (url, payload))| {
                url.contains("registerServerStatus") && payload.contains(service)
            })
            .map(|(token, _)| *token)
            .max()
            .unwrap_or_else(|| panic!("no server-status stream for {service}"))
    }

    pub fn open_stream_count(&self) -> usize {
        self.streams.borrow().len()
    }
}

impl BusClient for MockBus {
    fn call_once(
        &self,
        url: &str,
        payload: &str,
        _timeout: Duration,
    ) -> TransportResult<Option<String>> {
        self.calls
            .borrow_mut()
            .push((url.to_string(), payload.to_string()));
        let reply = self
            .call_replies
            .borrow()
            .get(url)
            .cloned()
            .unwrap_or_else(|| r#"{"returnValue":true}"#.to_string());
        Ok(Some(reply))
    }

    fn post(&self, url: &str, payload: &str) -> TransportResult<()> {
        self.posts
            .borrow_mut()
            .push((url.to_string(), payload.to_string()));
        Ok(())
    }

    fn open_stream(
        &self,
        url: &str,
        payload: &str,
        first_reply: Option<Duration>,
    ) -> TransportResult<(StreamToken, Option<String>)> {
        let token = self.next_token.get() + 1;
        self.next_token.set(token);
        self.streams
            .borrow_mut()
            .insert(token, (url.to_string(), payload.to_string()));

        let first = match first_reply {
            None => None,
            Some(_) => match &*self.ack.borrow() {
                Ack::Granted => Some(r#"{"returnValue":true}"#.to_string()),
                Ack::Denied => Some(r#"{"returnValue":false}"#.to_string()),
                Ack::Silent => None,
            },
        };
        Ok((token, first))
    }

    fn cancel_stream(&self, token: StreamToken) {
        self.streams.borrow_mut().remove(&token);
        self.cancelled.borrow_mut().push(token);
    }

    fn register_method(&self, category: &str, name: &str) -> TransportResult<()> {
        self.registered
            .borrow_mut()
            .push((category.to_string(), name.to_string()));
        Ok(())
    }
}

/// Captures the response sent through a [`Responder`](beacon_core::Responder).
pub fn capture_responder() -> (
    std::sync::Arc<std::sync::Mutex<Option<String>>>,
    beacon_core::Responder,
) {
    let slot = std::sync::Arc::new(std::sync::Mutex::new(None));
    let inner = std::sync::Arc::clone(&slot);
    let responder = beacon_core::Responder::new(move |payload| {
        *inner.lock().unwrap() = Some(payload);
    });
    (slot, responder)
}

type PluginFactory = Box<dyn Fn(Rc<dyn Manager>) -> Option<Box<dyn Plugin>>>;

/// Registry fed by the test, recording releases.
pub struct TestRegistry {
    descriptors: RefCell<Vec<PluginDescriptor>>,
    factories: RefCell<HashMap<&'static str, PluginFactory>>,
    pub released: RefCell<Vec<String>>,
}

impl TestRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            descriptors: RefCell::new(Vec::new()),
            factories: RefCell::new(HashMap::new()),
            released: RefCell::new(Vec::new()),
        })
    }

    pub fn add(&self, descriptor: PluginDescriptor, factory: PluginFactory) {
        self.factories
            .borrow_mut()
            .insert(descriptor.identity, factory);
        self.descriptors.borrow_mut().push(descriptor);
    }
}

impl PluginRegistry for TestRegistry {
    fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.descriptors.borrow().clone()
    }

    fn instantiate(
        &self,
        descriptor: &PluginDescriptor,
        manager: Rc<dyn Manager>,
    ) -> Option<Box<dyn Plugin>> {
        self.factories
            .borrow()
            .get(descriptor.identity)
            .and_then(|factory| factory(manager))
    }

    fn release(&self, descriptor: &PluginDescriptor) {
        self.released
            .borrow_mut()
            .push(descriptor.identity.to_string());
    }
}

/// A plugin that records every entry point into a shared event log.
pub struct MockPlugin {
    pub name: &'static str,
    pub manager: Rc<dyn Manager>,
    pub events: Rc<RefCell<Vec<String>>>,
    pub stop_decision: UnloadDecision,
    pub on_start: Option<Rc<dyn Fn(&MockPlugin)>>,
}

impl MockPlugin {
    pub fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl Plugin for MockPlugin {
    fn start_monitoring(&mut self) -> PluginResult<()> {
        self.events.borrow_mut().push(format!("start:{}", self.name));
        if let Some(hook) = self.on_start.clone() {
            hook(self);
        }
        Ok(())
    }

    fn stop_monitoring(&mut self, service: &str) -> PluginResult<UnloadDecision> {
        self.events
            .borrow_mut()
            .push(format!("stop:{}:{service}", self.name));
        Ok(self.stop_decision)
    }

    fn ui_locale_changed(&mut self, ui_locale: &str) -> PluginResult<()> {
        self.events
            .borrow_mut()
            .push(format!("locale:{}:{ui_locale}", self.name));
        Ok(())
    }
}

impl Drop for MockPlugin {
    fn drop(&mut self) {
        self.events.borrow_mut().push(format!("drop:{}", self.name));
    }
}

/// Everything a scenario needs, wired the way the runtime wires it.
pub struct Harness {
    pub bus: Rc<MockBus>,
    pub gateway: Rc<BusGateway>,
    pub manager: Rc<PluginManager>,
    pub monitor: Rc<ServiceMonitor>,
    pub registry: Rc<TestRegistry>,
    pub handle: LoopHandle,
    pub events: Rc<RefCell<Vec<String>>>,
    event_loop: RefCell<EventLoop>,
    _runtime: tokio::runtime::Runtime,
}

impl Harness {
    pub fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .expect("runtime");

        let (handle, rx) = loop_channel();
        let bus = MockBus::new();
        let gateway = Rc::new(BusGateway::new(
            Rc::clone(&bus) as Rc<dyn BusClient>,
            "com.webos.service.beacon",
        ));
        let timers = Rc::new(TimerService::new(runtime.handle().clone(), handle.clone()));
        let registry = TestRegistry::new();
        let manager = PluginManager::new(
            Rc::clone(&gateway),
            timers,
            Rc::clone(&registry) as Rc<dyn PluginRegistry>,
        );
        let monitor = ServiceMonitor::new(Rc::clone(&manager), Rc::clone(&gateway));
        let event_loop = EventLoop::new(rx, Rc::clone(&gateway), Rc::clone(&manager));

        Self {
            bus,
            gateway,
            manager,
            monitor,
            registry,
            handle,
            events: Rc::new(RefCell::new(Vec::new())),
            event_loop: RefCell::new(event_loop),
            _runtime: runtime,
        }
    }

    /// Registers a [`MockPlugin`] under `identity` with the given required
    /// services.
    pub fn add_plugin(
        &self,
        identity: &'static str,
        name: &'static str,
        required_services: &'static [&'static str],
        stop_decision: UnloadDecision,
        on_start: Option<Rc<dyn Fn(&MockPlugin)>>,
    ) {
        let descriptor = PluginDescriptor {
            api_version: beacon_api::API_VERSION,
            identity,
            name,
            required_services,
            create: |_, _| None,
        };
        let events = Rc::clone(&self.events);
        self.registry.add(
            descriptor,
            Box::new(move |manager| {
                events.borrow_mut().push(format!("instantiate:{name}"));
                Some(Box::new(MockPlugin {
                    name,
                    manager,
                    events: Rc::clone(&events),
                    stop_decision,
                    on_start: on_start.clone(),
                }))
            }),
        );
    }

    /// Starts the monitor over every registered plugin.
    pub fn start(&self) {
        self.monitor
            .start(self.registry.descriptors())
            .expect("monitor start");
    }

    /// Dispatches one synthesized loop event.
    pub fn dispatch(&self, event: LoopEvent) {
        let _ = self.event_loop.borrow().dispatch(event);
    }

    /// Dispatches a bus reply on the most recent stream matching
    /// `url_fragment`.
    pub fn reply(&self, url_fragment: &str, payload: Value) {
        let token = self.bus.token_for(url_fragment);
        self.dispatch(LoopEvent::Bus(BusEvent::Reply {
            token,
            payload: payload.to_string(),
        }));
    }

    /// Delivers the first locale reply (UI locale `en-US`).
    pub fn first_locale(&self) {
        self.locale("en-US");
    }

    /// Delivers a locale reply with the given UI locale.
    pub fn locale(&self, ui: &str) {
        self.reply(
            "getSystemSettings",
            json!({"settings": {"localeInfo": {"locales": {"UI": ui}}}}),
        );
    }

    /// Delivers a server-status reply for `service`.
    pub fn service_status(&self, service: &str, connected: bool) {
        let token = self.bus.status_token(service);
        self.dispatch(LoopEvent::Bus(BusEvent::Reply {
            token,
            payload: json!({"serviceName": service, "connected": connected}).to_string(),
        }));
    }

    /// Drains queued loop events (timer fires arrive through the channel).
    pub fn drain(&self) {
        let _ = self.event_loop.borrow_mut().drain();
    }

    /// Drains the loop until `predicate` holds, for up to two seconds.
    pub fn wait_until(&self, predicate: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            self.drain();
            if predicate() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn event_count(&self, event: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.as_str() == event)
            .count()
    }
}
