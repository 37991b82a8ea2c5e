//! The single event loop every completion is marshalled into.

use std::ops::ControlFlow;
use std::rc::Rc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use beacon_core::{BusEvent, BusGateway, BusSink};

use crate::manager::PluginManager;
use crate::timer::TimerKey;

/// An event consumed by the loop.
#[derive(Debug)]
pub enum LoopEvent {
    /// A completion from the bus transport.
    Bus(BusEvent),
    /// A timer expired.
    Timer(TimerKey),
    /// Clean termination was requested.
    Shutdown,
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested.
    Clean,
    /// The bus connection dropped. Fatal; the process should exit non-zero.
    BusLost,
}

/// Cloneable producer side of the loop channel.
#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::UnboundedSender<LoopEvent>,
}

impl LoopHandle {
    /// Enqueues an event. Sends after the loop has stopped are dropped.
    pub fn post(&self, event: LoopEvent) {
        let _ = self.tx.send(event);
    }

    /// Requests clean termination.
    pub fn shutdown(&self) {
        self.post(LoopEvent::Shutdown);
    }

    /// A [`BusSink`] feeding this loop, for constructing the bus client.
    pub fn bus_sink(&self) -> BusSink {
        let tx = self.tx.clone();
        Box::new(move |event| {
            let _ = tx.send(LoopEvent::Bus(event));
        })
    }
}

/// Creates the loop channel.
pub fn loop_channel() -> (LoopHandle, mpsc::UnboundedReceiver<LoopEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LoopHandle { tx }, rx)
}

/// Dispatches loop events serially on the calling thread.
pub struct EventLoop {
    events: mpsc::UnboundedReceiver<LoopEvent>,
    gateway: Rc<BusGateway>,
    manager: Rc<PluginManager>,
}

impl EventLoop {
    pub fn new(
        events: mpsc::UnboundedReceiver<LoopEvent>,
        gateway: Rc<BusGateway>,
        manager: Rc<PluginManager>,
    ) -> Self {
        Self {
            events,
            gateway,
            manager,
        }
    }

    /// Runs until shutdown or loss of the bus, then unloads every plugin.
    pub fn run(mut self) -> LoopExit {
        info!("Event loop running");
        let exit = loop {
            match self.events.blocking_recv() {
                Some(event) => match self.dispatch(event) {
                    ControlFlow::Continue(()) => {}
                    ControlFlow::Break(exit) => break exit,
                },
                // Every producer is gone; nothing can ever arrive again.
                None => break LoopExit::Clean,
            }
        };
        self.manager.shutdown();
        exit
    }

    /// Dispatches every event already queued, without blocking.
    pub fn drain(&mut self) -> ControlFlow<LoopExit> {
        while let Ok(event) = self.events.try_recv() {
            self.dispatch(event)?;
        }
        ControlFlow::Continue(())
    }

    /// Dispatches one event. Exposed so tests can drive the loop directly.
    pub fn dispatch(&self, event: LoopEvent) -> ControlFlow<LoopExit> {
        match event {
            LoopEvent::Bus(BusEvent::Disconnected) => {
                error!("Bus connection lost, terminating");
                ControlFlow::Break(LoopExit::BusLost)
            }
            LoopEvent::Bus(event) => {
                if let Some(owner) = self.gateway.dispatch(event) {
                    self.manager.process_unload_by_id(owner);
                }
                ControlFlow::Continue(())
            }
            LoopEvent::Timer(key) => {
                debug!(?key, "Timer event");
                self.manager.dispatch_timer(&key);
                ControlFlow::Continue(())
            }
            LoopEvent::Shutdown => {
                info!("Terminating");
                ControlFlow::Break(LoopExit::Clean)
            }
        }
    }
}
