//! Service orchestration: wiring, signals, and the run loop.

use std::rc::Rc;

use tracing::{error, info};

use beacon_core::{BusClient, BusGateway, PluginRegistry};
use beacon_framework::{
    EventLoop, LoopExit, LoopHandle, PluginManager, ServiceMonitor, TimerService, loop_channel,
};
use beacon_transport::HubClient;

use crate::config::BeaconConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::registry::StaticPluginRegistry;

/// Owns the background I/O runtime and runs the service.
///
/// The event loop itself runs on the thread that calls
/// [`run`](ServiceRuntime::run) — all core state is single-threaded; the
/// tokio runtime only hosts transport I/O, timers, and signal listeners.
pub struct ServiceRuntime {
    config: BeaconConfig,
    io_runtime: tokio::runtime::Runtime,
}

impl ServiceRuntime {
    pub fn new(config: BeaconConfig) -> RuntimeResult<Self> {
        let io_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(RuntimeError::RuntimeCreation)?;
        Ok(Self { config, io_runtime })
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    /// Attaches to the bus hub and runs until termination.
    ///
    /// Returns `Ok(())` on a clean, signal-driven shutdown. Failing to
    /// attach to the hub, failing to establish the locale subscription, and
    /// losing the bus mid-run are all fatal.
    pub fn run(&self) -> RuntimeResult<()> {
        let service = &self.config.service;
        info!(
            name = %service.name,
            hub = %service.hub_socket.display(),
            plugin_dir = %service.plugin_dir.display(),
            localization = %service.localization_path.display(),
            "Starting event monitor"
        );

        let (handle, events) = loop_channel();
        self.install_signal_handlers(handle.clone());

        let client = HubClient::connect(
            &service.hub_socket,
            &service.name,
            handle.bus_sink(),
            self.io_runtime.handle(),
        )?;

        let gateway = Rc::new(BusGateway::new(
            Rc::new(client) as Rc<dyn BusClient>,
            service.name.clone(),
        ));
        let timers = Rc::new(TimerService::new(
            self.io_runtime.handle().clone(),
            handle.clone(),
        ));
        let registry = Rc::new(StaticPluginRegistry::collect());
        let manager = PluginManager::new(
            Rc::clone(&gateway),
            timers,
            Rc::clone(&registry) as Rc<dyn PluginRegistry>,
        );

        // The monitor must outlive the loop: gateway records reach it only
        // through weak references.
        let monitor = ServiceMonitor::new(Rc::clone(&manager), Rc::clone(&gateway));
        monitor.start(registry.descriptors())?;

        let exit = EventLoop::new(events, gateway, manager).run();
        match exit {
            LoopExit::Clean => {
                info!("Shut down cleanly");
                Ok(())
            }
            LoopExit::BusLost => Err(RuntimeError::BusLost),
        }
    }

    /// SIGINT/SIGTERM request a clean shutdown. SIGUSR1 exits immediately
    /// without cleanup, leaving whatever is applied as it is — a hook for
    /// simulating crash situations in tests.
    fn install_signal_handlers(&self, handle: LoopHandle) {
        self.io_runtime.spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};

            let mut interrupt = match signal(SignalKind::interrupt()) {
                Ok(stream) => stream,
                Err(err) => {
                    error!(%err, "Failed to install SIGINT handler");
                    return;
                }
            };
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(err) => {
                    error!(%err, "Failed to install SIGTERM handler");
                    return;
                }
            };
            let mut crash_hook = match signal(SignalKind::user_defined1()) {
                Ok(stream) => stream,
                Err(err) => {
                    error!(%err, "Failed to install SIGUSR1 handler");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = interrupt.recv() => {
                        info!("Received SIGINT, terminating");
                        handle.shutdown();
                    }
                    _ = terminate.recv() => {
                        info!("Received SIGTERM, terminating");
                        handle.shutdown();
                    }
                    _ = crash_hook.recv() => {
                        std::process::exit(1);
                    }
                }
            }
        });
    }
}
