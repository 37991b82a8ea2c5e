//! Named, event-loop-bound timers.
//!
//! Expirations are delivered as [`LoopEvent::Timer`] and invoked on the loop
//! thread, never concurrently with other plugin code. Each scheduled timer
//! carries a generation number: a fire queued for a timer that has since been
//! cancelled or replaced finds no matching record and is dropped, so
//! cancellation is synchronous from the loop's perspective.

use std::cell::Cell;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use beacon_core::AdapterId;

use crate::event_loop::{LoopEvent, LoopHandle};

/// Identifies one scheduled timer instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    /// The adapter the timer belongs to.
    pub owner: AdapterId,
    /// Plugin-chosen timer id.
    pub timer: String,
    /// Distinguishes this scheduling from earlier ones under the same id.
    pub generation: u64,
}

/// Cancels its timer when dropped.
pub struct TimerHandle {
    generation: u64,
    cancel: CancellationToken,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Schedules timers on the background runtime and posts expirations into the
/// loop.
pub struct TimerService {
    runtime: tokio::runtime::Handle,
    events: LoopHandle,
    next_generation: Cell<u64>,
}

impl TimerService {
    pub fn new(runtime: tokio::runtime::Handle, events: LoopHandle) -> Self {
        Self {
            runtime,
            events,
            next_generation: Cell::new(0),
        }
    }

    /// Schedules a timer firing after `period` — repeatedly, when `repeat` —
    /// until the returned handle is dropped.
    pub fn schedule(
        &self,
        owner: AdapterId,
        timer: &str,
        period: Duration,
        repeat: bool,
    ) -> TimerHandle {
        let generation = self.next_generation.get() + 1;
        self.next_generation.set(generation);

        let key = TimerKey {
            owner,
            timer: timer.to_string(),
            generation,
        };
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let events = self.events.clone();

        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        events.post(LoopEvent::Timer(key.clone()));
                        if !repeat {
                            break;
                        }
                    }
                }
            }
        });

        TimerHandle { generation, cancel }
    }
}
