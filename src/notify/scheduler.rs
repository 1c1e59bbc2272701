//! Periodic pending-output check
//!
//! The scheduler is either idle or running exactly one polling cycle.
//! `enable` and `disable` are the only transitions and both are idempotent.
//! A disabled cycle finishes the check it is in the middle of, if any, and
//! never starts another.

use super::{OutputMonitor, ValueChangedSink};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Payload of every "value changed" event
pub const VALUE_CHANGED_SENTINEL: [u8; 1] = [0x01];

enum SchedulerState {
    Idle,
    Active {
        cycle: CancellationToken,
        handle: JoinHandle<()>,
    },
}

pub struct NotificationScheduler {
    monitor: Arc<dyn OutputMonitor>,
    sink: Arc<dyn ValueChangedSink>,
    interval: Duration,
    state: Mutex<SchedulerState>,
    // Disabled cycles that may still be finishing a check
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationScheduler {
    pub fn new(
        monitor: Arc<dyn OutputMonitor>,
        sink: Arc<dyn ValueChangedSink>,
        interval: Duration,
    ) -> Self {
        Self {
            monitor,
            sink,
            interval,
            state: Mutex::new(SchedulerState::Idle),
            retired: Mutex::new(Vec::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling, unless a cycle is already running.
    ///
    /// The first check runs immediately. Must be called from within a tokio
    /// runtime.
    pub fn enable(&self) {
        let mut state = self.lock_state();

        if let SchedulerState::Active { handle, .. } = &*state {
            if !handle.is_finished() {
                trace!("Notifications already enabled");
                return;
            }
        }

        let cycle = CancellationToken::new();
        let handle = tokio::spawn(run_cycle(
            Arc::clone(&self.monitor),
            Arc::clone(&self.sink),
            self.interval,
            cycle.clone(),
        ));
        *state = SchedulerState::Active { cycle, handle };

        debug!("Notifications enabled (every {:?})", self.interval);
    }

    /// Stop polling. A no-op when already idle.
    pub fn disable(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), SchedulerState::Idle);

        if let SchedulerState::Active { cycle, handle } = previous {
            cycle.cancel();

            let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
            retired.retain(|h| !h.is_finished());
            retired.push(handle);

            debug!("Notifications disabled");
        }
    }

    pub fn is_notifying(&self) -> bool {
        matches!(*self.lock_state(), SchedulerState::Active { .. })
    }

    /// Disable and wait for every polling task to exit.
    pub async fn shutdown(&self) {
        self.disable();

        let handles: Vec<_> = self
            .retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Notification cycle panicked: {}", e);
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_cycle(
    monitor: Arc<dyn OutputMonitor>,
    sink: Arc<dyn ValueChangedSink>,
    period: Duration,
    cycle: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cycle.cancelled() => break,
            _ = ticker.tick() => {}
        }

        check(monitor.as_ref(), sink.as_ref());
    }

    trace!("Notification cycle stopped");
}

/// One tick: notify once per burst of output.
///
/// The pending flags are only acknowledged after the sink accepted the
/// event, so a failed emit is retried on the next tick.
fn check(monitor: &dyn OutputMonitor, sink: &dyn ValueChangedSink) {
    if !monitor.has_pending_output() {
        return;
    }

    trace!("Output pending, emitting value changed");
    match sink.value_changed(&VALUE_CHANGED_SENTINEL) {
        Ok(()) => monitor.acknowledge_pending(),
        Err(e) => warn!("Failed to emit value changed: {}", e),
    }
}
