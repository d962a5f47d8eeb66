//! Start/stop control of the periodic push loop
use log::{debug, info};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::error::{ExporterError, Result};

struct SchedulerState {
    running: AtomicBool,
    /// Set only while `running` is true
    cancel: Mutex<Option<CancellationToken>>,
}

/// Clears the running state when the loop task ends, including by panic
struct RunningGuard(Arc<SchedulerState>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut cancel = self.0.cancel.lock();
        *cancel = None;
        self.0.running.store(false, Ordering::Release);
    }
}

/// Runs one background loop at a time, firing a tick on a fixed interval
pub struct Scheduler {
    state: Arc<SchedulerState>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SchedulerState {
                running: AtomicBool::new(false),
                cancel: Mutex::new(None),
            }),
        }
    }

    /// Spawn the loop on the current tokio runtime and return immediately.
    ///
    /// The first tick fires one `interval` after start. Ticks run sequentially;
    /// a slow tick delays the next one instead of overlapping it.
    pub fn start<F, Fut>(&self, interval: Duration, mut tick: F) -> Result<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(ExporterError::InvalidInterval);
        }
        let handle = Handle::try_current().map_err(|_| ExporterError::NoRuntime)?;

        let mut cancel = self.state.cancel.lock();
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ExporterError::ClientAlreadyRunning);
        }
        let token = CancellationToken::new();
        *cancel = Some(token.clone());
        drop(cancel);

        let guard = RunningGuard(Arc::clone(&self.state));
        handle.spawn(async move {
            let _guard = guard;
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            debug!("Starting remote_write client (interval: {:?})", interval);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => tick().await,
                }
            }
            info!("Stopping remote_write client");
        });

        Ok(())
    }

    /// Request the loop to stop. Does not wait for it to exit.
    pub fn stop(&self) {
        if let Some(token) = self.state.cancel.lock().take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
