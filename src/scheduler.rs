use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::Result;
use crate::pipeline::CycleReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Drives cycles on a fixed interval. A cycle runs to completion before the
/// next one can start; an overrunning cycle delays the next trigger, and
/// missed triggers are not queued.
pub struct Scheduler {
    interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self { interval, state }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Loop forever. Returns only when a cycle fails with a fatal
    /// (storage) error.
    pub async fn run<F, Fut>(&self, mut cycle: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CycleReport>>,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            self.state.send_replace(SchedulerState::Running);
            let started = Instant::now();
            let outcome = cycle().await;
            self.state.send_replace(SchedulerState::Idle);

            let elapsed = started.elapsed();
            match outcome {
                Ok(report) => {
                    tracing::debug!(?report, elapsed_ms = elapsed.as_millis() as u64, "cycle finished")
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("stopping scheduler: {}", e);
                    return Err(e);
                }
                Err(e) => tracing::warn!("cycle failed: {}", e),
            }

            if elapsed > self.interval {
                tracing::warn!(
                    elapsed_secs = elapsed.as_secs(),
                    interval_secs = self.interval.as_secs(),
                    "cycle overran the interval, next one starts late"
                );
            }
        }
    }
}
