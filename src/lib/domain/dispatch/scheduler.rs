//! Periodic trigger for the dispatch cycle

use std::{future::Future, time::Duration};

use clap::Parser;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
pub struct SchedulerConfig {
    /// Run the dispatch cycle automatically
    #[clap(
        long = "dispatch-enabled",
        env = "DISPATCH_ENABLED",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub enabled: bool,

    /// Seconds between dispatch cycles. Scheduling is skipped unless positive.
    #[clap(
        long = "dispatch-interval-seconds",
        env = "DISPATCH_INTERVAL_SECONDS",
        default_value = "120",
        allow_negative_numbers = true
    )]
    pub interval_seconds: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 120,
        }
    }
}

impl SchedulerConfig {
    /// The period between cycles, if scheduling should happen at all
    pub fn period(&self) -> Option<Duration> {
        if !self.enabled || self.interval_seconds <= 0 {
            return None;
        }

        Some(Duration::from_secs(self.interval_seconds.unsigned_abs()))
    }
}

/// Scheduler lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer is running
    Stopped,

    /// The timer is firing the job
    Running,
}

/// Fires a job on a fixed period.
///
/// The job runs on the timer's own task, so a slow run delays the next firing instead of
/// overlapping it, and missed firings are coalesced into one.
#[derive(Debug)]
pub struct CycleScheduler {
    config: SchedulerConfig,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl CycleScheduler {
    /// Create a stopped scheduler
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// The current lifecycle state
    pub fn state(&self) -> SchedulerState {
        match self.running {
            Some(_) => SchedulerState::Running,
            None => SchedulerState::Stopped,
        }
    }

    /// Start firing `job`, the first time immediately.
    ///
    /// # Returns
    /// `true` if a timer was created. A disabled scheduler, one with a non-positive interval,
    /// or one that's already running creates no timer and stays as it was.
    pub fn start<F, Fut>(&mut self, mut job: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.running.is_some() {
            warn!("Dispatch scheduler is already running");
            return false;
        }

        let Some(period) = self.config.period() else {
            info!("Dispatch scheduling is disabled");
            return false;
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => job().await,
                    _ = token.cancelled() => return,
                }
            }
        });

        info!("Dispatching every {} seconds", period.as_secs());

        self.running = Some((cancel, handle));

        true
    }

    /// Stop the timer, letting a job that's already running finish first
    pub async fn stop(&mut self) {
        let Some((cancel, handle)) = self.running.take() else {
            return;
        };

        cancel.cancel();

        if let Err(err) = handle.await {
            warn!("Dispatch scheduler task ended abnormally: {}", err);
        }

        debug!("Dispatch scheduler stopped");
    }
}
