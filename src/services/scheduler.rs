//! Periodic check scheduling
//!
//! One check after a short startup delay, then one per interval. Every run
//! goes through the checker's single-flight guard, so a tick that lands
//! during a manual check is dropped instead of queued.

use crate::checker::WantlistChecker;
use crate::error::CheckError;
use crate::types::Trigger;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{info, warn};

pub struct Scheduler {
    checker: Arc<WantlistChecker>,
    interval: Duration,
    initial_delay: Duration,
}

impl Scheduler {
    pub fn new(checker: Arc<WantlistChecker>, interval: Duration, initial_delay: Duration) -> Self {
        Self {
            checker,
            interval,
            initial_delay,
        }
    }

    /// Runs until the task is dropped
    pub async fn run(self) {
        let start = Instant::now();
        info!(
            "Scheduler started: first check in {}s, then every {} minutes",
            self.initial_delay.as_secs(),
            self.interval.as_secs() / 60
        );

        // Interval is anchored to process start, not to the end of the startup check
        let mut ticker = interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        sleep(self.initial_delay).await;
        self.trigger(Trigger::Startup).await;

        loop {
            ticker.tick().await;
            self.trigger(Trigger::Interval).await;
        }
    }

    async fn trigger(&self, trigger: Trigger) {
        match self.checker.check_now(trigger).await {
            Ok(_) => {}
            Err(CheckError::AlreadyRunning) => {
                warn!("Skipping {} check: previous check still running", trigger);
            }
        }
    }
}
