//! The always-on scheduler loop.
//!
//! Not a polling loop: each pass computes the exact delay to the next
//! configured wall-clock slot and sleeps that long. The slot set is
//! derived from the active configs' `scheduled_time` values on every
//! pass, so editing a campaign's time in the dashboard takes effect at
//! the next wake without a restart. A configured fallback list covers
//! the empty-config case.
//!
//! Shutdown is cooperative: the stop signal only interrupts the sleep,
//! never a tick in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike};
use revenda_core::Storage;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::dispatch::Dispatch;
use crate::engine::{AutomationEngine, SubItemOutcome};
use crate::housekeeping;

pub struct Scheduler {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    engine: AutomationEngine,
    fallback_wake_times: Vec<NaiveTime>,
}

/// Handle to a running scheduler. Dropping it does NOT stop the loop;
/// call [`SchedulerHandle::stop`].
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the loop to finish. An in-flight
    /// tick always runs to completion first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl Scheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        dispatcher: Arc<dyn Dispatch>,
        clock: Arc<dyn Clock>,
        fallback_wake_times: Vec<NaiveTime>,
    ) -> Self {
        let engine = AutomationEngine::new(storage.clone(), dispatcher, clock.clone());
        Self {
            storage,
            clock,
            engine,
            fallback_wake_times,
        }
    }

    /// Spawn the loop as a background tokio task.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SchedulerHandle { shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("⏰ automation scheduler started");

        // Restart edge case: if the process comes up exactly on a slot,
        // run it now instead of waiting a full day for it to come back.
        let times = self.wake_times().await;
        if matches_current_minute(&times, &*self.clock) {
            tracing::info!("current time matches a slot on startup, running immediately");
            self.tick().await;
        }

        loop {
            let times = self.wake_times().await;
            let delay = delay_until_next_wake(&times, self.clock.civil_now());
            tracing::debug!("next wake in {}s", delay.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(delay) => self.tick().await,
                _ = shutdown.changed() => {
                    tracing::info!("automation scheduler stopping");
                    break;
                }
            }
        }
    }

    /// One wake: housekeeping first, then every due automation, each
    /// inside its own failure boundary.
    async fn tick(&self) {
        let today = self.clock.civil_date();
        if let Err(e) = housekeeping::deactivate_expired_clients(&*self.storage, today).await {
            tracing::error!("housekeeping failed: {e}");
        }

        let configs = match self.storage.get_all_automation_configs().await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!("failed to load automation configs: {e}");
                return;
            }
        };

        let now_hhmm = self.clock.civil_time_string();
        for config in configs.iter().filter(|c| c.is_active) {
            if config.scheduled_time != now_hhmm {
                continue;
            }
            // One automation's failure must not starve its siblings.
            match self.engine.run_scheduled(config).await {
                Ok(Some(reports)) => {
                    let aborted = reports
                        .iter()
                        .any(|r| matches!(r.outcome, SubItemOutcome::Error { .. }));
                    if aborted {
                        tracing::error!(
                            "automation '{}' aborted mid-pass after a storage failure \
                             ({} sub-items reported)",
                            config.automation_type,
                            reports.len()
                        );
                    } else {
                        tracing::info!(
                            "automation '{}' processed {} sub-items",
                            config.automation_type,
                            reports.len()
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::error!(
                    "automation '{}' failed: {e}",
                    config.automation_type
                ),
            }
        }
    }

    /// Slot set for the next sleep: the active configs' times, sorted
    /// and deduplicated, or the fallback list when none exist.
    async fn wake_times(&self) -> Vec<NaiveTime> {
        let mut times: Vec<NaiveTime> = match self.storage.get_all_automation_configs().await {
            Ok(configs) => configs
                .iter()
                .filter(|c| c.is_active)
                .filter_map(|c| match crate::clock::parse_hhmm(&c.scheduled_time) {
                    Ok(t) => Some(t),
                    Err(e) => {
                        tracing::warn!("automation '{}': {e}", c.automation_type);
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::warn!("failed to load configs for wake times, using fallback: {e}");
                Vec::new()
            }
        };
        if times.is_empty() {
            times = self.fallback_wake_times.clone();
        }
        times.sort();
        times.dedup();
        times
    }
}

fn matches_current_minute(times: &[NaiveTime], clock: &dyn Clock) -> bool {
    let now = clock.civil_now();
    times
        .iter()
        .any(|t| t.hour() == now.hour() && t.minute() == now.minute())
}

/// Exact delay until the next slot: the first time strictly after the
/// current civil instant today, wrapping to the earliest slot tomorrow.
fn delay_until_next_wake(times: &[NaiveTime], civil_now: DateTime<FixedOffset>) -> Duration {
    // No slots at all: idle and re-derive in a minute.
    if times.is_empty() {
        return Duration::from_secs(60);
    }

    let now = civil_now.naive_local();
    let today = civil_now.date_naive();
    for &t in times {
        let target = today.and_time(t);
        if target > now {
            return (target - now).to_std().unwrap_or_default();
        }
    }

    let tomorrow = today.succ_opt().unwrap_or(today);
    (tomorrow.and_time(times[0]) - now)
        .to_std()
        .unwrap_or_else(|_| Duration::from_secs(60))
}
