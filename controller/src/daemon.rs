use std::{sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, NaiveDate};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};
use wit_common::{MatchOrdering, Origin, Schedule, Toggle};

use crate::{
    actuator::Actuator,
    controller::{Controller, Outcome},
    error::ActError,
    store::StateStore,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub override_expired: bool,
    pub action: Option<Toggle>,
    pub outcome: Option<Outcome>,
}

/// Drives the controller from the stored schedule.
pub struct Scheduler<S, A> {
    controller: Arc<Controller<S, A>>,
    ordering: MatchOrdering,
    last_seen: NaiveDate,
}

impl<S: StateStore, A: Actuator> Scheduler<S, A> {
    pub fn new(controller: Arc<Controller<S, A>>, ordering: MatchOrdering, today: NaiveDate) -> Self {
        Self {
            controller,
            ordering,
            last_seen: today,
        }
    }

    /// Runs one cycle at `now`.
    ///
    /// The override lock expires on the first cycle of a new day, or at once
    /// in manual mode. The day only counts as seen once that step succeeded.
    pub async fn cycle(&mut self, now: &DateTime<FixedOffset>) -> Result<CycleReport, ActError> {
        let mut report = CycleReport::default();
        let state = self.controller.state().await?;
        let today = now.date_naive();

        if (today != self.last_seen || state.manual) && state.override_lock {
            report.override_expired = self.controller.expire_override().await?;
        }
        self.last_seen = today;

        if state.manual {
            return Ok(report);
        }

        report.action = Schedule::parse(&state.schedule)?.current_action(now, self.ordering);
        if let Some(action) = report.action {
            report.outcome = Some(
                self.controller
                    .act(action.into(), Origin::Scheduler)
                    .await?,
            );
        }

        Ok(report)
    }

    /// Starts the loop on the runtime. Cycle failures are logged and the loop
    /// carries on until [`SchedulerHandle::stop`].
    pub fn spawn<C>(mut self, period: Duration, clock: C) -> SchedulerHandle
    where
        C: Fn() -> DateTime<FixedOffset> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; wait one full period.
            interval.tick().await;
            info!(period_ms = period.as_millis() as u64, "scheduler started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop_rx.changed() => break,
                }

                let now = clock();
                match self.cycle(&now).await {
                    Ok(CycleReport {
                        override_expired,
                        action,
                        outcome: Some(Outcome::Applied { state, transmitted }),
                    }) => info!(
                        override_expired,
                        action = action.map(Toggle::as_str),
                        running = state.running,
                        transmitted,
                        "schedule applied"
                    ),
                    Ok(report) => debug!(?report, "scheduler cycle"),
                    Err(err) => warn!("scheduler cycle failed: {err}"),
                }
            }

            info!("scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }
}

pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop after any in-flight cycle and waits for it to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.task.await {
            warn!("scheduler task ended abnormally: {err}");
        }
    }
}
