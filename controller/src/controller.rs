use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wit_common::{plan, Origin, Plan, Request, State};

use crate::{actuator::Actuator, error::ActError, store::StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing needed to change.
    Unchanged,
    /// The new state was persisted, after a transmission when `transmitted`.
    Applied { state: State, transmitted: bool },
    /// Unrecognised action; nothing was touched.
    Ignored,
}

/// Applies actions to the persisted state and drives the actuator.
///
/// Every read-decide-actuate-write sequence runs under one lock, so web
/// requests and the scheduler cannot both act on the same prior state.
pub struct Controller<S, A> {
    store: S,
    actuator: A,
    sequence: Mutex<()>,
}

impl<S: StateStore, A: Actuator> Controller<S, A> {
    pub fn new(store: S, actuator: A) -> Arc<Self> {
        Arc::new(Self {
            store,
            actuator,
            sequence: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub async fn state(&self) -> Result<State, ActError> {
        Ok(self.store.get().await?)
    }

    pub async fn act(&self, request: Request, origin: Origin) -> Result<Outcome, ActError> {
        let _sequence = self.sequence.lock().await;
        let current = self.store.get().await?;

        match plan(&current, &request, origin)? {
            Plan::Unchanged => {
                debug!(action = request.name(), ?origin, "no change");
                Ok(Outcome::Unchanged)
            }
            Plan::Ignored(name) => {
                warn!(action = %name, "unknown action");
                Ok(Outcome::Ignored)
            }
            Plan::Commit { state, transmit } => {
                // A failed transmission returns before anything is written.
                let transmitted = match &transmit {
                    Some(token) => {
                        self.actuator.transmit(token).await?;
                        true
                    }
                    None => false,
                };
                self.store.set(&state).await?;

                info!(
                    action = request.name(),
                    ?origin,
                    running = state.running,
                    locked = state.override_lock,
                    manual = state.manual,
                    "state updated"
                );
                Ok(Outcome::Applied { state, transmitted })
            }
        }
    }

    /// Clears the override lock if it is set. Returns whether it persisted a change.
    pub async fn expire_override(&self) -> Result<bool, ActError> {
        let _sequence = self.sequence.lock().await;
        let mut state = self.store.get().await?;
        if !state.override_lock {
            return Ok(false);
        }

        state.override_lock = false;
        self.store.set(&state).await?;
        info!("override lock expired");
        Ok(true)
    }
}
