//! Lifecycle bookkeeping shared by every loop-driven component.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::ComponentState;
use tracing::info;

use crate::error::{IngestionError, Result};
use crate::sync::{lock_unpoisoned, StopSignal};
use crate::worker::{LoopWorker, StopOutcome};

/// State machine plus the stop signal and worker of one loop
///
/// `Uninitialized -> Initializing -> Ready -> Running -> Stopping -> Stopped`,
/// `Initializing -> Failed`. A stopped component may be started again.
///
/// Every launch gets its own stop signal. A loop detached by a timed-out
/// halt keeps its triggered signal and can never be revived by a restart.
pub struct LoopRuntime {
    component: String,
    state: Mutex<ComponentState>,
    signal: Mutex<Arc<StopSignal>>,
    worker: Mutex<Option<LoopWorker>>,
}

impl LoopRuntime {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: Mutex::new(ComponentState::Uninitialized),
            signal: Mutex::new(Arc::new(StopSignal::new())),
            worker: Mutex::new(None),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn state(&self) -> ComponentState {
        *lock_unpoisoned(&self.state)
    }

    pub fn set_state(&self, state: ComponentState) {
        *lock_unpoisoned(&self.state) = state;
    }

    /// Enter `Initializing`, rejecting re-initialization while running
    pub fn begin_initialize(&self) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        match *state {
            ComponentState::Running | ComponentState::Stopping => {
                Err(IngestionError::InvalidState {
                    component: self.component.clone(),
                    state: *state,
                    operation: "initialize",
                })
            }
            _ => {
                *state = ComponentState::Initializing;
                Ok(())
            }
        }
    }

    /// Spawn the loop. Returns `Ok(false)` if already running.
    pub fn launch<F>(&self, thread_name: &str, body: F) -> Result<bool>
    where
        F: FnOnce(Arc<StopSignal>) + Send + 'static,
    {
        let mut state = lock_unpoisoned(&self.state);
        match *state {
            ComponentState::Running => return Ok(false),
            ComponentState::Ready | ComponentState::Stopped => {}
            other => {
                return Err(IngestionError::InvalidState {
                    component: self.component.clone(),
                    state: other,
                    operation: "start",
                })
            }
        }

        let signal = Arc::new(StopSignal::new());
        *lock_unpoisoned(&self.signal) = signal.clone();
        let worker = LoopWorker::spawn(thread_name, move || body(signal))?;
        *lock_unpoisoned(&self.worker) = Some(worker);
        *state = ComponentState::Running;
        info!(component = %self.component, "loop started");
        Ok(true)
    }

    /// Signal the loop and wait up to `timeout` for it to exit.
    ///
    /// A no-op returning `NotRunning` unless the loop is running.
    pub fn halt(&self, timeout: Duration) -> StopOutcome {
        {
            let mut state = lock_unpoisoned(&self.state);
            if *state != ComponentState::Running {
                return StopOutcome::NotRunning;
            }
            *state = ComponentState::Stopping;
        }

        lock_unpoisoned(&self.signal).trigger();
        let worker = lock_unpoisoned(&self.worker).take();
        let outcome = match worker {
            Some(worker) => worker.join_timeout(timeout),
            None => StopOutcome::NotRunning,
        };

        self.set_state(ComponentState::Stopped);
        info!(component = %self.component, outcome = ?outcome, "loop stopped");
        outcome
    }
}
