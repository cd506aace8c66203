//! Named loop thread with a bounded join

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{IngestionError, Result};

/// Result of stopping a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Loop exited and the thread was joined
    Joined,
    /// Loop did not exit in time; the thread was detached
    TimedOut,
    /// Nothing was running
    NotRunning,
}

/// Signals loop exit from inside the thread, including on panic unwind
struct ExitNotifier(SyncSender<()>);

impl Drop for ExitNotifier {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// A running loop thread
pub struct LoopWorker {
    name: String,
    handle: Option<JoinHandle<()>>,
    exited: Receiver<()>,
}

impl LoopWorker {
    /// Spawn `body` on a thread named `name`
    pub fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (exit_tx, exited) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _notifier = ExitNotifier(exit_tx);
                body();
            })
            .map_err(|e| IngestionError::SpawnFailed {
                thread: name.to_string(),
                message: e.to_string(),
            })?;

        debug!(thread = %name, "loop thread spawned");
        Ok(Self {
            name: name.to_string(),
            handle: Some(handle),
            exited,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the loop body has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait up to `timeout` for the loop to exit, then join it.
    ///
    /// An unresponsive thread is detached and reported, never waited on
    /// indefinitely.
    pub fn join_timeout(mut self, timeout: Duration) -> StopOutcome {
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!(thread = %self.name, "loop thread panicked");
                    }
                }
                StopOutcome::Joined
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    thread = %self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "loop thread unresponsive, detaching"
                );
                StopOutcome::TimedOut
            }
        }
    }
}
