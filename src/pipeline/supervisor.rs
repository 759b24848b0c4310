//! Completion barrier with dynamic registration.
//!
//! Units are submitted through a cloneable [`UnitSpawner`], including from
//! inside other running units. [`Supervisor::run`] keeps joining until no
//! unit is running and nothing is waiting in the submission channel. A unit
//! submits its children before it returns, so once the running set drains
//! every child is already in the channel.

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::PipelineError;

type Job = BoxFuture<'static, Result<(), PipelineError>>;

/// Handle for submitting units to a running [`Supervisor`].
#[derive(Clone)]
pub struct UnitSpawner {
    tx: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for UnitSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitSpawner").finish_non_exhaustive()
    }
}

impl UnitSpawner {
    /// Submits a unit. Dropped silently once the supervisor has stopped.
    pub fn spawn<F>(&self, unit: F)
    where
        F: Future<Output = Result<(), PipelineError>> + Send + 'static,
    {
        if self.tx.send(Box::pin(unit)).is_err() {
            debug!("supervisor stopped, unit dropped");
        }
    }
}

/// Owns all running units of one run.
pub struct Supervisor {
    rx: mpsc::UnboundedReceiver<Job>,
    spawner: UnitSpawner,
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            spawner: UnitSpawner { tx },
        }
    }

    #[must_use]
    pub fn spawner(&self) -> UnitSpawner {
        self.spawner.clone()
    }

    /// Runs until every submitted unit, and every unit those submitted, has
    /// finished. Returns the number of units joined.
    ///
    /// # Errors
    ///
    /// The first [`PipelineError`] returned by a unit. All other units are
    /// aborted.
    pub async fn run(mut self) -> Result<usize, PipelineError> {
        let mut running = JoinSet::new();
        let mut joined = 0usize;

        loop {
            if running.is_empty() {
                match self.rx.try_recv() {
                    Ok(job) => {
                        running.spawn(job);
                        continue;
                    }
                    Err(_) => break,
                }
            }

            tokio::select! {
                Some(job) = self.rx.recv() => {
                    running.spawn(job);
                }
                Some(result) = running.join_next() => {
                    joined += 1;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(fatal)) => {
                            warn!(error = %fatal, "fatal unit error, aborting run");
                            running.abort_all();
                            return Err(fatal);
                        }
                        Err(e) => warn!(error = %e, "unit task panicked"),
                    }
                }
            }
        }

        debug!(joined, "all units finished");
        Ok(joined)
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor").finish_non_exhaustive()
    }
}
