//! Drives one job at a time through stage, watch, launch and wait.
//!
//! ```text
//! Idle ──submit──▶ Staging ──▶ Launching ──▶ Waiting ──▶ Completed(outcome)
//!                     │            │            │
//!                     └────────────┴────────────┴──▶ Completed(Failure | Cancelled)
//! ```
//!
//! All transitions for a job happen on the single task spawned by
//! [`JobCoordinator::submit`]; [`JobCoordinator::cancel`] only signals that
//! task. The status watch is armed after staging and before the worker is
//! launched, so a worker that finishes instantly cannot be missed.
//!
//! Cancellation never deletes staged files. The next submission
//! overwrites them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mixbuild_core::{types::new_job_id, FailureReason, JobId, JobInput, JobOutcome};
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::HandoffConfig;
use crate::events::{JobEvent, JobState};
use crate::launcher::{Launcher, ProcessLauncher};
use crate::stager::{JobStager, StageError};
use crate::watcher::StatusWatcher;

/// Capacity of the lifecycle event channel. A job emits at most five
/// events, so lagging only happens to subscribers that stop reading.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("job {job_id} is still in progress")]
    AlreadyInProgress { job_id: JobId },
}

/// Caller's handle on a submitted job.
#[derive(Debug)]
pub struct JobTicket {
    job_id: JobId,
    outcome: oneshot::Receiver<JobOutcome>,
    cancel: CancellationToken,
}

impl JobTicket {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Request cancellation of this job. Same effect as
    /// [`JobCoordinator::cancel`] while this job is current.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> JobOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(job_id = %self.job_id, "Job task ended without an outcome");
                JobOutcome::Cancelled
            }
        }
    }
}

struct ActiveJob {
    job_id: JobId,
    cancel: CancellationToken,
}

struct Slot {
    state: JobState,
    active: Option<ActiveJob>,
}

struct Inner<L> {
    stager: JobStager,
    watcher: StatusWatcher,
    launcher: L,
    default_timeout: Option<Duration>,
    slot: Mutex<Slot>,
    event_tx: broadcast::Sender<JobEvent>,
}

/// Submits jobs to the out-of-process worker and reports their outcome.
///
/// Cheap to clone; clones share the same job slot.
pub struct JobCoordinator<L: Launcher = ProcessLauncher> {
    inner: Arc<Inner<L>>,
}

impl<L: Launcher> Clone for JobCoordinator<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl JobCoordinator<ProcessLauncher> {
    /// Coordinator that launches the configured worker executable.
    pub fn new(config: &HandoffConfig) -> Self {
        Self::with_launcher(config, ProcessLauncher::new(config))
    }
}

impl<L: Launcher> JobCoordinator<L> {
    pub fn with_launcher(config: &HandoffConfig, launcher: L) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                stager: JobStager::new(config),
                watcher: StatusWatcher::new(config.status_path()),
                launcher,
                default_timeout: config.job_timeout,
                slot: Mutex::new(Slot {
                    state: JobState::Idle,
                    active: None,
                }),
                event_tx,
            }),
        }
    }

    /// Receive lifecycle events for every job submitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Current state of the job slot.
    pub fn state(&self) -> JobState {
        self.inner.lock_slot().state.clone()
    }

    /// Submit `input` using the configured default timeout, if any.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, input: JobInput) -> Result<JobTicket, HandoffError> {
        self.start(input, self.inner.default_timeout)
    }

    /// Submit `input`, failing with [`FailureReason::Timeout`] if the
    /// worker has not reported within `timeout`.
    pub fn submit_with_timeout(
        &self,
        input: JobInput,
        timeout: Duration,
    ) -> Result<JobTicket, HandoffError> {
        self.start(input, Some(timeout))
    }

    /// Cancel the in-flight job. Returns `false` if there was none.
    pub fn cancel(&self) -> bool {
        let slot = self.inner.lock_slot();
        match &slot.active {
            Some(active) => {
                tracing::info!(job_id = %active.job_id, "Job cancellation requested");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn start(&self, input: JobInput, timeout: Option<Duration>) -> Result<JobTicket, HandoffError> {
        let job_id = new_job_id();
        let cancel = CancellationToken::new();
        {
            let mut slot = self.inner.lock_slot();
            if let Some(active) = slot.active.as_ref().filter(|_| slot.state.is_busy()) {
                return Err(HandoffError::AlreadyInProgress {
                    job_id: active.job_id,
                });
            }
            slot.state = JobState::Staging;
            slot.active = Some(ActiveJob {
                job_id,
                cancel: cancel.clone(),
            });
        }
        tracing::info!(%job_id, timeout_secs = ?timeout.map(|t| t.as_secs_f64()), "Job submitted");
        self.inner.publish(JobEvent::StateChanged {
            job_id,
            state: JobState::Staging,
        });

        let (tx, rx) = oneshot::channel();
        let ticket = JobTicket {
            job_id,
            outcome: rx,
            cancel: cancel.clone(),
        };

        if let Err(e) = input.validate() {
            tracing::warn!(%job_id, error = %e, "Job input rejected");
            let outcome = JobOutcome::failure(FailureReason::from(&e));
            self.inner.finish(job_id, outcome.clone());
            let _ = tx.send(outcome);
            return Ok(ticket);
        }

        // A deadline too far out to represent is no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.run(job_id, &input, deadline, &cancel).await;
            inner.finish(job_id, outcome.clone());
            let _ = tx.send(outcome);
        });

        Ok(ticket)
    }
}

impl<L: Launcher> Inner<L> {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn transition(&self, job_id: JobId, state: JobState) {
        tracing::info!(%job_id, state = state.as_str(), "Job state changed");
        self.lock_slot().state = state.clone();
        self.publish(JobEvent::StateChanged { job_id, state });
    }

    fn finish(&self, job_id: JobId, outcome: JobOutcome) {
        {
            let mut slot = self.lock_slot();
            slot.state = JobState::Completed {
                outcome: outcome.clone(),
            };
            slot.active = None;
        }
        match &outcome {
            JobOutcome::Success { result_path } => {
                tracing::info!(%job_id, result_path = %result_path.display(), "Job completed");
            }
            JobOutcome::Failure { reason } => {
                tracing::warn!(%job_id, %reason, "Job failed");
            }
            JobOutcome::Cancelled => {
                tracing::info!(%job_id, "Job cancelled");
            }
        }
        self.publish(JobEvent::Completed { job_id, outcome });
    }

    async fn run(
        &self,
        job_id: JobId,
        input: &JobInput,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        // Staging runs to completion even if cancelled meanwhile.
        if let Err(e) = self.stager.stage(input).await {
            return match e {
                StageError::Invalid(e) => JobOutcome::failure(FailureReason::from(&e)),
                e => JobOutcome::failure(FailureReason::StagingFailed(e.to_string())),
            };
        }
        if cancel.is_cancelled() {
            return JobOutcome::Cancelled;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return JobOutcome::failure(FailureReason::Timeout);
        }

        let mut subscription = match self.watcher.watch() {
            Ok(sub) => sub,
            Err(e) => return JobOutcome::failure(FailureReason::WatchFailed(e.to_string())),
        };

        self.transition(job_id, JobState::Launching);
        match self.launcher.launch().await {
            Ok(handle) => {
                tracing::debug!(%job_id, pid = ?handle.pid, "Worker started for job");
            }
            Err(e) => {
                subscription.cancel();
                return JobOutcome::failure(FailureReason::LaunchFailed(e.to_string()));
            }
        }
        if cancel.is_cancelled() {
            subscription.cancel();
            return JobOutcome::Cancelled;
        }

        self.transition(job_id, JobState::Waiting);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => JobOutcome::Cancelled,
            _ = wait_for_deadline(deadline) => JobOutcome::failure(FailureReason::Timeout),
            item = subscription.next() => match item {
                Some(Ok(record)) => JobOutcome::success(record.result_path),
                Some(Err(e)) => JobOutcome::failure(FailureReason::WatchFailed(e.to_string())),
                None => JobOutcome::Cancelled,
            },
        };
        subscription.cancel();
        outcome
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
