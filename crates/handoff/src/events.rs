//! Job lifecycle events broadcast by the coordinator.
//!
//! The completion-presentation collaborator subscribes with
//! [`JobCoordinator::subscribe`](crate::coordinator::JobCoordinator::subscribe)
//! to follow progress without polling.

use mixbuild_core::{JobId, JobOutcome};
use serde::Serialize;

/// Where a coordinator is in the handoff of its current job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Staging,
    Launching,
    Waiting,
    Completed { outcome: JobOutcome },
}

impl JobState {
    /// `true` while a job is in flight and a new submission must be refused.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Staging | Self::Launching | Self::Waiting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Staging => "staging",
            Self::Launching => "launching",
            Self::Waiting => "waiting",
            Self::Completed { .. } => "completed",
        }
    }
}

/// A lifecycle event for one submitted job.
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    /// The job moved to a non-terminal state.
    StateChanged { job_id: JobId, state: JobState },

    /// The job reached its terminal outcome. Sent exactly once per job.
    Completed { job_id: JobId, outcome: JobOutcome },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::StateChanged { job_id, .. } | Self::Completed { job_id, .. } => *job_id,
        }
    }
}
