//! Terminal results of a submitted job.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::input::InputError;

/// The single terminal value delivered for every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The worker reported completion with a result file.
    Success { result_path: PathBuf },
    Failure { reason: FailureReason },
    /// The caller cancelled the job before it completed.
    Cancelled,
}

/// Why a job ended without a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    IncompleteInput,
    SizeMismatch,
    UnsupportedFormat,
    /// Copying images or writing the status record failed.
    StagingFailed(String),
    LaunchFailed(String),
    /// The status watch could not be armed or broke while waiting.
    WatchFailed(String),
    /// The caller-supplied deadline passed before the worker reported.
    Timeout,
}

impl JobOutcome {
    pub fn success(result_path: impl Into<PathBuf>) -> Self {
        Self::Success {
            result_path: result_path.into(),
        }
    }

    pub fn failure(reason: FailureReason) -> Self {
        Self::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<&InputError> for FailureReason {
    fn from(err: &InputError) -> Self {
        match err {
            InputError::IncompleteInput { .. } => FailureReason::IncompleteInput,
            InputError::SizeMismatch { .. } => FailureReason::SizeMismatch,
            InputError::UnsupportedFormat { .. } => FailureReason::UnsupportedFormat,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteInput => f.write_str("not all five faces were provided"),
            Self::SizeMismatch => f.write_str("images do not share the same dimensions"),
            Self::UnsupportedFormat => f.write_str("an image is not a jpg, jpeg or png file"),
            Self::StagingFailed(msg) => write!(f, "staging failed: {msg}"),
            Self::LaunchFailed(msg) => write!(f, "worker launch failed: {msg}"),
            Self::WatchFailed(msg) => write!(f, "status watch failed: {msg}"),
            Self::Timeout => f.write_str("worker did not report before the deadline"),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { result_path } => write!(f, "success: {}", result_path.display()),
            Self::Failure { reason } => write!(f, "failure: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}
