//! `mixbuild-submit` library crate.
//!
//! Command-line arguments and input assembly for the `mixbuild-submit`
//! binary, kept here so they can be tested without a worker. The
//! entrypoint lives in `main.rs`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use mixbuild_core::probe::{probe_face_image, ProbeError};
use mixbuild_core::{Face, JobInput, JobOutcome};

/// Exit status when the job was cancelled (matches SIGINT convention).
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "mixbuild-submit")]
#[command(about = "Hand five face photographs to the reconstruction worker", long_about = None)]
pub struct SubmitArgs {
    /// Front photograph
    pub front: PathBuf,

    /// Back photograph
    pub back: PathBuf,

    /// Left photograph
    pub left: PathBuf,

    /// Right photograph
    pub right: PathBuf,

    /// Overhead photograph
    pub top: PathBuf,

    /// Give up after this many seconds (overrides MIXBUILD_JOB_TIMEOUT_SECS)
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl SubmitArgs {
    /// Image path for `face`.
    pub fn path(&self, face: Face) -> &Path {
        match face {
            Face::Front => &self.front,
            Face::Back => &self.back,
            Face::Left => &self.left,
            Face::Right => &self.right,
            Face::Top => &self.top,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// Probe every image header and assemble the job input.
    pub fn build_input(&self) -> Result<JobInput, ProbeError> {
        let mut input = JobInput::new();
        for face in Face::ALL {
            let image = probe_face_image(face, self.path(face))?;
            tracing::debug!(%face, width = image.width, height = image.height, "Probed image");
            input.set(image);
        }
        Ok(input)
    }
}

/// Process exit status for a terminal outcome.
pub fn exit_code(outcome: &JobOutcome) -> ExitCode {
    match outcome {
        JobOutcome::Success { .. } => ExitCode::SUCCESS,
        JobOutcome::Failure { .. } => ExitCode::FAILURE,
        JobOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
