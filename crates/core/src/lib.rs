//! Domain model for the reconstruction job handoff.
//!
//! Pure types and validation with no I/O beyond image header probing:
//! the five [`Face`]s, the [`JobInput`] a caller fills in, the
//! [`StatusRecord`] exchanged with the worker, and the terminal
//! [`JobOutcome`] of a submission.

pub mod face;
pub mod input;
pub mod outcome;
pub mod probe;
pub mod status;
pub mod types;

pub use face::Face;
pub use input::{CompleteInput, FaceImage, InputError, JobInput};
pub use outcome::{FailureReason, JobOutcome};
pub use status::{StatusDecodeError, StatusRecord};
pub use types::JobId;
