//! `mixbuild-handoff` -- filesystem handoff to the reconstruction worker.
//!
//! A job is handed to the worker through a well-known staging directory:
//! the five face images are copied in under their ordinals, a pending
//! `status.json` is written, the worker executable is started, and its
//! completion is observed by watching the status file.
//!
//! [`JobCoordinator`] owns that sequence. The building blocks are public
//! for callers that need only part of it.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod launcher;
pub mod stager;
pub mod watcher;

pub use config::{ConfigError, HandoffConfig};
pub use coordinator::{HandoffError, JobCoordinator, JobTicket};
pub use events::{JobEvent, JobState};
pub use launcher::{LaunchError, Launcher, ProcessLauncher, WorkerHandle};
pub use stager::{JobStager, StageError, StagedImage, StagedJob};
pub use watcher::{StatusSubscription, StatusWatcher, WatchError};
