//! Shared fixtures for handoff integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mixbuild_core::probe::probe_face_image;
use mixbuild_core::{Face, JobInput, StatusRecord};
use mixbuild_handoff::{HandoffConfig, LaunchError, Launcher, WorkerHandle};

/// Write a `width` x `height` PNG for every face under `dir` and probe
/// them into a [`JobInput`].
pub fn png_input(dir: &Path, width: u32, height: u32) -> JobInput {
    JobInput::from_images(Face::ALL.into_iter().map(|face| {
        let path = write_png(dir, &format!("{face}.png"), width, height);
        probe_face_image(face, &path).expect("probe fixture")
    }))
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::new(width, height)
        .save(&path)
        .expect("write png fixture");
    path
}

/// Config with the staging directory inside `root`.
pub fn config_in(root: &Path) -> HandoffConfig {
    HandoffConfig::new(root.join("MixBuild"))
}

/// Names of the files in `dir`, sorted.
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn read_status(path: &Path) -> StatusRecord {
    StatusRecord::decode(&std::fs::read(path).expect("read status")).expect("decode status")
}

/// What the simulated worker does after being launched.
#[derive(Debug, Clone)]
pub enum WorkerScript {
    /// Write a completed record for `result_path` after `delay`.
    Complete { delay: Duration, result_path: String },
    /// Write the given raw contents in order, `delay` apart.
    Writes { delay: Duration, contents: Vec<Vec<u8>> },
    /// Do nothing.
    Hang,
    /// Fail to launch.
    Refuse,
}

/// In-process stand-in for the worker executable.
pub struct FakeWorker {
    status_path: PathBuf,
    script: WorkerScript,
    launches: Arc<AtomicUsize>,
}

impl FakeWorker {
    pub fn new(config: &HandoffConfig, script: WorkerScript) -> Self {
        Self {
            status_path: config.status_path(),
            script,
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared launch counter, readable after the worker is moved into a
    /// coordinator.
    pub fn launch_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.launches)
    }
}

impl Launcher for FakeWorker {
    async fn launch(&self) -> Result<WorkerHandle, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);

        let writes = match &self.script {
            WorkerScript::Refuse => {
                return Err(LaunchError::NotFound("/opt/mixbuild/worker".into()));
            }
            WorkerScript::Hang => Vec::new(),
            WorkerScript::Complete { delay, result_path } => {
                vec![(*delay, StatusRecord::completed(result_path.clone()).encode())]
            }
            WorkerScript::Writes { delay, contents } => {
                contents.iter().map(|c| (*delay, c.clone())).collect()
            }
        };

        let status_path = self.status_path.clone();
        tokio::spawn(async move {
            for (delay, bytes) in writes {
                tokio::time::sleep(delay).await;
                tokio::fs::write(&status_path, bytes)
                    .await
                    .expect("fake worker write");
            }
        });

        Ok(WorkerHandle {
            pid: None,
            program: PathBuf::from("fake-worker"),
            launched_at: chrono::Utc::now(),
        })
    }
}
