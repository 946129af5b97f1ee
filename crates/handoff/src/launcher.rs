//! Worker process launch.
//!
//! The worker takes no job payload on its command line; it finds its
//! input in the staging directory. Launching returns as soon as the OS
//! has started the process. Exit status is never awaited because the
//! protocol does not depend on it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use mixbuild_core::types::Timestamp;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::config::HandoffConfig;

/// Diagnostic handle for a started worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    /// OS process id, when the platform reports one.
    pub pid: Option<u32>,
    pub program: PathBuf,
    pub launched_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Worker binary not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Worker is already running (pid {pid:?})")]
    AlreadyRunning { pid: Option<u32> },

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Starts the worker process.
///
/// Implemented by [`ProcessLauncher`] in production; tests substitute
/// launchers that simulate a worker in-process.
pub trait Launcher: Send + Sync + 'static {
    fn launch(&self) -> impl Future<Output = Result<WorkerHandle, LaunchError>> + Send;
}

/// Launches the configured worker executable as a child process.
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
    /// Most recently spawned child, kept to refuse overlapping launches.
    current: Mutex<Option<Child>>,
}

impl ProcessLauncher {
    pub fn new(config: &HandoffConfig) -> Self {
        Self {
            program: config.worker_program.clone(),
            args: config.worker_args.clone(),
            working_dir: config.staging_dir.clone(),
            current: Mutex::new(None),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Verify an explicit program path exists and is executable.
    ///
    /// Bare names (no directory part) are resolved through `PATH` by the
    /// spawn itself.
    async fn check_program(&self) -> Result<(), LaunchError> {
        if self.program.components().count() <= 1 {
            return Ok(());
        }
        let metadata = tokio::fs::metadata(&self.program)
            .await
            .map_err(|_| LaunchError::NotFound(self.program.display().to_string()))?;
        if !metadata.is_file() {
            return Err(LaunchError::NotFound(self.program.display().to_string()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                return Err(LaunchError::PermissionDenied(format!(
                    "{} is not executable (mode {mode:#o})",
                    self.program.display()
                )));
            }
        }
        Ok(())
    }
}

impl Launcher for ProcessLauncher {
    async fn launch(&self) -> Result<WorkerHandle, LaunchError> {
        self.check_program().await?;

        let mut current = self.current.lock().await;
        if let Some(child) = current.as_mut() {
            match child.try_wait() {
                Ok(None) => {
                    return Err(LaunchError::AlreadyRunning { pid: child.id() });
                }
                Ok(Some(status)) => {
                    tracing::debug!(?status, "Previous worker has exited");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not query previous worker state");
                }
            }
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    LaunchError::NotFound(self.program.display().to_string())
                }
                std::io::ErrorKind::PermissionDenied => {
                    LaunchError::PermissionDenied(self.program.display().to_string())
                }
                _ => LaunchError::Spawn(e),
            })?;

        let handle = WorkerHandle {
            pid: child.id(),
            program: self.program.clone(),
            launched_at: chrono::Utc::now(),
        };
        *current = Some(child);

        tracing::info!(
            pid = ?handle.pid,
            program = %self.program.display(),
            "Worker launched",
        );
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
