use std::path::PathBuf;
use std::time::Duration;

use mixbuild_core::status::STATUS_FILE_NAME;

/// Name of the staging folder created under the user's pictures directory.
pub const DEFAULT_STAGING_FOLDER: &str = "MixBuild";

/// Default worker executable, resolved through `PATH`.
pub const DEFAULT_WORKER_PROGRAM: &str = "mixbuild-worker";

/// Handoff configuration loaded from environment variables.
///
/// All fields have defaults suitable for a desktop install. Tests build
/// the struct directly.
#[derive(Debug, Clone)]
pub struct HandoffConfig {
    /// Well-known directory shared with the worker.
    pub staging_dir: PathBuf,
    /// File name of the status record inside `staging_dir`.
    pub status_file_name: String,
    /// Worker executable.
    pub worker_program: PathBuf,
    /// Fixed launch arguments. Never carries job data.
    pub worker_args: Vec<String>,
    /// Deadline applied to every job unless the caller supplies one.
    /// `None` waits indefinitely.
    pub job_timeout: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },
}

impl HandoffConfig {
    /// Config rooted at `staging_dir` with every other field defaulted.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            status_file_name: STATUS_FILE_NAME.to_string(),
            worker_program: PathBuf::from(DEFAULT_WORKER_PROGRAM),
            worker_args: Vec::new(),
            job_timeout: None,
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                                  |
    /// |-----------------------------|------------------------------------------|
    /// | `MIXBUILD_STAGING_DIR`      | `$HOME/Pictures/MixBuild`, else `./MixBuild` |
    /// | `MIXBUILD_STATUS_FILE`      | `status.json`                            |
    /// | `MIXBUILD_WORKER_PATH`      | `mixbuild-worker`                        |
    /// | `MIXBUILD_WORKER_ARGS`      | (none)                                   |
    /// | `MIXBUILD_JOB_TIMEOUT_SECS` | (unbounded)                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let staging_dir = lookup("MIXBUILD_STAGING_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| match lookup("HOME") {
                Some(home) => PathBuf::from(home)
                    .join("Pictures")
                    .join(DEFAULT_STAGING_FOLDER),
                None => PathBuf::from(DEFAULT_STAGING_FOLDER),
            });

        let status_file_name = lookup("MIXBUILD_STATUS_FILE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| STATUS_FILE_NAME.to_string());

        let worker_program = lookup("MIXBUILD_WORKER_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKER_PROGRAM));

        let worker_args: Vec<String> = lookup("MIXBUILD_WORKER_ARGS")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let job_timeout = match lookup("MIXBUILD_JOB_TIMEOUT_SECS") {
            Some(value) if !value.trim().is_empty() => {
                let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidSeconds {
                    var: "MIXBUILD_JOB_TIMEOUT_SECS",
                    value: value.clone(),
                })?;
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            staging_dir,
            status_file_name,
            worker_program,
            worker_args,
            job_timeout,
        })
    }

    /// Full path of the status record.
    pub fn status_path(&self) -> PathBuf {
        self.staging_dir.join(&self.status_file_name)
    }
}
