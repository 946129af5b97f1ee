//! Materialises a job in the shared staging directory.
//!
//! [`JobStager::stage`] validates the input, creates the staging
//! directory if needed, removes the previous job's status record, copies
//! the five images in under their face ordinals, and only then writes the
//! pending status record. The worker
//! therefore never sees a status file before every image is in place.
//!
//! Staged files outlive the call. Re-staging overwrites them in place,
//! so retrying after a failure never accumulates stale copies.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use mixbuild_core::input::{is_accepted_extension, source_extension};
use mixbuild_core::{Face, FaceImage, InputError, JobInput, StatusRecord};

use crate::config::HandoffConfig;

/// One image as it sits in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub face: Face,
    pub path: PathBuf,
}

/// A job fully written to the staging directory.
#[derive(Debug, Clone)]
pub struct StagedJob {
    pub dir: PathBuf,
    /// One entry per face, in [`Face::ALL`] order.
    pub images: Vec<StagedImage>,
    pub status_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The input failed validation. Nothing was written.
    #[error(transparent)]
    Invalid(#[from] InputError),

    #[error("cannot create staging directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot clear stale file {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot copy {face} image {from} to {to}: {source}")]
    Copy {
        face: Face,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write status record {path}: {source}")]
    WriteStatus {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copies job inputs into the well-known staging location.
#[derive(Debug, Clone)]
pub struct JobStager {
    staging_dir: PathBuf,
    status_file_name: String,
}

impl JobStager {
    pub fn new(config: &HandoffConfig) -> Self {
        Self {
            staging_dir: config.staging_dir.clone(),
            status_file_name: config.status_file_name.clone(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn status_path(&self) -> PathBuf {
        self.staging_dir.join(&self.status_file_name)
    }

    /// Validate `input` and write it to the staging directory.
    ///
    /// Validation happens before any filesystem access. Image copies run
    /// concurrently; the pending status record is written after all of
    /// them have finished.
    pub async fn stage(&self, input: &JobInput) -> Result<StagedJob, StageError> {
        let complete = input.validate()?;

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|source| StageError::CreateDir {
                path: self.staging_dir.clone(),
                source,
            })?;

        let targets: Vec<(FaceImage, PathBuf)> = complete
            .images()
            .iter()
            .map(|img| {
                let ext = img.extension().unwrap_or_default();
                let to = self.staging_dir.join(img.face.staged_file_name(&ext));
                (img.clone(), to)
            })
            .collect();

        let status_path = self.status_path();
        self.remove_previous_status(&status_path).await?;

        let keep: HashSet<PathBuf> = targets.iter().map(|(_, to)| to.clone()).collect();
        self.remove_stale_images(&keep).await?;

        let images = try_join_all(targets.into_iter().map(|(img, to)| copy_image(img, to))).await?;

        self.write_pending_status(&status_path).await?;

        tracing::info!(
            dir = %self.staging_dir.display(),
            width = complete.dimensions().0,
            height = complete.dimensions().1,
            "Job staged",
        );

        Ok(StagedJob {
            dir: self.staging_dir.clone(),
            images,
            status_path,
        })
    }

    /// Delete the previous job's status record so it never sits next to
    /// images of the new job.
    async fn remove_previous_status(&self, status_path: &Path) -> Result<(), StageError> {
        match tokio::fs::remove_file(status_path).await {
            Ok(()) => {
                tracing::debug!(path = %status_path.display(), "Removed previous status record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StageError::RemoveStale {
                path: status_path.to_path_buf(),
                source,
            }),
        }
    }

    /// Delete `<ordinal>.<ext>` images left over from an earlier job whose
    /// face is now staged under a different extension.
    async fn remove_stale_images(&self, keep: &HashSet<PathBuf>) -> Result<(), StageError> {
        let read_err = |source| StageError::RemoveStale {
            path: self.staging_dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.staging_dir)
            .await
            .map_err(read_err)?;

        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let path = entry.path();
            if keep.contains(&path) || !is_staged_image_name(&path) {
                continue;
            }
            tracing::debug!(path = %path.display(), "Removing stale staged image");
            tokio::fs::remove_file(&path)
                .await
                .map_err(|source| StageError::RemoveStale {
                    path: path.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Write the pending record through a temporary sibling so readers
    /// only ever see a complete file.
    async fn write_pending_status(&self, status_path: &Path) -> Result<(), StageError> {
        let tmp_path = self
            .staging_dir
            .join(format!(".{}.tmp", self.status_file_name));
        let write_err = |source| StageError::WriteStatus {
            path: status_path.to_path_buf(),
            source,
        };

        tokio::fs::write(&tmp_path, StatusRecord::pending().encode())
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, status_path)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

async fn copy_image(img: FaceImage, to: PathBuf) -> Result<StagedImage, StageError> {
    let bytes = tokio::fs::copy(&img.source, &to)
        .await
        .map_err(|source| StageError::Copy {
            face: img.face,
            from: img.source.clone(),
            to: to.clone(),
            source,
        })?;
    tracing::debug!(face = %img.face, path = %to.display(), bytes, "Copied image");
    Ok(StagedImage {
        face: img.face,
        path: to,
    })
}

/// `true` for file names of the form `<face-ordinal>.<accepted-ext>`.
fn is_staged_image_name(path: &Path) -> bool {
    let Some(ext) = source_extension(path) else {
        return false;
    };
    let ordinal = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse::<i32>().ok());
    is_accepted_extension(&ext) && ordinal.and_then(Face::from_ordinal).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
