//! Job input model: five labelled photographs plus validation.
//!
//! [`JobInput`] is filled incrementally by the image-source collaborator
//! (one [`FaceImage`] per face). A job is submittable only when every
//! face is present, every source has an accepted image extension, and
//! all five images report identical pixel dimensions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::face::Face;

/// File extensions (lowercase, without the dot) accepted as job images.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One photograph supplied for a face.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceImage {
    pub face: Face,
    /// Where the image bytes can be read from.
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl FaceImage {
    pub fn new(face: Face, source: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            face,
            source: source.into(),
            width,
            height,
        }
    }

    /// Lowercased extension of the source path, if it has one.
    pub fn extension(&self) -> Option<String> {
        source_extension(&self.source)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Lowercased extension of `path` without the leading dot.
pub fn source_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Returns `true` if `extension` (lowercase, no dot) is an accepted image type.
pub fn is_accepted_extension(extension: &str) -> bool {
    ACCEPTED_EXTENSIONS.contains(&extension)
}

/// Reasons a [`JobInput`] is rejected before anything is staged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Incomplete input: missing {}", format_faces(.missing))]
    IncompleteInput { missing: Vec<Face> },

    #[error(
        "Size mismatch: {face} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}"
    )]
    SizeMismatch {
        face: Face,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Unsupported image format for {face}: {extension:?}")]
    UnsupportedFormat { face: Face, extension: String },
}

fn format_faces(faces: &[Face]) -> String {
    faces
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The five photographs of a job, each entry present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobInput {
    entries: [Option<FaceImage>; 5],
}

impl JobInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an input from a set of images, later entries replacing
    /// earlier ones for the same face.
    pub fn from_images(images: impl IntoIterator<Item = FaceImage>) -> Self {
        let mut input = Self::new();
        for image in images {
            input.set(image);
        }
        input
    }

    /// Store `image` under its face, returning the entry it replaced.
    pub fn set(&mut self, image: FaceImage) -> Option<FaceImage> {
        self.entries[image.face.index()].replace(image)
    }

    pub fn clear(&mut self, face: Face) -> Option<FaceImage> {
        self.entries[face.index()].take()
    }

    pub fn get(&self, face: Face) -> Option<&FaceImage> {
        self.entries[face.index()].as_ref()
    }

    /// Faces that have no image yet, in [`Face::ALL`] order.
    pub fn missing_faces(&self) -> Vec<Face> {
        Face::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    /// `true` once every face has an image. Dimensions and formats are
    /// only checked by [`validate`](Self::validate).
    pub fn is_ready(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }

    /// Check every submission precondition and return the complete set.
    ///
    /// Checks run in this order: all faces present, identical
    /// dimensions (measured against the front image), accepted formats.
    pub fn validate(&self) -> Result<CompleteInput, InputError> {
        let missing = self.missing_faces();
        if !missing.is_empty() {
            return Err(InputError::IncompleteInput { missing });
        }

        let images: Vec<FaceImage> = self.entries.iter().flatten().cloned().collect();

        let (expected_width, expected_height) = images[0].dimensions();
        if let Some(odd) = images
            .iter()
            .find(|img| img.dimensions() != (expected_width, expected_height))
        {
            return Err(InputError::SizeMismatch {
                face: odd.face,
                expected_width,
                expected_height,
                actual_width: odd.width,
                actual_height: odd.height,
            });
        }

        for image in &images {
            match image.extension() {
                Some(ext) if is_accepted_extension(&ext) => {}
                other => {
                    return Err(InputError::UnsupportedFormat {
                        face: image.face,
                        extension: other.unwrap_or_default(),
                    });
                }
            }
        }

        Ok(CompleteInput { images })
    }
}

/// A [`JobInput`] that passed [`JobInput::validate`].
///
/// Holds exactly one image per face, in [`Face::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteInput {
    images: Vec<FaceImage>,
}

impl CompleteInput {
    pub fn images(&self) -> &[FaceImage] {
        &self.images
    }

    /// The shared pixel dimensions of all five images.
    pub fn dimensions(&self) -> (u32, u32) {
        self.images[0].dimensions()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
