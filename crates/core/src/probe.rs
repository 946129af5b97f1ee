//! Header-only image dimension probing.
//!
//! Turns a picked file into a [`FaceImage`] by reading just enough of the
//! image header to learn its pixel size. The pixel data is never decoded.

use std::path::Path;

use crate::face::Face;
use crate::input::FaceImage;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("image file not found: {0}")]
    NotFound(String),

    #[error("cannot read image header of {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Read the pixel dimensions of the image at `path`.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32), ProbeError> {
    if !path.is_file() {
        return Err(ProbeError::NotFound(path.display().to_string()));
    }
    image::image_dimensions(path).map_err(|source| ProbeError::Unreadable {
        path: path.display().to_string(),
        source,
    })
}

/// Build the [`FaceImage`] for `face` from the file at `path`.
pub fn probe_face_image(face: Face, path: &Path) -> Result<FaceImage, ProbeError> {
    let (width, height) = image_dimensions(path)?;
    Ok(FaceImage::new(face, path, width, height))
}
