//! Image decoding for display

use crate::AppError;
use image::imageops::FilterType;
use image::{GenericImageView, ImageReader};
use std::fmt;
use std::path::{Path, PathBuf};

/// A decoded RGBA8 bitmap ready for the host to draw
#[derive(Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedImage")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Decode `path` and scale it to fit inside `display` with aspect preserved.
///
/// Small images are scaled up as well. A zero display dimension disables scaling.
pub fn load_for_display(path: &Path, display: (u32, u32)) -> Result<LoadedImage, AppError> {
    tracing::debug!("Loading image: {}", path.display());

    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;

    let (max_w, max_h) = display;
    let img = if max_w > 0 && max_h > 0 && img.dimensions() != display {
        img.resize(max_w, max_h, FilterType::Triangle)
    } else {
        img
    };

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(LoadedImage {
        path: path.to_path_buf(),
        width,
        height,
        data: rgba.into_raw(),
    })
}

/// Get image dimensions without fully decoding
pub fn image_dimensions(path: &Path) -> Result<(u32, u32), AppError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}
