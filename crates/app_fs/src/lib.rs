//! Image viewer file system layer
//!
//! Provides:
//! - Absolute, lexically normalized paths (no symlink resolution)
//! - Scan root derivation from user supplied inputs
//! - A lazy, deterministic walker that discovers supported image files

mod paths;
mod walker;

pub use paths::{absolutize, derive_scan_roots, is_hidden_name, normalize_path};
pub use walker::{is_supported_image, ImageEntry, ImageWalker, SUPPORTED_EXTENSIONS};

use thiserror::Error;

/// File system errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl FsError {
    /// Classify an io error raised while touching `path`
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                FsError::AccessDenied(path.display().to_string())
            }
            _ => FsError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
