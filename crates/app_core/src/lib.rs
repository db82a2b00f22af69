//! Image viewer core logic
//!
//! This crate contains:
//! - Configuration and the shared configuration handle
//! - Error types
//! - Sort strategies
//! - Scanning, merging and the background scan task
//! - Thumbnail cache
//! - Image loading
//! - Slideshow playback and random-order history
//! - Library state

pub mod config;
pub mod error;
pub mod image_loader;
pub mod navigation;
pub mod scan_task;
pub mod scanner;
pub mod slideshow;
pub mod sort;
pub mod state;
pub mod thumbnail_manager;

pub use config::{
    AppConfig, AppearanceConfig, CliOverrides, DefaultsConfig, SharedConfig, SlideshowOrder,
    SortStrategy, UnviewedIndicator, CACHE_THUMBNAIL_SIZE, MAX_RATING_MULTIPLIER,
    MAX_SLIDESHOW_TIME, MIN_SLIDESHOW_TIME,
};
pub use error::AppError;
pub use image_loader::{image_dimensions, load_for_display, LoadedImage};
pub use navigation::RandomHistory;
pub use scan_task::{spawn_scan, ScanEvent, ScanHandle};
pub use scanner::{iter_images, scan_and_merge, scan_and_merge_with_progress, ScanRequest};
pub use slideshow::{Clock, ManualClock, SlideshowController, SlideshowEvent, SystemClock};
pub use sort::{sort, sort_by_name};
pub use state::AppState;
pub use thumbnail_manager::{ThumbnailCache, ThumbnailEvent, ThumbnailFill};

pub type Result<T> = std::result::Result<T, AppError>;
