//! Application configuration

use crate::AppError;
use directories::ProjectDirs;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Pixel size of the on-disk cache thumbnails, independent of the grid size
pub const CACHE_THUMBNAIL_SIZE: u32 = 128;

/// Lower bound for the slideshow base time, in seconds
pub const MIN_SLIDESHOW_TIME: f64 = 0.5;

/// Upper bound for the slideshow base time, in seconds
pub const MAX_SLIDESHOW_TIME: f64 = 3600.0;

/// Upper bound for the extra seconds per star
pub const MAX_RATING_MULTIPLIER: f64 = 600.0;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: DefaultsConfig,
    pub appearance: AppearanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub recursive: bool,
    pub sort: SortStrategy,
    pub thumbnail_size: u32,
    /// Base display time per image, in seconds
    pub slideshow_time: f64,
    pub slideshow_order: SlideshowOrder,
    #[serde(rename = "loop")]
    pub loop_slideshow: bool,
    pub fullscreen: bool,
    /// Extra seconds per star
    pub rating_multiplier: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            sort: SortStrategy::Unviewed,
            thumbnail_size: 200,
            slideshow_time: 5.0,
            slideshow_order: SlideshowOrder::Forward,
            loop_slideshow: false,
            fullscreen: true,
            rating_multiplier: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub highlight_color: String,
    pub unviewed_indicator: UnviewedIndicator,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            highlight_color: "#4a90d9".to_string(),
            unviewed_indicator: UnviewedIndicator::Border,
        }
    }
}

/// Named ordering applied to the record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortStrategy {
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "unviewed")]
    Unviewed,
    #[serde(rename = "viewed")]
    Viewed,
    #[serde(rename = "alpha")]
    Alpha,
    #[serde(rename = "directory")]
    Directory,
    #[serde(rename = "rating")]
    Rating,
    #[serde(rename = "rating-desc")]
    RatingDesc,
}

impl SortStrategy {
    pub const ALL: [SortStrategy; 7] = [
        SortStrategy::Random,
        SortStrategy::Unviewed,
        SortStrategy::Viewed,
        SortStrategy::Alpha,
        SortStrategy::Directory,
        SortStrategy::Rating,
        SortStrategy::RatingDesc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortStrategy::Random => "random",
            SortStrategy::Unviewed => "unviewed",
            SortStrategy::Viewed => "viewed",
            SortStrategy::Alpha => "alpha",
            SortStrategy::Directory => "directory",
            SortStrategy::Rating => "rating",
            SortStrategy::RatingDesc => "rating-desc",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SortStrategy::Random => "Random order",
            SortStrategy::Unviewed => "Unviewed first, then alphabetical",
            SortStrategy::Viewed => "Viewed first, then alphabetical",
            SortStrategy::Alpha => "Alphabetical by filename",
            SortStrategy::Directory => "Grouped by directory, then alphabetical",
            SortStrategy::Rating => "Lowest rating first (unrated at top)",
            SortStrategy::RatingDesc => "Highest rating first",
        }
    }
}

/// Slideshow playback direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlideshowOrder {
    #[serde(rename = "forward")]
    Forward,
    #[serde(rename = "backward")]
    Backward,
    #[serde(rename = "random")]
    Random,
}

impl SlideshowOrder {
    pub const ALL: [SlideshowOrder; 3] = [
        SlideshowOrder::Forward,
        SlideshowOrder::Backward,
        SlideshowOrder::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SlideshowOrder::Forward => "forward",
            SlideshowOrder::Backward => "backward",
            SlideshowOrder::Random => "random",
        }
    }

    /// forward -> backward -> random -> forward
    pub fn cycle(self) -> Self {
        match self {
            SlideshowOrder::Forward => SlideshowOrder::Backward,
            SlideshowOrder::Backward => SlideshowOrder::Random,
            SlideshowOrder::Random => SlideshowOrder::Forward,
        }
    }
}

/// How unviewed thumbnails are marked in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnviewedIndicator {
    #[serde(rename = "border")]
    Border,
    #[serde(rename = "dot")]
    Dot,
    #[serde(rename = "none")]
    None,
}

impl UnviewedIndicator {
    pub const ALL: [UnviewedIndicator; 3] = [
        UnviewedIndicator::Border,
        UnviewedIndicator::Dot,
        UnviewedIndicator::None,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UnviewedIndicator::Border => "border",
            UnviewedIndicator::Dot => "dot",
            UnviewedIndicator::None => "none",
        }
    }
}

macro_rules! named_enum {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == s)
                    .ok_or_else(|| {
                        let valid: Vec<&str> = $ty::ALL.iter().map(|v| v.name()).collect();
                        AppError::InvalidArgument(format!(
                            "Unknown {} '{}'. Valid options: {}",
                            $what,
                            s,
                            valid.join(", ")
                        ))
                    })
            }
        }
    };
}

named_enum!(SortStrategy, "sort strategy");
named_enum!(SlideshowOrder, "slideshow order");
named_enum!(UnviewedIndicator, "unviewed indicator");

/// Per-invocation values layered over the loaded file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub recursive: Option<bool>,
    pub sort: Option<SortStrategy>,
    pub thumbnail_size: Option<u32>,
    pub slideshow_time: Option<f64>,
    pub slideshow_order: Option<SlideshowOrder>,
    pub loop_slideshow: Option<bool>,
    pub fullscreen: Option<bool>,
    pub rating_multiplier: Option<f64>,
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`.
    ///
    /// A missing file yields defaults and writes them out. A file that does
    /// not parse is reported and replaced by defaults in memory only.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("Using default configuration");
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                tracing::warn!("Could not write default configuration: {}", e);
            }
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::info!("Configuration loaded from {:?}", path);
                Ok(config)
            }
            Err(e) => {
                tracing::warn!("Ignoring unparsable configuration {:?}: {}", path, e);
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("io.github", "image-viewer", "image-viewer")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Seconds an image with `rating` stays on screen
    pub fn display_time_for(&self, rating: u8) -> f64 {
        self.defaults.slideshow_time + f64::from(rating) * self.defaults.rating_multiplier
    }

    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        let d = &mut self.defaults;
        if let Some(v) = overrides.recursive {
            d.recursive = v;
        }
        if let Some(v) = overrides.sort {
            d.sort = v;
        }
        if let Some(v) = overrides.thumbnail_size {
            d.thumbnail_size = v;
        }
        if let Some(v) = overrides.slideshow_time {
            d.slideshow_time = v;
        }
        if let Some(v) = overrides.slideshow_order {
            d.slideshow_order = v;
        }
        if let Some(v) = overrides.loop_slideshow {
            d.loop_slideshow = v;
        }
        if let Some(v) = overrides.fullscreen {
            d.fullscreen = v;
        }
        if let Some(v) = overrides.rating_multiplier {
            d.rating_multiplier = v;
        }
        self
    }

    /// Reject values the viewer cannot work with
    pub fn validate(&self) -> Result<(), AppError> {
        let d = &self.defaults;
        // Range checks also reject NaN and infinities
        if !(MIN_SLIDESHOW_TIME..=MAX_SLIDESHOW_TIME).contains(&d.slideshow_time) {
            return Err(AppError::Config(format!(
                "slideshow_time must be between {}s and {}s, got {}",
                MIN_SLIDESHOW_TIME, MAX_SLIDESHOW_TIME, d.slideshow_time
            )));
        }
        if !(0.0..=MAX_RATING_MULTIPLIER).contains(&d.rating_multiplier) {
            return Err(AppError::Config(format!(
                "rating_multiplier must be between 0 and {}, got {}",
                MAX_RATING_MULTIPLIER, d.rating_multiplier
            )));
        }
        if !(32..=1024).contains(&d.thumbnail_size) {
            return Err(AppError::Config(format!(
                "thumbnail_size must be between 32 and 1024, got {}",
                d.thumbnail_size
            )));
        }
        if !is_hex_color(&self.appearance.highlight_color) {
            return Err(AppError::Config(format!(
                "highlight_color must look like #rrggbb, got '{}'",
                self.appearance.highlight_color
            )));
        }
        Ok(())
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Cloneable handle to the one live configuration.
///
/// Readers take snapshots; all writes go through [`SharedConfig::update`].
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<AppConfig>>,
    path: Option<Arc<PathBuf>>,
}

impl SharedConfig {
    /// Configuration persisted to `path` on every update
    pub fn new(config: AppConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(Arc::new(path.into())),
        }
    }

    /// Configuration that is never written to disk
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    pub fn snapshot(&self) -> AppConfig {
        self.inner.read().clone()
    }

    /// Read a single value without cloning the whole configuration
    pub fn with<R>(&self, f: impl FnOnce(&AppConfig) -> R) -> R {
        f(&self.inner.read())
    }

    /// Apply `f` to a copy, validate it, then publish and persist it.
    ///
    /// An invalid result leaves the live configuration untouched.
    pub fn update(&self, f: impl FnOnce(&mut AppConfig)) -> Result<AppConfig, AppError> {
        let mut candidate = self.snapshot();
        f(&mut candidate);
        candidate.validate()?;

        *self.inner.write() = candidate.clone();

        if let Some(path) = &self.path {
            if let Err(e) = candidate.save_to(path) {
                tracing::warn!("Could not persist configuration: {}", e);
            }
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.defaults.recursive);
        assert_eq!(config.defaults.sort, SortStrategy::Unviewed);
        assert_eq!(config.defaults.slideshow_order, SlideshowOrder::Forward);
        assert_eq!(config.appearance.unviewed_indicator, UnviewedIndicator::Border);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_display_time() {
        let config = AppConfig::default();
        assert_eq!(config.display_time_for(0), 5.0);
        assert_eq!(config.display_time_for(4), 7.0);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("rating-desc".parse::<SortStrategy>().unwrap(), SortStrategy::RatingDesc);
        assert_eq!("random".parse::<SlideshowOrder>().unwrap(), SlideshowOrder::Random);

        let err = "size".parse::<SortStrategy>().unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        let msg = err.to_string();
        assert!(msg.contains("alpha") && msg.contains("rating-desc"));
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let text = r#"
[defaults]
sort = "alpha"
loop = true

[appearance]
unviewed_indicator = "dot"
"#;
        let config: AppConfig = toml::from_str(text).unwrap();
        assert_eq!(config.defaults.sort, SortStrategy::Alpha);
        assert!(config.defaults.loop_slideshow);
        assert_eq!(config.defaults.thumbnail_size, 200);
        assert_eq!(config.appearance.unviewed_indicator, UnviewedIndicator::Dot);
        assert_eq!(config.appearance.highlight_color, "#4a90d9");
    }

    #[test]
    fn test_missing_file_written_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = AppConfig::default();
        config.defaults.slideshow_time = 0.1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.defaults.rating_multiplier = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.defaults.thumbnail_size = 4096;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.appearance.highlight_color = "blue".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_times() {
        for bad in [1e20, f64::INFINITY, f64::NAN, MAX_SLIDESHOW_TIME + 1.0] {
            let mut config = AppConfig::default();
            config.defaults.slideshow_time = bad;
            assert!(config.validate().is_err(), "slideshow_time {} accepted", bad);
        }
        for bad in [f64::INFINITY, f64::NAN, MAX_RATING_MULTIPLIER * 2.0] {
            let mut config = AppConfig::default();
            config.defaults.rating_multiplier = bad;
            assert!(config.validate().is_err(), "rating_multiplier {} accepted", bad);
        }

        let mut config = AppConfig::default();
        config.defaults.slideshow_time = MAX_SLIDESHOW_TIME;
        config.defaults.rating_multiplier = MAX_RATING_MULTIPLIER;
        assert!(config.validate().is_ok());

        let parsed: AppConfig = toml::from_str("[defaults]\nslideshow_time = inf\n").unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_colour() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.appearance.highlight_color = "#12345g".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let overrides = CliOverrides {
            recursive: Some(false),
            slideshow_time: Some(2.0),
            ..Default::default()
        };
        let config = AppConfig::default().with_overrides(&overrides);
        assert!(!config.defaults.recursive);
        assert_eq!(config.defaults.slideshow_time, 2.0);
        assert_eq!(config.defaults.sort, SortStrategy::Unviewed);
    }

    #[test]
    fn test_shared_update_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let shared = SharedConfig::new(AppConfig::default(), &path);

        let clone = shared.clone();
        clone.update(|cfg| cfg.defaults.slideshow_time = 3.0).unwrap();
        assert_eq!(shared.snapshot().defaults.slideshow_time, 3.0);
        assert_eq!(AppConfig::load_from(&path).unwrap().defaults.slideshow_time, 3.0);
    }

    #[test]
    fn test_shared_update_rejects_invalid() {
        let shared = SharedConfig::in_memory(AppConfig::default());
        let result = shared.update(|cfg| cfg.defaults.slideshow_time = 0.0);
        assert!(result.is_err());
        assert_eq!(shared.snapshot().defaults.slideshow_time, 5.0);
    }
}
