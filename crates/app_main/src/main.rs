//! image_viewer - browse, rate and slideshow local photo collections
//!
//! Headless host: scans, lists or plays a slideshow in the terminal.

mod app;

use anyhow::Result;
use app_core::{AppConfig, CliOverrides, SlideshowOrder, SortStrategy};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "image_viewer",
    version,
    about = "A lightweight image viewer with slideshow, ratings, and viewed tracking",
    after_help = concat!(
        "Examples:\n",
        "  image_viewer /photos --slideshow\n",
        "  image_viewer /photos --sort rating-desc\n",
        "  image_viewer /photos --slideshow-time 3 --loop",
    )
)]
pub struct Cli {
    /// Directories or image files to view
    #[arg(value_name = "PATH", default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Recursively scan directories (default: on)
    #[arg(short = 'r', long, conflicts_with = "no_recursive")]
    pub recursive: bool,

    /// Disable recursive scanning
    #[arg(long)]
    pub no_recursive: bool,

    /// Start a slideshow instead of listing
    #[arg(short, long)]
    pub slideshow: bool,

    /// Base display time per image in seconds
    #[arg(long, value_name = "SECS")]
    pub slideshow_time: Option<f64>,

    /// forward | backward | random
    #[arg(long, value_name = "ORDER")]
    pub slideshow_order: Option<SlideshowOrder>,

    /// Loop the slideshow when reaching the end
    #[arg(long = "loop")]
    pub loop_slideshow: bool,

    /// random | unviewed | viewed | alpha | directory | rating | rating-desc
    #[arg(long, value_name = "SORT")]
    pub sort: Option<SortStrategy>,

    /// Thumbnail size in pixels
    #[arg(long, value_name = "SIZE")]
    pub thumb_size: Option<u32>,

    /// Start the slideshow fullscreen
    #[arg(long, conflicts_with = "windowed")]
    pub fullscreen: bool,

    /// Start the slideshow in a window
    #[arg(long)]
    pub windowed: bool,

    /// Extra display time in seconds per rating star
    #[arg(long, value_name = "N")]
    pub rating_multiplier: Option<f64>,

    /// Print the listing as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Fill the thumbnail cache after scanning
    #[arg(long)]
    pub thumbnails: bool,

    /// Delete cached thumbnails below the given paths and exit
    #[arg(long)]
    pub clear_thumbnails: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        let recursive = if self.no_recursive {
            Some(false)
        } else if self.recursive {
            Some(true)
        } else {
            None
        };
        let fullscreen = if self.windowed {
            Some(false)
        } else if self.fullscreen {
            Some(true)
        } else {
            None
        };

        CliOverrides {
            recursive,
            sort: self.sort,
            thumbnail_size: self.thumb_size,
            slideshow_time: self.slideshow_time,
            slideshow_order: self.slideshow_order,
            loop_slideshow: self.loop_slideshow.then_some(true),
            fullscreen,
            rating_multiplier: self.rating_multiplier,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging and panic hook first
    let _log_guard = app_log::init()?;

    // Clean up old logs (7 days)
    if let Err(e) = app_log::cleanup_old_logs(7) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    tracing::info!("image_viewer starting...");

    if let Some(missing) = cli.paths.iter().find(|p| !p.exists()) {
        eprintln!("Error: path does not exist: {}", missing.display());
        return Ok(ExitCode::from(1));
    }

    let config = AppConfig::load()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load configuration: {}", e);
            AppConfig::default()
        })
        .with_overrides(&cli.overrides());

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::from(1));
    }

    app::run(&cli, config)
}
