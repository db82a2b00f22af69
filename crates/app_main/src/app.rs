//! Terminal host: drives the core the way a window would

use crate::Cli;
use anyhow::{Context, Result};
use app_core::{
    AppConfig, AppState, SharedConfig, SlideshowEvent, SystemClock, ThumbnailCache, ThumbnailEvent,
    ThumbnailFill,
};
use app_db::ImageRecord;
use app_fs::derive_scan_roots;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on how long the slideshow loop sleeps between ticks
const MAX_IDLE: Duration = Duration::from_millis(250);

pub fn run(cli: &Cli, config: AppConfig) -> Result<ExitCode> {
    if cli.clear_thumbnails {
        let roots = derive_scan_roots(&cli.paths)?;
        let removed = ThumbnailCache::clear_all(&roots);
        println!("Removed {} cached thumbnails", removed);
        return Ok(ExitCode::SUCCESS);
    }

    let shared = SharedConfig::new(config, AppConfig::config_path());
    let state = AppState::open(shared, &cli.paths).context("opening record stores")?;

    let report = state
        .start_scan()?
        .wait_with_progress(|path, count| {
            eprintln!("Scanning... {} images ({})", count, path.display());
        })
        .context("scanning")?;
    for (root, reason) in &report.failed {
        eprintln!("Warning: could not store images under {}: {}", root.display(), reason);
    }
    let sort = state.config().with(|c| c.defaults.sort);
    eprintln!("Found {} images ({})", report.records.len(), sort.description());
    state.apply_scan(report.records);

    if cli.thumbnails {
        fill_thumbnails(&state)?;
    }

    if cli.slideshow {
        run_slideshow(&state)?;
    } else {
        print_listing(&state.images(), cli.json)?;
    }

    Ok(ExitCode::SUCCESS)
}

fn print_listing(records: &[ImageRecord], json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for record in records {
        if json {
            writeln!(out, "{}", serde_json::to_string(record)?)?;
        } else {
            let marker = if record.viewed { ' ' } else { '*' };
            writeln!(out, "{} {} {}", record.stars(), marker, record.path.display())?;
        }
    }
    Ok(())
}

fn fill_thumbnails(state: &AppState) -> Result<()> {
    let fill = ThumbnailFill::spawn(
        state.images(),
        state.router().clone(),
        ThumbnailCache::default(),
    )?;

    for event in fill.events().iter() {
        match event {
            ThumbnailEvent::Ready { .. } => {}
            ThumbnailEvent::Failed { path, error } => {
                eprintln!("Thumbnail failed: {} ({})", path.display(), error);
            }
            ThumbnailEvent::Finished {
                processed,
                cancelled,
            } => {
                let note = if cancelled { " (cancelled)" } else { "" };
                eprintln!("Thumbnails: {} processed{}", processed, note);
            }
        }
    }
    fill.join();
    Ok(())
}

fn run_slideshow(state: &AppState) -> Result<()> {
    if state.is_empty() {
        eprintln!("No images to show");
        return Ok(());
    }

    let (mut controller, events) = state.slideshow(Arc::new(SystemClock), 0);
    controller.start();

    let mut stopped = false;
    loop {
        controller.tick();

        for event in events.try_iter() {
            match event {
                SlideshowEvent::Display {
                    record,
                    position,
                    total,
                    image,
                } => {
                    let size = image
                        .map(|img| format!("{}x{}", img.width, img.height))
                        .unwrap_or_else(|| "unreadable".to_string());
                    println!(
                        "[{}/{}] {} {} ({})",
                        position,
                        total,
                        record.stars(),
                        record.display_name(),
                        size
                    );
                }
                SlideshowEvent::Viewed { path } => tracing::debug!("Viewed {}", path.display()),
                SlideshowEvent::RatingChanged { rating, .. } => println!("Rating: {}", rating),
                SlideshowEvent::Notification(msg) => println!("{}", msg),
                SlideshowEvent::PlaybackChanged { playing } => stopped = !playing,
                SlideshowEvent::Exhausted => stopped = true,
            }
        }

        let deadline = controller.next_deadline();
        if stopped && deadline.is_none() {
            break;
        }

        let now = Instant::now();
        let wait = deadline
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE);
        std::thread::sleep(wait);
    }

    controller.cleanup();
    println!("Slideshow finished");
    Ok(())
}
