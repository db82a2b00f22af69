//! Slideshow playback state machine
//!
//! The controller owns no thread and no OS timer. Auto-advance and the
//! viewed mark are deadlines; the host calls [`SlideshowController::tick`]
//! from its event loop and the controller fires whatever is due. Output goes
//! out as [`SlideshowEvent`]s on a channel.

use crate::image_loader::{load_for_display, LoadedImage};
use crate::navigation::RandomHistory;
use crate::{SharedConfig, SlideshowOrder, MAX_SLIDESHOW_TIME, MIN_SLIDESHOW_TIME};
use app_db::{ImageRecord, StoreRouter};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Dwell time after which a displayed image counts as viewed
pub const VIEWED_DELAY: Duration = Duration::from_millis(1000);

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Output of the controller for the hosting surface
#[derive(Debug, Clone)]
pub enum SlideshowEvent {
    /// Show `record`; `position` is 1-based
    Display {
        record: ImageRecord,
        position: usize,
        total: usize,
        image: Option<LoadedImage>,
    },
    Viewed { path: PathBuf },
    RatingChanged { path: PathBuf, rating: u8 },
    Notification(String),
    PlaybackChanged { playing: bool },
    /// The session has no images left
    Exhausted,
}

#[derive(Debug)]
struct PendingView {
    due: Instant,
    path: PathBuf,
}

/// Timed playback over an ordered image sequence
pub struct SlideshowController {
    config: SharedConfig,
    router: Arc<StoreRouter>,
    clock: Arc<dyn Clock>,
    events: Sender<SlideshowEvent>,
    rng: StdRng,

    images: Vec<ImageRecord>,
    index: usize,
    playing: bool,
    history: RandomHistory,
    display_size: (u32, u32),
    decode: bool,

    advance_due: Option<Instant>,
    /// Paths captured when they were shown, marked in order once due
    pending_views: VecDeque<PendingView>,
}

impl SlideshowController {
    pub fn new(
        config: SharedConfig,
        router: Arc<StoreRouter>,
        clock: Arc<dyn Clock>,
    ) -> (Self, Receiver<SlideshowEvent>) {
        let (events, rx) = crossbeam_channel::unbounded();
        let controller = Self {
            config,
            router,
            clock,
            events,
            rng: StdRng::from_entropy(),
            images: Vec::new(),
            index: 0,
            playing: false,
            history: RandomHistory::new(),
            display_size: (1920, 1080),
            decode: true,
            advance_due: None,
            pending_views: VecDeque::new(),
        };
        (controller, rx)
    }

    /// Use a fixed seed for random order
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Whether display events carry a decoded bitmap
    pub fn with_decoding(mut self, decode: bool) -> Self {
        self.decode = decode;
        self
    }

    // ===== Session =====

    /// Replace the session and show `start_index` (clamped). Playback stops.
    pub fn load(&mut self, images: Vec<ImageRecord>, start_index: usize) {
        self.cancel_timers();
        self.set_playing(false);
        self.history.clear();
        self.index = start_index.min(images.len().saturating_sub(1));
        self.images = images;

        if self.images.is_empty() {
            self.emit(SlideshowEvent::Exhausted);
        } else {
            self.show_current();
        }
    }

    /// Cancel every pending timer. Call before dropping or replacing the controller.
    pub fn cleanup(&mut self) {
        self.cancel_timers();
        self.playing = false;
    }

    pub fn current(&self) -> Option<&ImageRecord> {
        self.images.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based position and total
    pub fn position(&self) -> Option<(usize, usize)> {
        (!self.images.is_empty()).then(|| (self.index + 1, self.images.len()))
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.display_size
    }

    /// Sticky display size; only changed here, never per image
    pub fn resize(&mut self, width: u32, height: u32) {
        self.display_size = (width, height);
        if !self.images.is_empty() {
            self.show_current();
        }
    }

    // ===== Navigation =====

    pub fn next(&mut self) {
        if self.images.is_empty() {
            return;
        }
        self.go_next();
        self.reset_advance_timer();
    }

    pub fn previous(&mut self) {
        if self.images.is_empty() {
            return;
        }
        self.go_previous();
        self.reset_advance_timer();
    }

    fn order(&self) -> SlideshowOrder {
        self.config.with(|c| c.defaults.slideshow_order)
    }

    fn looping(&self) -> bool {
        self.config.with(|c| c.defaults.loop_slideshow)
    }

    fn go_next(&mut self) {
        match self.order() {
            SlideshowOrder::Forward => self.advance_linear(),
            SlideshowOrder::Backward => self.retreat_linear(),
            SlideshowOrder::Random => {
                let len = self.images.len();
                if let Some(i) = self.history.forward(self.index, len, &mut self.rng) {
                    self.jump_to(i);
                }
            }
        }
    }

    fn go_previous(&mut self) {
        match self.order() {
            SlideshowOrder::Forward => self.retreat_linear(),
            SlideshowOrder::Backward => self.advance_linear(),
            SlideshowOrder::Random => {
                if let Some(i) = self.history.back() {
                    self.jump_to(i);
                }
            }
        }
    }

    fn advance_linear(&mut self) {
        if self.index + 1 < self.images.len() {
            self.jump_to(self.index + 1);
        } else if self.looping() {
            self.jump_to(0);
        } else {
            self.stop();
        }
    }

    fn retreat_linear(&mut self) {
        if self.index > 0 {
            self.jump_to(self.index - 1);
        } else if self.looping() {
            self.jump_to(self.images.len() - 1);
        }
    }

    fn jump_to(&mut self, index: usize) {
        if index < self.images.len() {
            self.index = index;
            self.show_current();
        }
    }

    fn show_current(&mut self) {
        let Some(record) = self.images.get(self.index).cloned() else {
            return;
        };

        let image = if self.decode {
            match load_for_display(&record.path, self.display_size) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!("Error loading image {}: {}", record.path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        self.schedule_viewed(&record.path);
        self.emit(SlideshowEvent::Display {
            position: self.index + 1,
            total: self.images.len(),
            record,
            image,
        });
    }

    // ===== Playback =====

    pub fn start(&mut self) {
        if self.images.is_empty() {
            return;
        }
        self.set_playing(true);
        self.reset_advance_timer();
    }

    pub fn stop(&mut self) {
        self.advance_due = None;
        self.set_playing(false);
    }

    pub fn toggle_play(&mut self) {
        if self.playing {
            self.stop();
        } else {
            self.start();
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            self.emit(SlideshowEvent::PlaybackChanged { playing });
        }
    }

    fn reset_advance_timer(&mut self) {
        self.advance_due = None;
        self.schedule_advance();
    }

    fn schedule_advance(&mut self) {
        if !self.playing {
            return;
        }
        let Some(record) = self.images.get(self.index) else {
            return;
        };
        let secs = self.config.with(|c| c.display_time_for(record.rating));
        let due = Duration::try_from_secs_f64(secs)
            .ok()
            .and_then(|delay| self.clock.now().checked_add(delay));
        if due.is_none() {
            tracing::warn!("Display time {}s is out of range, not auto-advancing", secs);
        }
        self.advance_due = due;
    }

    fn schedule_viewed(&mut self, path: &Path) {
        self.pending_views.retain(|p| p.path != path);
        self.pending_views.push_back(PendingView {
            due: self.clock.now() + VIEWED_DELAY,
            path: path.to_path_buf(),
        });
    }

    fn cancel_timers(&mut self) {
        self.advance_due = None;
        self.pending_views.clear();
    }

    /// Earliest pending deadline, for hosts that sleep between ticks
    pub fn next_deadline(&self) -> Option<Instant> {
        let view = self.pending_views.iter().map(|p| p.due).min();
        match (view, self.advance_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every timer that is due
    pub fn tick(&mut self) {
        let now = self.clock.now();

        while let Some(pos) = self.pending_views.iter().position(|p| p.due <= now) {
            if let Some(pending) = self.pending_views.remove(pos) {
                self.mark_viewed(&pending.path);
            }
        }

        if self.advance_due.is_some_and(|due| due <= now) {
            self.advance_due = None;
            self.on_advance();
        }
    }

    fn on_advance(&mut self) {
        if !self.playing {
            return;
        }
        let at_end = self.index + 1 >= self.images.len();
        if self.order() == SlideshowOrder::Forward && at_end && !self.looping() {
            self.stop();
            return;
        }
        self.go_next();
        self.schedule_advance();
    }

    fn mark_viewed(&mut self, path: &Path) {
        match self.router.mark_viewed(path) {
            Ok(true) => {
                self.refresh_record(path);
                self.emit(SlideshowEvent::Viewed {
                    path: path.to_path_buf(),
                });
            }
            Ok(false) => tracing::debug!("Not marking unknown image viewed: {}", path.display()),
            Err(e) => tracing::warn!("Could not mark {} viewed: {}", path.display(), e),
        }
    }

    /// Replace the session copy of `path` with the stored record
    fn refresh_record(&mut self, path: &Path) {
        match self.router.get(path) {
            Ok(Some(fresh)) => {
                if let Some(slot) = self.images.iter_mut().find(|r| r.path == path) {
                    *slot = fresh;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not re-read {}: {}", path.display(), e),
        }
    }

    // ===== Edits =====

    /// Adjust the current image's rating by `delta`; returns the new rating
    pub fn change_rating(&mut self, delta: i32) -> Option<u8> {
        let path = self.current()?.path.clone();

        match self.router.adjust_rating(&path, delta) {
            Ok(Some(rating)) => {
                self.refresh_record(&path);
                self.emit(SlideshowEvent::RatingChanged { path, rating });
                Some(rating)
            }
            Ok(None) => {
                tracing::debug!("Rating change for unknown image: {}", path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Could not change rating of {}: {}", path.display(), e);
                self.emit(SlideshowEvent::Notification(format!("Error: {}", e)));
                None
            }
        }
    }

    /// Delete the current image from disk and from its store
    pub fn delete_current(&mut self) -> bool {
        let Some(path) = self.current().map(|r| r.path.clone()) else {
            return false;
        };

        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Could not delete {}: {}", path.display(), e);
                self.emit(SlideshowEvent::Notification(format!("Error deleting: {}", e)));
                return false;
            }
            tracing::info!("Deleted: {}", path.display());
        }

        if let Err(e) = self.router.delete(&path) {
            tracing::warn!("Could not remove record for {}: {}", path.display(), e);
        }

        self.images.remove(self.index);
        self.history.clear();
        self.pending_views.retain(|p| p.path != path);

        if self.images.is_empty() {
            self.cancel_timers();
            self.set_playing(false);
            self.emit(SlideshowEvent::Exhausted);
        } else {
            self.index = self.index.min(self.images.len() - 1);
            self.show_current();
            self.emit(SlideshowEvent::Notification("Image deleted".into()));
        }
        true
    }

    // ===== Settings =====

    /// forward -> backward -> random -> forward
    pub fn cycle_order(&mut self) -> SlideshowOrder {
        let order = self.order().cycle();
        if let Err(e) = self.config.update(|c| c.defaults.slideshow_order = order) {
            tracing::warn!("Could not change order: {}", e);
            return self.order();
        }
        if order == SlideshowOrder::Random {
            self.history.clear();
        }
        self.emit(SlideshowEvent::Notification(format!("Order: {}", order)));
        order
    }

    pub fn toggle_loop(&mut self) -> bool {
        let looping = !self.looping();
        if let Err(e) = self.config.update(|c| c.defaults.loop_slideshow = looping) {
            tracing::warn!("Could not toggle loop: {}", e);
            return self.looping();
        }
        let state = if looping { "on" } else { "off" };
        self.emit(SlideshowEvent::Notification(format!("Loop: {}", state)));
        looping
    }

    /// Change the base display time by `delta` seconds (kept within 0.5s..=1h) and persist it
    pub fn adjust_time(&mut self, delta: f64) -> f64 {
        let current = self.config.with(|c| c.defaults.slideshow_time);
        let time = (current + delta).clamp(MIN_SLIDESHOW_TIME, MAX_SLIDESHOW_TIME);
        if let Err(e) = self.config.update(|c| c.defaults.slideshow_time = time) {
            tracing::warn!("Could not change slideshow time: {}", e);
            return current;
        }
        self.emit(SlideshowEvent::Notification(format!("Time: {:.1}s", time)));
        time
    }

    fn emit(&self, event: SlideshowEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Slideshow event dropped, no receiver");
        }
    }
}

impl Drop for SlideshowController {
    fn drop(&mut self) {
        self.cleanup();
    }
}
