//! Lazy discovery of supported image files

use crate::{absolutize, is_hidden_name, FsError, Result};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, FilterEntry, WalkDir};

/// Lowercase extensions the viewer can display
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Check if a path has a supported image extension (case-insensitive)
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
}

/// A discovered image file with a fresh stat snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub name: String,
    pub directory: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl ImageEntry {
    /// Stat `path` and build an entry. The path must already be absolute.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| FsError::from_io(e, path))?;

        if !metadata.is_file() {
            return Err(FsError::InvalidPath(format!("Not a file: {}", path.display())));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            directory,
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }
}

type DirWalk = FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

/// Prune hidden directories below the walk root. Hidden files are kept.
fn keep_entry(entry: &DirEntry) -> bool {
    !(entry.depth() > 0 && entry.file_type().is_dir() && is_hidden_name(entry.file_name()))
}

/// A directory's own files come before its subdirectories, each group by name
fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_file_entry(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Walks input paths and yields one [`ImageEntry`] per supported image.
///
/// Inputs are visited in the order given. Directories are walked depth
/// first, yielding a directory's files (sorted by name) before descending
/// into its subdirectories (also by name). Symbolic links to directories
/// are not followed. Entries that cannot be read are skipped. A file reachable
/// from several overlapping inputs is yielded once.
pub struct ImageWalker<'a> {
    inputs: std::vec::IntoIter<PathBuf>,
    recursive: bool,
    current: Option<DirWalk>,
    seen: HashSet<PathBuf>,
    count: usize,
    on_progress: Option<Box<dyn FnMut(&Path, usize) + 'a>>,
}

impl<'a> ImageWalker<'a> {
    pub fn new<P: AsRef<Path>>(paths: &[P], recursive: bool) -> Self {
        let inputs: Vec<PathBuf> = paths
            .iter()
            .filter_map(|p| match absolutize(p) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Skipping input {:?}: {}", p.as_ref(), e);
                    None
                }
            })
            .collect();

        Self {
            inputs: inputs.into_iter(),
            recursive,
            current: None,
            seen: HashSet::new(),
            count: 0,
            on_progress: None,
        }
    }

    /// Called after every discovered file with the running count and its path
    pub fn with_progress(mut self, callback: impl FnMut(&Path, usize) + 'a) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Number of images yielded so far
    pub fn discovered(&self) -> usize {
        self.count
    }

    fn walk_dir(&self, root: &Path) -> DirWalk {
        let mut walk = WalkDir::new(root).follow_links(false).sort_by(files_first);
        if !self.recursive {
            walk = walk.max_depth(1);
        }
        walk.into_iter().filter_entry(keep_entry as fn(&DirEntry) -> bool)
    }

    fn accept(&mut self, path: &Path) -> Option<ImageEntry> {
        if !is_supported_image(path) || self.seen.contains(path) {
            return None;
        }

        match ImageEntry::from_path(path) {
            Ok(entry) => {
                self.seen.insert(entry.path.clone());
                self.count += 1;
                if let Some(callback) = self.on_progress.as_mut() {
                    callback(&entry.path, self.count);
                }
                Some(entry)
            }
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Iterator for ImageWalker<'_> {
    type Item = ImageEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(walk) = self.current.as_mut() {
                match walk.next() {
                    Some(Ok(entry)) => {
                        if is_file_entry(&entry) {
                            if let Some(image) = self.accept(entry.path()) {
                                return Some(image);
                            }
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        tracing::debug!("Walk error: {}", e);
                        continue;
                    }
                    None => self.current = None,
                }
            }

            let input = self.inputs.next()?;
            if input.is_dir() {
                self.current = Some(self.walk_dir(&input));
            } else if input.is_file() {
                if let Some(image) = self.accept(&input) {
                    return Some(image);
                }
            } else {
                tracing::warn!("Input path does not exist: {}", input.display());
            }
        }
    }
}
