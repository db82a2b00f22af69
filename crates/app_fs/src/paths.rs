//! Path normalization and scan root derivation

use crate::{is_supported_image, FsError, Result};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory, then normalize it.
pub fn absolutize<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(FsError::InvalidPath("empty path".into()));
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(normalize_path(&absolute))
}

/// Resolve `.` and `..` lexically. Symbolic links are left untouched.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    normalized
}

/// Names starting with a dot are hidden (`.thumbnails`, `.git`, ...)
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Map each input to the directory one store will own.
///
/// A file input maps to its parent directory, anything else to itself.
/// Inputs that do not exist but carry an image extension are treated as
/// files. The result is deduplicated and keeps first-seen order.
pub fn derive_scan_roots<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut roots = Vec::new();
    let mut seen = HashSet::new();

    for path in paths {
        let path = absolutize(path)?;
        let looks_like_file = path.is_file() || (!path.exists() && is_supported_image(&path));

        let root = if looks_like_file {
            match path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => path,
            }
        } else {
            path
        };

        if seen.insert(root.clone()) {
            roots.push(root);
        }
    }

    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/photos/./2024/../2025/a.jpg")),
            PathBuf::from("/photos/2025/a.jpg")
        );
    }

    #[test]
    fn test_absolutize_relative() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolutize("some/dir").unwrap(), cwd.join("some/dir"));
        assert!(absolutize("").is_err());
    }

    #[test]
    fn test_hidden_name() {
        assert!(is_hidden_name(OsStr::new(".thumbnails")));
        assert!(!is_hidden_name(OsStr::new("holiday")));
    }

    #[test]
    fn test_roots_from_file_and_dir() {
        let roots = derive_scan_roots(&["/a/photo.jpg", "/a/b"]).unwrap();
        assert_eq!(roots, vec![PathBuf::from("/a"), PathBuf::from("/a/b")]);
    }

    #[test]
    fn test_roots_deduplicated_in_order() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let photo = dir.path().join("photo.png");
        std::fs::write(&photo, b"x").unwrap();

        let inputs = vec![
            sub.clone(),
            photo,
            dir.path().to_path_buf(),
            sub.join("."),
        ];
        let roots = derive_scan_roots(&inputs).unwrap();
        assert_eq!(roots, vec![sub, dir.path().to_path_buf()]);
    }
}
