// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for photo files

use crate::constants::{APP_ID, file_formats};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default photo directory: `~/Pictures/snapcam`
pub fn default_photo_directory() -> PathBuf {
    let pictures = dirs::picture_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join("Pictures")
    });
    pictures.join(APP_ID)
}

/// Photo directory honouring a configured override
pub fn photo_directory(configured: Option<&Path>) -> PathBuf {
    configured
        .map(Path::to_path_buf)
        .unwrap_or_else(default_photo_directory)
}

/// Where photos go when the configured directory cannot be created:
/// `~/.local/share/snapcam/photos`
pub fn fallback_photo_directory() -> PathBuf {
    let data = dirs::data_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(".local").join("share")
    });
    data.join(APP_ID).join("photos")
}

/// Ensure the photo directory exists, creating it if necessary
pub fn ensure_photo_directory(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    info!(path = %dir.display(), "Photo directory ready");
    Ok(())
}

/// Create `preferred`, falling back to `fallback` when that fails
///
/// Returns the directory photos should be written to.
pub fn prepare_photo_directory(preferred: &Path, fallback: &Path) -> std::io::Result<PathBuf> {
    match ensure_photo_directory(preferred) {
        Ok(()) => Ok(preferred.to_path_buf()),
        Err(e) if preferred != fallback => {
            warn!(
                path = %preferred.display(),
                fallback = %fallback.display(),
                error = %e,
                "Photo directory unusable, using fallback"
            );
            ensure_photo_directory(fallback)?;
            Ok(fallback.to_path_buf())
        }
        Err(e) => Err(e),
    }
}

/// Timestamped path for a new photo inside `dir`
///
/// Two photos in the same millisecond get a numeric suffix.
pub fn new_photo_path(dir: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format(file_formats::TIMESTAMP_FORMAT);
    let stem = format!("{}{}", file_formats::PHOTO_PREFIX, timestamp);

    let mut path = dir.join(format!("{}.{}", stem, file_formats::PHOTO_EXTENSION));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!(
            "{}_{}.{}",
            stem,
            counter,
            file_formats::PHOTO_EXTENSION
        ));
        counter += 1;
    }
    path
}

/// Write encoded photo bytes to a fresh timestamped file inside `dir`
pub fn write_photo(dir: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let path = new_photo_path(dir);
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), size = bytes.len(), "Photo saved");
    Ok(path)
}
