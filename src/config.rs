// SPDX-License-Identifier: GPL-3.0-only

//! Persistent user configuration
//!
//! Stored as JSON under `$XDG_CONFIG_HOME/snapcam/config.json`. Unknown or
//! missing fields fall back to their defaults so older files keep loading.

use crate::backends::camera::CameraBackendType;
use crate::constants::{APP_ID, timing, v4l2};
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "config.json";

/// Where camera access decisions come from
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PermissionSource {
    /// Portal inside Flatpak, device node check otherwise
    #[default]
    Auto,
    /// Always ask xdg-desktop-portal
    Portal,
    /// Check read/write access on the device node
    Device,
    /// Treat access as granted (virtual camera, testing)
    Granted,
    /// Treat access as denied
    Denied,
}

impl std::fmt::Display for PermissionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionSource::Auto => write!(f, "auto"),
            PermissionSource::Portal => write!(f, "portal"),
            PermissionSource::Device => write!(f, "device"),
            PermissionSource::Granted => write!(f, "granted"),
            PermissionSource::Denied => write!(f, "denied"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (V4L2 or the synthetic virtual camera)
    pub backend: CameraBackendType,
    /// V4L2 device node
    pub device_path: String,
    /// Override for the photo directory (default: ~/Pictures/snapcam)
    pub photo_directory: Option<PathBuf>,
    /// Capture timeout in milliseconds
    pub capture_timeout_ms: u64,
    /// Source of camera access decisions
    pub permission_source: PermissionSource,
    /// Frames discarded before the kept one
    pub warmup_frames: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            device_path: v4l2::DEFAULT_DEVICE.to_string(),
            photo_directory: None,
            capture_timeout_ms: timing::CAPTURE_TIMEOUT.as_millis() as u64,
            permission_source: PermissionSource::default(),
            warmup_frames: v4l2::DEFAULT_WARMUP_FRAMES,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                warn!("No config directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing or malformed file yields the defaults
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                }
                Self::default()
            }
        }
    }

    /// Strict load, reporting I/O and parse errors
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}
