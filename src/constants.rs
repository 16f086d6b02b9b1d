// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application identifier, used for config and photo directory names
pub const APP_ID: &str = "snapcam";

/// Timing constants for the capture workflow
pub mod timing {
    use super::Duration;

    /// Upper bound on a single hardware capture before it is reported as failed
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

    /// How long teardown waits for blocking camera work before abandoning it
    pub const WORKER_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
}

/// V4L2 capture defaults
pub mod v4l2 {
    use super::Duration;

    /// Device node opened when none is configured
    pub const DEFAULT_DEVICE: &str = "/dev/video0";

    /// Frames discarded before the kept one so auto exposure can settle
    pub const DEFAULT_WARMUP_FRAMES: u32 = 5;

    /// Number of mmap buffers requested for a still capture stream
    pub const STREAM_BUFFERS: u32 = 4;

    /// How long a rebind waits for an abandoned capture to let go of the device
    pub const RELEASE_WAIT: Duration = Duration::from_millis(500);

    /// Poll interval while waiting for the device to be let go
    pub const RELEASE_POLL: Duration = Duration::from_millis(20);
}

/// Photo file naming
pub mod file_formats {
    /// Prefix of every photo file name
    pub const PHOTO_PREFIX: &str = "IMG_";

    /// chrono format string for the timestamp part of the file name
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S%.3f";

    /// Extension of written photos
    pub const PHOTO_EXTENSION: &str = "jpg";

    /// JPEG quality used when a frame must be re-encoded
    pub const JPEG_QUALITY: u8 = 92;
}

/// Resolution of the synthetic test pattern produced by the virtual camera
pub mod virtual_camera {
    pub const WIDTH: u32 = 640;
    pub const HEIGHT: u32 = 480;
}

/// Application information utilities
pub mod app_info {
    use std::path::Path;

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// Check if the application is running inside a Flatpak sandbox
    pub fn is_flatpak() -> bool {
        Path::new("/.flatpak-info").exists()
    }

    /// Get the runtime environment string (e.g., "Flatpak" or "Native")
    pub fn runtime_environment() -> &'static str {
        if is_flatpak() { "Flatpak" } else { "Native" }
    }
}
