// SPDX-License-Identifier: GPL-3.0-only

//! Permission providers that need no desktop portal

use super::{PermissionProvider, PermissionStatus};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Native access check on a V4L2 device node
///
/// Outside a sandbox, camera access is plain file access: membership in the
/// `video` group or a logind ACL. There is nobody to prompt, so a prompt is
/// just another check.
pub struct DevicePermission {
    device_path: PathBuf,
}

impl DevicePermission {
    pub fn new(device_path: impl AsRef<Path>) -> Self {
        Self {
            device_path: device_path.as_ref().to_path_buf(),
        }
    }
}

impl PermissionProvider for DevicePermission {
    fn name(&self) -> &'static str {
        "device"
    }

    fn check(&self) -> PermissionStatus {
        device_access(&self.device_path)
    }

    fn prompt(&self) -> BoxFuture<'static, bool> {
        let granted = self.check() == PermissionStatus::Granted;
        futures::future::ready(granted).boxed()
    }
}

fn device_access(path: &Path) -> PermissionStatus {
    match std::fs::OpenOptions::new().read(true).write(true).open(path) {
        Ok(_) => PermissionStatus::Granted,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => PermissionStatus::Denied,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot determine device access");
            PermissionStatus::Unknown
        }
    }
}

/// Fixed answer, for the virtual camera and for scripted runs
pub struct StaticPermission {
    granted: bool,
}

impl StaticPermission {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

impl PermissionProvider for StaticPermission {
    fn name(&self) -> &'static str {
        "static"
    }

    fn check(&self) -> PermissionStatus {
        if self.granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    fn prompt(&self) -> BoxFuture<'static, bool> {
        futures::future::ready(self.granted).boxed()
    }
}
