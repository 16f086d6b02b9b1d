// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The capture session only needs three things from the hardware: bind it,
//! take one still, release it.
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← owns the binding, enforces one capture at a time
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← bind / capture / release
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌───────┐   ┌─────────┐
//!  │ V4L2  │   │ Virtual │
//!  └───────┘   └─────────┘
//! ```

pub mod format_converters;
pub mod types;
pub mod v4l2;
pub mod virtual_camera;

pub use types::*;

use crate::config::Config;
use futures::future::BoxFuture;
use std::path::Path;

/// Camera hardware collaborator
///
/// `capture` returns a `'static` future so the session can drive it on the
/// camera worker thread while the owner keeps handling messages. Dropping
/// that future must abandon the capture without leaving the device stuck.
pub trait CameraBackend: Send {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Bind camera resources; photos taken through this binding land in `output_dir`
    ///
    /// Fails with [`BackendError::DeviceBusy`] when the device is already bound.
    fn bind(&mut self, output_dir: &Path) -> BackendResult<BindingId>;

    /// Take one still photo through `binding`
    fn capture(&mut self, binding: BindingId) -> BoxFuture<'static, BackendResult<CapturedImageRef>>;

    /// Release `binding`. Unknown ids are ignored.
    fn release(&mut self, binding: BindingId);
}

/// Create the backend selected in `config`
pub fn get_backend(config: &Config) -> Box<dyn CameraBackend> {
    match config.backend {
        CameraBackendType::V4l2 => Box::new(v4l2::V4l2Backend::new(
            config.device_path.clone(),
            config.warmup_frames,
        )),
        CameraBackendType::Virtual => Box::new(virtual_camera::VirtualCamera::new()),
    }
}
