// SPDX-License-Identifier: GPL-3.0-only

//! Snapcam - permission-gated still photo capture
//!
//! The crate drives one workflow: obtain camera access, show the live
//! camera, take a photo on request and show the result.
//!
//! # Architecture
//!
//! - [`permission`]: camera access decision and the OS permission providers
//! - [`session`]: camera binding lifecycle and single-photo capture
//! - [`app`]: the coordinator state machine tying both to the UI
//! - [`backends`]: camera hardware backends
//! - [`worker`]: the thread hardware work runs on
//! - [`config`]: user configuration
//! - [`storage`]: where photos are written
//!
//! # Example
//!
//! ```ignore
//! let gate = PermissionGate::new(permission::provider_for(&config));
//! let session = CaptureSession::new(backend, photo_dir, config.capture_timeout())?;
//! let coordinator = CaptureCoordinator::new(gate, session);
//! let ui = coordinator.subscribe();
//! tokio::spawn(coordinator.run());
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod permission;
pub mod session;
pub mod storage;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use app::{CaptureCoordinator, CaptureState, CoordinatorHandle, Message, UiSnapshot, UiVisibility};
pub use config::Config;
pub use errors::{AppError, AppResult, CameraError};
pub use permission::{PermissionGate, PermissionStatus};
pub use session::{CaptureSession, CapturedImageRef};
