// SPDX-License-Identifier: GPL-3.0-only

//! Camera session lifecycle and single-photo capture
//!
//! A [`CaptureSession`] holds at most one hardware binding at a time and at
//! most one capture in flight. Captures run on the [`CameraWorker`] thread
//! under a timeout; their result is handed to a callback exactly once.
//! Dropping the session releases the binding.

use crate::backends::camera::CameraBackend;
use crate::errors::CameraError;
use crate::permission::AccessGranted;
use crate::storage;
use crate::worker::CameraWorker;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use crate::backends::camera::{BindingId, CapturedImageRef};

/// Live binding to camera hardware, owned by the session
#[derive(Debug)]
pub struct CameraSessionHandle {
    binding: BindingId,
    opened_at: Instant,
}

impl CameraSessionHandle {
    pub fn binding(&self) -> BindingId {
        self.binding
    }

    /// Time since the camera was bound
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

/// A capture running on the worker
struct InFlight {
    generation: u64,
    task: JoinHandle<()>,
}

pub struct CaptureSession {
    backend: Box<dyn CameraBackend>,
    worker: CameraWorker,
    output_dir: PathBuf,
    /// Used when `output_dir` cannot be created
    fallback_dir: PathBuf,
    capture_timeout: Duration,
    handle: Option<CameraSessionHandle>,
    in_flight: Option<InFlight>,
    next_generation: u64,
    /// Highest capture generation whose result is settled; written by the
    /// worker before the callback runs
    settled: Arc<AtomicU64>,
}

impl CaptureSession {
    /// Create an inactive session; starts the camera worker thread
    pub fn new(
        backend: Box<dyn CameraBackend>,
        output_dir: PathBuf,
        capture_timeout: Duration,
    ) -> std::io::Result<Self> {
        info!(
            backend = %backend.backend_type(),
            dir = %output_dir.display(),
            timeout_ms = capture_timeout.as_millis() as u64,
            "Creating capture session"
        );
        Ok(Self {
            backend,
            worker: CameraWorker::spawn()?,
            output_dir,
            fallback_dir: storage::fallback_photo_directory(),
            capture_timeout,
            handle: None,
            in_flight: None,
            next_generation: 1,
            settled: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Replace the directory photos go to when the configured one is unusable
    pub fn with_fallback_dir(mut self, dir: PathBuf) -> Self {
        self.fallback_dir = dir;
        self
    }

    /// Bind camera resources
    ///
    /// Fails with [`CameraError::BindFailed`] when the hardware is unavailable
    /// or this session already holds a binding.
    pub fn activate(&mut self, _grant: AccessGranted) -> Result<&CameraSessionHandle, CameraError> {
        if let Some(handle) = &self.handle {
            return Err(CameraError::BindFailed(format!(
                "session already holds binding {}",
                handle.binding
            )));
        }

        let photo_dir = storage::prepare_photo_directory(&self.output_dir, &self.fallback_dir)
            .map_err(|e| {
                CameraError::BindFailed(format!(
                    "no usable photo directory ({} or {}): {}",
                    self.output_dir.display(),
                    self.fallback_dir.display(),
                    e
                ))
            })?;

        let binding = self
            .backend
            .bind(&photo_dir)
            .map_err(|e| CameraError::BindFailed(e.to_string()))?;

        info!(binding = %binding, "Camera session active");
        Ok(&*self.handle.insert(CameraSessionHandle {
            binding,
            opened_at: Instant::now(),
        }))
    }

    /// Take one photo
    ///
    /// Returns `NotActive` or `Busy` immediately, without calling
    /// `on_captured`, when there is no binding or a capture is already in
    /// flight. Otherwise `on_captured` runs exactly once on the camera worker
    /// thread, unless the session is deactivated first.
    pub fn capture_photo<F>(&mut self, on_captured: F) -> Result<(), CameraError>
    where
        F: FnOnce(Result<CapturedImageRef, CameraError>) + Send + 'static,
    {
        let Some(handle) = &self.handle else {
            return Err(CameraError::NotActive);
        };
        if self.is_capturing() {
            return Err(CameraError::Busy);
        }

        let binding = handle.binding;
        let capture = self.backend.capture(binding);
        let timeout = self.capture_timeout;
        let generation = self.next_generation;
        self.next_generation += 1;
        let settled = Arc::clone(&self.settled);
        info!(binding = %binding, generation, "Capture requested");

        let task = self.worker.spawn_task(async move {
            let started = Instant::now();
            let result = match tokio::time::timeout(timeout, capture).await {
                Ok(Ok(locator)) => {
                    info!(
                        locator = %locator,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Photo captured"
                    );
                    Ok(locator)
                }
                Ok(Err(e)) => Err(CameraError::CaptureFailed(e.to_string())),
                Err(_) => Err(CameraError::CaptureFailed(format!(
                    "capture timed out after {} ms",
                    timeout.as_millis()
                ))),
            };
            settled.fetch_max(generation, Ordering::SeqCst);
            on_captured(result);
        });
        self.in_flight = Some(InFlight { generation, task });
        Ok(())
    }

    /// Release the binding, abandoning any capture in flight. No-op when inactive.
    pub fn deactivate(&mut self) {
        if self.is_capturing() {
            warn!("Abandoning capture in flight");
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }

        match self.handle.take() {
            Some(handle) => {
                self.backend.release(handle.binding);
                info!(
                    binding = %handle.binding,
                    active_ms = handle.age().as_millis() as u64,
                    "Camera session released"
                );
            }
            None => debug!("Deactivate on inactive session"),
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_capturing(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| self.settled.load(Ordering::SeqCst) < f.generation)
    }

    pub fn handle(&self) -> Option<&CameraSessionHandle> {
        self.handle.as_ref()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("backend", &self.backend.backend_type())
            .field("handle", &self.handle)
            .field("capturing", &self.is_capturing())
            .finish()
    }
}
