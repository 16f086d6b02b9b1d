// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 still capture backend
//!
//! Binding opens the device node and negotiates a capture format (MJPG when
//! the driver offers it, YUYV otherwise). Each capture starts a short mmap
//! stream, drops a few warm-up frames so auto exposure can settle, and keeps
//! the next one.

use super::format_converters::{encode_jpeg, yuyv_to_rgb};
use super::types::*;
use super::CameraBackend;
use crate::constants::{file_formats, v4l2 as v4l2_consts};
use crate::storage;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const MJPG: &[u8; 4] = b"MJPG";
const YUYV: &[u8; 4] = b"YUYV";

/// Negotiated frame layout
#[derive(Debug, Clone, Copy)]
struct StillFormat {
    width: u32,
    height: u32,
    fourcc: FourCC,
}

struct Binding {
    id: BindingId,
    device: Arc<Mutex<Device>>,
    format: StillFormat,
    output_dir: PathBuf,
}

pub struct V4l2Backend {
    device_path: String,
    warmup_frames: u32,
    next_binding: u64,
    binding: Option<Binding>,
    /// Device of a released binding that an abandoned capture still holds
    lingering: Option<Weak<Mutex<Device>>>,
}

impl V4l2Backend {
    pub fn new(device_path: String, warmup_frames: u32) -> Self {
        Self {
            device_path,
            warmup_frames,
            next_binding: 1,
            binding: None,
            lingering: None,
        }
    }

    fn open_device(&self) -> BackendResult<(Device, StillFormat)> {
        let device = Device::with_path(&self.device_path)
            .map_err(|e| classify_io_error(&self.device_path, e))?;

        let mut format = device
            .format()
            .map_err(|e| classify_io_error(&self.device_path, e))?;

        // Prefer MJPG: the driver hands us a finished JPEG
        for fourcc in [MJPG, YUYV] {
            format.fourcc = FourCC::new(fourcc);
            match device.set_format(&format) {
                Ok(applied) if applied.fourcc == FourCC::new(fourcc) => {
                    info!(
                        device = %self.device_path,
                        width = applied.width,
                        height = applied.height,
                        fourcc = ?applied.fourcc,
                        "Negotiated still format"
                    );
                    let still = StillFormat {
                        width: applied.width,
                        height: applied.height,
                        fourcc: applied.fourcc,
                    };
                    return Ok((device, still));
                }
                Ok(applied) => {
                    debug!(requested = ?FourCC::new(fourcc), got = ?applied.fourcc, "Format not accepted");
                }
                Err(e) if e.raw_os_error() == Some(libc::EBUSY) => {
                    return Err(BackendError::DeviceBusy(format!(
                        "{} is streaming for another client",
                        self.device_path
                    )));
                }
                Err(e) => {
                    warn!(device = %self.device_path, error = %e, "Could not set format");
                }
            }
        }

        Err(BackendError::NotAvailable(format!(
            "{} offers neither MJPG nor YUYV",
            self.device_path
        )))
    }
}

impl CameraBackend for V4l2Backend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn bind(&mut self, output_dir: &Path) -> BackendResult<BindingId> {
        if let Some(binding) = &self.binding {
            return Err(BackendError::DeviceBusy(format!(
                "{} already bound as {}",
                self.device_path, binding.id
            )));
        }

        if let Some(lingering) = self.lingering.take() {
            if !wait_for_release(&lingering, v4l2_consts::RELEASE_WAIT) {
                self.lingering = Some(lingering);
                return Err(BackendError::DeviceBusy(format!(
                    "{} still held by an abandoned capture",
                    self.device_path
                )));
            }
            debug!(device = %self.device_path, "Abandoned capture let go of the device");
        }

        let (device, format) = self.open_device()?;
        let id = BindingId(self.next_binding);
        self.next_binding += 1;

        self.binding = Some(Binding {
            id,
            device: Arc::new(Mutex::new(device)),
            format,
            output_dir: output_dir.to_path_buf(),
        });
        info!(binding = %id, device = %self.device_path, "V4L2 device bound");
        Ok(id)
    }

    fn capture(&mut self, binding: BindingId) -> BoxFuture<'static, BackendResult<CapturedImageRef>> {
        let Some(bound) = self.binding.as_ref().filter(|b| b.id == binding) else {
            return futures::future::ready(Err(BackendError::UnknownBinding(binding))).boxed();
        };

        let device = Arc::clone(&bound.device);
        let format = bound.format;
        let output_dir = bound.output_dir.clone();
        let warmup_frames = self.warmup_frames;

        async move {
            tokio::task::spawn_blocking(move || {
                let device = device
                    .lock()
                    .map_err(|_| BackendError::Other("device lock poisoned".into()))?;
                let frame = grab_frame(&device, warmup_frames)?;
                let jpeg = to_jpeg(frame, format)?;
                let path = storage::write_photo(&output_dir, &jpeg)?;
                Ok::<_, BackendError>(CapturedImageRef::from_path(&path))
            })
            .await
            .map_err(|e| BackendError::Other(format!("Capture task error: {}", e)))?
        }
        .boxed()
    }

    fn release(&mut self, binding: BindingId) {
        let Some(released) = self.binding.take_if(|b| b.id == binding) else {
            return;
        };
        // A timed-out capture keeps its own Arc until the blocking call returns
        if Arc::strong_count(&released.device) > 1 {
            warn!(
                binding = %binding,
                device = %self.device_path,
                "Released while a capture still holds the device"
            );
            self.lingering = Some(Arc::downgrade(&released.device));
        }
        info!(binding = %binding, device = %self.device_path, "V4L2 device released");
    }
}

/// Stream until the warm-up frames are consumed and return a copy of the next one
fn grab_frame(device: &Device, warmup_frames: u32) -> BackendResult<Vec<u8>> {
    let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, v4l2_consts::STREAM_BUFFERS)
        .map_err(|e| BackendError::CaptureFailed(format!("Failed to start stream: {}", e)))?;

    for _ in 0..warmup_frames {
        stream
            .next()
            .map_err(|e| BackendError::CaptureFailed(format!("Warm-up frame failed: {}", e)))?;
    }

    let (buf, meta) = stream
        .next()
        .map_err(|e| BackendError::CaptureFailed(format!("Frame dequeue failed: {}", e)))?;

    let used = (meta.bytesused as usize).min(buf.len());
    debug!(sequence = meta.sequence, bytes = used, "Still frame dequeued");
    Ok(buf[..used].to_vec())
}

fn to_jpeg(frame: Vec<u8>, format: StillFormat) -> BackendResult<Vec<u8>> {
    if format.fourcc == FourCC::new(MJPG) {
        return Ok(frame);
    }

    let rgb = yuyv_to_rgb(&frame, format.width, format.height);
    let image = image::RgbImage::from_raw(format.width, format.height, rgb)
        .ok_or_else(|| BackendError::CaptureFailed("frame size mismatch".into()))?;
    encode_jpeg(&image, file_formats::JPEG_QUALITY)
}

/// Wait until nothing holds `device` any more; false if `limit` passes first
fn wait_for_release<T>(device: &Weak<T>, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while device.strong_count() > 0 {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(v4l2_consts::RELEASE_POLL);
    }
    true
}

fn classify_io_error(device_path: &str, err: std::io::Error) -> BackendError {
    match (err.kind(), err.raw_os_error()) {
        (_, Some(code)) if code == libc::EBUSY => {
            BackendError::DeviceBusy(format!("{}: {}", device_path, err))
        }
        (std::io::ErrorKind::NotFound, _) => {
            BackendError::NotAvailable(format!("{} does not exist", device_path))
        }
        (std::io::ErrorKind::PermissionDenied, _) => {
            BackendError::NotAvailable(format!("{}: permission denied", device_path))
        }
        _ => BackendError::IoError(format!("{}: {}", device_path, err)),
    }
}
