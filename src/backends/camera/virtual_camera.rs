// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! Renders a synthetic test pattern instead of reading a sensor. Useful on
//! machines without a camera and for exercising the full capture workflow
//! end to end.

use super::format_converters::encode_jpeg;
use super::types::*;
use super::CameraBackend;
use crate::constants::{file_formats, virtual_camera as vc};
use crate::storage;
use futures::FutureExt;
use futures::future::BoxFuture;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct VirtualCamera {
    next_binding: u64,
    bound: Option<(BindingId, PathBuf)>,
    frames_taken: u64,
}

impl VirtualCamera {
    pub fn new() -> Self {
        Self {
            next_binding: 1,
            bound: None,
            frames_taken: 0,
        }
    }
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for VirtualCamera {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }

    fn bind(&mut self, output_dir: &Path) -> BackendResult<BindingId> {
        if let Some((id, _)) = &self.bound {
            return Err(BackendError::DeviceBusy(format!(
                "virtual camera already bound as {}",
                id
            )));
        }

        let id = BindingId(self.next_binding);
        self.next_binding += 1;
        self.bound = Some((id, output_dir.to_path_buf()));
        info!(binding = %id, dir = %output_dir.display(), "Virtual camera bound");
        Ok(id)
    }

    fn capture(&mut self, binding: BindingId) -> BoxFuture<'static, BackendResult<CapturedImageRef>> {
        let output_dir = match &self.bound {
            Some((id, dir)) if *id == binding => dir.clone(),
            _ => return futures::future::ready(Err(BackendError::UnknownBinding(binding))).boxed(),
        };

        self.frames_taken += 1;
        let frame_number = self.frames_taken;

        async move {
            tokio::task::spawn_blocking(move || {
                let pattern = test_pattern(vc::WIDTH, vc::HEIGHT, frame_number);
                let jpeg = encode_jpeg(&pattern, file_formats::JPEG_QUALITY)?;
                let path = storage::write_photo(&output_dir, &jpeg)?;
                debug!(frame_number, path = %path.display(), "Virtual frame written");
                Ok::<_, BackendError>(CapturedImageRef::from_path(&path))
            })
            .await
            .map_err(|e| BackendError::Other(format!("Capture task error: {}", e)))?
        }
        .boxed()
    }

    fn release(&mut self, binding: BindingId) {
        if matches!(&self.bound, Some((id, _)) if *id == binding) {
            self.bound = None;
            info!(binding = %binding, "Virtual camera released");
        }
    }
}

/// Diagonal colour gradient, shifted per frame so consecutive photos differ
fn test_pattern(width: u32, height: u32, frame_number: u64) -> RgbImage {
    let shift = (frame_number * 37 % 256) as u32;
    RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1) + shift) % 256;
        let g = (y * 255 / height.max(1) + shift) % 256;
        let b = ((x + y) / 4 + shift) % 256;
        Rgb([r as u8, g as u8, b as u8])
    })
}
