// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! The terminal plays the rendering side of the capture workflow:
//! - `photo`: one permission, capture, photo cycle
//! - `session`: interactive, driven by single-letter commands on stdin
//! - `status`: report the camera permission status

use snapcam::app::{
    Advisory, CaptureCoordinator, CaptureState, CoordinatorHandle, PermissionPhase, UiSnapshot,
};
use snapcam::backends::camera::{self, CameraBackendType};
use snapcam::config::{Config, PermissionSource};
use snapcam::constants::app_info;
use snapcam::errors::{AppError, AppResult};
use snapcam::permission::{self, PermissionGate};
use snapcam::session::{CaptureSession, CapturedImageRef};
use snapcam::storage;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{debug, info};

/// Command line settings that take precedence over the config file
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub backend: Option<CameraBackendType>,
    pub device: Option<String>,
    pub output: Option<PathBuf>,
    pub permission: Option<PermissionSource>,
    pub timeout_ms: Option<u64>,
}

pub fn load_config(overrides: Overrides) -> Config {
    let mut config = match &overrides.config_path {
        Some(path) => Config::load_or_default(path),
        None => Config::load(),
    };

    if let Some(backend) = overrides.backend {
        config.backend = backend;
    }
    if let Some(device) = overrides.device {
        config.device_path = device;
    }
    if let Some(output) = overrides.output {
        config.photo_directory = Some(output);
    }
    if let Some(permission) = overrides.permission {
        config.permission_source = permission;
    }
    if let Some(timeout_ms) = overrides.timeout_ms {
        config.capture_timeout_ms = timeout_ms;
    }
    debug!(?config, "Effective configuration");
    config
}

fn build_coordinator(config: &Config) -> AppResult<CaptureCoordinator> {
    let gate = PermissionGate::new(permission::provider_for(config));
    let output_dir = storage::photo_directory(config.photo_directory.as_deref());
    let session = CaptureSession::new(
        camera::get_backend(config),
        output_dir,
        config.capture_timeout(),
    )?;
    Ok(CaptureCoordinator::new(gate, session))
}

/// Route Ctrl+C into an orderly shutdown so the camera gets released
fn install_interrupt(handle: &CoordinatorHandle) -> AppResult<()> {
    let handle = handle.clone();
    ctrlc::set_handler(move || {
        info!("Interrupted, shutting down");
        handle.shutdown();
    })
    .map_err(|e| format!("Failed to install interrupt handler: {}", e))?;
    Ok(())
}

fn new_runtime() -> AppResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AppError::from(format!("Failed to start async runtime: {}", e)))
}

/// Why a single-photo run ended without a photo
fn photo_failure(snapshot: &UiSnapshot) -> AppError {
    match &snapshot.advisory {
        Some(Advisory::PermissionDenied) => AppError::PermissionDenied,
        Some(Advisory::Camera(e)) => e.clone().into(),
        Some(other) => other.to_string().into(),
        None if snapshot.state.is_closed() => "Interrupted".into(),
        None => "Capture workflow stopped".into(),
    }
}

/// Take a single photo
pub fn take_photo(config: Config) -> AppResult<()> {
    let runtime = new_runtime()?;
    runtime.block_on(async move {
        let coordinator = build_coordinator(&config)?;
        let handle = coordinator.handle();
        install_interrupt(&handle)?;
        let mut ui = coordinator.subscribe();
        let running = tokio::spawn(coordinator.run());

        let mut requested = false;
        let outcome: AppResult<CapturedImageRef> = loop {
            if ui.changed().await.is_err() {
                break Err(photo_failure(&UiSnapshot::default()));
            }
            let snapshot = ui.borrow_and_update().clone();

            match snapshot.state {
                CaptureState::AwaitingPermission(PermissionPhase::RationaleRequired) => {
                    if let Some(advisory) = &snapshot.advisory {
                        println!("{}", advisory);
                    }
                    handle.dismiss_rationale();
                }
                CaptureState::AwaitingPermission(PermissionPhase::Denied)
                | CaptureState::CameraUnavailable
                | CaptureState::Closed => break Err(photo_failure(&snapshot)),
                CaptureState::CameraActive {
                    capture_in_flight: false,
                } => {
                    if requested {
                        break Err(photo_failure(&snapshot));
                    }
                    println!("Capturing...");
                    handle.capture();
                    requested = true;
                }
                CaptureState::PhotoShown => {
                    if let Some(photo) = snapshot.photo {
                        break Ok(photo);
                    }
                }
                CaptureState::AwaitingPermission(PermissionPhase::Pending)
                | CaptureState::Activating
                | CaptureState::CameraActive {
                    capture_in_flight: true,
                } => {}
            }
        };

        handle.shutdown();
        running.await.map_err(join_failure)?;

        let photo = outcome?;
        println!("Photo saved: {}", photo);
        Ok::<(), AppError>(())
    })
}

/// Interactive session; the terminal shows what a camera window would
pub fn run_session(config: Config) -> AppResult<()> {
    let runtime = new_runtime()?;
    runtime.block_on(async move {
        let coordinator = build_coordinator(&config)?;
        let handle = coordinator.handle();
        install_interrupt(&handle)?;
        let mut ui = coordinator.subscribe();
        let running = tokio::spawn(coordinator.run());
        spawn_input_reader(handle)?;

        println!("Commands: c capture, r retake, y continue, t retry camera, q quit");
        let mut renderer = Renderer::default();
        while ui.changed().await.is_ok() {
            let snapshot = ui.borrow_and_update().clone();
            renderer.render(&snapshot);
            if snapshot.state.is_closed() {
                break;
            }
        }

        let last = running.await.map_err(join_failure)?;
        if let Some(photo) = last.photo {
            println!("Last photo: {}", photo);
        }
        Ok::<(), AppError>(())
    })
}

fn join_failure(err: tokio::task::JoinError) -> AppError {
    AppError::Other(format!("Coordinator task failed: {}", err))
}

/// Print the permission status without prompting
pub fn show_status(config: &Config) -> AppResult<()> {
    let provider = permission::provider_for(config);
    println!("snapcam {} ({})", app_info::version(), app_info::runtime_environment());
    println!("Backend: {}", config.backend);
    if config.backend == CameraBackendType::V4l2 {
        println!("Device: {}", config.device_path);
    }
    println!(
        "Photo directory: {}",
        storage::photo_directory(config.photo_directory.as_deref()).display()
    );
    println!(
        "Camera permission: {} (source: {}, provider: {})",
        provider.check(),
        config.permission_source,
        provider.name()
    );
    Ok(())
}

/// Map stdin lines to user actions; end of input quits
fn spawn_input_reader(handle: CoordinatorHandle) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match line.trim() {
                    "c" => handle.capture(),
                    "r" => handle.retake(),
                    "y" => handle.dismiss_rationale(),
                    "t" => handle.retry_camera(),
                    "q" => break,
                    "" => {}
                    other => eprintln!("Unknown command: {}", other),
                }
                if handle.is_closed() {
                    return;
                }
            }
            handle.shutdown();
        })?;
    Ok(())
}

/// Prints the visible view and each new advisory
#[derive(Default)]
struct Renderer {
    view: Option<String>,
    advisory_serial: u64,
}

impl Renderer {
    fn render(&mut self, snapshot: &UiSnapshot) {
        if snapshot.advisory_serial != self.advisory_serial {
            self.advisory_serial = snapshot.advisory_serial;
            if let Some(advisory) = &snapshot.advisory {
                eprintln!("! {}", advisory);
            }
        }

        let view = match (&snapshot.state, &snapshot.photo) {
            (CaptureState::CameraActive { capture_in_flight: true }, _) => {
                "[camera] capturing...".to_string()
            }
            _ if snapshot.visibility.show_camera() => "[camera] live".to_string(),
            (_, Some(photo)) if snapshot.visibility.show_photo() => format!("[photo] {}", photo),
            (CaptureState::AwaitingPermission(_), _) => "[waiting for camera access]".to_string(),
            (CaptureState::Activating, _) => "[opening camera]".to_string(),
            (CaptureState::CameraUnavailable, _) => "[camera unavailable]".to_string(),
            _ => "[closed]".to_string(),
        };
        if self.view.as_deref() != Some(view.as_str()) {
            println!("{}", view);
            self.view = Some(view);
        }
    }
}
