// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture workflow

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level application error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// The user declined camera access
    PermissionDenied,
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Errors raised by the capture session
///
/// `BindFailed` and `CaptureFailed` come from the environment (hardware busy,
/// I/O faults). `NotActive` and `Busy` are ordering mistakes by the caller and
/// are kept distinct so they can be told apart from hardware trouble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Camera hardware is unavailable or bound by someone else
    BindFailed(String),
    /// The capture itself failed; carries the underlying cause
    CaptureFailed(String),
    /// Capture requested with no open session
    NotActive,
    /// Capture requested while another one is still in flight
    Busy,
}

impl CameraError {
    /// Whether this error stems from misuse rather than the environment
    pub fn is_logic_fault(&self) -> bool {
        matches!(self, CameraError::NotActive | CameraError::Busy)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::PermissionDenied => write!(f, "Camera access was denied"),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::BindFailed(msg) => write!(f, "Failed to bind camera: {}", msg),
            CameraError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            CameraError::NotActive => write!(f, "No active camera session"),
            CameraError::Busy => write!(f, "A capture is already in progress"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
