// SPDX-License-Identifier: GPL-3.0-only

//! Capture workflow state and the messages that drive it

use crate::errors::CameraError;
use crate::session::CapturedImageRef;

/// Sub-state while camera access is undecided or refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPhase {
    /// Waiting for a check or a prompt answer
    Pending,
    /// The user must see why the camera is needed before being asked
    RationaleRequired,
    /// Access was refused; only the system settings can change that
    Denied,
}

/// Capture workflow state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    AwaitingPermission(PermissionPhase),
    /// Camera bind issued; waiting for its outcome
    Activating,
    /// Live camera shown
    CameraActive { capture_in_flight: bool },
    /// Access granted but the camera could not be bound
    CameraUnavailable,
    /// The last captured photo is shown
    PhotoShown,
    /// Torn down; every further message is ignored
    Closed,
}

impl Default for CaptureState {
    fn default() -> Self {
        CaptureState::AwaitingPermission(PermissionPhase::Pending)
    }
}

impl CaptureState {
    /// Which view the renderer should show
    pub fn visibility(&self) -> UiVisibility {
        match self {
            CaptureState::CameraActive { .. } => UiVisibility::CAMERA,
            CaptureState::PhotoShown => UiVisibility::PHOTO,
            CaptureState::AwaitingPermission(_)
            | CaptureState::Activating
            | CaptureState::CameraUnavailable
            | CaptureState::Closed => UiVisibility::HIDDEN,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, CaptureState::Closed)
    }
}

/// Camera view and photo view flags
///
/// Only the three constants exist, so both views can never be shown at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UiVisibility {
    show_camera: bool,
    show_photo: bool,
}

impl UiVisibility {
    pub const HIDDEN: Self = Self {
        show_camera: false,
        show_photo: false,
    };
    pub const CAMERA: Self = Self {
        show_camera: true,
        show_photo: false,
    };
    pub const PHOTO: Self = Self {
        show_camera: false,
        show_photo: true,
    };

    pub fn show_camera(&self) -> bool {
        self.show_camera
    }

    pub fn show_photo(&self) -> bool {
        self.show_photo
    }
}

/// User-visible notice produced by the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Persistent "camera unavailable" notice; no automatic retry
    PermissionDenied,
    /// Explain why the camera is needed, then send `RationaleDismissed`
    RationaleRequired,
    /// Camera failure or misuse
    Camera(CameraError),
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::PermissionDenied => {
                write!(f, "Camera access denied. Allow it in the system settings.")
            }
            Advisory::RationaleRequired => {
                write!(f, "Camera access is needed to take photos.")
            }
            Advisory::Camera(e) => write!(f, "{}", e),
        }
    }
}

/// Everything the renderer needs to draw the current frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiSnapshot {
    pub state: CaptureState,
    pub visibility: UiVisibility,
    /// Most recent photo; replaced by each new capture
    pub photo: Option<CapturedImageRef>,
    pub advisory: Option<Advisory>,
    /// Bumped on every report, so a repeated advisory still reads as new
    pub advisory_serial: u64,
}

/// Inputs of the capture workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Begin: check or request camera access
    Start,
    /// Answer to the permission request
    PermissionResolved(bool),
    /// The request was held back until a rationale is shown
    RationaleRequired,
    /// The user has read the rationale
    RationaleDismissed,
    /// Outcome of binding the camera
    SessionActivated(Result<(), CameraError>),
    /// The user pressed the shutter
    CaptureRequested,
    /// The session refused the capture outright
    CaptureRejected(CameraError),
    /// Outcome of an issued capture
    CaptureCompleted(Result<CapturedImageRef, CameraError>),
    /// Go back to the live camera for another photo
    Retake,
    /// Try binding the camera again after a failure
    RetryCamera,
    /// Release everything and stop
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_are_exclusive_in_every_state() {
        let states = [
            CaptureState::AwaitingPermission(PermissionPhase::Pending),
            CaptureState::AwaitingPermission(PermissionPhase::RationaleRequired),
            CaptureState::AwaitingPermission(PermissionPhase::Denied),
            CaptureState::Activating,
            CaptureState::CameraActive {
                capture_in_flight: false,
            },
            CaptureState::CameraActive {
                capture_in_flight: true,
            },
            CaptureState::CameraUnavailable,
            CaptureState::PhotoShown,
            CaptureState::Closed,
        ];
        for state in states {
            let v = state.visibility();
            assert!(!(v.show_camera() && v.show_photo()), "{:?}", state);
        }
    }

    #[test]
    fn test_initial_state_hides_both_views() {
        let snapshot = UiSnapshot::default();
        assert_eq!(
            snapshot.state,
            CaptureState::AwaitingPermission(PermissionPhase::Pending)
        );
        assert_eq!(snapshot.visibility, UiVisibility::HIDDEN);
        assert!(snapshot.photo.is_none());
    }
}
