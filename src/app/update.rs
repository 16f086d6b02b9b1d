// SPDX-License-Identifier: GPL-3.0-only

//! State transitions
//!
//! [`transition`] is pure: it maps the current state and one message to the
//! next state and the side effects to run. The coordinator runs the effects;
//! effects with an immediate outcome report back as messages.

use super::state::{Advisory, CaptureState, Message, PermissionPhase};
use crate::errors::CameraError;
use crate::session::CapturedImageRef;

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RequestPermission,
    RequestPermissionAfterRationale,
    Activate,
    Capture,
    Deactivate,
    StorePhoto(CapturedImageRef),
    Report(Advisory),
    ClearAdvisory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: CaptureState,
    pub commands: Vec<Command>,
}

impl Transition {
    fn to(next: CaptureState, commands: Vec<Command>) -> Self {
        Self { next, commands }
    }

    fn stay(state: CaptureState) -> Self {
        Self::to(state, Vec::new())
    }
}

pub fn transition(state: CaptureState, message: &Message) -> Transition {
    use CaptureState::*;
    use Command::*;

    if state.is_closed() {
        return Transition::stay(state);
    }

    match (state, message) {
        (_, Message::Shutdown) => Transition::to(Closed, vec![Deactivate]),

        // Permission
        (AwaitingPermission(PermissionPhase::Pending), Message::Start) => {
            Transition::to(state, vec![RequestPermission])
        }
        (AwaitingPermission(_), Message::PermissionResolved(true)) => {
            Transition::to(Activating, vec![ClearAdvisory, Activate])
        }
        (AwaitingPermission(_), Message::PermissionResolved(false)) => Transition::to(
            AwaitingPermission(PermissionPhase::Denied),
            vec![Report(Advisory::PermissionDenied)],
        ),
        (AwaitingPermission(PermissionPhase::Pending), Message::RationaleRequired) => {
            Transition::to(
                AwaitingPermission(PermissionPhase::RationaleRequired),
                vec![Report(Advisory::RationaleRequired)],
            )
        }
        (AwaitingPermission(PermissionPhase::RationaleRequired), Message::RationaleDismissed) => {
            Transition::to(
                AwaitingPermission(PermissionPhase::Pending),
                vec![ClearAdvisory, RequestPermissionAfterRationale],
            )
        }

        // Session lifecycle; only one bind outcome is awaited at a time
        (Activating, Message::SessionActivated(Ok(()))) => Transition::to(
            CameraActive {
                capture_in_flight: false,
            },
            vec![ClearAdvisory],
        ),
        (Activating, Message::SessionActivated(Err(e))) => Transition::to(
            CameraUnavailable,
            vec![Report(Advisory::Camera(e.clone()))],
        ),
        (CameraUnavailable, Message::RetryCamera) => {
            Transition::to(Activating, vec![ClearAdvisory, Activate])
        }
        (PhotoShown, Message::Retake) => Transition::to(Activating, vec![Activate]),

        // Capture
        (
            CameraActive {
                capture_in_flight: false,
            },
            Message::CaptureRequested,
        ) => Transition::to(
            CameraActive {
                capture_in_flight: true,
            },
            vec![ClearAdvisory, Capture],
        ),
        (
            CameraActive {
                capture_in_flight: true,
            },
            Message::CaptureRequested,
        ) => Transition::to(state, vec![Report(Advisory::Camera(CameraError::Busy))]),
        (_, Message::CaptureRequested) => Transition::to(
            state,
            vec![Report(Advisory::Camera(CameraError::NotActive))],
        ),
        (
            CameraActive {
                capture_in_flight: true,
            },
            Message::CaptureCompleted(Ok(locator)),
        ) => Transition::to(PhotoShown, vec![StorePhoto(locator.clone()), Deactivate]),
        (
            CameraActive {
                capture_in_flight: true,
            },
            Message::CaptureCompleted(Err(e)) | Message::CaptureRejected(e),
        ) => Transition::to(
            CameraActive {
                capture_in_flight: false,
            },
            vec![Report(Advisory::Camera(e.clone()))],
        ),

        // Out of order or stale
        _ => {
            tracing::debug!(?state, ?message, "Message ignored in this state");
            Transition::stay(state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENDING: CaptureState = CaptureState::AwaitingPermission(PermissionPhase::Pending);
    const IDLE: CaptureState = CaptureState::CameraActive {
        capture_in_flight: false,
    };
    const IN_FLIGHT: CaptureState = CaptureState::CameraActive {
        capture_in_flight: true,
    };

    #[test]
    fn test_grant_activates_before_showing_camera() {
        let t = transition(PENDING, &Message::PermissionResolved(true));
        assert_eq!(t.next, CaptureState::Activating);
        assert_eq!(t.commands, vec![Command::ClearAdvisory, Command::Activate]);

        let t = transition(t.next, &Message::SessionActivated(Ok(())));
        assert_eq!(t.next, IDLE);
    }

    #[test]
    fn test_denial_never_activates() {
        let t = transition(PENDING, &Message::PermissionResolved(false));
        assert_eq!(
            t.next,
            CaptureState::AwaitingPermission(PermissionPhase::Denied)
        );
        assert!(!t.commands.contains(&Command::Activate));
        assert_eq!(t.commands, vec![Command::Report(Advisory::PermissionDenied)]);
    }

    #[test]
    fn test_rationale_round_trip() {
        let t = transition(PENDING, &Message::RationaleRequired);
        assert_eq!(
            t.next,
            CaptureState::AwaitingPermission(PermissionPhase::RationaleRequired)
        );

        let t = transition(t.next, &Message::RationaleDismissed);
        assert_eq!(t.next, PENDING);
        assert!(t.commands.contains(&Command::RequestPermissionAfterRationale));
    }

    #[test]
    fn test_capture_success_shows_photo_and_releases() {
        let t = transition(IDLE, &Message::CaptureRequested);
        assert_eq!(t.next, IN_FLIGHT);
        assert!(t.commands.contains(&Command::Capture));

        let locator = CapturedImageRef::new("photo-42.jpg");
        let t = transition(IN_FLIGHT, &Message::CaptureCompleted(Ok(locator.clone())));
        assert_eq!(t.next, CaptureState::PhotoShown);
        assert_eq!(
            t.commands,
            vec![Command::StorePhoto(locator), Command::Deactivate]
        );
    }

    #[test]
    fn test_capture_failure_stays_on_camera() {
        let err = CameraError::CaptureFailed("fault".into());
        let t = transition(IN_FLIGHT, &Message::CaptureCompleted(Err(err.clone())));
        assert_eq!(t.next, IDLE);
        assert_eq!(t.commands, vec![Command::Report(Advisory::Camera(err))]);
    }

    #[test]
    fn test_overlapping_capture_is_rejected() {
        let t = transition(IN_FLIGHT, &Message::CaptureRequested);
        assert_eq!(t.next, IN_FLIGHT);
        assert_eq!(
            t.commands,
            vec![Command::Report(Advisory::Camera(CameraError::Busy))]
        );
    }

    #[test]
    fn test_capture_before_camera_is_misuse() {
        let t = transition(PENDING, &Message::CaptureRequested);
        assert_eq!(t.next, PENDING);
        assert_eq!(
            t.commands,
            vec![Command::Report(Advisory::Camera(CameraError::NotActive))]
        );
    }

    #[test]
    fn test_stale_completion_ignored() {
        let locator = CapturedImageRef::new("late.jpg");
        let t = transition(IDLE, &Message::CaptureCompleted(Ok(locator)));
        assert_eq!(t, Transition::stay(IDLE));
    }

    #[test]
    fn test_retake_reactivates() {
        let t = transition(CaptureState::PhotoShown, &Message::Retake);
        assert_eq!(t.next, CaptureState::Activating);
        assert_eq!(t.commands, vec![Command::Activate]);
        let t = transition(t.next, &Message::SessionActivated(Ok(())));
        assert_eq!(t.next, IDLE);
    }

    #[test]
    fn test_repeated_activation_requests_ignored_while_binding() {
        for message in [Message::Retake, Message::RetryCamera] {
            let t = transition(CaptureState::Activating, &message);
            assert_eq!(t, Transition::stay(CaptureState::Activating));
        }
    }

    #[test]
    fn test_bind_outcome_outside_activation_is_stale() {
        let err = CameraError::BindFailed("session already holds binding #2".into());
        for state in [IDLE, CaptureState::PhotoShown, CaptureState::CameraUnavailable] {
            let t = transition(state, &Message::SessionActivated(Err(err.clone())));
            assert_eq!(t, Transition::stay(state));
            let t = transition(state, &Message::SessionActivated(Ok(())));
            assert_eq!(t, Transition::stay(state));
        }
    }

    #[test]
    fn test_bind_failure_needs_manual_retry() {
        let err = CameraError::BindFailed("busy".into());
        let t = transition(CaptureState::Activating, &Message::SessionActivated(Err(err)));
        assert_eq!(t.next, CaptureState::CameraUnavailable);
        assert!(!t.commands.contains(&Command::Activate));

        let t = transition(t.next, &Message::RetryCamera);
        assert_eq!(t.next, CaptureState::Activating);
        assert_eq!(t.commands, vec![Command::ClearAdvisory, Command::Activate]);
    }

    #[test]
    fn test_shutdown_from_anywhere_then_inert() {
        for state in [
            PENDING,
            CaptureState::Activating,
            IDLE,
            IN_FLIGHT,
            CaptureState::PhotoShown,
        ] {
            let t = transition(state, &Message::Shutdown);
            assert_eq!(t.next, CaptureState::Closed);
            assert_eq!(t.commands, vec![Command::Deactivate]);
        }

        let t = transition(CaptureState::Closed, &Message::CaptureRequested);
        assert_eq!(t, Transition::stay(CaptureState::Closed));
    }
}
