// SPDX-License-Identifier: GPL-3.0-only

//! Capture workflow coordinator
//!
//! [`CaptureCoordinator`] is the single owner of the workflow state. Every
//! change goes through [`CaptureCoordinator::update`], one message at a time:
//!
//! ```text
//!  UI ──CoordinatorHandle──┐
//!  permission answer ──────┼──> queue ──> update ──> transition ──> commands
//!  capture result ─────────┘                │
//!                                           └──> watch<UiSnapshot> ──> UI
//! ```
//!
//! Asynchronous results (the permission prompt answer, the capture result)
//! only ever reach the state as queued messages.
//!
//! - `state`: workflow states, UI snapshot and messages
//! - `update`: the pure transition function

pub mod state;
pub mod update;

pub use state::{
    Advisory, CaptureState, Message, PermissionPhase, UiSnapshot, UiVisibility,
};
pub use update::{Command, Transition, transition};

use crate::errors::CameraError;
use crate::permission::{AccessRequest, PermissionGate, PermissionStatus};
use crate::session::{CaptureSession, CapturedImageRef};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

pub struct CaptureCoordinator {
    state: CaptureState,
    gate: PermissionGate,
    session: CaptureSession,
    photo: Option<CapturedImageRef>,
    advisory: Option<Advisory>,
    advisory_serial: u64,
    sender: mpsc::UnboundedSender<Message>,
    receiver: mpsc::UnboundedReceiver<Message>,
    ui: watch::Sender<UiSnapshot>,
}

impl CaptureCoordinator {
    pub fn new(gate: PermissionGate, session: CaptureSession) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (ui, _) = watch::channel(UiSnapshot::default());
        Self {
            state: CaptureState::default(),
            gate,
            session,
            photo: None,
            advisory: None,
            advisory_serial: 0,
            sender,
            receiver,
            ui,
        }
    }

    /// Handle for the rendering side to send user actions
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            sender: self.sender.clone(),
        }
    }

    /// Receive a snapshot each time the visible state changes
    pub fn subscribe(&self) -> watch::Receiver<UiSnapshot> {
        self.ui.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn snapshot(&self) -> UiSnapshot {
        UiSnapshot {
            state: self.state,
            visibility: self.state.visibility(),
            photo: self.photo.clone(),
            advisory: self.advisory.clone(),
            advisory_serial: self.advisory_serial,
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn permission_status(&self) -> PermissionStatus {
        self.gate.check_status()
    }

    /// Process `message`, then everything already queued behind it
    ///
    /// Must be called within a tokio runtime; permission prompts are spawned on it.
    pub fn update(&mut self, message: Message) {
        self.apply(message);
        while let Ok(message) = self.receiver.try_recv() {
            self.apply(message);
        }
    }

    /// Wait for the next queued message and process it
    pub async fn process_next(&mut self) {
        if let Some(message) = self.receiver.recv().await {
            self.update(message);
        }
    }

    /// Drive the workflow from the first permission check until shutdown
    ///
    /// Returns the final snapshot.
    pub async fn run(mut self) -> UiSnapshot {
        info!("Capture coordinator started");
        self.update(Message::Start);
        while !self.state.is_closed() {
            match self.receiver.recv().await {
                Some(message) => self.update(message),
                None => break,
            }
        }
        self.teardown();
        self.snapshot()
    }

    /// Release the camera and close the workflow. Idempotent.
    pub fn teardown(&mut self) {
        if !self.state.is_closed() {
            self.update(Message::Shutdown);
        }
        // Covers a binding taken after Closed by a late activation result
        self.session.deactivate();
        info!("Capture coordinator stopped");
    }

    fn apply(&mut self, message: Message) {
        // The gate keeps the first decision; later answers are rewritten to it
        let message = match message {
            Message::PermissionResolved(granted) => {
                Message::PermissionResolved(self.gate.resolve(granted) == PermissionStatus::Granted)
            }
            other => other,
        };

        let previous = self.state;
        let Transition { next, commands } = transition(previous, &message);
        if next != previous {
            info!(from = ?previous, to = ?next, "Capture state changed");
        }
        self.state = next;

        for command in commands {
            self.execute(command);
        }
        self.publish();
    }

    fn execute(&mut self, command: Command) {
        debug!(?command, "Executing command");
        match command {
            Command::RequestPermission => {
                let sender = self.sender.clone();
                let outcome = self.gate.request_access(move |granted| {
                    let _ = sender.send(Message::PermissionResolved(granted));
                });
                self.on_access_request(outcome);
            }
            Command::RequestPermissionAfterRationale => {
                let sender = self.sender.clone();
                let outcome = self.gate.request_after_rationale(move |granted| {
                    let _ = sender.send(Message::PermissionResolved(granted));
                });
                self.on_access_request(outcome);
            }
            Command::Activate => {
                // Our own binding still open counts as activated
                let result = if let Some(handle) = self.session.handle() {
                    debug!(binding = %handle.binding(), "Session already active");
                    Ok(())
                } else if let Some(grant) = self.gate.granted() {
                    self.session.activate(grant).map(|handle| {
                        debug!(binding = %handle.binding(), "Session activated");
                    })
                } else {
                    error!(status = %self.gate.check_status(), "Activation without camera access");
                    Err(CameraError::BindFailed("camera access not granted".into()))
                };
                let _ = self.sender.send(Message::SessionActivated(result));
            }
            Command::Capture => {
                let sender = self.sender.clone();
                let issued = self.session.capture_photo(move |result| {
                    let _ = sender.send(Message::CaptureCompleted(result));
                });
                if let Err(e) = issued {
                    let _ = self.sender.send(Message::CaptureRejected(e));
                }
            }
            Command::Deactivate => self.session.deactivate(),
            Command::StorePhoto(locator) => {
                info!(locator = %locator, "Showing captured photo");
                self.photo = Some(locator);
            }
            Command::Report(advisory) => {
                match &advisory {
                    Advisory::RationaleRequired => info!(advisory = %advisory, "Rationale required"),
                    Advisory::Camera(e) if e.is_logic_fault() => {
                        warn!(error = %e, "Capture request rejected")
                    }
                    _ => warn!(advisory = %advisory, "Capture workflow advisory"),
                }
                self.advisory = Some(advisory);
                self.advisory_serial += 1;
            }
            Command::ClearAdvisory => self.advisory = None,
        }
    }

    fn on_access_request(&mut self, outcome: AccessRequest) {
        match outcome {
            AccessRequest::RationaleRequired => {
                let _ = self.sender.send(Message::RationaleRequired);
            }
            other => debug!(outcome = ?other, "Permission requested"),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.ui.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

impl std::fmt::Debug for CaptureCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureCoordinator")
            .field("state", &self.state)
            .field("gate", &self.gate)
            .field("session", &self.session)
            .field("photo", &self.photo)
            .field("advisory", &self.advisory)
            .finish()
    }
}

/// User actions from the rendering side
///
/// Cheap to clone; messages sent after the coordinator stopped are dropped.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl CoordinatorHandle {
    /// Shutter pressed
    pub fn capture(&self) {
        self.post(Message::CaptureRequested);
    }

    pub fn retake(&self) {
        self.post(Message::Retake);
    }

    /// The user has read why the camera is needed
    pub fn dismiss_rationale(&self) {
        self.post(Message::RationaleDismissed);
    }

    pub fn retry_camera(&self) {
        self.post(Message::RetryCamera);
    }

    pub fn shutdown(&self) {
        self.post(Message::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn post(&self, message: Message) {
        if self.sender.send(message).is_err() {
            debug!("Coordinator stopped, message dropped");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CameraMonitor, CaptureScript, ScriptedCamera, ScriptedPermission};
    use std::sync::Arc;
    use std::time::Duration;

    const IDLE: CaptureState = CaptureState::CameraActive {
        capture_in_flight: false,
    };

    fn build(
        permission: ScriptedPermission,
        (camera, monitor): (ScriptedCamera, CameraMonitor),
    ) -> (CaptureCoordinator, CameraMonitor) {
        let dir = std::env::temp_dir().join("snapcam-coordinator-tests");
        let session = CaptureSession::new(Box::new(camera), dir, Duration::from_secs(1)).unwrap();
        let gate = PermissionGate::new(Arc::new(permission));
        (CaptureCoordinator::new(gate, session), monitor)
    }

    fn coordinator(permission: ScriptedPermission) -> (CaptureCoordinator, CameraMonitor) {
        build(permission, ScriptedCamera::new())
    }

    /// Coordinator already showing the live camera
    fn camera_shown() -> (CaptureCoordinator, CameraMonitor) {
        let (mut coordinator, monitor) = coordinator(ScriptedPermission::already_granted());
        coordinator.update(Message::Start);
        assert_eq!(coordinator.state(), IDLE);
        (coordinator, monitor)
    }

    /// Process queued messages until `done` holds. Results from the worker may
    /// already have been applied by the time this is called.
    async fn settle(coordinator: &mut CaptureCoordinator, done: impl Fn(&UiSnapshot) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(&coordinator.snapshot()) {
                coordinator.process_next().await;
            }
        })
        .await
        .expect("capture workflow did not settle");
    }

    async fn take_photo(coordinator: &mut CaptureCoordinator) {
        coordinator.update(Message::CaptureRequested);
        settle(coordinator, |s| s.state == CaptureState::PhotoShown).await;
    }

    #[tokio::test]
    async fn test_granted_shows_camera() {
        let (coordinator, monitor) = camera_shown();
        let snapshot = coordinator.snapshot();
        assert!(snapshot.visibility.show_camera());
        assert!(!snapshot.visibility.show_photo());
        assert_eq!(monitor.open(), 1);
    }

    #[tokio::test]
    async fn test_prompted_grant_shows_camera() {
        let (mut coordinator, monitor) = coordinator(ScriptedPermission::answering(true));
        coordinator.update(Message::Start);
        assert_eq!(monitor.binds(), 0);

        settle(&mut coordinator, |s| s.visibility.show_camera()).await;
        assert_eq!(coordinator.state(), IDLE);
        assert_eq!(monitor.open(), 1);
    }

    #[tokio::test]
    async fn test_denied_shows_nothing() {
        let (mut coordinator, monitor) = coordinator(ScriptedPermission::answering(false));
        coordinator.update(Message::Start);
        settle(&mut coordinator, |s| s.advisory.is_some()).await;

        let snapshot = coordinator.snapshot();
        assert_eq!(
            snapshot.state,
            CaptureState::AwaitingPermission(PermissionPhase::Denied)
        );
        assert_eq!(snapshot.visibility, UiVisibility::HIDDEN);
        assert_eq!(snapshot.advisory, Some(Advisory::PermissionDenied));
        assert_eq!(monitor.binds(), 0);
        assert_eq!(coordinator.permission_status(), PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn test_capture_success_shows_photo() {
        let (mut coordinator, monitor) = camera_shown();
        take_photo(&mut coordinator).await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.visibility, UiVisibility::PHOTO);
        assert_eq!(snapshot.photo, Some(CapturedImageRef::new("photo-42.jpg")));
        assert_eq!(monitor.open(), 0);
    }

    #[tokio::test]
    async fn test_capture_failure_keeps_camera() {
        let (mut coordinator, monitor) = camera_shown();
        monitor.push(CaptureScript::Fail("sensor fault".into()));
        coordinator.update(Message::CaptureRequested);
        settle(&mut coordinator, |s| s.advisory.is_some()).await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, IDLE);
        assert!(!snapshot.visibility.show_photo());
        assert!(matches!(
            snapshot.advisory,
            Some(Advisory::Camera(CameraError::CaptureFailed(_)))
        ));
        assert_eq!(snapshot.advisory_serial, 1);
        assert_eq!(monitor.open(), 1);

        // Retry right away
        take_photo(&mut coordinator).await;
        assert_eq!(coordinator.snapshot().advisory_serial, 1);
    }

    #[tokio::test]
    async fn test_teardown_mid_capture() {
        let (mut coordinator, monitor) = camera_shown();
        monitor.push(CaptureScript::Hang);
        coordinator.update(Message::CaptureRequested);
        assert!(coordinator.session().is_capturing());

        tokio::time::timeout(Duration::from_secs(5), async { coordinator.teardown() })
            .await
            .unwrap();
        assert_eq!(coordinator.state(), CaptureState::Closed);
        assert_eq!(monitor.open(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_capture_reports_busy() {
        let (mut coordinator, monitor) = camera_shown();
        monitor.push(CaptureScript::Delay(
            Duration::from_millis(200),
            "photo-slow.jpg".into(),
        ));
        coordinator.update(Message::CaptureRequested);
        coordinator.update(Message::CaptureRequested);
        assert_eq!(
            coordinator.snapshot().advisory,
            Some(Advisory::Camera(CameraError::Busy))
        );

        // The first capture still completes
        settle(&mut coordinator, |s| s.state == CaptureState::PhotoShown).await;
        assert_eq!(
            coordinator.snapshot().photo,
            Some(CapturedImageRef::new("photo-slow.jpg"))
        );
        assert_eq!(monitor.captures(), 1);
    }

    #[tokio::test]
    async fn test_capture_before_camera_is_reported_as_misuse() {
        let (mut coordinator, monitor) = coordinator(ScriptedPermission::never_answers());
        coordinator.update(Message::Start);
        coordinator.update(Message::CaptureRequested);

        assert_eq!(
            coordinator.snapshot().advisory,
            Some(Advisory::Camera(CameraError::NotActive))
        );
        assert_eq!(monitor.captures(), 0);
    }

    #[tokio::test]
    async fn test_no_activation_while_undecided() {
        let (mut coordinator, monitor) = coordinator(ScriptedPermission::never_answers());
        coordinator.update(Message::Start);
        coordinator.update(Message::RetryCamera);
        coordinator.update(Message::Retake);

        assert_eq!(monitor.binds(), 0);
        assert_eq!(coordinator.permission_status(), PermissionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_rationale_then_prompt() {
        let (mut coordinator, monitor) = coordinator(ScriptedPermission::needs_rationale(true));
        coordinator.update(Message::Start);
        assert_eq!(
            coordinator.state(),
            CaptureState::AwaitingPermission(PermissionPhase::RationaleRequired)
        );
        assert_eq!(
            coordinator.snapshot().advisory,
            Some(Advisory::RationaleRequired)
        );

        coordinator.update(Message::RationaleDismissed);
        settle(&mut coordinator, |s| s.visibility.show_camera()).await;
        assert!(coordinator.snapshot().advisory.is_none());
        assert_eq!(monitor.open(), 1);
    }

    #[tokio::test]
    async fn test_retake_replaces_photo() {
        let (mut coordinator, monitor) = camera_shown();
        take_photo(&mut coordinator).await;

        coordinator.update(Message::Retake);
        assert_eq!(coordinator.snapshot().visibility, UiVisibility::CAMERA);
        assert_eq!(monitor.open(), 1);

        monitor.push(CaptureScript::Succeed("photo-43.jpg".into()));
        take_photo(&mut coordinator).await;
        assert_eq!(
            coordinator.snapshot().photo,
            Some(CapturedImageRef::new("photo-43.jpg"))
        );
    }

    #[tokio::test]
    async fn test_double_retake_binds_once() {
        let (mut coordinator, monitor) = camera_shown();
        take_photo(&mut coordinator).await;

        let handle = coordinator.handle();
        handle.retake();
        handle.retake();
        coordinator.process_next().await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, IDLE);
        assert!(snapshot.visibility.show_camera());
        assert!(snapshot.advisory.is_none());
        assert_eq!(monitor.open(), 1);
        assert_eq!(monitor.binds(), 2);

        // Still usable afterwards
        take_photo(&mut coordinator).await;
        assert_eq!(monitor.open(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_then_retry() {
        let (mut coordinator, monitor) =
            build(ScriptedPermission::already_granted(), ScriptedCamera::unavailable());

        coordinator.update(Message::Start);
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, CaptureState::CameraUnavailable);
        assert_eq!(snapshot.visibility, UiVisibility::HIDDEN);
        assert!(matches!(
            snapshot.advisory,
            Some(Advisory::Camera(CameraError::BindFailed(_)))
        ));

        coordinator.update(Message::RetryCamera);
        assert_eq!(coordinator.state(), CaptureState::CameraUnavailable);
        assert_eq!(coordinator.snapshot().advisory_serial, 2);
        assert_eq!(monitor.open(), 0);
    }

    #[tokio::test]
    async fn test_double_retry_recovers_camera() {
        let (mut coordinator, monitor) =
            build(ScriptedPermission::already_granted(), ScriptedCamera::unavailable());
        coordinator.update(Message::Start);
        assert_eq!(coordinator.state(), CaptureState::CameraUnavailable);

        monitor.set_unavailable(false);
        let handle = coordinator.handle();
        handle.retry_camera();
        handle.retry_camera();
        coordinator.process_next().await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, IDLE);
        assert!(snapshot.visibility.show_camera());
        assert!(snapshot.advisory.is_none());
        assert_eq!(monitor.open(), 1);
        assert_eq!(monitor.binds(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let (mut coordinator, _monitor) = coordinator(ScriptedPermission::already_granted());
        let mut ui = coordinator.subscribe();
        assert!(!ui.has_changed().unwrap());

        coordinator.update(Message::Start);
        assert!(ui.has_changed().unwrap());
        assert!(ui.borrow_and_update().visibility.show_camera());
    }

    #[tokio::test]
    async fn test_run_loop_full_cycle() {
        let (coordinator, monitor) = coordinator(ScriptedPermission::answering(true));
        let handle = coordinator.handle();
        let mut ui = coordinator.subscribe();
        let running = tokio::spawn(coordinator.run());

        let timeout = Duration::from_secs(5);
        tokio::time::timeout(timeout, ui.wait_for(|s| s.visibility.show_camera()))
            .await
            .unwrap()
            .unwrap();
        handle.capture();
        tokio::time::timeout(timeout, ui.wait_for(|s| s.visibility.show_photo()))
            .await
            .unwrap()
            .unwrap();
        handle.shutdown();

        let last = tokio::time::timeout(timeout, running).await.unwrap().unwrap();
        assert_eq!(last.state, CaptureState::Closed);
        assert_eq!(last.photo, Some(CapturedImageRef::new("photo-42.jpg")));
        assert_eq!(monitor.open(), 0);
        assert!(handle.is_closed());
    }
}
