// SPDX-License-Identifier: GPL-3.0-only

//! Scripted doubles for the permission and camera collaborators

use crate::backends::camera::{
    BackendError, BackendResult, BindingId, CameraBackend, CameraBackendType, CapturedImageRef,
};
use crate::permission::{
    AccessGranted, PermissionGate, PermissionProvider, PermissionStatus, StaticPermission,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Permission provider with a fixed script
pub struct ScriptedPermission {
    check: PermissionStatus,
    rationale: bool,
    answer: Option<bool>,
    prompts: AtomicUsize,
}

impl ScriptedPermission {
    pub fn already_granted() -> Self {
        Self {
            check: PermissionStatus::Granted,
            rationale: false,
            answer: Some(true),
            prompts: AtomicUsize::new(0),
        }
    }

    /// Undecided until prompted, then answers `granted`
    pub fn answering(granted: bool) -> Self {
        Self {
            check: PermissionStatus::Unknown,
            rationale: false,
            answer: Some(granted),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn needs_rationale(granted: bool) -> Self {
        Self {
            rationale: true,
            ..Self::answering(granted)
        }
    }

    /// The prompt stays open forever
    pub fn never_answers() -> Self {
        Self {
            answer: None,
            ..Self::answering(false)
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for ScriptedPermission {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn check(&self) -> PermissionStatus {
        self.check
    }

    fn should_show_rationale(&self) -> bool {
        self.rationale
    }

    fn prompt(&self) -> BoxFuture<'static, bool> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Some(granted) => futures::future::ready(granted).boxed(),
            None => futures::future::pending().boxed(),
        }
    }
}

/// Obtain an access token the way production code does
pub fn grant() -> AccessGranted {
    let mut gate = PermissionGate::new(Arc::new(StaticPermission::new(true)));
    gate.request_access(|_| {});
    gate.granted().expect("static provider grants access")
}

/// What the scripted camera does on the next capture
#[derive(Debug, Clone)]
pub enum CaptureScript {
    Succeed(String),
    Fail(String),
    Delay(Duration, String),
    Hang,
}

#[derive(Debug, Default)]
pub struct BackendStats {
    pub open: usize,
    pub binds: usize,
    pub releases: usize,
    pub captures: usize,
}

/// Test-side view of a [`ScriptedCamera`]
#[derive(Clone, Default)]
pub struct CameraMonitor {
    stats: Arc<Mutex<BackendStats>>,
    script: Arc<Mutex<VecDeque<CaptureScript>>>,
    unavailable: Arc<AtomicBool>,
}

impl CameraMonitor {
    pub fn push(&self, step: CaptureScript) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Make later binds fail, or succeed again
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn open(&self) -> usize {
        self.stats.lock().unwrap().open
    }

    pub fn binds(&self) -> usize {
        self.stats.lock().unwrap().binds
    }

    pub fn releases(&self) -> usize {
        self.stats.lock().unwrap().releases
    }

    pub fn captures(&self) -> usize {
        self.stats.lock().unwrap().captures
    }
}

/// Camera backend double. Captures default to succeeding with `photo-42.jpg`.
pub struct ScriptedCamera {
    monitor: CameraMonitor,
    next_binding: u64,
    bound: Option<BindingId>,
}

impl ScriptedCamera {
    pub fn new() -> (Self, CameraMonitor) {
        let monitor = CameraMonitor::default();
        let camera = Self {
            monitor: monitor.clone(),
            next_binding: 1,
            bound: None,
        };
        (camera, monitor)
    }

    /// Every bind fails as if another process held the device
    pub fn unavailable() -> (Self, CameraMonitor) {
        let (camera, monitor) = Self::new();
        monitor.set_unavailable(true);
        (camera, monitor)
    }
}

impl CameraBackend for ScriptedCamera {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }

    fn bind(&mut self, _output_dir: &Path) -> BackendResult<BindingId> {
        if self.monitor.unavailable.load(Ordering::SeqCst) || self.bound.is_some() {
            return Err(BackendError::DeviceBusy("scripted camera in use".into()));
        }
        let id = BindingId(self.next_binding);
        self.next_binding += 1;
        self.bound = Some(id);

        let mut stats = self.monitor.stats.lock().unwrap();
        stats.open += 1;
        stats.binds += 1;
        Ok(id)
    }

    fn capture(&mut self, binding: BindingId) -> BoxFuture<'static, BackendResult<CapturedImageRef>> {
        if self.bound != Some(binding) {
            return futures::future::ready(Err(BackendError::UnknownBinding(binding))).boxed();
        }
        self.monitor.stats.lock().unwrap().captures += 1;

        let step = self
            .monitor
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| CaptureScript::Succeed("photo-42.jpg".into()));

        match step {
            CaptureScript::Succeed(locator) => {
                futures::future::ready(Ok(CapturedImageRef::new(locator))).boxed()
            }
            CaptureScript::Fail(cause) => {
                futures::future::ready(Err(BackendError::CaptureFailed(cause))).boxed()
            }
            CaptureScript::Delay(delay, locator) => async move {
                tokio::time::sleep(delay).await;
                Ok(CapturedImageRef::new(locator))
            }
            .boxed(),
            CaptureScript::Hang => futures::future::pending().boxed(),
        }
    }

    fn release(&mut self, binding: BindingId) {
        if self.bound == Some(binding) {
            self.bound = None;
            let mut stats = self.monitor.stats.lock().unwrap();
            stats.open -= 1;
            stats.releases += 1;
        }
    }
}
