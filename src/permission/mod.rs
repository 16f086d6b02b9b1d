// SPDX-License-Identifier: GPL-3.0-only

//! Camera access authorization
//!
//! [`PermissionGate`] owns the one authorization decision of a run. The
//! decision comes either from a synchronous check or from the single answer
//! to an OS prompt, and never changes afterwards. Only a gate holding
//! `Granted` hands out [`AccessGranted`], the token the capture session
//! requires to bind hardware.

pub mod device;
pub mod portal;

pub use device::{DevicePermission, StaticPermission};
pub use portal::PortalPermission;

use crate::config::{Config, PermissionSource};
use crate::constants::app_info;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Camera authorization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Unknown => write!(f, "unknown"),
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
        }
    }
}

/// OS permission API
pub trait PermissionProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Current grant state, without prompting
    fn check(&self) -> PermissionStatus;

    /// Whether the user should see an explanation before being asked
    fn should_show_rationale(&self) -> bool {
        false
    }

    /// Ask the user; resolves once with the answer
    fn prompt(&self) -> BoxFuture<'static, bool>;
}

/// Proof that camera access was granted
///
/// Only [`PermissionGate::granted`] creates one.
#[derive(Debug, Clone, Copy)]
pub struct AccessGranted {
    _private: (),
}

/// What [`PermissionGate::request_access`] did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequest {
    /// Already granted; the callback ran before returning
    Granted,
    /// Already denied this run; the callback ran before returning
    Denied,
    /// The user must see an explanation first; the callback was not used.
    /// Follow up with [`PermissionGate::request_after_rationale`].
    RationaleRequired,
    /// A prompt is open; the callback runs once with the answer
    Prompted,
    /// An earlier prompt is still open; this callback was dropped
    AlreadyPending,
}

pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    status: PermissionStatus,
    pending: bool,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            status: PermissionStatus::Unknown,
            pending: false,
        }
    }

    /// Current grant state. Consults the provider only while undecided.
    pub fn check_status(&self) -> PermissionStatus {
        match self.status {
            PermissionStatus::Unknown => self.provider.check(),
            decided => decided,
        }
    }

    /// Whether a prompt is outstanding
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Request camera access
    ///
    /// `on_result` runs at most once. It runs before this returns when the
    /// answer is already known, and later from a runtime task when a prompt
    /// is needed, so it must be `Send`. Must be called within a tokio runtime.
    pub fn request_access<F>(&mut self, on_result: F) -> AccessRequest
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.request(on_result, true)
    }

    /// Request access after the rationale was shown, skipping the rationale check
    pub fn request_after_rationale<F>(&mut self, on_result: F) -> AccessRequest
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.request(on_result, false)
    }

    fn request<F>(&mut self, on_result: F, honour_rationale: bool) -> AccessRequest
    where
        F: FnOnce(bool) + Send + 'static,
    {
        match self.status {
            PermissionStatus::Granted => {
                on_result(true);
                return AccessRequest::Granted;
            }
            PermissionStatus::Denied => {
                on_result(false);
                return AccessRequest::Denied;
            }
            PermissionStatus::Unknown => {}
        }

        if self.pending {
            debug!(provider = self.provider.name(), "Permission prompt already open");
            return AccessRequest::AlreadyPending;
        }

        if self.provider.check() == PermissionStatus::Granted {
            info!(provider = self.provider.name(), "Camera permission previously granted");
            self.status = PermissionStatus::Granted;
            on_result(true);
            return AccessRequest::Granted;
        }

        if honour_rationale && self.provider.should_show_rationale() {
            info!(provider = self.provider.name(), "Camera permission needs a rationale first");
            return AccessRequest::RationaleRequired;
        }

        info!(provider = self.provider.name(), "Prompting for camera permission");
        self.pending = true;
        let prompt = self.provider.prompt();
        tokio::spawn(async move {
            let granted = prompt.await;
            on_result(granted);
        });
        AccessRequest::Prompted
    }

    /// Record the answer to the outstanding prompt
    ///
    /// The first decision sticks; later answers are ignored. Returns the
    /// status now in effect.
    pub fn resolve(&mut self, granted: bool) -> PermissionStatus {
        self.pending = false;
        match self.status {
            PermissionStatus::Unknown => {
                self.status = if granted {
                    PermissionStatus::Granted
                } else {
                    PermissionStatus::Denied
                };
                info!(status = %self.status, "Camera permission resolved");
            }
            decided => {
                if (decided == PermissionStatus::Granted) != granted {
                    warn!(status = %decided, granted, "Ignoring late permission answer");
                }
            }
        }
        self.status
    }

    /// Access token, if access was granted
    pub fn granted(&self) -> Option<AccessGranted> {
        (self.status == PermissionStatus::Granted).then_some(AccessGranted { _private: () })
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("provider", &self.provider.name())
            .field("status", &self.status)
            .field("pending", &self.pending)
            .finish()
    }
}

/// Permission provider selected in `config`
pub fn provider_for(config: &Config) -> Arc<dyn PermissionProvider> {
    match config.permission_source {
        PermissionSource::Auto if app_info::is_flatpak() => Arc::new(PortalPermission::new()),
        PermissionSource::Auto | PermissionSource::Device => {
            Arc::new(DevicePermission::new(&config.device_path))
        }
        PermissionSource::Portal => Arc::new(PortalPermission::new()),
        PermissionSource::Granted => Arc::new(StaticPermission::new(true)),
        PermissionSource::Denied => Arc::new(StaticPermission::new(false)),
    }
}
