// SPDX-License-Identifier: GPL-3.0-only

//! xdg-desktop-portal camera access
//!
//! Inside Flatpak the camera is only reachable after the Camera portal has
//! asked the user. `AccessCamera` returns a request object; the answer
//! arrives later as that object's `Response` signal. We subscribe before
//! calling so a fast answer cannot slip past.

use super::{PermissionProvider, PermissionStatus};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use tracing::{info, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Portal response code for "the user allowed it"
const RESPONSE_SUCCESS: u32 = 0;

#[derive(Debug, Default)]
pub struct PortalPermission;

impl PortalPermission {
    pub fn new() -> Self {
        Self
    }
}

impl PermissionProvider for PortalPermission {
    fn name(&self) -> &'static str {
        "portal"
    }

    fn check(&self) -> PermissionStatus {
        // The portal has no synchronous query; it answers through a request
        PermissionStatus::Unknown
    }

    fn prompt(&self) -> BoxFuture<'static, bool> {
        async {
            match access_camera().await {
                Ok(granted) => granted,
                Err(e) => {
                    warn!(error = %e, "Camera portal request failed, treating as denied");
                    false
                }
            }
        }
        .boxed()
    }
}

/// Ask the Camera portal for access
pub async fn access_camera() -> Result<bool, String> {
    let connection = zbus::Connection::session()
        .await
        .map_err(|e| format!("Failed to connect to session D-Bus: {}", e))?;

    let camera = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        PORTAL_PATH,
        CAMERA_INTERFACE,
    )
    .await
    .map_err(|e| format!("Failed to create Camera portal proxy: {}", e))?;

    match camera.get_property::<bool>("IsCameraPresent").await {
        Ok(false) => warn!("Camera portal reports no camera present"),
        Ok(true) => {}
        Err(e) => warn!(error = %e, "Could not query IsCameraPresent"),
    }

    let token = format!("snapcam_{}", uuid::Uuid::new_v4().simple());
    let sender = connection
        .unique_name()
        .map(|name| name.to_string())
        .ok_or_else(|| "D-Bus connection has no unique name".to_string())?;
    let request_path = request_path(&sender, &token);

    let request = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        request_path.as_str(),
        REQUEST_INTERFACE,
    )
    .await
    .map_err(|e| format!("Failed to create Request proxy: {}", e))?;

    let mut responses = request
        .receive_signal("Response")
        .await
        .map_err(|e| format!("Failed to subscribe to portal response: {}", e))?;

    let mut options: HashMap<&str, Value> = HashMap::new();
    options.insert("handle_token", Value::from(token.as_str()));

    let handle: OwnedObjectPath = camera
        .call("AccessCamera", &(options,))
        .await
        .map_err(|e| format!("AccessCamera failed: {}", e))?;

    if handle.as_str() != request_path {
        // Portals older than 0.9 ignore handle_token
        warn!(expected = %request_path, got = %handle.as_str(), "Unexpected portal request path");
    }

    info!(request = %handle.as_str(), "Waiting for camera portal answer");

    let message = responses
        .next()
        .await
        .ok_or_else(|| "Portal closed the request without answering".to_string())?;

    let body = message.body();
    let (response, _results): (u32, HashMap<String, OwnedValue>) = body
        .deserialize()
        .map_err(|e| format!("Malformed portal response: {}", e))?;

    info!(response, "Camera portal answered");
    Ok(response == RESPONSE_SUCCESS)
}

/// Object path the portal uses for a request made with `token`
fn request_path(sender: &str, token: &str) -> String {
    let sender = sender.trim_start_matches(':').replace('.', "_");
    format!("{}/request/{}/{}", PORTAL_PATH, sender, token)
}
