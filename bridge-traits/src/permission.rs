//! Location Permission Abstraction
//!
//! Query and request access to the OS location permission, plus the host UI
//! used to recover from a denial.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Correlation token matching an asynchronous permission result to the
/// request that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRequestId(pub Uuid);

impl PermissionRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PermissionRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PermissionRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location permission as tracked by the core for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionState {
    /// Not queried yet
    Unknown,
    Granted,
    /// Denied, the OS will still show a request dialog
    Denied,
    /// Denied, only the system settings page can grant it
    DeniedPermanently,
}

impl PermissionState {
    /// Map an OS answer to the tracked state.
    pub fn from_status(status: PermissionStatus) -> Self {
        match status {
            PermissionStatus::Granted => PermissionState::Granted,
            PermissionStatus::Denied {
                can_ask_again: true,
            } => PermissionState::Denied,
            PermissionStatus::Denied {
                can_ask_again: false,
            } => PermissionState::DeniedPermanently,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PermissionState::Unknown => "unknown",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::DeniedPermanently => "denied_permanently",
        };
        f.write_str(name)
    }
}

/// Answer of the OS permission store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// Location access is granted
    Granted,
    /// Location access is not granted
    Denied {
        /// Whether the OS will still show a request dialog
        can_ask_again: bool,
    },
}

/// Result of a permission request, delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOutcome {
    pub request_id: PermissionRequestId,
    pub granted: bool,
    pub can_ask_again: bool,
}

/// Receiver for permission request results.
pub trait PermissionCallback: Send + Sync {
    fn on_result(&self, outcome: PermissionOutcome);
}

/// Permission store trait
///
/// - **Android**: `checkSelfPermission` + `shouldShowRequestPermissionRationale`,
///   `requestPermissions` with the result routed from `onRequestPermissionsResult`
/// - **iOS**: `CLLocationManager.authorizationStatus` / `requestWhenInUseAuthorization`
/// - **Desktop**: usually always granted
pub trait PermissionStore: Send + Sync {
    /// Query the current permission status. Must not show any UI.
    fn check(&self) -> PermissionStatus;

    /// Show the OS permission dialog.
    ///
    /// Returns once the dialog is launched; the outcome is delivered later
    /// through `callback`, carrying `request_id` unchanged.
    fn request(
        &self,
        request_id: PermissionRequestId,
        callback: Arc<dyn PermissionCallback>,
    ) -> Result<()>;
}

/// Host UI for the permission remediation flow.
///
/// Dialog copy and chrome belong to the host; the core only decides which
/// flow to start.
#[async_trait::async_trait]
pub trait PermissionPrompter: Send + Sync {
    /// Explain why location is needed. Resolves to `true` when the user agrees
    /// to be asked again.
    async fn show_rationale(&self) -> bool;

    /// Tell the user the permission was permanently denied and offer to open
    /// the system settings page for the app.
    async fn offer_settings(&self) -> Result<()>;
}
