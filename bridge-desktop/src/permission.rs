//! In-Memory Permission Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    permission::{
        PermissionCallback, PermissionOutcome, PermissionPrompter, PermissionRequestId,
        PermissionStatus, PermissionStore,
    },
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// How [`MemoryPermissionStore`] answers a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPolicy {
    Grant,
    /// Deny, allowing another dialog later
    Deny,
    /// Deny and suppress further dialogs
    DenyPermanently,
}

/// Permission store held in memory.
///
/// Desktop platforms rarely gate location behind a dialog; this store lets a
/// development host simulate every permission path. Requests are answered
/// synchronously according to the [`RequestPolicy`].
pub struct MemoryPermissionStore {
    status: Mutex<PermissionStatus>,
    policy: RequestPolicy,
}

impl MemoryPermissionStore {
    pub fn new(status: PermissionStatus, policy: RequestPolicy) -> Self {
        Self {
            status: Mutex::new(status),
            policy,
        }
    }

    /// Already granted; requests are granted too.
    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, RequestPolicy::Grant)
    }

    /// Override the current status, e.g. after the user toggled a setting.
    pub fn set_status(&self, status: PermissionStatus) {
        if let Ok(mut current) = self.status.lock() {
            *current = status;
        }
    }
}

impl Default for MemoryPermissionStore {
    fn default() -> Self {
        Self::granted()
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn check(&self) -> PermissionStatus {
        self.status
            .lock()
            .map(|status| *status)
            .unwrap_or(PermissionStatus::Denied {
                can_ask_again: false,
            })
    }

    fn request(
        &self,
        request_id: PermissionRequestId,
        callback: Arc<dyn PermissionCallback>,
    ) -> Result<()> {
        let (granted, can_ask_again) = match self.policy {
            RequestPolicy::Grant => (true, true),
            RequestPolicy::Deny => (false, true),
            RequestPolicy::DenyPermanently => (false, false),
        };

        {
            let mut status = self.status.lock().map_err(|_| {
                BridgeError::OperationFailed("permission state poisoned".to_string())
            })?;
            *status = if granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied { can_ask_again }
            };
        }

        debug!(%request_id, granted, can_ask_again, "Simulated permission dialog answered");
        callback.on_result(PermissionOutcome {
            request_id,
            granted,
            can_ask_again,
        });
        Ok(())
    }
}

/// Prompter for hosts without dialogs.
///
/// Logs the rationale and settings redirect and answers the rationale from
/// configuration.
#[derive(Debug, Clone)]
pub struct ConsolePrompter {
    pub accept_rationale: bool,
}

impl Default for ConsolePrompter {
    fn default() -> Self {
        Self {
            accept_rationale: true,
        }
    }
}

#[async_trait]
impl PermissionPrompter for ConsolePrompter {
    async fn show_rationale(&self) -> bool {
        info!(
            accepted = self.accept_rationale,
            "Location permission is needed to show your position on the map"
        );
        self.accept_rationale
    }

    async fn offer_settings(&self) -> Result<()> {
        info!("Location permission denied. Enable it in the system settings");
        Ok(())
    }
}
