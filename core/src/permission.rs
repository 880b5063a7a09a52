//! Permission gate for BLE scanning
//!
//! Android requires a location permission before BLE discovery is allowed;
//! iOS has no equivalent requirement and the gate passes unconditionally.
//! A denied permission is a blocked state, not an error: the caller is left
//! waiting and may re-run the gate later.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::platform::Platform;

/// Outcome of a permission gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// Never checked or requested
    Unknown,
    /// Scanning is allowed
    Granted,
    /// The user declined the prompt
    Denied,
}

/// Permission kinds the pairing flow cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionKind {
    /// Coarse/fine location, required for BLE scans on Android
    Location,
}

/// Errors from the OS permission boundary
#[derive(Error, Debug, Clone)]
pub enum PermissionError {
    #[error("Permission request failed: {0}")]
    RequestFailed(String),
}

/// OS permission collaborator
///
/// `check` queries the current grant without prompting; `request` may show
/// the OS-native dialog.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PermissionRequester: Send + Sync {
    async fn check(&self, kind: PermissionKind) -> Result<bool, PermissionError>;
    async fn request(&self, kind: PermissionKind) -> Result<bool, PermissionError>;
}

/// Gates the scan pipeline on the platform's permission requirement
pub struct PermissionGate<R: PermissionRequester> {
    platform: Platform,
    requester: R,
    status: PermissionStatus,
}

impl<R: PermissionRequester> PermissionGate<R> {
    pub fn new(platform: Platform, requester: R) -> Self {
        Self {
            platform,
            requester,
            status: PermissionStatus::Unknown,
        }
    }

    /// Last resolved status
    pub fn status(&self) -> PermissionStatus {
        self.status
    }

    /// Resolve the scan permission, prompting at most once
    ///
    /// A repeated call after the permission has already been decided
    /// re-queries the OS instead of re-prompting, so a grant revoked (or
    /// given) in settings is picked up.
    pub async fn check_and_request(&mut self) -> Result<PermissionStatus, PermissionError> {
        if self.platform == Platform::Ios {
            self.status = PermissionStatus::Granted;
            return Ok(self.status);
        }

        let granted = match self.status {
            PermissionStatus::Unknown => {
                debug!("requesting location permission for BLE scan");
                self.requester.request(PermissionKind::Location).await?
            }
            PermissionStatus::Granted | PermissionStatus::Denied => {
                self.requester.check(PermissionKind::Location).await?
            }
        };

        self.status = if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        Ok(self.status)
    }
}
