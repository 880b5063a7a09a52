//! Platform discrimination and presentation-boundary collaborators
//!
//! The pairing flow behaves differently on the two mobile platform families:
//! Android gates scanning on a location permission and can request the
//! adapter be enabled programmatically; iOS has no scan permission but can
//! only send the user to the OS settings via a deep link. Alert dialogs are
//! owned by the presentation layer and are requested through [`Prompter`]
//! using stable translation identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Mobile platform family the app is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Android: location permission required, programmatic adapter enable
    Android,
    /// iOS: no scan permission, remediation via settings deep links
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => write!(f, "android"),
            Platform::Ios => write!(f, "ios"),
        }
    }
}

/// OS settings deep links used for adapter remediation on iOS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsLink {
    /// Direct to the Bluetooth pane (adapter is merely powered off)
    Bluetooth,
    /// App settings root (adapter inaccessible: unauthorized, unsupported, ...)
    App,
}

impl SettingsLink {
    /// The deep-link URL the presentation layer should open
    pub fn url(&self) -> &'static str {
        match self {
            SettingsLink::Bluetooth => "App-Prefs:Bluetooth",
            SettingsLink::App => "app-settings:",
        }
    }
}

/// A dialog request, keyed by translation identifiers
///
/// The core never renders or localizes text; it names the dialog and the
/// presentation layer looks the strings up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub title_key: String,
    pub message_key: Option<String>,
    pub ok_key: Option<String>,
}

impl PromptSpec {
    pub fn new(title_key: impl Into<String>) -> Self {
        Self {
            title_key: title_key.into(),
            message_key: None,
            ok_key: None,
        }
    }

    pub fn with_message(mut self, key: impl Into<String>) -> Self {
        self.message_key = Some(key.into());
        self
    }

    pub fn with_ok(mut self, key: impl Into<String>) -> Self {
        self.ok_key = Some(key.into());
        self
    }

    /// The adapter-off confirm dialog shown before a settings deep link
    pub fn adapter_off() -> Self {
        Self::new("hotspot_setup.pair.alert_ble_off.title")
            .with_message("hotspot_setup.pair.alert_ble_off.body")
            .with_ok("generic.go_to_settings")
    }

    /// The handshake-failed acknowledgment
    pub fn connect_failed() -> Self {
        Self::new("hotspot_setup.onboarding_error.title_connect_failed")
            .with_message("hotspot_setup.onboarding_error.body_connect_failed")
    }

    /// Fallback acknowledgment for an unexpected handshake error
    pub fn connect_error(detail: impl Into<String>) -> Self {
        Self::new("generic.something_went_wrong").with_message(detail)
    }
}

/// Errors from the settings-opening boundary
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Failed to open settings link {0}: {1}")]
    SettingsOpenFailed(&'static str, String),
}

/// Presentation-layer dialog collaborator
///
/// `confirm` shows an OK/Cancel dialog and resolves to the user's choice;
/// `acknowledge` blocks until the user dismisses an OK-only dialog.
#[async_trait::async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, prompt: PromptSpec) -> bool;
    async fn acknowledge(&self, prompt: PromptSpec);
}

/// Deep-link collaborator for iOS remediation
pub trait SettingsOpener: Send + Sync {
    fn open(&self, link: SettingsLink) -> Result<(), PlatformError>;
}
