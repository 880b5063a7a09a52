//! Adapter power-state monitoring and remediation
//!
//! When the adapter is not powered on, the remediation path depends on the
//! platform: Android requests the adapter be enabled programmatically, iOS
//! sends the user to a settings deep link behind a confirm prompt. A
//! declined prompt leaves the gate blocked; that is a waiting state, not an
//! error. Remediation never loops on its own — the caller re-checks the
//! state afterwards.

use thiserror::Error;
use tracing::{debug, info};

use crate::platform::{Platform, PlatformError, PromptSpec, Prompter, SettingsLink, SettingsOpener};
use crate::transport::{AdapterState, BleTransport, TransportError};

/// What remediation applies for a given platform and adapter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationPlan {
    /// Adapter already powered on
    NotNeeded,
    /// Programmatically request enable (Android)
    RequestEnable,
    /// Confirm prompt, then a settings deep link (iOS)
    PromptThenOpen(SettingsLink),
}

/// How a remediation attempt concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// Adapter was already on
    NotNeeded,
    /// Enable was requested and confirmed by the transport
    Enabled,
    /// The user accepted the prompt and was sent to settings
    SentToSettings,
    /// The user declined; the gate stays blocked
    Declined,
}

/// Errors from adapter remediation
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Remediation path as a pure function of platform and state
///
/// iOS distinguishes a merely powered-off adapter (Bluetooth pane) from an
/// inaccessible one (app settings root).
pub fn remediation_plan(platform: Platform, state: AdapterState) -> RemediationPlan {
    match (platform, state) {
        (_, AdapterState::PoweredOn) => RemediationPlan::NotNeeded,
        (Platform::Android, _) => RemediationPlan::RequestEnable,
        (Platform::Ios, AdapterState::PoweredOff) => {
            RemediationPlan::PromptThenOpen(SettingsLink::Bluetooth)
        }
        (Platform::Ios, AdapterState::Unknown) => {
            RemediationPlan::PromptThenOpen(SettingsLink::App)
        }
    }
}

/// Observes adapter power state and drives user-directed remediation
pub struct AdapterStateMonitor<'a, T, P, S>
where
    T: BleTransport,
    P: Prompter,
    S: SettingsOpener,
{
    platform: Platform,
    transport: &'a T,
    prompter: &'a P,
    settings: &'a S,
}

impl<'a, T, P, S> AdapterStateMonitor<'a, T, P, S>
where
    T: BleTransport,
    P: Prompter,
    S: SettingsOpener,
{
    pub fn new(platform: Platform, transport: &'a T, prompter: &'a P, settings: &'a S) -> Self {
        Self {
            platform,
            transport,
            settings,
            prompter,
        }
    }

    /// Current adapter power state
    pub async fn get_state(&self) -> AdapterState {
        self.transport.adapter_state().await
    }

    /// Run at most one remediation attempt for the observed state
    ///
    /// The caller must re-invoke [`get_state`](Self::get_state) to learn
    /// whether remediation took effect.
    pub async fn remediate(&self, state: AdapterState) -> Result<RemediationOutcome, AdapterError> {
        match remediation_plan(self.platform, state) {
            RemediationPlan::NotNeeded => Ok(RemediationOutcome::NotNeeded),
            RemediationPlan::RequestEnable => {
                info!("requesting adapter enable");
                self.transport.enable().await?;
                Ok(RemediationOutcome::Enabled)
            }
            RemediationPlan::PromptThenOpen(link) => {
                if self.prompter.confirm(PromptSpec::adapter_off()).await {
                    debug!(url = link.url(), "user accepted, opening settings");
                    self.settings.open(link)?;
                    Ok(RemediationOutcome::SentToSettings)
                } else {
                    debug!("user declined adapter remediation");
                    Ok(RemediationOutcome::Declined)
                }
            }
        }
    }
}
