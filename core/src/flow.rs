//! Pairing flow orchestration
//!
//! Chains the gates in strict sequence: permission → adapter → scan. No
//! stage starts speculatively; a blocked gate leaves the flow waiting (not
//! failed) and the caller may re-run it. Rescanning re-runs the adapter
//! gate first, matching the manual "scan again" path.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapter::{AdapterError, AdapterStateMonitor};
use crate::permission::{PermissionError, PermissionGate, PermissionRequester, PermissionStatus};
use crate::platform::{Platform, Prompter, SettingsOpener};
use crate::scan::ScanSnapshot;
use crate::session::{PairingSession, SelectOutcome, SessionConfig, SessionError};
use crate::transport::{AdapterState, BleTransport, DeviceId};

/// Why the flow is waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// Both gates passed; scanning may proceed
    Satisfied,
    /// Scan permission denied; waiting on the user
    PermissionBlocked,
    /// Adapter not powered on after one remediation attempt
    AdapterBlocked,
}

/// Result of one flow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowProgress {
    /// A scan pass completed; the snapshot is available
    ScanComplete,
    /// A gate is blocked; nothing was scanned
    Blocked(GateStatus),
}

/// Errors from flow orchestration
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Flow cancelled")]
    Cancelled,
}

/// Drives a device from discoverable to connected-and-configured
pub struct PairingFlow<'a, T, P, S, R>
where
    T: BleTransport,
    P: Prompter,
    S: SettingsOpener,
    R: PermissionRequester,
{
    platform: Platform,
    transport: &'a T,
    prompter: &'a P,
    settings: &'a S,
    permission: PermissionGate<R>,
    session: PairingSession<'a, T, P>,
    cancel: CancellationToken,
}

impl<'a, T, P, S, R> PairingFlow<'a, T, P, S, R>
where
    T: BleTransport,
    P: Prompter,
    S: SettingsOpener,
    R: PermissionRequester,
{
    pub fn new(
        platform: Platform,
        transport: &'a T,
        prompter: &'a P,
        settings: &'a S,
        requester: R,
        config: SessionConfig,
    ) -> Self {
        Self::with_cancel(
            platform,
            transport,
            prompter,
            settings,
            requester,
            config,
            CancellationToken::new(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_cancel(
        platform: Platform,
        transport: &'a T,
        prompter: &'a P,
        settings: &'a S,
        requester: R,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            platform,
            transport,
            prompter,
            settings,
            permission: PermissionGate::new(platform, requester),
            session: PairingSession::with_cancel(transport, prompter, config, cancel.clone()),
            cancel,
        }
    }

    /// The underlying session state machine
    pub fn session(&self) -> &PairingSession<'a, T, P> {
        &self.session
    }

    /// Most recent scan snapshot
    pub fn snapshot(&self) -> &ScanSnapshot {
        self.session.snapshot()
    }

    /// Run the permission and adapter gates once, in order
    ///
    /// At most one remediation attempt per call; the adapter state is
    /// re-queried afterwards rather than looping.
    pub async fn check_gates(&mut self) -> Result<GateStatus, FlowError> {
        if self.cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }

        if self.permission.check_and_request().await? != PermissionStatus::Granted {
            info!("scan permission not granted; flow waiting");
            return Ok(GateStatus::PermissionBlocked);
        }

        let monitor =
            AdapterStateMonitor::new(self.platform, self.transport, self.prompter, self.settings);
        let state = monitor.get_state().await;
        if state != AdapterState::PoweredOn {
            debug!(%state, "adapter not ready, attempting remediation");
            monitor.remediate(state).await?;
            if monitor.get_state().await != AdapterState::PoweredOn {
                info!("adapter still unavailable; flow waiting");
                return Ok(GateStatus::AdapterBlocked);
            }
        }

        Ok(GateStatus::Satisfied)
    }

    /// Run the gates, then a discovery pass
    pub async fn scan(&mut self) -> Result<FlowProgress, FlowError> {
        match self.check_gates().await? {
            GateStatus::Satisfied => {
                self.session.scan().await?;
                Ok(FlowProgress::ScanComplete)
            }
            blocked => Ok(FlowProgress::Blocked(blocked)),
        }
    }

    /// Select a candidate from the current snapshot
    pub async fn select(&mut self, id: &DeviceId) -> Result<SelectOutcome, FlowError> {
        Ok(self.session.select(id).await?)
    }

    /// Abort the flow; pending suspension points observe the token
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
