//! Pairing session state machine
//!
//! Drives the per-device connect → configure → verify handshake around the
//! scan lifecycle:
//!
//! ```text
//! Idle → Scanning → ScanComplete → Connecting(d) → Connected(d)
//!                        ↑                 └→ Failed(d, reason) ─┐
//!                        └───────── automatic rescan ────────────┘
//! ```
//!
//! Exactly one device may be selected at a time; a second selection while a
//! handshake is in flight is rejected, not queued. A failed handshake is
//! surfaced through one blocking acknowledgment and then automatically
//! resets into a fresh scan, discarding the failed candidate.

use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::platform::{PromptSpec, Prompter};
use crate::scan::{ScanCoordinator, ScanError, ScanSnapshot, DEFAULT_SCAN_DURATION};
use crate::transport::{
    BleTransport, CandidateDevice, DeviceId, HandshakeFailureKind, HandshakeOutcome,
};

/// Tunable session parameters
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock length of one discovery pass
    pub scan_duration: Duration,
    /// Pause after a successful handshake before the device is handed to
    /// the caller, letting it finish post-handshake initialization
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scan_duration: DEFAULT_SCAN_DURATION,
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Why a selection ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The handshake reported a non-success outcome
    Handshake(HandshakeFailureKind),
    /// The handshake raised a transport error
    Error(String),
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFailure::Handshake(kind) => write!(f, "{kind}"),
            SessionFailure::Error(msg) => write!(f, "{msg}"),
        }
    }
}

/// Session state; the selected device, if any, lives inside the variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    Scanning,
    ScanComplete,
    Connecting(CandidateDevice),
    Connected(CandidateDevice),
    Failed(CandidateDevice, SessionFailure),
}

impl PairingState {
    /// The device currently selected for (or holding) a connection
    pub fn selected(&self) -> Option<&CandidateDevice> {
        match self {
            PairingState::Connecting(d)
            | PairingState::Connected(d)
            | PairingState::Failed(d, _) => Some(d),
            _ => None,
        }
    }
}

/// How a selection resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Handshake succeeded; the device is ready for downstream use after
    /// the settle delay has elapsed
    Connected(CandidateDevice),
    /// Handshake failed; the user acknowledged and a fresh scan completed
    FailedAndRescanned(SessionFailure),
}

/// Errors from session operations
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("A selection is already in flight")]
    SelectionInFlight,
    #[error("A scan is already in progress")]
    ScanInProgress,
    #[error("No completed scan to select from")]
    NoSnapshot,
    #[error("Device {0} is not in the current scan snapshot")]
    UnknownDevice(DeviceId),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Session cancelled")]
    Cancelled,
}

/// The pairing state machine
pub struct PairingSession<'a, T: BleTransport, P: Prompter> {
    transport: &'a T,
    prompter: &'a P,
    config: SessionConfig,
    cancel: CancellationToken,
    state: PairingState,
    snapshot: ScanSnapshot,
}

impl<'a, T: BleTransport, P: Prompter> PairingSession<'a, T, P> {
    pub fn new(transport: &'a T, prompter: &'a P, config: SessionConfig) -> Self {
        Self::with_cancel(transport, prompter, config, CancellationToken::new())
    }

    /// Build a session whose suspension points honor an external token
    pub fn with_cancel(
        transport: &'a T,
        prompter: &'a P,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            prompter,
            config,
            cancel,
            state: PairingState::Idle,
            snapshot: ScanSnapshot::default(),
        }
    }

    pub fn state(&self) -> &PairingState {
        &self.state
    }

    /// Most recent scan snapshot; replaced wholesale on every rescan
    pub fn snapshot(&self) -> &ScanSnapshot {
        &self.snapshot
    }

    /// Run a discovery pass: `Idle/ScanComplete/Failed → Scanning → ScanComplete`
    ///
    /// Rescanning discards the previous snapshot and any previously selected
    /// device.
    pub async fn scan(&mut self) -> Result<&ScanSnapshot, SessionError> {
        match self.state {
            PairingState::Connecting(_) | PairingState::Connected(_) => {
                return Err(SessionError::SelectionInFlight)
            }
            PairingState::Scanning => return Err(SessionError::ScanInProgress),
            PairingState::Idle | PairingState::ScanComplete | PairingState::Failed(..) => {}
        }
        self.run_scan().await?;
        Ok(&self.snapshot)
    }

    /// Select candidate `id` and run the connect-and-configure handshake
    ///
    /// On success the state is `Connected` and the device is returned after
    /// the settle delay. On failure the user acknowledges one dialog, the
    /// machine resets through `Scanning` into a fresh `ScanComplete`, and
    /// the failure is reported in the outcome.
    pub async fn select(&mut self, id: &DeviceId) -> Result<SelectOutcome, SessionError> {
        match self.state {
            PairingState::Connecting(_) | PairingState::Connected(_) => {
                return Err(SessionError::SelectionInFlight)
            }
            PairingState::ScanComplete => {}
            _ => return Err(SessionError::NoSnapshot),
        }

        let device = self
            .snapshot
            .find(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownDevice(id.clone()))?;

        info!(device = %device.id, "connecting");
        self.state = PairingState::Connecting(device.clone());

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            r = self.transport.connect_and_configure(&device) => r,
        };

        match result {
            Ok(HandshakeOutcome::Success) => {
                info!(device = %device.id, "connected");
                self.state = PairingState::Connected(device.clone());
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                    _ = tokio::time::sleep(self.config.settle_delay) => {}
                }
                Ok(SelectOutcome::Connected(device))
            }
            Ok(HandshakeOutcome::Failure(kind)) => {
                warn!(device = %device.id, %kind, "handshake failed");
                let failure = SessionFailure::Handshake(kind);
                self.fail_and_rescan(device, failure.clone(), PromptSpec::connect_failed())
                    .await?;
                Ok(SelectOutcome::FailedAndRescanned(failure))
            }
            Err(e) => {
                warn!(device = %device.id, error = %e, "handshake error");
                let failure = SessionFailure::Error(e.to_string());
                let prompt = PromptSpec::connect_error(e.to_string());
                self.fail_and_rescan(device, failure.clone(), prompt).await?;
                Ok(SelectOutcome::FailedAndRescanned(failure))
            }
        }
    }

    /// `Failed(d, r)`: one blocking acknowledgment, then an automatic rescan
    async fn fail_and_rescan(
        &mut self,
        device: CandidateDevice,
        failure: SessionFailure,
        prompt: PromptSpec,
    ) -> Result<(), SessionError> {
        self.state = PairingState::Failed(device, failure);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            _ = self.prompter.acknowledge(prompt) => {}
        }

        self.run_scan().await
    }

    async fn run_scan(&mut self) -> Result<(), SessionError> {
        debug!("scan snapshot reset");
        self.state = PairingState::Scanning;
        self.snapshot = ScanSnapshot::default();

        let coordinator = ScanCoordinator::new(self.transport);
        match coordinator.scan(self.config.scan_duration, &self.cancel).await {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                self.state = PairingState::ScanComplete;
                Ok(())
            }
            Err(ScanError::Cancelled) => Err(SessionError::Cancelled),
            Err(e) => {
                // A failed pass leaves nothing to select from; allow retry
                self.state = PairingState::Idle;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{AdapterState, DiscoveryEvent, TransportError};
    use futures::stream::BoxStream;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Transport scripted with per-pass scan results and per-call handshake
    /// outcomes. An exhausted handshake script never resolves, which models
    /// an in-flight handshake for cancellation tests.
    struct ScriptedTransport {
        scans: Mutex<VecDeque<Vec<CandidateDevice>>>,
        handshakes: Mutex<VecDeque<Result<HandshakeOutcome, TransportError>>>,
    }

    impl ScriptedTransport {
        fn new(
            scans: Vec<Vec<CandidateDevice>>,
            handshakes: Vec<Result<HandshakeOutcome, TransportError>>,
        ) -> Self {
            Self {
                scans: Mutex::new(scans.into()),
                handshakes: Mutex::new(handshakes.into()),
            }
        }
    }

    #[async_trait::async_trait]
    impl BleTransport for ScriptedTransport {
        async fn enable(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn adapter_state(&self) -> AdapterState {
            AdapterState::PoweredOn
        }

        async fn start_discovery(
            &self,
            _duration: Duration,
        ) -> Result<BoxStream<'static, DiscoveryEvent>, TransportError> {
            let devices = self.scans.lock().pop_front().unwrap_or_default();
            Ok(Box::pin(futures::stream::iter(
                devices.into_iter().map(DiscoveryEvent::DeviceObserved),
            )))
        }

        async fn stop_discovery(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn connect_and_configure(
            &self,
            _device: &CandidateDevice,
        ) -> Result<HandshakeOutcome, TransportError> {
            let next = self.handshakes.lock().pop_front();
            match next {
                Some(outcome) => outcome,
                None => futures::future::pending().await,
            }
        }
    }

    struct RecordingPrompter {
        acknowledged: Mutex<Vec<PromptSpec>>,
    }

    impl RecordingPrompter {
        fn new() -> Self {
            Self {
                acknowledged: Mutex::new(Vec::new()),
            }
        }

        fn ack_count(&self) -> usize {
            self.acknowledged.lock().len()
        }
    }

    #[async_trait::async_trait]
    impl Prompter for RecordingPrompter {
        async fn confirm(&self, _prompt: PromptSpec) -> bool {
            true
        }

        async fn acknowledge(&self, prompt: PromptSpec) {
            self.acknowledged.lock().push(prompt);
        }
    }

    fn device(id: &str, name: &str) -> CandidateDevice {
        CandidateDevice::new(id, Some(name))
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_transitions_idle_to_scan_complete() {
        let transport =
            ScriptedTransport::new(vec![vec![device("a", "Alpha"), device("b", "Beta")]], vec![]);
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        assert_eq!(*session.state(), PairingState::Idle);
        let snapshot = session.scan().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(*session.state(), PairingState::ScanComplete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_before_scan_rejected() {
        let transport = ScriptedTransport::new(vec![], vec![]);
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        let result = session.select(&DeviceId::from("a")).await;
        assert!(matches!(result, Err(SessionError::NoSnapshot)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_unknown_device_rejected() {
        let transport = ScriptedTransport::new(vec![vec![device("a", "Alpha")]], vec![]);
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        session.scan().await.unwrap();
        let result = session.select(&DeviceId::from("zz")).await;
        assert!(matches!(result, Err(SessionError::UnknownDevice(_))));
        assert_eq!(*session.state(), PairingState::ScanComplete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_handshake_connects_after_settle_delay() {
        let transport = ScriptedTransport::new(
            vec![vec![device("a", "Alpha"), device("b", "Beta")]],
            vec![Ok(HandshakeOutcome::Success)],
        );
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        session.scan().await.unwrap();
        let before = tokio::time::Instant::now();
        let outcome = session.select(&DeviceId::from("a")).await.unwrap();

        assert_eq!(outcome, SelectOutcome::Connected(device("a", "Alpha")));
        assert_eq!(*session.state(), PairingState::Connected(device("a", "Alpha")));
        // Device is handed over only after the settle delay
        assert!(before.elapsed() >= Duration::from_millis(500));
        assert_eq!(prompter.ack_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_handshake_acknowledges_once_and_rescans() {
        let transport = ScriptedTransport::new(
            vec![
                vec![device("a", "Alpha"), device("b", "Beta")],
                // The failed candidate is not rediscovered
                vec![device("b", "Beta")],
            ],
            vec![Ok(HandshakeOutcome::Failure(
                HandshakeFailureKind::ConnectFailed,
            ))],
        );
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        session.scan().await.unwrap();
        let outcome = session.select(&DeviceId::from("a")).await.unwrap();

        assert_eq!(
            outcome,
            SelectOutcome::FailedAndRescanned(SessionFailure::Handshake(
                HandshakeFailureKind::ConnectFailed
            ))
        );
        assert_eq!(prompter.ack_count(), 1);
        assert_eq!(*session.state(), PairingState::ScanComplete);
        assert!(!session.snapshot().contains(&DeviceId::from("a")));
        assert!(session.snapshot().contains(&DeviceId::from("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_acknowledges_error_text() {
        let transport = ScriptedTransport::new(
            vec![vec![device("a", "Alpha")], vec![]],
            vec![Err(TransportError::HandshakeError(
                DeviceId::from("a"),
                "link dropped".into(),
            ))],
        );
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        session.scan().await.unwrap();
        let outcome = session.select(&DeviceId::from("a")).await.unwrap();

        match outcome {
            SelectOutcome::FailedAndRescanned(SessionFailure::Error(msg)) => {
                assert!(msg.contains("link dropped"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(prompter.ack_count(), 1);
        let acked = prompter.acknowledged.lock();
        assert!(acked[0]
            .message_key
            .as_deref()
            .is_some_and(|m| m.contains("link dropped")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_selection_while_connected_rejected() {
        let transport = ScriptedTransport::new(
            vec![vec![device("a", "Alpha"), device("b", "Beta")]],
            vec![Ok(HandshakeOutcome::Success)],
        );
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        session.scan().await.unwrap();
        session.select(&DeviceId::from("a")).await.unwrap();

        let result = session.select(&DeviceId::from("b")).await;
        assert!(matches!(result, Err(SessionError::SelectionInFlight)));
        // The established connection is untouched
        assert_eq!(session.state().selected(), Some(&device("a", "Alpha")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_while_connected_rejected() {
        let transport = ScriptedTransport::new(
            vec![vec![device("a", "Alpha")]],
            vec![Ok(HandshakeOutcome::Success)],
        );
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        session.scan().await.unwrap();
        session.select(&DeviceId::from("a")).await.unwrap();
        assert!(matches!(
            session.scan().await,
            Err(SessionError::SelectionInFlight)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescan_discards_previous_snapshot() {
        let transport = ScriptedTransport::new(
            vec![vec![device("a", "Alpha")], vec![device("c", "Gamma")]],
            vec![],
        );
        let prompter = RecordingPrompter::new();
        let mut session = PairingSession::new(&transport, &prompter, SessionConfig::default());

        session.scan().await.unwrap();
        assert!(session.snapshot().contains(&DeviceId::from("a")));

        session.scan().await.unwrap();
        assert!(!session.snapshot().contains(&DeviceId::from("a")));
        assert!(session.snapshot().contains(&DeviceId::from("c")));
        assert_eq!(session.state().selected(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_handshake_applies_no_outcome() {
        // Empty handshake script: connect_and_configure never resolves
        let transport = ScriptedTransport::new(vec![vec![device("a", "Alpha")]], vec![]);
        let prompter = RecordingPrompter::new();
        let cancel = CancellationToken::new();
        let mut session = PairingSession::with_cancel(
            &transport,
            &prompter,
            SessionConfig::default(),
            cancel.clone(),
        );

        session.scan().await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = session.select(&DeviceId::from("a")).await;
        assert!(matches!(result, Err(SessionError::Cancelled)));
        // No Connected/Failed transition was applied
        assert_eq!(*session.state(), PairingState::Connecting(device("a", "Alpha")));
        assert_eq!(prompter.ack_count(), 0);
    }
}
