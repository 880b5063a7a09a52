//! BLE transport abstraction
//!
//! Defines the collaborator seam to the platform BLE stack. The wire-level
//! GATT protocol lives behind [`BleTransport`]; the core only drives
//! discovery and the connect-and-configure handshake through it.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque peripheral identifier, stable for the lifetime of a scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId(s.to_string())
    }
}

/// A peripheral observed during discovery
///
/// Only devices with a human-readable name are eligible pairing candidates;
/// the scan coordinator drops unnamed observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDevice {
    pub id: DeviceId,
    pub name: Option<String>,
}

impl CandidateDevice {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: DeviceId(id.into()),
            name: name.map(str::to_string),
        }
    }

    /// Name shown in the candidate list, if the device is nameable
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Power state of the local BLE adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterState {
    /// State not yet determined, or the adapter is inaccessible
    Unknown,
    /// Radio is off
    PoweredOff,
    /// Radio is on; scanning may proceed
    PoweredOn,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterState::Unknown => write!(f, "Unknown"),
            AdapterState::PoweredOff => write!(f, "PoweredOff"),
            AdapterState::PoweredOn => write!(f, "PoweredOn"),
        }
    }
}

/// Events emitted by the transport during a discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A peripheral was observed (possibly repeatedly)
    DeviceObserved(CandidateDevice),
}

/// Result of the connect-and-configure handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Success,
    Failure(HandshakeFailureKind),
}

/// Why a handshake reported non-success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailureKind {
    /// The BLE connection could not be established
    ConnectFailed,
    /// Connected, but the configure step was rejected
    ConfigFailed,
    /// The device stopped responding mid-handshake
    Timeout,
}

impl fmt::Display for HandshakeFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeFailureKind::ConnectFailed => write!(f, "connect failed"),
            HandshakeFailureKind::ConfigFailed => write!(f, "configuration rejected"),
            HandshakeFailureKind::Timeout => write!(f, "device timed out"),
        }
    }
}

/// Errors from the BLE transport boundary
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Adapter unavailable")]
    AdapterUnavailable,
    #[error("Failed to enable adapter: {0}")]
    EnableFailed(String),
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),
    #[error("Handshake error with {0}: {1}")]
    HandshakeError(DeviceId, String),
}

/// Platform BLE stack collaborator
///
/// Discovery ownership: at most one discovery pass runs at a time; the scan
/// coordinator calls `stop_discovery` when its timer expires.
#[async_trait::async_trait]
pub trait BleTransport: Send + Sync {
    /// Programmatically request the adapter be enabled (Android path)
    async fn enable(&self) -> Result<(), TransportError>;

    /// Current adapter power state
    async fn adapter_state(&self) -> AdapterState;

    /// Begin a discovery pass; the stream yields observation events until
    /// `stop_discovery` or the transport's own expiry
    async fn start_discovery(
        &self,
        duration: Duration,
    ) -> Result<BoxStream<'static, DiscoveryEvent>, TransportError>;

    /// End the current discovery pass
    async fn stop_discovery(&self) -> Result<(), TransportError>;

    /// Run the connect-and-configure handshake against a candidate
    async fn connect_and_configure(
        &self,
        device: &CandidateDevice,
    ) -> Result<HandshakeOutcome, TransportError>;
}
