//! PairKit — hotspot pairing and provisioning core
//!
//! Brings a nearby BLE hotspot from "discoverable" to "connected and
//! configured with a validated add-gateway transaction":
//!
//! 1. Gate on the scan permission ([`permission`]) and adapter power state
//!    ([`adapter`]), in strict sequence.
//! 2. Run a time-bounded discovery pass ([`scan`]).
//! 3. Drive the connect → configure → verify handshake with
//!    retry-by-rescan ([`session`], orchestrated by [`flow`]).
//! 4. Validate physical antenna parameters ([`antenna`]).
//! 5. Decode the signed add-gateway transaction and resolve the device's
//!    network identity ([`gateway`]).
//!
//! Rendering, navigation, localization, and the QR camera are collaborators
//! behind traits; the BLE stack sits behind [`transport::BleTransport`].

pub mod adapter;
pub mod antenna;
pub mod flow;
pub mod gateway;
pub mod permission;
pub mod platform;
pub mod scan;
pub mod session;
pub mod transport;

pub use adapter::{remediation_plan, AdapterStateMonitor, RemediationOutcome, RemediationPlan};
pub use antenna::{
    AntennaConfig, AntennaConfigValidator, AntennaProfile, LocaleFormat, MAX_GAIN_DBI,
    MIN_GAIN_DBI,
};
pub use flow::{FlowError, FlowProgress, GateStatus, PairingFlow};
pub use gateway::{
    AddGatewayTxn, GatewayTransactionResolver, HttpOnboardingClient, OnboardingClient,
    ResolutionState, TxnDecoder,
};
pub use permission::{PermissionGate, PermissionRequester, PermissionStatus};
pub use platform::{Platform, PromptSpec, Prompter, SettingsLink, SettingsOpener};
pub use scan::{ScanCoordinator, ScanSnapshot, DEFAULT_SCAN_DURATION};
pub use session::{
    PairingSession, PairingState, SelectOutcome, SessionConfig, SessionFailure,
};
pub use transport::{
    AdapterState, BleTransport, CandidateDevice, DeviceId, DiscoveryEvent, HandshakeFailureKind,
    HandshakeOutcome, TransportError,
};
