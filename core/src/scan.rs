//! Time-bounded device discovery
//!
//! A scan pass runs for a fixed wall-clock duration, accumulates every
//! distinct device id observed, and returns the whole snapshot at expiry.
//! Unnamed devices are dropped: a candidate must be nameable to be pairable.
//! Rescanning replaces the previous snapshot wholesale; there is no merge.

use futures::StreamExt;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{BleTransport, CandidateDevice, DeviceId, DiscoveryEvent, TransportError};

/// Default scan duration used by the pairing flow
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_millis(2000);

/// Errors from a scan pass
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Scan cancelled")]
    Cancelled,
}

/// Immutable result of one scan pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSnapshot {
    devices: Vec<CandidateDevice>,
}

impl ScanSnapshot {
    /// Candidates in first-observed order
    pub fn devices(&self) -> &[CandidateDevice] {
        &self.devices
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.iter().any(|d| &d.id == id)
    }

    pub fn find(&self, id: &DeviceId) -> Option<&CandidateDevice> {
        self.devices.iter().find(|d| &d.id == id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Runs discovery passes against the BLE transport
///
/// The coordinator owns the adapter's discovery mode for the duration of a
/// pass; it is only invoked once the permission and adapter gates are
/// satisfied.
pub struct ScanCoordinator<'a, T: BleTransport> {
    transport: &'a T,
}

impl<'a, T: BleTransport> ScanCoordinator<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Run one discovery pass and return the snapshot at timer expiry
    ///
    /// Duplicate ids collapse to one entry; a later observation that carries
    /// a name upgrades an earlier nameless one. Devices still nameless at
    /// expiry are discarded.
    pub async fn scan(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<ScanSnapshot, ScanError> {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        debug!(duration_ms = duration.as_millis() as u64, "starting scan");
        let mut stream = self.transport.start_discovery(duration).await?;

        let mut observed: HashMap<DeviceId, CandidateDevice> = HashMap::new();
        let mut order: Vec<DeviceId> = Vec::new();
        let deadline = tokio::time::Instant::now() + duration;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = self.transport.stop_discovery().await;
                    return Err(ScanError::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => break,
                event = stream.next() => match event {
                    Some(DiscoveryEvent::DeviceObserved(device)) => {
                        match observed.entry(device.id.clone()) {
                            Entry::Vacant(slot) => {
                                order.push(device.id.clone());
                                slot.insert(device);
                            }
                            Entry::Occupied(mut slot) => {
                                if device.display_name().is_some() {
                                    slot.insert(device);
                                }
                            }
                        }
                    }
                    // Transport ended the pass early
                    None => break,
                },
            }
        }

        // Expiry sealed the snapshot; a stop failure only gets logged
        if let Err(e) = self.transport.stop_discovery().await {
            warn!(error = %e, "failed to stop discovery");
        }

        let devices: Vec<CandidateDevice> = order
            .into_iter()
            .filter_map(|id| observed.remove(&id))
            .filter(|d| d.display_name().is_some())
            .collect();

        info!(candidates = devices.len(), "scan complete");
        Ok(ScanSnapshot { devices })
    }
}
