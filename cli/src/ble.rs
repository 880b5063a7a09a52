//! btleplug-backed BLE transport
//!
//! Desktop implementation of the core transport trait, used to exercise the
//! pairing flow against real peripherals. Observations are flushed from the
//! adapter's peripheral list shortly before the scan deadline.

use anyhow::Context;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::BoxStream;
use std::time::Duration;
use tracing::{debug, warn};

use pairkit_core::{
    AdapterState, BleTransport, CandidateDevice, DeviceId, DiscoveryEvent, HandshakeFailureKind,
    HandshakeOutcome, TransportError,
};

pub struct BtleplugTransport {
    adapter: Adapter,
}

impl BtleplugTransport {
    pub async fn new() -> anyhow::Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .context("no Bluetooth adapter found")?;
        Ok(Self { adapter })
    }

    async fn peripheral_by_id(&self, id: &DeviceId) -> Result<Option<Peripheral>, TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::DiscoveryFailed(e.to_string()))?;
        Ok(peripherals
            .into_iter()
            .find(|p| p.address().to_string() == id.0))
    }
}

#[async_trait::async_trait]
impl BleTransport for BtleplugTransport {
    async fn enable(&self) -> Result<(), TransportError> {
        // Desktop hosts cannot toggle the radio programmatically
        warn!("adapter enable not supported on this host; continuing");
        Ok(())
    }

    async fn adapter_state(&self) -> AdapterState {
        match self.adapter.adapter_info().await {
            Ok(_) => AdapterState::PoweredOn,
            Err(_) => AdapterState::Unknown,
        }
    }

    async fn start_discovery(
        &self,
        duration: Duration,
    ) -> Result<BoxStream<'static, DiscoveryEvent>, TransportError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TransportError::DiscoveryFailed(e.to_string()))?;

        let adapter = self.adapter.clone();
        let (tx, rx) = futures::channel::mpsc::unbounded();
        tokio::spawn(async move {
            // Flush just before the coordinator's deadline so every
            // peripheral seen during the pass makes it into the snapshot
            let wait = duration.saturating_sub(Duration::from_millis(150));
            tokio::time::sleep(wait).await;

            let peripherals = match adapter.peripherals().await {
                Ok(peripherals) => peripherals,
                Err(e) => {
                    warn!(error = %e, "failed to list peripherals");
                    return;
                }
            };
            for peripheral in peripherals {
                let name = match peripheral.properties().await {
                    Ok(Some(props)) => props.local_name,
                    _ => None,
                };
                let device = CandidateDevice {
                    id: DeviceId(peripheral.address().to_string()),
                    name,
                };
                if tx
                    .unbounded_send(DiscoveryEvent::DeviceObserved(device))
                    .is_err()
                {
                    break;
                }
            }
        });

        Ok(Box::pin(rx))
    }

    async fn stop_discovery(&self) -> Result<(), TransportError> {
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| TransportError::DiscoveryFailed(e.to_string()))
    }

    async fn connect_and_configure(
        &self,
        device: &CandidateDevice,
    ) -> Result<HandshakeOutcome, TransportError> {
        let peripheral = self.peripheral_by_id(&device.id).await?.ok_or_else(|| {
            TransportError::HandshakeError(device.id.clone(), "peripheral no longer visible".into())
        })?;

        if let Err(e) = peripheral.connect().await {
            debug!(device = %device.id, error = %e, "connect failed");
            return Ok(HandshakeOutcome::Failure(HandshakeFailureKind::ConnectFailed));
        }
        if let Err(e) = peripheral.discover_services().await {
            debug!(device = %device.id, error = %e, "service discovery failed");
            let _ = peripheral.disconnect().await;
            return Ok(HandshakeOutcome::Failure(HandshakeFailureKind::ConfigFailed));
        }

        Ok(HandshakeOutcome::Success)
    }
}
