//! Add-gateway transaction decoding and identity resolution
//!
//! A QR scan produces a signed add-gateway transaction string. Decoding it
//! (through the opaque [`TxnDecoder`] collaborator) yields the gateway and
//! owner public keys; the device's MAC address is then resolved
//! asynchronously from the remote onboarding record keyed by the gateway
//! key. Resolution failure is non-fatal: the keys stay displayed, the
//! address stays absent.
//!
//! Ordering: the latest decode wins. A resolution still in flight for a
//! replaced record is discarded when it lands.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Resolution progress of a decoded transaction's MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionState {
    Pending,
    Resolved,
    Failed,
}

/// Keys extracted by the transaction decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGateway {
    pub gateway_b58: String,
    pub owner_b58: String,
}

/// A decoded add-gateway transaction
///
/// Immutable except for `mac_address`/`resolution`, which transition
/// `Pending → Resolved` or `Pending → Failed` exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddGatewayTxn {
    pub gateway_b58: String,
    pub owner_b58: String,
    pub mac_address: Option<String>,
    pub resolution: ResolutionState,
}

/// Errors from transaction decoding
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
}

/// Errors from the onboarding-record lookup
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    #[error("Onboarding record not found")]
    NotFound,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected status {0}")]
    Status(u16),
}

/// Opaque signed-transaction decoder collaborator
///
/// The `AddGatewayV1` wire format is owned by the signing library; the core
/// only consumes its decoded keys.
#[cfg_attr(test, mockall::automock)]
pub trait TxnDecoder: Send + Sync {
    fn decode(&self, txn: &str) -> Result<DecodedGateway, DecodeError>;
}

/// Remote onboarding record, keyed by gateway public key
///
/// Unknown fields in the payload are tolerated and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingRecord {
    #[serde(rename = "macEth0")]
    pub mac_eth0: String,
}

/// Onboarding-record service collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait OnboardingClient: Send + Sync {
    async fn record(&self, gateway_b58: &str) -> Result<OnboardingRecord, ResolutionError>;
}

/// Onboarding client over the HTTP service: `GET {base}/onboarding/{key}`
pub struct HttpOnboardingClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpOnboardingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::agent(),
        }
    }
}

#[async_trait::async_trait]
impl OnboardingClient for HttpOnboardingClient {
    async fn record(&self, gateway_b58: &str) -> Result<OnboardingRecord, ResolutionError> {
        let url = format!(
            "{}/onboarding/{}",
            self.base_url.trim_end_matches('/'),
            gateway_b58
        );
        let agent = self.agent.clone();

        // ureq is blocking; keep it off the control thread
        let response = tokio::task::spawn_blocking(move || agent.get(&url).call())
            .await
            .map_err(|e| ResolutionError::Network(e.to_string()))?;

        match response {
            Ok(resp) => resp
                .into_json::<OnboardingRecord>()
                .map_err(|e| ResolutionError::Network(e.to_string())),
            Err(ureq::Error::Status(404, _)) => Err(ResolutionError::NotFound),
            Err(ureq::Error::Status(code, _)) => Err(ResolutionError::Status(code)),
            Err(e) => Err(ResolutionError::Network(e.to_string())),
        }
    }
}

/// Whether a resolution result reached the record it was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The result was applied; the updated record attached
    Applied(AddGatewayTxn),
    /// A newer decode replaced the record first; result discarded
    Stale,
}

struct Tracked {
    generation: u64,
    txn: AddGatewayTxn,
}

/// Decodes add-gateway transactions and resolves their device identity
pub struct GatewayTransactionResolver<D: TxnDecoder, C: OnboardingClient> {
    decoder: D,
    client: C,
    current: Mutex<Option<Tracked>>,
    generation: AtomicU64,
}

impl<D: TxnDecoder, C: OnboardingClient> GatewayTransactionResolver<D, C> {
    pub fn new(decoder: D, client: C) -> Self {
        Self {
            decoder,
            client,
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Decode a signed transaction string, replacing any previous record
    ///
    /// Returns the generation identifying this decode; pass it to
    /// [`resolve`](Self::resolve). A malformed string propagates as
    /// [`DecodeError`] and leaves the previous record in place.
    pub fn decode(&self, txn_str: &str) -> Result<u64, DecodeError> {
        Ok(self.decode_inner(txn_str)?.0)
    }

    fn decode_inner(&self, txn_str: &str) -> Result<(u64, AddGatewayTxn), DecodeError> {
        let decoded = self.decoder.decode(txn_str)?;

        for (field, key) in [
            ("gateway", &decoded.gateway_b58),
            ("owner", &decoded.owner_b58),
        ] {
            bs58::decode(key).into_vec().map_err(|_| {
                DecodeError::MalformedTransaction(format!("{field} key is not base58"))
            })?;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let txn = AddGatewayTxn {
            gateway_b58: decoded.gateway_b58,
            owner_b58: decoded.owner_b58,
            mac_address: None,
            resolution: ResolutionState::Pending,
        };
        info!(generation, gateway = %txn.gateway_b58, "transaction decoded");
        *self.current.lock() = Some(Tracked {
            generation,
            txn: txn.clone(),
        });
        Ok((generation, txn))
    }

    /// The record visible to the confirmation screen
    pub fn current(&self) -> Option<AddGatewayTxn> {
        self.current.lock().as_ref().map(|t| t.txn.clone())
    }

    /// Look up the MAC address for the decode identified by `generation`
    ///
    /// The result is applied only if that decode is still the latest and
    /// still pending; otherwise it is discarded. Lookup failure marks the
    /// record `Failed` and is not an error to the caller.
    pub async fn resolve(&self, generation: u64) -> ResolveOutcome {
        let gateway_b58 = {
            let guard = self.current.lock();
            match guard.as_ref() {
                Some(t) if t.generation == generation => t.txn.gateway_b58.clone(),
                _ => return ResolveOutcome::Stale,
            }
        };

        let result = self.client.record(&gateway_b58).await;

        let mut guard = self.current.lock();
        let tracked = match guard.as_mut() {
            Some(t) if t.generation == generation => t,
            _ => {
                debug!(generation, "resolution superseded by newer decode");
                return ResolveOutcome::Stale;
            }
        };
        if tracked.txn.resolution != ResolutionState::Pending {
            return ResolveOutcome::Stale;
        }

        match result {
            Ok(record) => {
                debug!(generation, mac = %record.mac_eth0, "mac resolved");
                tracked.txn.mac_address = Some(record.mac_eth0);
                tracked.txn.resolution = ResolutionState::Resolved;
            }
            Err(e) => {
                warn!(generation, error = %e, "mac resolution failed");
                tracked.txn.resolution = ResolutionState::Failed;
            }
        }
        ResolveOutcome::Applied(tracked.txn.clone())
    }

    /// Decode and immediately resolve; the common single-screen path
    ///
    /// Returns the record of this decode even if another decode replaces it
    /// while the lookup is in flight; in that case the lookup result itself
    /// is discarded and the record comes back still `Pending`.
    pub async fn decode_and_resolve(&self, txn_str: &str) -> Result<AddGatewayTxn, DecodeError> {
        let (generation, pending) = self.decode_inner(txn_str)?;
        match self.resolve(generation).await {
            ResolveOutcome::Applied(txn) => Ok(txn),
            ResolveOutcome::Stale => Ok(pending),
        }
    }
}
