//! Device transport adapters
//!
//! Both adapters implement [`Transport`], so the dispatcher can drive a
//! mixed batch of cloud and LAN lights through one contract. Failures come
//! back as [`TransportError`] values and are folded into the dispatch outcome.

mod cloud;
mod lan;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use cloud::{CloudTransport, DEFAULT_CLOUD_BASE_URL};
pub use lan::{DEFAULT_LAN_PORT, LanTransport, lan_message};

use crate::devices::{Capability, Device, TransportKind};

/// Failure to deliver a capability change to a device
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// LAN device has no address to send to
    #[error("device {0} has no LAN address")]
    MissingAddress(String),

    /// Remote API answered with a non-success code
    #[error("rejected with code {code}: {message}")]
    Rejected { code: i64, message: String },

    /// Send did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Local socket error
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload encoding error
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sends one capability change to one device
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which devices this adapter serves
    fn kind(&self) -> TransportKind;

    /// Apply a capability value to a device
    ///
    /// # Errors
    ///
    /// Returns error if the change could not be delivered (or, for request/response
    /// transports, was not acknowledged as successful)
    async fn apply(&self, device: &Device, capability: Capability) -> Result<(), TransportError>;
}

/// The pair of adapters a dispatcher routes between
#[derive(Clone)]
pub struct Transports {
    cloud: Arc<dyn Transport>,
    lan: Arc<dyn Transport>,
}

impl Transports {
    #[must_use]
    pub fn new(cloud: Arc<dyn Transport>, lan: Arc<dyn Transport>) -> Self {
        Self { cloud, lan }
    }

    /// Adapter responsible for the given device
    #[must_use]
    pub fn for_device(&self, device: &Device) -> &Arc<dyn Transport> {
        self.for_kind(device.transport)
    }

    /// Adapter responsible for a transport kind
    #[must_use]
    pub fn for_kind(&self, kind: TransportKind) -> &Arc<dyn Transport> {
        match kind {
            TransportKind::Cloud => &self.cloud,
            TransportKind::Lan => &self.lan,
        }
    }
}

impl std::fmt::Debug for Transports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transports")
            .field("cloud", &self.cloud.kind())
            .field("lan", &self.lan.kind())
            .finish()
    }
}
