//! LAN datagram adapter for the Govee local control protocol
//!
//! Commands are single JSON datagrams sent to the device's control port.
//! There is no acknowledgment: success only means the datagram left the
//! local socket.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::net::UdpSocket;

use super::{Transport, TransportError};
use crate::devices::{Capability, Device, TransportKind};

/// Default device control port
pub const DEFAULT_LAN_PORT: u16 = 4003;

/// Connectionless, unconfirmed adapter
#[derive(Debug, Clone)]
pub struct LanTransport {
    send_timeout: Duration,
}

impl LanTransport {
    #[must_use]
    pub const fn new(send_timeout: Duration) -> Self {
        Self { send_timeout }
    }

    async fn send(&self, addr: SocketAddr, payload: &[u8]) -> Result<(), TransportError> {
        let bind: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let send = async {
            let socket = UdpSocket::bind(bind).await?;
            socket.send_to(payload, addr).await?;
            Ok::<_, std::io::Error>(())
        };

        tokio::time::timeout(self.send_timeout, send)
            .await
            .map_err(|_| TransportError::Timeout(self.send_timeout))??;

        Ok(())
    }
}

#[async_trait]
impl Transport for LanTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Lan
    }

    async fn apply(&self, device: &Device, capability: Capability) -> Result<(), TransportError> {
        let addr = device
            .address
            .ok_or_else(|| TransportError::MissingAddress(device.name.clone()))?;
        let payload = serde_json::to_vec(&lan_message(capability))?;

        tracing::debug!(device = %device.name, %addr, %capability, "lan datagram");

        self.send(addr, &payload).await.inspect_err(|e| {
            tracing::warn!(device = %device.name, %addr, error = %e, "lan send failed");
        })
    }
}

/// Build the protocol message for a capability change
#[must_use]
pub fn lan_message(capability: Capability) -> serde_json::Value {
    match capability {
        Capability::Power(state) => json!({
            "msg": { "cmd": "turn", "data": { "value": u8::from(state.is_on()) } }
        }),
        Capability::Brightness(pct) => json!({
            "msg": { "cmd": "brightness", "data": { "value": pct } }
        }),
        Capability::ColorTemperature(kelvin) => json!({
            "msg": {
                "cmd": "colorwc",
                "data": { "color": { "r": 0, "g": 0, "b": 0 }, "colorTemInKelvin": kelvin }
            }
        }),
        Capability::ColorRgb(rgb) => json!({
            "msg": {
                "cmd": "colorwc",
                "data": {
                    "color": { "r": (rgb >> 16) & 0xFF, "g": (rgb >> 8) & 0xFF, "b": rgb & 0xFF },
                    "colorTemInKelvin": 0
                }
            }
        }),
    }
}
