//! LAN device discovery
//!
//! Devices with LAN control enabled answer a multicast `scan` request with
//! their IP address, device id and model.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::Result;

/// Multicast group and port devices listen on for scans
pub const MULTICAST_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250)), 4001);

/// Port devices send scan replies to
pub const DEFAULT_LISTEN_PORT: u16 = 4002;

/// A device that answered a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub ip: String,
    pub device: String,
    pub sku: String,
}

#[derive(Debug, Deserialize)]
struct ScanReply {
    msg: ScanReplyMsg,
}

#[derive(Debug, Deserialize)]
struct ScanReplyMsg {
    cmd: String,
    data: DiscoveredDevice,
}

/// Scan the local network for LAN-controllable devices
///
/// # Errors
///
/// Returns error if the listening socket cannot be bound or the scan cannot be sent
pub async fn scan(listen_port: u16, wait: Duration) -> Result<Vec<DiscoveredDevice>> {
    scan_with(
        MULTICAST_ADDR,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), listen_port),
        wait,
    )
    .await
}

/// Send a scan to `target` from a socket bound at `listen`, collecting replies
/// until `wait` elapses
///
/// # Errors
///
/// Returns error if the socket cannot be bound or the scan cannot be sent
pub async fn scan_with(
    target: SocketAddr,
    listen: SocketAddr,
    wait: Duration,
) -> Result<Vec<DiscoveredDevice>> {
    let socket = UdpSocket::bind(listen).await?;
    let request = json!({ "msg": { "cmd": "scan", "data": { "account_topic": "reserve" } } });
    socket.send_to(&serde_json::to_vec(&request)?, target).await?;

    tracing::info!(%target, "sent LAN discovery scan");

    let deadline = Instant::now() + wait;
    let mut found: Vec<DiscoveredDevice> = Vec::new();
    let mut buf = [0u8; 2048];

    loop {
        let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
        let Ok(received) = received else {
            break;
        };
        let (len, from) = received?;

        match parse_scan_reply(&buf[..len]) {
            Some(device) if !found.iter().any(|d| d.device == device.device) => {
                tracing::info!(ip = %device.ip, sku = %device.sku, "discovered LAN device");
                found.push(device);
            }
            Some(_) => {}
            None => tracing::debug!(%from, "ignoring non-scan datagram"),
        }
    }

    Ok(found)
}

/// Parse a scan reply datagram
#[must_use]
pub fn parse_scan_reply(bytes: &[u8]) -> Option<DiscoveredDevice> {
    let reply: ScanReply = serde_json::from_slice(bytes).ok()?;
    (reply.msg.cmd == "scan").then_some(reply.msg.data)
}
