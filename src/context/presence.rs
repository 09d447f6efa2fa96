//! Phone-based presence detection
//!
//! The user counts as home when their phone is reachable on the local
//! network. The tailnet peer list is checked first (a peer whose current
//! address is on the LAN), then a single ARP probe to the phone's static IP.

use std::collections::HashMap;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::ContextSource;
use crate::config::PresenceConfig;
use crate::{Error, Result};

pub const AT_HOME: &str = "At Home";
pub const AWAY: &str = "Away";

/// Checks whether the user's phone is at home
#[derive(Debug, Clone)]
pub struct PresenceProbe {
    phone_name: Option<String>,
    phone_ip: Option<String>,
    lan_prefix: String,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct TailscaleStatus {
    #[serde(rename = "Peer", default)]
    peers: HashMap<String, TailscalePeer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TailscalePeer {
    #[serde(rename = "DNSName", default)]
    dns_name: String,
    #[serde(default)]
    online: bool,
    #[serde(default)]
    cur_addr: String,
}

impl PresenceProbe {
    #[must_use]
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            phone_name: config.phone_name.clone().filter(|n| !n.is_empty()),
            phone_ip: config.phone_ip.clone().filter(|ip| !ip.is_empty()),
            lan_prefix: config.lan_prefix.clone(),
            timeout: config.timeout,
        }
    }

    /// Whether the phone is on the home network
    ///
    /// Missing tools or failed probes count as away.
    pub async fn is_home(&self) -> bool {
        if let Some(name) = &self.phone_name {
            match self.tailscale_status().await {
                Ok(status) => {
                    if peer_is_local(&status, name, &self.lan_prefix) {
                        tracing::info!(phone = %name, "home via tailnet local address");
                        return true;
                    }
                    tracing::debug!(phone = %name, "phone not local on tailnet");
                }
                Err(e) => tracing::debug!(error = %e, "tailnet check unavailable"),
            }
        }

        if let Some(ip) = &self.phone_ip {
            match self.run("arping", &["-c", "1", "-w", "1", ip]).await {
                Ok(output) if output.status.success() => {
                    tracing::info!(%ip, "home via arp probe");
                    return true;
                }
                Ok(_) => tracing::debug!(%ip, "arp probe got no reply"),
                Err(e) => tracing::debug!(error = %e, "arp probe unavailable"),
            }
        }

        tracing::info!("user appears to be away");
        false
    }

    async fn tailscale_status(&self) -> Result<TailscaleStatus> {
        let output = self.run("tailscale", &["status", "--json"]).await?;
        if !output.status.success() {
            return Err(Error::Context(format!(
                "tailscale exited with code {}",
                output.status.code().unwrap_or(-1)
            )));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        let path = which::which(program)
            .map_err(|e| Error::Context(format!("{program} not found: {e}")))?;

        tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(path)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::Context(format!("{program} timed out after {:?}", self.timeout)))?
        .map_err(Error::Io)
    }
}

#[async_trait]
impl ContextSource for PresenceProbe {
    fn name(&self) -> &'static str {
        "presence"
    }

    async fn query(&self) -> Result<String> {
        Ok(if self.is_home().await { AT_HOME } else { AWAY }.to_string())
    }
}

fn peer_is_local(status: &TailscaleStatus, phone_name: &str, lan_prefix: &str) -> bool {
    let phone_name = phone_name.to_lowercase();
    status.peers.values().any(|peer| {
        peer.dns_name.to_lowercase().contains(&phone_name)
            && peer.online
            && peer.cur_addr.starts_with(lan_prefix)
    })
}
