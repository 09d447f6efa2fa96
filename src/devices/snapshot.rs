//! Save and restore the state of cloud-controlled lights

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::DeviceRegistry;
use super::resolver::ResolvedTargets;
use super::types::{DeviceState, TransportKind};
use crate::dispatch::{ActionRequest, DispatchOutcome, Dispatcher};
use crate::transport::CloudTransport;
use crate::{Error, Result};

/// Default snapshot location: `<data dir>/hearth/snapshot.json`
#[must_use]
pub fn default_snapshot_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.data_dir().join("hearth").join("snapshot.json"))
}

/// Device states captured at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    /// Canonical device name → state
    pub devices: BTreeMap<String, DeviceState>,
}

impl Snapshot {
    /// Query every cloud device for its current state
    ///
    /// Devices that fail to answer are left out of the snapshot.
    pub async fn capture(registry: &DeviceRegistry, cloud: &CloudTransport) -> Self {
        let mut devices = BTreeMap::new();

        for device in registry
            .devices()
            .iter()
            .filter(|d| d.transport == TransportKind::Cloud)
        {
            match cloud.query_state(device).await {
                Ok(state) => {
                    devices.insert(device.name.clone(), state);
                }
                Err(e) => {
                    tracing::warn!(device = %device.name, error = %e, "state query failed, skipping");
                }
            }
        }

        Self {
            saved_at: Utc::now(),
            devices,
        }
    }

    /// Write the snapshot as JSON
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        tracing::info!(path = %path.display(), devices = self.devices.len(), "snapshot saved");
        Ok(())
    }

    /// Read a snapshot written by [`Snapshot::save`]
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)
            .map_err(|e| Error::NotFound(format!("snapshot {}: {e}", path.display())))?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Build one request per device that still exists and has a known power state
    #[must_use]
    pub fn restore_requests(&self, registry: &DeviceRegistry) -> Vec<ActionRequest> {
        self.devices
            .iter()
            .filter_map(|(name, state)| {
                let Some(device) = registry.get(name) else {
                    tracing::warn!(device = %name, "snapshot device no longer registered");
                    return None;
                };
                let power = state.power?;
                Some(ActionRequest {
                    power,
                    targets: ResolvedTargets {
                        devices: vec![device.clone()],
                        ..ResolvedTargets::default()
                    },
                    brightness: state.brightness.filter(|b| (1..=100).contains(b)),
                    color_temp_k: state.color_temp_k.filter(|k| *k > 0),
                    color_rgb: state.color_rgb.filter(|_| {
                        state.color_temp_k.is_none_or(|k| k == 0)
                    }),
                })
            })
            .collect()
    }

    /// Re-apply the captured states
    pub async fn restore(
        &self,
        registry: &DeviceRegistry,
        dispatcher: &Dispatcher,
    ) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();
        for request in self.restore_requests(registry) {
            outcomes.push(dispatcher.dispatch(&request).await);
        }
        outcomes
    }
}
