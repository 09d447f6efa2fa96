//! Registered device listing

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::devices::{Device, TransportKind};

/// A registered light as exposed over the API
#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub sku: String,
    pub transport: TransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<&Device> for DeviceInfo {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            sku: device.sku.clone(),
            transport: device.transport,
            address: device.address.map(|a| a.to_string()),
        }
    }
}

/// Response for listing devices
#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceInfo>,
    pub count: usize,
}

async fn list_devices(State(state): State<Arc<ApiState>>) -> Json<DeviceListResponse> {
    let devices: Vec<DeviceInfo> = state
        .assistant
        .registry()
        .devices()
        .iter()
        .map(DeviceInfo::from)
        .collect();

    Json(DeviceListResponse {
        count: devices.len(),
        devices,
    })
}

/// Build the device listing router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/devices", get(list_devices))
        .with_state(state)
}
