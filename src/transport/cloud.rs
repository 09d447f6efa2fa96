//! Cloud REST adapter for the Govee developer API

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{Transport, TransportError};
use crate::config::CloudConfig;
use crate::devices::{Capability, Device, DeviceState, PowerState, TransportKind};

/// Default base URL of the Govee developer API
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://openapi.api.govee.com";

/// Response code the API uses for success
const SUCCESS_CODE: i64 = 200;

/// Cloud request/response adapter
#[derive(Debug, Clone)]
pub struct CloudTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ControlRequest<'a> {
    request_id: String,
    payload: ControlPayload<'a>,
}

#[derive(Debug, Serialize)]
struct ControlPayload<'a> {
    sku: &'a str,
    device: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    capability: Option<CapabilityBody>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct CapabilityBody {
    #[serde(rename = "type")]
    kind: &'static str,
    instance: &'static str,
    value: u32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default, alias = "msg")]
    message: Option<String>,
    #[serde(default)]
    payload: Option<StatePayload>,
}

#[derive(Debug, Deserialize)]
struct StatePayload {
    #[serde(default)]
    capabilities: Vec<StateCapability>,
}

#[derive(Debug, Deserialize)]
struct StateCapability {
    instance: String,
    #[serde(default)]
    state: Option<StateValue>,
}

#[derive(Debug, Deserialize)]
struct StateValue {
    #[serde(default)]
    value: serde_json::Value,
}

impl CloudTransport {
    /// Create a cloud adapter
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Hearth-Gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a cloud adapter from configuration
    ///
    /// Without an API key the adapter is still built; the service rejects
    /// every request, which surfaces as a per-device failure.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &CloudConfig) -> Result<Self, TransportError> {
        let api_key = config.api_key.clone().unwrap_or_else(|| {
            tracing::warn!("GOVEE_API_KEY not set; cloud devices will fail");
            SecretString::from(String::new())
        });
        Self::new(&config.base_url, api_key, config.timeout)
    }

    /// Query the current capability state of a device
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API reports a failure code
    pub async fn query_state(&self, device: &Device) -> Result<DeviceState, TransportError> {
        let request = ControlRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            payload: ControlPayload {
                sku: &device.sku,
                device: &device.id,
                capability: None,
            },
        };

        let response = self.post("/router/api/v1/device/state", &request).await?;
        let capabilities = response.payload.map(|p| p.capabilities).unwrap_or_default();

        Ok(state_from_capabilities(&capabilities))
    }

    async fn post(
        &self,
        path: &str,
        body: &ControlRequest<'_>,
    ) -> Result<ApiResponse, TransportError> {
        let response: ApiResponse = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Govee-API-Key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if response.code == SUCCESS_CODE {
            Ok(response)
        } else {
            Err(TransportError::Rejected {
                code: response.code,
                message: response.message.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl Transport for CloudTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Cloud
    }

    async fn apply(&self, device: &Device, capability: Capability) -> Result<(), TransportError> {
        let request = ControlRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            payload: ControlPayload {
                sku: &device.sku,
                device: &device.id,
                capability: Some(capability_body(capability)),
            },
        };

        tracing::debug!(device = %device.name, %capability, "cloud control request");

        match self.post("/router/api/v1/device/control", &request).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(device = %device.name, %capability, error = %e, "cloud control failed");
                Err(e)
            }
        }
    }
}

fn capability_body(capability: Capability) -> CapabilityBody {
    match capability {
        Capability::Power(state) => CapabilityBody {
            kind: "devices.capabilities.on_off",
            instance: "powerSwitch",
            value: u32::from(state.is_on()),
        },
        Capability::Brightness(pct) => CapabilityBody {
            kind: "devices.capabilities.range",
            instance: "brightness",
            value: u32::from(pct),
        },
        Capability::ColorTemperature(kelvin) => CapabilityBody {
            kind: "devices.capabilities.color_setting",
            instance: "colorTemperatureK",
            value: kelvin,
        },
        Capability::ColorRgb(rgb) => CapabilityBody {
            kind: "devices.capabilities.color_setting",
            instance: "colorRgb",
            value: rgb,
        },
    }
}

fn state_from_capabilities(capabilities: &[StateCapability]) -> DeviceState {
    let mut state = DeviceState::default();

    for cap in capabilities {
        let Some(value) = cap.state.as_ref().and_then(|s| s.value.as_u64()) else {
            continue;
        };
        match cap.instance.as_str() {
            "powerSwitch" => {
                state.power = Some(if value == 1 { PowerState::On } else { PowerState::Off });
            }
            "brightness" => state.brightness = u8::try_from(value).ok(),
            "colorRgb" => state.color_rgb = u32::try_from(value).ok(),
            "colorTemperatureK" => {
                state.color_temp_k = u32::try_from(value).ok().filter(|k| *k > 0);
            }
            _ => {}
        }
    }

    state
}
