//! Device and capability types

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Physical control path used to reach a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Vendor cloud REST API (request/response)
    Cloud,
    /// Local-network UDP datagrams (fire-and-forget)
    Lan,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloud => f.write_str("cloud"),
            Self::Lan => f.write_str("lan"),
        }
    }
}

/// A registered light
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Canonical upper-cased name (e.g. "KITCHEN LIGHT 1")
    pub name: String,
    /// Vendor device identifier (MAC-like string)
    pub id: String,
    /// Vendor model identifier (e.g. "H6008")
    pub sku: String,
    /// Transport used to control this device
    pub transport: TransportKind,
    /// Local address, required for LAN devices
    pub address: Option<SocketAddr>,
}

/// Requested power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// Parse an LLM-provided action word; anything other than "ON" is `Off`
    #[must_use]
    pub fn from_action(action: &str) -> Self {
        if action.trim().eq_ignore_ascii_case("on") {
            Self::On
        } else {
            Self::Off
        }
    }

    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
        }
    }
}

/// A controllable attribute of a light together with its target value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "capability", content = "value", rename_all = "snake_case")]
pub enum Capability {
    /// Power switch
    Power(PowerState),
    /// Brightness percentage, 1..=100
    Brightness(u8),
    /// White color temperature in Kelvin
    ColorTemperature(u32),
    /// RGB color packed as 0xRRGGBB
    ColorRgb(u32),
}

impl Capability {
    /// Short label used in logs and status text
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Power(_) => "power",
            Self::Brightness(_) => "brightness",
            Self::ColorTemperature(_) => "color temperature",
            Self::ColorRgb(_) => "color",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Power(state) => write!(f, "power {state}"),
            Self::Brightness(pct) => write!(f, "brightness {pct}%"),
            Self::ColorTemperature(k) => write!(f, "color temperature {k}K"),
            Self::ColorRgb(rgb) => write!(f, "color #{rgb:06X}"),
        }
    }
}

/// Last known state of a device as reported by the cloud API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub power: Option<PowerState>,
    pub brightness: Option<u8>,
    pub color_rgb: Option<u32>,
    pub color_temp_k: Option<u32>,
}
