//! Aggregated dispatch results

use std::fmt::Write as _;

use serde::Serialize;

use crate::devices::{Capability, PowerState, TransportKind};

/// Result of one capability step on one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub device: String,
    pub transport: TransportKind,
    pub capability: Capability,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every step attempted for a request, in target order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub power: PowerState,
    pub brightness: Option<u8>,
    pub color_temp_k: Option<u32>,
    pub color_rgb: Option<u32>,
    /// Targets came from an "ALL" expansion
    pub expanded_all: bool,
    pub target_count: usize,
    /// Target segments that matched nothing
    pub unrecognized: Vec<String>,
    pub steps: Vec<StepOutcome>,
}

impl DispatchOutcome {
    /// True when every attempted step succeeded (vacuously true with no targets)
    #[must_use]
    pub fn overall_success(&self) -> bool {
        self.steps.iter().all(|s| s.success)
    }

    /// Whether any device was actually contacted
    #[must_use]
    pub fn action_taken(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Devices with at least one failed step, in first-seen order
    #[must_use]
    pub fn failed_devices(&self) -> Vec<&str> {
        let mut failed: Vec<&str> = Vec::new();
        for step in self.steps.iter().filter(|s| !s.success) {
            if !failed.contains(&step.device.as_str()) {
                failed.push(&step.device);
            }
        }
        failed
    }

    /// Devices whose steps all succeeded, in first-seen order
    #[must_use]
    pub fn succeeded_devices(&self) -> Vec<&str> {
        let failed = self.failed_devices();
        let mut succeeded: Vec<&str> = Vec::new();
        for step in &self.steps {
            let name = step.device.as_str();
            if !failed.contains(&name) && !succeeded.contains(&name) {
                succeeded.push(name);
            }
        }
        succeeded
    }

    /// First recorded error for a device
    fn first_error(&self, device: &str) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| s.device == device && !s.success)
            .and_then(|s| s.error.as_deref())
    }

    /// Status line fed to the response synthesizer
    #[must_use]
    pub fn summary(&self) -> String {
        if self.target_count == 0 {
            return if self.unrecognized.is_empty() {
                "No matching lights found".to_string()
            } else {
                format!("No matching lights found for '{}'", self.unrecognized.join(", "))
            };
        }

        let succeeded = self.succeeded_devices();
        let failed = self.failed_devices();
        let settings = self.settings();

        let mut summary = if failed.is_empty() {
            let who = if self.expanded_all && self.unrecognized.is_empty() {
                "ALL".to_string()
            } else {
                succeeded.join(", ")
            };
            format!("SUCCESS: {who} turned {}{settings}", self.power)
        } else if succeeded.is_empty() {
            format!(
                "FAILURE: could not turn {} {}",
                self.power,
                self.describe_failures(&failed)
            )
        } else {
            format!(
                "PARTIAL FAILURE: {} turned {}{settings}; failed: {}",
                succeeded.join(", "),
                self.power,
                self.describe_failures(&failed)
            )
        };

        if !self.unrecognized.is_empty() {
            let _ = write!(summary, " (no match for '{}')", self.unrecognized.join(", "));
        }
        summary
    }

    fn settings(&self) -> String {
        let mut out = String::new();
        if let Some(pct) = self.brightness {
            let _ = write!(out, " at {pct}% brightness");
        }
        if let Some(kelvin) = self.color_temp_k {
            let _ = write!(out, " with color temperature {kelvin}K");
        }
        if let Some(rgb) = self.color_rgb {
            let _ = write!(out, " with color #{rgb:06X}");
        }
        out
    }

    fn describe_failures(&self, failed: &[&str]) -> String {
        failed
            .iter()
            .map(|device| match self.first_error(device) {
                Some(error) => format!("{device} ({error})"),
                None => (*device).to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
