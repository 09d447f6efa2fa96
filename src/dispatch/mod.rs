//! Dispatch orchestration
//!
//! Drives an [`ActionRequest`] across its resolved devices. Each device runs
//! its own small state machine:
//!
//! ```text
//! Pending → PowerSet → (BrightnessSet) → (ColorSet) → Done | Failed
//! ```
//!
//! Brightness and color only follow a successful power step when turning
//! lights on. A failure on one device never stops the others.

mod outcome;

use std::num::NonZeroU32;
use std::sync::Arc;

use futures::StreamExt;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};

pub use outcome::{DispatchOutcome, StepOutcome};

use crate::config::DispatchConfig;
use crate::devices::{Capability, Device, PowerState, ResolvedTargets};
use crate::intent::ParsedAction;
use crate::transport::Transports;

type Pacer = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A light command ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub power: PowerState,
    pub targets: ResolvedTargets,
    pub brightness: Option<u8>,
    pub color_temp_k: Option<u32>,
    /// RGB color, used only when no color temperature is set
    pub color_rgb: Option<u32>,
}

impl ActionRequest {
    /// Combine an extracted action with its resolved targets
    #[must_use]
    pub fn new(action: &ParsedAction, targets: ResolvedTargets) -> Self {
        Self {
            power: action.power,
            targets,
            brightness: action.brightness,
            color_temp_k: action.color_temp_k,
            color_rgb: None,
        }
    }

    /// Capability steps applied to every target, in order
    ///
    /// Brightness and color are dropped entirely when turning off. Color
    /// temperature and RGB are alternative modes; temperature wins.
    #[must_use]
    pub fn steps(&self) -> Vec<Capability> {
        let mut steps = vec![Capability::Power(self.power)];
        if self.power.is_on() {
            steps.extend(self.brightness.map(Capability::Brightness));
            steps.extend(match (self.color_temp_k, self.color_rgb) {
                (Some(kelvin), _) => Some(Capability::ColorTemperature(kelvin)),
                (None, rgb) => rgb.map(Capability::ColorRgb),
            });
        }
        steps
    }
}

/// Sends action requests through the transport adapters
#[derive(Debug, Clone)]
pub struct Dispatcher {
    transports: Transports,
    config: DispatchConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(transports: Transports, config: DispatchConfig) -> Self {
        Self { transports, config }
    }

    /// Dispatch a request to every resolved target
    ///
    /// Never fails: per-step errors are recorded in the outcome.
    pub async fn dispatch(&self, request: &ActionRequest) -> DispatchOutcome {
        let steps = request.steps();
        let pacer = if request.targets.expanded_all {
            self.pacer().map(Arc::new)
        } else {
            None
        };

        tracing::info!(
            power = %request.power,
            targets = request.targets.len(),
            paced = pacer.is_some(),
            "dispatching light command"
        );

        // Built up front so the stream holds concrete futures, keeping dispatch Send
        let runs: Vec<_> = request
            .targets
            .iter()
            .map(|device| self.run_device(device, &steps, pacer.clone()))
            .collect();

        let per_device: Vec<Vec<StepOutcome>> = futures::stream::iter(runs)
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let outcome = DispatchOutcome {
            power: request.power,
            brightness: request.brightness.filter(|_| request.power.is_on()),
            color_temp_k: request.color_temp_k.filter(|_| request.power.is_on()),
            color_rgb: request
                .color_rgb
                .filter(|_| request.power.is_on() && request.color_temp_k.is_none()),
            expanded_all: request.targets.expanded_all,
            target_count: request.targets.len(),
            unrecognized: request.targets.unrecognized.clone(),
            steps: per_device.into_iter().flatten().collect(),
        };

        if outcome.overall_success() {
            tracing::info!(steps = outcome.steps.len(), "dispatch complete");
        } else {
            tracing::warn!(failed = ?outcome.failed_devices(), "dispatch completed with failures");
        }

        outcome
    }

    fn pacer(&self) -> Option<Pacer> {
        if self.config.pacing.is_zero() {
            return None;
        }
        Quota::with_period(self.config.pacing)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)))
    }

    async fn run_device(
        &self,
        device: &Device,
        steps: &[Capability],
        pacer: Option<Arc<Pacer>>,
    ) -> Vec<StepOutcome> {
        let transport = self.transports.for_device(device);
        let mut outcomes = Vec::with_capacity(steps.len());

        for &capability in steps {
            if let Some(pacer) = &pacer {
                pacer.until_ready().await;
            }

            let result = tokio::time::timeout(
                self.config.step_timeout,
                transport.apply(device, capability),
            )
            .await;

            let error = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("timed out after {:?}", self.config.step_timeout)),
            };
            let failed = error.is_some();

            outcomes.push(StepOutcome {
                device: device.name.clone(),
                transport: device.transport,
                capability,
                success: !failed,
                error,
            });

            if failed && matches!(capability, Capability::Power(_)) {
                tracing::debug!(device = %device.name, "power step failed, skipping remaining steps");
                break;
            }
        }

        outcomes
    }
}
