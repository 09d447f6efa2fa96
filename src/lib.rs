//! Hearth Gateway - Voice and text smart-home assistant
//!
//! This library provides the core functionality for the Hearth gateway:
//! - Intent classification and light action extraction via a local LLM
//! - Target resolution over a registry of cloud and LAN lights
//! - Best-effort dispatch with per-device error aggregation
//! - Persona replies enriched with presence, weather and web search
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Front ends                        │
//! │        HTTP (/process)   │   CLI (hearth say)        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Assistant                          │
//! │  Classifier │ Extractor │ Resolver │ Dispatcher     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Transports                          │
//! │      Cloud REST (Govee API)  │  LAN UDP datagrams    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod config;
pub mod context;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod llm;
pub mod transport;

pub use assistant::{Assistant, AssistantBuilder, Reply};
pub use config::Config;
pub use devices::{
    Capability, Device, DeviceRegistry, DeviceState, PowerState, ResolvedTargets, Snapshot,
    TransportKind, resolve,
};
pub use dispatch::{ActionRequest, DispatchOutcome, Dispatcher, StepOutcome};
pub use error::{Error, Result};
pub use intent::{Classification, ExtractError, Extraction, Intent, ParsedAction, extract};
pub use llm::{Completion, CompletionOptions, OllamaClient};
pub use transport::{CloudTransport, LanTransport, Transport, TransportError, Transports};
