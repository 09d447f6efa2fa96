//! Light registry, target resolution and local-network discovery
//!
//! The registry is built once from configuration and shared read-only.

pub mod discovery;
pub mod registry;
pub mod resolver;
pub mod snapshot;
pub mod types;

pub use discovery::{DiscoveredDevice, scan};
pub use registry::{DeviceRegistry, normalize_name};
pub use resolver::{ResolvedTargets, resolve};
pub use snapshot::Snapshot;
pub use types::{Capability, Device, DeviceState, PowerState, TransportKind};
