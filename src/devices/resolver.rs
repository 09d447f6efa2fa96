//! Target resolution from free-text device references
//!
//! A target spec is whatever the user or the LLM named: `"ALL"`, a canonical
//! device name, an alias, a group, a comma-separated list of those, or a
//! near-miss that only partially matches a registered name.

use super::registry::{DeviceRegistry, normalize_name};
use super::types::Device;

/// Token that expands to every registered device
const ALL_TOKEN: &str = "ALL";

/// Concrete devices a target spec resolved to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTargets {
    /// Devices in resolution order; duplicates are kept
    pub devices: Vec<Device>,
    /// Whether any segment expanded to every registered device
    pub expanded_all: bool,
    /// Segments that matched nothing
    pub unrecognized: Vec<String>,
}

impl ResolvedTargets {
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }
}

/// Resolve a target spec against the registry
///
/// Unrecognized or ambiguous segments resolve to nothing; this is logged
/// and reported, never an error.
#[must_use]
pub fn resolve(spec: &str, registry: &DeviceRegistry) -> ResolvedTargets {
    let mut resolved = ResolvedTargets::default();

    for segment in spec.split(',') {
        let segment = normalize_name(segment);
        if segment.is_empty() {
            continue;
        }

        if let Some(device) = registry.get(&segment).or_else(|| registry.alias(&segment)) {
            resolved.devices.push(device.clone());
            continue;
        }

        if let Some(members) = registry.group(&segment) {
            resolved.devices.extend(members.into_iter().cloned());
            continue;
        }

        // Registered names win over the token, so "SMALL LAMP" stays one device
        if segment.contains(ALL_TOKEN) {
            resolved.expanded_all = true;
            resolved.devices.extend(registry.devices().iter().cloned());
            continue;
        }

        match partial_match(&segment, registry) {
            Some(device) => {
                tracing::debug!(requested = %segment, device = %device.name, "resolved by partial match");
                resolved.devices.push(device.clone());
            }
            None => {
                tracing::warn!(requested = %segment, "unrecognized device target");
                resolved.unrecognized.push(segment);
            }
        }
    }

    resolved
}

/// Unique substring containment in either direction
fn partial_match<'a>(segment: &str, registry: &'a DeviceRegistry) -> Option<&'a Device> {
    let mut candidates = registry
        .devices()
        .iter()
        .filter(|d| d.name.contains(segment) || segment.contains(d.name.as_str()));

    let first = candidates.next()?;
    if candidates.next().is_some() {
        tracing::debug!(requested = %segment, "ambiguous partial match");
        return None;
    }
    Some(first)
}
