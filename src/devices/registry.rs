//! Device registry built once from configuration

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use super::types::{Device, TransportKind};
use crate::config::DeviceEntry;

/// Normalize a device, alias, or group name for lookup
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Read-only registry of controllable lights
///
/// Devices keep their configuration order, which is the order used for
/// "ALL" expansion and dispatch.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    aliases: HashMap<String, String>,
    groups: HashMap<String, Vec<String>>,
}

impl DeviceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration entries
    ///
    /// Entries missing an id or sku, and LAN entries without a usable address,
    /// are skipped with a warning.
    #[must_use]
    pub fn from_entries(
        entries: &[DeviceEntry],
        aliases: &HashMap<String, String>,
        groups: &HashMap<String, Vec<String>>,
        default_lan_port: u16,
    ) -> Self {
        let mut registry = Self::new();

        for entry in entries {
            let Some(device) = device_from_entry(entry, default_lan_port) else {
                continue;
            };
            if !registry.insert(device) {
                tracing::warn!(device = %entry.name, "duplicate device name, keeping first entry");
            }
        }

        for (alias, target) in aliases {
            registry.add_alias(alias, target);
        }
        for (group, members) in groups {
            registry.add_group(group, members);
        }

        tracing::info!(devices = registry.len(), "device registry loaded");
        registry
    }

    /// Insert a device; returns false if the name is empty or already registered
    pub fn insert(&mut self, mut device: Device) -> bool {
        device.name = normalize_name(&device.name);
        if device.name.is_empty() || self.get(&device.name).is_some() {
            return false;
        }
        self.devices.push(device);
        true
    }

    /// Register an alias for a device; unknown targets are ignored
    pub fn add_alias(&mut self, alias: &str, target: &str) {
        let target = normalize_name(target);
        if self.get(&target).is_none() {
            tracing::warn!(alias, target = %target, "alias points at unknown device, ignoring");
            return;
        }
        self.aliases.insert(normalize_name(alias), target);
    }

    /// Register a named group of devices; unknown members are dropped
    pub fn add_group(&mut self, group: &str, members: &[String]) {
        let members: Vec<String> = members
            .iter()
            .map(|m| normalize_name(m))
            .filter(|m| {
                let known = self.get(m).is_some();
                if !known {
                    tracing::warn!(group, member = %m, "group member is not a registered device");
                }
                known
            })
            .collect();
        self.groups.insert(normalize_name(group), members);
    }

    /// Builder-style alias registration
    #[must_use]
    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        self.add_alias(alias, target);
        self
    }

    /// Builder-style group registration
    #[must_use]
    pub fn with_group(mut self, group: &str, members: &[&str]) -> Self {
        let members: Vec<String> = members.iter().map(ToString::to_string).collect();
        self.add_group(group, &members);
        self
    }

    /// Look up a device by canonical name (case-insensitive)
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Device> {
        let name = normalize_name(name);
        self.devices.iter().find(|d| d.name == name)
    }

    /// Look up the device an alias points at
    #[must_use]
    pub fn alias(&self, alias: &str) -> Option<&Device> {
        self.aliases
            .get(&normalize_name(alias))
            .and_then(|name| self.get(name))
    }

    /// Look up the members of a group
    #[must_use]
    pub fn group(&self, group: &str) -> Option<Vec<&Device>> {
        self.groups
            .get(&normalize_name(group))
            .map(|members| members.iter().filter_map(|m| self.get(m)).collect())
    }

    /// All devices in registration order
    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Canonical names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.name.as_str()).collect()
    }

    /// Number of devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn device_from_entry(entry: &DeviceEntry, default_lan_port: u16) -> Option<Device> {
    let id = entry.id.as_deref().map(str::trim).unwrap_or_default();
    let sku = entry.sku.as_deref().map(str::trim).unwrap_or_default();

    if normalize_name(&entry.name).is_empty() {
        tracing::warn!(id, "skipping device: missing name");
        return None;
    }
    if id.is_empty() || sku.is_empty() {
        tracing::warn!(device = %entry.name, "skipping device: missing id or sku");
        return None;
    }

    let address = match entry.transport {
        TransportKind::Cloud => None,
        TransportKind::Lan => {
            let Some(raw) = entry.address.as_deref() else {
                tracing::warn!(device = %entry.name, "skipping LAN device: missing address");
                return None;
            };
            let Some(addr) = parse_lan_address(raw, default_lan_port) else {
                tracing::warn!(device = %entry.name, address = raw, "skipping LAN device: invalid address");
                return None;
            };
            Some(addr)
        }
    };

    Some(Device {
        name: normalize_name(&entry.name),
        id: id.to_string(),
        sku: sku.to_string(),
        transport: entry.transport,
        address,
    })
}

/// Parse "ip" or "ip:port", filling in the default control port
fn parse_lan_address(raw: &str, default_port: u16) -> Option<SocketAddr> {
    let raw = raw.trim();
    raw.parse::<SocketAddr>()
        .ok()
        .or_else(|| raw.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, default_port)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: Option<&str>, sku: Option<&str>) -> DeviceEntry {
        DeviceEntry {
            name: name.to_string(),
            id: id.map(ToString::to_string),
            sku: sku.map(ToString::to_string),
            transport: TransportKind::Cloud,
            address: None,
        }
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name("  kitchen   light 1 "), "KITCHEN LIGHT 1");
    }

    #[test]
    fn skips_entries_missing_id_or_sku() {
        let entries = vec![
            entry("Kitchen Light 1", Some("AA:BB"), Some("H6008")),
            entry("Kitchen Light 2", None, Some("H6008")),
            entry("Standing Lamp", Some("CC:DD"), Some("  ")),
        ];
        let registry = DeviceRegistry::from_entries(&entries, &HashMap::new(), &HashMap::new(), 4003);

        assert_eq!(registry.names(), vec!["KITCHEN LIGHT 1"]);
    }

    #[test]
    fn skips_nameless_entries() {
        let entries = vec![
            entry("   ", Some("00:00"), Some("H6008")),
            entry("Kitchen Light 1", Some("AA:BB"), Some("H6008")),
            entry("Standing Lamp", Some("CC:DD"), Some("H6008")),
        ];
        let registry = DeviceRegistry::from_entries(&entries, &HashMap::new(), &HashMap::new(), 4003);

        assert_eq!(registry.names(), vec!["KITCHEN LIGHT 1", "STANDING LAMP"]);

        // A blank name would otherwise partially match every target
        let targets = crate::devices::resolve("standing", &registry);
        assert_eq!(targets.devices[0].name, "STANDING LAMP");
        assert!(crate::devices::resolve("garage", &registry).is_empty());
    }

    #[test]
    fn insert_rejects_blank_name() {
        let mut registry = DeviceRegistry::new();
        let accepted = registry.insert(Device {
            name: " ".to_string(),
            id: "00:00".to_string(),
            sku: "H6008".to_string(),
            transport: TransportKind::Cloud,
            address: None,
        });

        assert!(!accepted);
        assert!(registry.is_empty());
    }

    #[test]
    fn lan_entries_need_an_address() {
        let mut with_addr = entry("Ceiling Light", Some("EE:FF"), Some("H60A1"));
        with_addr.transport = TransportKind::Lan;
        with_addr.address = Some("192.168.1.187".to_string());

        let mut without_addr = entry("Desk Light", Some("11:22"), Some("H60A1"));
        without_addr.transport = TransportKind::Lan;

        let registry = DeviceRegistry::from_entries(
            &[with_addr, without_addr],
            &HashMap::new(),
            &HashMap::new(),
            4003,
        );

        assert_eq!(registry.len(), 1);
        let ceiling = registry.get("ceiling light").unwrap();
        assert_eq!(ceiling.address, Some("192.168.1.187:4003".parse().unwrap()));
    }

    #[test]
    fn explicit_port_is_kept() {
        assert_eq!(
            parse_lan_address("10.0.0.5:5000", 4003),
            Some("10.0.0.5:5000".parse().unwrap())
        );
        assert_eq!(parse_lan_address("not-an-ip", 4003), None);
    }

    #[test]
    fn duplicate_names_keep_first() {
        let entries = vec![
            entry("Lamp", Some("first"), Some("H6008")),
            entry("LAMP", Some("second"), Some("H6008")),
        ];
        let registry = DeviceRegistry::from_entries(&entries, &HashMap::new(), &HashMap::new(), 4003);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("lamp").unwrap().id, "first");
    }

    #[test]
    fn aliases_and_groups_ignore_unknown_devices() {
        let entries = vec![
            entry("Kitchen Light 1", Some("a"), Some("H6008")),
            entry("Kitchen Light 2", Some("b"), Some("H6008")),
        ];
        let registry = DeviceRegistry::from_entries(&entries, &HashMap::new(), &HashMap::new(), 4003)
            .with_alias("stove", "kitchen light 1")
            .with_alias("garage", "garage light")
            .with_group("kitchen", &["kitchen light 1", "kitchen light 2", "pantry"]);

        assert_eq!(registry.alias("Stove").unwrap().name, "KITCHEN LIGHT 1");
        assert!(registry.alias("garage").is_none());
        assert_eq!(registry.group("KITCHEN").unwrap().len(), 2);
    }
}
