//! Configuration management for Hearth gateway
//!
//! Values resolve in priority order: environment variable → config file → default.

pub mod file;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

pub use file::{DeviceEntry, HearthConfigFile, config_file_path, load_config_file};

use crate::devices::DeviceRegistry;
use crate::transport::{DEFAULT_CLOUD_BASE_URL, DEFAULT_LAN_PORT};
use crate::{Error, Result};

/// Default Ollama generate endpoint
pub const DEFAULT_LLM_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Default local model
pub const DEFAULT_LLM_MODEL: &str = "qwen2.5:3b";

/// Hearth gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub cloud: CloudConfig,
    pub lan: LanConfig,
    pub dispatch: DispatchConfig,
    pub assistant: AssistantConfig,
    pub presence: PresenceConfig,
    pub weather: WeatherConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub devices: Vec<DeviceEntry>,
    pub aliases: HashMap<String, String>,
    pub groups: HashMap<String, Vec<String>>,
}

/// LLM completion service configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

/// Cloud device API configuration
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub base_url: String,
    /// API key (from `GOVEE_API_KEY` env or config file)
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

/// LAN control configuration
#[derive(Debug, Clone)]
pub struct LanConfig {
    pub port: u16,
    pub discovery_port: u16,
    pub send_timeout: Duration,
    pub scan_timeout: Duration,
}

/// Dispatch tuning
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Max devices driven concurrently
    pub max_concurrency: usize,
    /// Minimum spacing between sends when targeting every device
    pub pacing: Duration,
    /// Timeout for a single capability step
    pub step_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            pacing: Duration::from_millis(100),
            step_timeout: Duration::from_secs(10),
        }
    }
}

/// Assistant persona configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub name: String,
    pub style: String,
    /// Conversation lines kept for context
    pub history_turns: usize,
    pub profile_path: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Maya".to_string(),
            style: "Concise".to_string(),
            history_turns: 6,
            profile_path: None,
        }
    }
}

/// Presence detection configuration
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub phone_name: Option<String>,
    pub phone_ip: Option<String>,
    pub lan_prefix: String,
    pub timeout: Duration,
}

/// Weather lookup configuration
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub location: Option<String>,
    pub timeout: Duration,
}

/// Web search configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub provider: String,
    pub api_key: Option<SecretString>,
    pub max_results: usize,
    pub timeout: Duration,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Request budget for the HTTP API; 0 disables limiting
    pub requests_per_minute: u32,
}

impl Config {
    /// Load configuration from an explicit file or the standard path, then
    /// apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => file::load_config_file_from(path)?,
            None => load_config_file(),
        };

        let mut config = Self::from_file(file);
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without consulting the environment
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or values are invalid
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = Self::from_file(file::parse_config_file(content)?);
        config.validate()?;
        Ok(config)
    }

    /// Resolve a parsed file against defaults
    #[must_use]
    pub fn from_file(file: HearthConfigFile) -> Self {
        let dispatch_defaults = DispatchConfig::default();
        let assistant_defaults = AssistantConfig::default();

        Self {
            llm: LlmConfig {
                endpoint: file.llm.endpoint.unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
                model: file.llm.model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                timeout: Duration::from_secs(file.llm.timeout_secs.unwrap_or(60)),
            },
            cloud: CloudConfig {
                base_url: file
                    .cloud
                    .base_url
                    .unwrap_or_else(|| DEFAULT_CLOUD_BASE_URL.to_string()),
                api_key: file.cloud.api_key.map(SecretString::from),
                timeout: Duration::from_secs(file.cloud.timeout_secs.unwrap_or(10)),
            },
            lan: LanConfig {
                port: file.lan.port.unwrap_or(DEFAULT_LAN_PORT),
                discovery_port: file
                    .lan
                    .discovery_port
                    .unwrap_or(crate::devices::discovery::DEFAULT_LISTEN_PORT),
                send_timeout: Duration::from_millis(file.lan.send_timeout_ms.unwrap_or(1000)),
                scan_timeout: Duration::from_secs(file.lan.scan_timeout_secs.unwrap_or(5)),
            },
            dispatch: DispatchConfig {
                max_concurrency: file
                    .dispatch
                    .max_concurrency
                    .unwrap_or(dispatch_defaults.max_concurrency),
                pacing: file
                    .dispatch
                    .pacing_ms
                    .map_or(dispatch_defaults.pacing, Duration::from_millis),
                step_timeout: file
                    .dispatch
                    .step_timeout_secs
                    .map_or(dispatch_defaults.step_timeout, Duration::from_secs),
            },
            assistant: AssistantConfig {
                name: file.assistant.name.unwrap_or(assistant_defaults.name),
                style: file.assistant.style.unwrap_or(assistant_defaults.style),
                history_turns: file
                    .assistant
                    .history_turns
                    .unwrap_or(assistant_defaults.history_turns),
                profile_path: file.assistant.profile_path,
            },
            presence: PresenceConfig {
                phone_name: file.presence.phone_name,
                phone_ip: file.presence.phone_ip,
                lan_prefix: file
                    .presence
                    .lan_prefix
                    .unwrap_or_else(|| "192.168.1.".to_string()),
                timeout: Duration::from_secs(file.presence.timeout_secs.unwrap_or(5)),
            },
            weather: WeatherConfig {
                location: file.weather.location,
                timeout: Duration::from_secs(file.weather.timeout_secs.unwrap_or(5)),
            },
            search: SearchConfig {
                provider: file
                    .search
                    .provider
                    .unwrap_or_else(|| "duckduckgo".to_string()),
                api_key: file.search.api_key.map(SecretString::from),
                max_results: file.search.max_results.unwrap_or(3),
                timeout: Duration::from_secs(file.search.timeout_secs.unwrap_or(10)),
            },
            server: ServerConfig {
                port: file.server.port.unwrap_or(8000),
                requests_per_minute: file.server.requests_per_minute.unwrap_or(120),
            },
            devices: file.devices,
            aliases: file.aliases,
            groups: file.groups,
        }
    }

    /// Apply environment-style overrides from a lookup function
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = get("OLLAMA_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = get("MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(key) = get("GOVEE_API_KEY").filter(|k| !k.is_empty()) {
            self.cloud.api_key = Some(SecretString::from(key));
        }
        if let Some(port) = get("HEARTH_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(key) = get("SEARCH_API_KEY").filter(|k| !k.is_empty()) {
            self.search.api_key = Some(SecretString::from(key));
        }
        if let Some(name) = get("PHONE_NAME") {
            self.presence.phone_name = Some(name);
        }
        if let Some(ip) = get("PHONE_STATIC_IP") {
            self.presence.phone_ip = Some(ip);
        }
        if let Some(location) = get("WEATHER_LOCATION") {
            self.weather.location = Some(location);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dispatch.max_concurrency == 0 {
            return Err(Error::Config("dispatch.max_concurrency must be at least 1".to_string()));
        }
        if self.assistant.history_turns == 0 {
            return Err(Error::Config("assistant.history_turns must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Build the device registry described by this configuration
    #[must_use]
    pub fn registry(&self) -> DeviceRegistry {
        DeviceRegistry::from_entries(&self.devices, &self.aliases, &self.groups, self.lan.port)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_when_file_is_empty() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config.llm.endpoint, DEFAULT_LLM_ENDPOINT);
        assert_eq!(config.cloud.base_url, DEFAULT_CLOUD_BASE_URL);
        assert_eq!(config.lan.port, DEFAULT_LAN_PORT);
        assert_eq!(config.dispatch.max_concurrency, 4);
        assert_eq!(config.dispatch.pacing, Duration::from_millis(100));
        assert_eq!(config.assistant.history_turns, 6);
        assert!(config.cloud.api_key.is_none());
        assert!(config.registry().is_empty());
    }

    #[test]
    fn overrides_take_priority() {
        let mut config = Config::from_toml_str(
            r#"
            [llm]
            model = "from-file"
            "#,
        )
        .unwrap();

        config.apply_overrides(|key| match key {
            "MODEL_NAME" => Some("from-env".to_string()),
            "GOVEE_API_KEY" => Some("secret".to_string()),
            "HEARTH_PORT" => Some("9100".to_string()),
            _ => None,
        });

        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.cloud.api_key.unwrap().expose_secret(), "secret");
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let result = Config::from_toml_str("[dispatch]\nmax_concurrency = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn registry_uses_configured_lan_port() {
        let config = Config::from_toml_str(
            r#"
            [lan]
            port = 5003

            [[devices]]
            name = "Ceiling Light"
            id = "EE:FF"
            sku = "H60A1"
            transport = "lan"
            address = "10.0.0.7"
            "#,
        )
        .unwrap();

        let registry = config.registry();
        assert_eq!(
            registry.get("CEILING LIGHT").unwrap().address,
            Some("10.0.0.7:5003".parse().unwrap())
        );
    }
}
