//! TOML configuration file loading
//!
//! Supports `~/.config/hearth/config.toml` as the persistent config source.
//! Every field is optional; the file is a partial overlay on top of defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::devices::TransportKind;
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HearthConfigFile {
    pub llm: LlmFileConfig,
    pub cloud: CloudFileConfig,
    pub lan: LanFileConfig,
    pub dispatch: DispatchFileConfig,
    pub assistant: AssistantFileConfig,
    pub presence: PresenceFileConfig,
    pub weather: WeatherFileConfig,
    pub search: SearchFileConfig,
    pub server: ServerFileConfig,

    /// Registered lights
    pub devices: Vec<DeviceEntry>,

    /// Alias name → canonical device name
    pub aliases: HashMap<String, String>,

    /// Group name → member device names
    pub groups: HashMap<String, Vec<String>>,
}

/// LLM completion service
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Ollama generate endpoint (e.g. "http://localhost:11434/api/generate")
    pub endpoint: Option<String>,
    /// Model name (e.g. "qwen2.5:3b")
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Cloud device API
#[derive(Debug, Default, Deserialize)]
pub struct CloudFileConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// LAN device control
#[derive(Debug, Default, Deserialize)]
pub struct LanFileConfig {
    /// Device control port
    pub port: Option<u16>,
    /// Port discovery replies arrive on
    pub discovery_port: Option<u16>,
    pub send_timeout_ms: Option<u64>,
    pub scan_timeout_secs: Option<u64>,
}

/// Dispatch tuning
#[derive(Debug, Default, Deserialize)]
pub struct DispatchFileConfig {
    pub max_concurrency: Option<usize>,
    pub pacing_ms: Option<u64>,
    pub step_timeout_secs: Option<u64>,
}

/// Assistant persona and conversation settings
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    pub name: Option<String>,
    pub style: Option<String>,
    pub history_turns: Option<usize>,
    pub profile_path: Option<PathBuf>,
}

/// Presence detection
#[derive(Debug, Default, Deserialize)]
pub struct PresenceFileConfig {
    /// Phone hostname as it appears in the tailnet
    pub phone_name: Option<String>,
    /// Phone's static LAN address for the ARP fallback
    pub phone_ip: Option<String>,
    /// Prefix identifying LAN addresses (e.g. "192.168.1.")
    pub lan_prefix: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Weather lookup
#[derive(Debug, Default, Deserialize)]
pub struct WeatherFileConfig {
    pub location: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Web search
#[derive(Debug, Default, Deserialize)]
pub struct SearchFileConfig {
    /// "duckduckgo", "brave" or "serper"
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub max_results: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// HTTP server
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub requests_per_minute: Option<u32>,
}

/// One `[[devices]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_transport")]
    pub transport: TransportKind,
    /// LAN address ("ip" or "ip:port")
    #[serde(default)]
    pub address: Option<String>,
}

const fn default_transport() -> TransportKind {
    TransportKind::Cloud
}

/// Parse a config file body
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config_file(content: &str) -> Result<HearthConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load a config file from an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_config_file_from(path: &Path) -> Result<HearthConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    let file = parse_config_file(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(file)
}

/// Load the TOML config file from the standard path
///
/// Returns `HearthConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> HearthConfigFile {
    let Some(path) = config_file_path() else {
        return HearthConfigFile::default();
    };

    if !path.exists() {
        return HearthConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            HearthConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/hearth/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("hearth").join("config.toml"))
}
