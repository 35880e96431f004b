//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use solarforge_core::ForgeConfig;
use std::path::{Path, PathBuf};

/// Full configuration for the SolarForge node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SolarForgeConfig {
    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Settlement gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Forge tuning.
    #[serde(default)]
    pub forge: ForgeSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Where forges are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// POST to the gateway at `url`.
    #[default]
    Http,
    /// Settle in-process with made-up hashes. Development only.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub mode: GatewayMode,
    /// Settlement gateway endpoint. Required in `http` mode.
    #[serde(default)]
    pub url: Option<String>,
    /// Per-call timeout in seconds.
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeSection {
    /// Sunshines per star.
    #[serde(default = "default_credits_per_reward")]
    pub credits_per_reward: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    9001
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_gateway_timeout() -> u64 {
    ForgeConfig::default().gateway_timeout_secs
}
fn default_credits_per_reward() -> u64 {
    ForgeConfig::default().credits_per_reward
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::default(),
            url: None,
            timeout_secs: default_gateway_timeout(),
        }
    }
}

impl Default for ForgeSection {
    fn default() -> Self {
        Self {
            credits_per_reward: default_credits_per_reward(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SolarForgeConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: SolarForgeConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Forge engine tuning assembled from the `[forge]` and `[gateway]` sections.
    pub fn forge_config(&self) -> ForgeConfig {
        ForgeConfig {
            credits_per_reward: self.forge.credits_per_reward,
            gateway_timeout_secs: self.gateway.timeout_secs,
        }
    }

    /// Check settings the node cannot start without.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.forge_config().conversion()?;
        if self.gateway.mode == GatewayMode::Http
            && self.gateway.url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            anyhow::bail!(
                "[gateway] url is required; set mode = \"local\" to settle in-process for development"
            );
        }
        Ok(())
    }

    /// Whether logs should be emitted as JSON lines.
    pub fn json_logs(&self) -> bool {
        self.logging.format.eq_ignore_ascii_case("json")
    }
}
