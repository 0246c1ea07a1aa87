//! Config file handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::PostrunError;
use crate::request::proxy::{DEFAULT_BASE_URL, DEFAULT_PREFIX};
use crate::request::GatewaySettings;
use crate::scripting::ScriptLimits;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// postrun configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub config_dir: PathBuf,
    pub gateway: GatewaySettings,
    /// Force Basic auth from `user`/`password` on every request
    pub global_auth: bool,
    /// Per-request timeout; `None` disables it
    pub timeout: Option<Duration>,
    pub script_limits: ScriptLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
            gateway: GatewaySettings::default(),
            global_auth: false,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            script_limits: ScriptLimits::default(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the default config directory
    pub fn load() -> Result<Self, PostrunError> {
        let config_dir = Self::default_config_dir();
        let config_file = config_dir.join("config.toml");
        Self::load_from(&config_file)
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, PostrunError> {
        let config_dir = path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_dir);

        if !path.exists() {
            return Ok(Self { config_dir, ..Self::default() });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| PostrunError::Config(format!("Failed to read config: {}", e)))?;

        let mut config = Self::from_toml_str(&content)?;
        config.config_dir = config_dir;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PostrunError> {
        let toml_value: toml::Value = toml::from_str(content)
            .map_err(|e| PostrunError::Config(format!("Invalid config TOML: {}", e)))?;

        let gateway = toml_value.get("gateway");
        let gateway = GatewaySettings {
            enabled: gateway
                .and_then(|g| g.get("enabled"))
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            base_url: gateway
                .and_then(|g| g.get("base_url"))
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_BASE_URL)
                .to_string(),
            prefix: gateway
                .and_then(|g| g.get("prefix"))
                .and_then(|v| v.as_str())
                .map(normalize_prefix)
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        };

        let global_auth = toml_value
            .get("auth")
            .and_then(|a| a.get("global"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let timeout = match toml_value.get("http").and_then(|h| h.get("timeout_secs")) {
            None => Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            Some(value) => {
                let secs = value.as_integer()
                    .ok_or_else(|| PostrunError::Config("http.timeout_secs must be an integer".to_string()))?;
                // 0 turns the timeout off
                u64::try_from(secs)
                    .map_err(|_| PostrunError::Config(format!("http.timeout_secs must not be negative: {}", secs)))
                    .map(|secs| (secs > 0).then(|| Duration::from_secs(secs)))?
            }
        };

        let defaults = ScriptLimits::default();
        let scripts = toml_value.get("scripts");
        let script_limits = ScriptLimits {
            memory_limit: scripts
                .and_then(|s| s.get("memory_limit_mb"))
                .and_then(|v| v.as_integer())
                .and_then(|mb| usize::try_from(mb).ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.memory_limit),
            max_stack_size: scripts
                .and_then(|s| s.get("max_stack_kb"))
                .and_then(|v| v.as_integer())
                .and_then(|kb| usize::try_from(kb).ok())
                .map(|kb| kb * 1024)
                .unwrap_or(defaults.max_stack_size),
        };

        Ok(Self {
            config_dir: Self::default_config_dir(),
            gateway,
            global_auth,
            timeout,
            script_limits,
        })
    }

    /// Get the default config directory
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("postrun"))
            .unwrap_or_else(|| PathBuf::from(".postrun"))
    }
}

/// Leading slash, no trailing slash
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
