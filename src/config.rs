use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::interface::InterfaceFilter;
use crate::monitor::MonitorSettings;

pub const ENV_PORT: &str = "NETWORK_CONFIG_PORT";
pub const ENV_DEBUG: &str = "NETWORK_CONFIG_DEBUG";
pub const ENV_MONITOR_ENABLED: &str = "HOTSPOT_MONITOR_ENABLED";
pub const ENV_MONITOR_INTERVAL: &str = "HOTSPOT_MONITOR_INTERVAL";
pub const ENV_AUTO_RECOVERY: &str = "HOTSPOT_AUTO_RECOVERY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lists every interface unfiltered and enables hotspot diagnostics and
    /// backend fallback.
    pub debug: bool,
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub filter: InterfaceFilter,
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 8080 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub auto_recovery: bool,
    pub settle_delay_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            enabled: true,
            interval_secs: 30,
            auto_recovery: true,
            settle_delay_secs: 2,
        }
    }
}

impl MonitorConfig {
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            enabled: self.enabled,
            interval: Duration::from_secs(self.interval_secs.max(1)),
            auto_recovery: self.auto_recovery,
            settle_delay: Duration::from_secs(self.settle_delay_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub default_target: String,
    pub timeout_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        ConnectivityConfig {
            default_target: "http://www.baidu.com".to_string(),
            timeout_secs: 3,
        }
    }
}

impl ConnectivityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// Defaults, overlaid by the config file if present, overlaid by the
    /// environment.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies environment overrides. Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = env_value(&lookup, ENV_PORT, |v| v.parse::<u16>().ok().filter(|p| *p != 0)) {
            self.server.port = port;
        }
        if let Some(debug) = env_value(&lookup, ENV_DEBUG, parse_bool) {
            self.debug = debug;
        }
        if let Some(enabled) = env_value(&lookup, ENV_MONITOR_ENABLED, parse_bool) {
            self.monitor.enabled = enabled;
        }
        if let Some(secs) = env_value(&lookup, ENV_MONITOR_INTERVAL, |v| v.parse::<u64>().ok().filter(|s| *s > 0)) {
            self.monitor.interval_secs = secs;
        }
        if let Some(auto) = env_value(&lookup, ENV_AUTO_RECOVERY, parse_bool) {
            self.monitor.auto_recovery = auto;
        }
    }
}

fn env_value<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("Ignoring invalid value {:?} for {}", raw, key);
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?;
    Ok(config_dir.join("netconfig").join("config.toml"))
}
