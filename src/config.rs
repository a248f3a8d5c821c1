use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SETUP_DIR_ENV: &str = "PI_BRIDGE_SETUP_DIR";
const DEFAULT_SETUP_DIR: &str = "/usr/share/pi-bridge/setup";

/// Tool settings, read from `config.toml` in the user's config directory.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the provisioning scripts and `defaults.sh`.
    pub setup_dir: PathBuf,
    /// Escalate privileged operations through `sudo`.
    pub sudo: bool,
    pub paths: Paths,
}

/// Locations of the files the bridge reads and patches.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Paths {
    pub hostapd_conf: PathBuf,
    pub dnsmasq_conf: PathBuf,
    pub network_manager_conf: PathBuf,
    pub systemd_dir: PathBuf,
    pub state_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            setup_dir: PathBuf::from(DEFAULT_SETUP_DIR),
            sudo: true,
            paths: Paths::default(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            hostapd_conf: PathBuf::from("/etc/hostapd/hostapd.conf"),
            dnsmasq_conf: PathBuf::from("/etc/dnsmasq.conf"),
            network_manager_conf: PathBuf::from("/etc/NetworkManager/NetworkManager.conf"),
            systemd_dir: PathBuf::from("/etc/systemd/system"),
            state_file: default_state_file(),
        }
    }
}

impl Paths {
    pub fn unit_file(&self, unit: &str) -> PathBuf {
        self.systemd_dir.join(unit)
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let mut settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Settings::default()
        };

        if let Ok(dir) = std::env::var(SETUP_DIR_ENV) {
            if !dir.is_empty() {
                settings.setup_dir = PathBuf::from(dir);
            }
        }

        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid settings")
    }

    pub fn defaults_file(&self) -> PathBuf {
        self.setup_dir.join("defaults.sh")
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?;
    Ok(config_dir.join("pi-bridge").join("config.toml"))
}

fn default_state_file() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("/var/cache"))
        .join("pi-bridge")
        .join("setup-state.json")
}

/// Fallback values for every configurable field, from `defaults.sh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub ap_interface: String,
    pub wan_interface: String,
    pub ssid: String,
    pub country: String,
    pub gateway: String,
    pub chipset: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            ap_interface: "wlan1".to_string(),
            wan_interface: "eth0".to_string(),
            ssid: "PiNet".to_string(),
            country: "US".to_string(),
            gateway: "192.168.31.4".to_string(),
            chipset: "intel".to_string(),
        }
    }
}

impl Defaults {
    /// Load from `path`; a missing or unreadable file yields the built-in values.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) => {
                warn!("Could not read defaults from {} ({}), using built-in values", path.display(), err);
                Self::default()
            }
        }
    }

    /// Parse `KEY=value` / `KEY="value"` lines. Comments, blanks and unknown keys are skipped.
    pub fn parse(content: &str) -> Self {
        let mut defaults = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();

            match key.trim() {
                "DEFAULT_AP_INTERFACE" => defaults.ap_interface = value,
                "DEFAULT_WAN_INTERFACE" => defaults.wan_interface = value,
                "DEFAULT_AP_SSID" => defaults.ssid = value,
                "DEFAULT_AP_COUNTRY" => defaults.country = value,
                "DEFAULT_AP_GATEWAY" => defaults.gateway = value,
                "DEFAULT_WIFI_CHIPSET" => defaults.chipset = value,
                other => debug!("Ignoring unknown defaults key: {}", other),
            }
        }

        defaults
    }
}
