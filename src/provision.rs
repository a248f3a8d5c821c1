//! Provisioning stages delegated to the setup scripts.
//!
//! Each stage is a shell script in the setup directory, parameterized through
//! environment variables. The scripts own the first-time file contents; this
//! crate only decides which stage runs, with which parameters, and when.

use anyhow::{Context, Result};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::info;

use crate::error::BridgeError;

#[derive(Clone, PartialEq, Eq)]
pub enum Stage {
    InstallPackages { chipset: String },
    Hostapd { interface: String, ssid: String, country: String, passphrase: String },
    Dnsmasq { interface: String, gateway: String },
    NetworkManager { interface: String },
    Nat { ap_interface: String, wan_interface: String },
    StaticIpService { interface: String, gateway: String },
    EnableServices { interface: String },
    Mdns,
}

impl Stage {
    pub fn script(&self) -> &'static str {
        match self {
            Stage::InstallPackages { .. } => "01-install-packages.sh",
            Stage::Hostapd { .. } => "02-configure-hostapd.sh",
            Stage::Dnsmasq { .. } => "03-configure-dnsmasq.sh",
            Stage::NetworkManager { .. } => "04-configure-network-manager.sh",
            Stage::Nat { .. } => "05-setup-nat.sh",
            Stage::StaticIpService { .. } => "06-setup-service.sh",
            Stage::EnableServices { .. } => "07-enable-services.sh",
            Stage::Mdns => "08-configure-mdns.sh",
        }
    }

    pub fn env(&self) -> Vec<(&'static str, String)> {
        match self {
            Stage::InstallPackages { chipset } => vec![("WIFI_CHIPSET", chipset.clone())],
            Stage::Hostapd { interface, ssid, country, .. } => vec![
                ("AP_INTERFACE", interface.clone()),
                ("AP_SSID", ssid.clone()),
                ("AP_COUNTRY", country.clone()),
            ],
            Stage::Dnsmasq { interface, gateway } | Stage::StaticIpService { interface, gateway } => {
                vec![("AP_INTERFACE", interface.clone()), ("AP_GATEWAY", gateway.clone())]
            }
            Stage::NetworkManager { interface } | Stage::EnableServices { interface } => {
                vec![("AP_INTERFACE", interface.clone())]
            }
            Stage::Nat { ap_interface, wan_interface } => vec![
                ("AP_INTERFACE", ap_interface.clone()),
                ("WAN_INTERFACE", wan_interface.clone()),
            ],
            Stage::Mdns => Vec::new(),
        }
    }

    /// Text fed to the script's stdin; the passphrase never goes through the environment.
    pub fn stdin(&self) -> Option<String> {
        match self {
            Stage::Hostapd { passphrase, .. } => Some(format!("{}\n", passphrase)),
            _ => None,
        }
    }
}

// Debug output goes to logs, so the passphrase is masked.
impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.script())?;
        for (key, value) in self.env() {
            write!(f, " {}={}", key, value)?;
        }
        if self.stdin().is_some() {
            write!(f, " <passphrase on stdin>")?;
        }
        Ok(())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script())
    }
}

pub trait Provisioner {
    fn run(&self, stage: &Stage) -> Result<()>;
}

/// Runs stage scripts with `bash`, streaming their output to the terminal.
pub struct ScriptProvisioner {
    setup_dir: PathBuf,
}

impl ScriptProvisioner {
    pub fn new(setup_dir: impl Into<PathBuf>) -> Self {
        Self { setup_dir: setup_dir.into() }
    }
}

impl Provisioner for ScriptProvisioner {
    fn run(&self, stage: &Stage) -> Result<()> {
        let script = self.setup_dir.join(stage.script());
        info!("Running {}", stage.script());

        let mut cmd = Command::new("bash");
        cmd.arg(&script).envs(stage.env());

        let status = match stage.stdin() {
            Some(input) => {
                let mut child = cmd
                    .stdin(Stdio::piped())
                    .spawn()
                    .with_context(|| format!("Failed to execute {}", script.display()))?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin
                        .write_all(input.as_bytes())
                        .with_context(|| format!("Failed to write stdin of {}", stage.script()))?;
                }
                child.wait()
            }
            None => cmd.status(),
        }
        .with_context(|| format!("Failed to execute {}", script.display()))?;

        if !status.success() {
            let detail = match status.code() {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(BridgeError::Command {
                command: stage.script().to_string(),
                detail,
            }
            .into());
        }

        Ok(())
    }
}
