use anyhow::Result;
use tracing::info;

use crate::error::BridgeError;
use crate::exec::{self, Privilege};

pub const HOSTAPD: &str = "hostapd";
pub const DNSMASQ: &str = "dnsmasq";
pub const NETWORK_MANAGER: &str = "NetworkManager";

/// Unit that assigns the AP gateway address to `interface`.
pub fn static_ip_unit(interface: &str) -> String {
    format!("{}-static-ip.service", interface)
}

/// systemd unit lifecycle operations.
pub trait ServiceManager {
    fn enable(&self, unit: &str) -> Result<()>;

    /// `systemctl disable --now`: disable and stop in one call.
    fn disable_now(&self, unit: &str) -> Result<()>;

    fn start(&self, unit: &str) -> Result<()>;

    fn stop(&self, unit: &str) -> Result<()>;

    fn restart(&self, unit: &str) -> Result<()>;

    /// `systemctl is-active` text (`active`, `inactive`, `failed`, ...). Never fails.
    fn is_active(&self, unit: &str) -> String;
}

pub struct Systemctl {
    privilege: Privilege,
}

impl Systemctl {
    pub fn new(privilege: Privilege) -> Self {
        Self { privilege }
    }

    fn systemctl(&self, args: &[&str]) -> Result<()> {
        let mut cmd = self.privilege.command("systemctl");
        cmd.args(args);
        let output = exec::run(&mut cmd)?;

        if !output.success {
            return Err(BridgeError::Command {
                command: format!("systemctl {}", args.join(" ")),
                detail: output.diagnostic(),
            }
            .into());
        }

        info!("systemctl {}", args.join(" "));
        Ok(())
    }
}

impl ServiceManager for Systemctl {
    fn enable(&self, unit: &str) -> Result<()> {
        self.systemctl(&["enable", unit])
    }

    fn disable_now(&self, unit: &str) -> Result<()> {
        self.systemctl(&["disable", "--now", unit])
    }

    fn start(&self, unit: &str) -> Result<()> {
        self.systemctl(&["start", unit])
    }

    fn stop(&self, unit: &str) -> Result<()> {
        self.systemctl(&["stop", unit])
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.systemctl(&["restart", unit])
    }

    fn is_active(&self, unit: &str) -> String {
        let mut cmd = Privilege::Direct.command("systemctl");
        cmd.args(["is-active", unit]);

        match exec::run(&mut cmd) {
            Ok(output) => {
                let state = output.stdout.trim();
                if state.is_empty() { "unknown".to_string() } else { state.to_string() }
            }
            Err(_) => "unknown".to_string(),
        }
    }
}

/// Bring the AP up: gateway address first, then the AP and DHCP daemons.
pub fn start_bridge(services: &dyn ServiceManager, ap_interface: &str) -> Result<()> {
    services.start(&static_ip_unit(ap_interface))?;
    services.start(HOSTAPD)?;
    services.start(DNSMASQ)
}

pub fn stop_bridge(services: &dyn ServiceManager) -> Result<()> {
    services.stop(HOSTAPD)?;
    services.stop(DNSMASQ)
}
