//! First-time provisioning, resumable across the reboot that follows package
//! installation.
//!
//! A fresh run gathers answers, installs packages and, unless installation
//! was skipped, saves a [`SetupCheckpoint`] and asks for a reboot. The next
//! run finds the checkpoint and continues with the remaining stages. The
//! checkpoint only resumes under the mode it was created in.

use anyhow::Result;
use std::io::BufRead;
use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointStore, SetupAnswers, SetupCheckpoint, SetupMode};
use crate::error::BridgeError;
use crate::interface::choose_default_ap_interface;
use crate::prompt::{Prompter, validate_passphrase};
use crate::provision::Stage;
use crate::system::System;

pub const SKIP_PACKAGES_ENV: &str = "PI_BRIDGE_SKIP_PACKAGE_INSTALL";
pub const CHIPSETS: [&str; 2] = ["intel", "realtek"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOptions {
    pub mode: SetupMode,
    /// Pre-provisioned image: no package stage, no reboot.
    pub skip_packages: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    Completed,
    /// Packages installed and checkpoint saved; reboot and run setup again.
    RebootRequired,
    /// Operator declined to proceed.
    Aborted,
    /// Operator declined to resume; the checkpoint was deleted.
    Discarded,
}

pub struct SetupController<'a> {
    sys: &'a System<'a>,
    prompter: &'a dyn Prompter,
    checkpoints: &'a CheckpointStore,
}

impl<'a> SetupController<'a> {
    pub fn new(sys: &'a System<'a>, prompter: &'a dyn Prompter, checkpoints: &'a CheckpointStore) -> Self {
        Self { sys, prompter, checkpoints }
    }

    /// Run setup. In defaults mode the AP passphrase is the first line of `input`.
    pub fn run(&self, options: SetupOptions, input: &mut dyn BufRead) -> Result<SetupOutcome> {
        info!("=== Pi Bridge Setup ===");

        let (answers, resuming) = match self.checkpoints.load() {
            Some(checkpoint) => {
                let saved = checkpoint.mode();
                if saved != options.mode {
                    return Err(BridgeError::ModeMismatch {
                        saved,
                        requested: options.mode,
                        path: self.checkpoints.path().display().to_string(),
                    }
                    .into());
                }

                info!("Found previous setup state after package installation.");
                info!("This usually means a reboot was required to finish setup.");
                let resume = options.mode == SetupMode::Defaults
                    || self.prompter.confirm("Resume setup from step 2?", true)?;
                if !resume {
                    self.checkpoints.clear();
                    info!("Cleared saved setup state. Re-run setup to start over.");
                    return Ok(SetupOutcome::Discarded);
                }
                (checkpoint.config, true)
            }
            None => (self.gather(options.mode)?, false),
        };

        log_summary(&answers);
        self.validate_interface(&answers.interface)?;

        if options.mode == SetupMode::Interactive
            && !self.prompter.confirm("Proceed with setup?", true)?
        {
            info!("Aborted.");
            return Ok(SetupOutcome::Aborted);
        }

        if !resuming {
            if options.skip_packages {
                info!("Skipping package installation ({}=1)", SKIP_PACKAGES_ENV);
            } else {
                self.sys.provisioner.run(&Stage::InstallPackages {
                    chipset: answers.chipset.clone(),
                })?;
                self.checkpoints
                    .save(&SetupCheckpoint::packages_installed(answers))?;
                info!("Step 1 complete: packages/firmware installation finished.");
                info!("Reboot is required before continuing setup.");
                info!("After reboot, run `pi-bridge setup` again to resume from step 2.");
                return Ok(SetupOutcome::RebootRequired);
            }
        }

        let passphrase = match options.mode {
            SetupMode::Defaults => read_passphrase(input)?,
            SetupMode::Interactive => self.prompt_passphrase()?,
        };

        for stage in remaining_stages(&answers, passphrase) {
            self.sys.provisioner.run(&stage)?;
        }
        self.checkpoints.clear();

        info!("=== Setup complete ===");
        Ok(SetupOutcome::Completed)
    }

    fn gather(&self, mode: SetupMode) -> Result<SetupAnswers> {
        let defaults = self.sys.defaults;
        let default_interface = choose_default_ap_interface(self.sys.host, &defaults.ap_interface);

        if mode == SetupMode::Defaults {
            return Ok(SetupAnswers {
                chipset: defaults.chipset.clone(),
                interface: default_interface,
                ssid: defaults.ssid.clone(),
                country: defaults.country.clone(),
                gateway: defaults.gateway.clone(),
                wan_interface: defaults.wan_interface.clone(),
                enable_mdns: false,
                use_defaults: true,
            });
        }

        info!("(Press Enter to accept defaults shown in brackets)");
        let p = self.prompter;

        let chipset = p.select("WiFi chipset", &CHIPSETS, &defaults.chipset)?;
        let interface = p.text("AP interface", Some(&default_interface))?;
        let ssid = p.text("Network SSID", Some(&defaults.ssid))?;
        let country = if defaults.country == "US" {
            if p.confirm("Are you in the United States?", true)? {
                "US".to_string()
            } else {
                p.text("Country code (e.g., GB, DE, CA)", None)?
            }
        } else {
            p.text("Country code", Some(&defaults.country))?
        };
        let gateway = p.text("AP gateway IP", Some(&defaults.gateway))?;
        let wan_interface = p.text("WAN interface (internet uplink)", Some(&defaults.wan_interface))?;
        let enable_mdns = p.confirm(
            "Enable mDNS reflection (device discovery across networks)?",
            false,
        )?;

        Ok(SetupAnswers {
            chipset,
            interface,
            ssid,
            country: country.to_uppercase(),
            gateway,
            wan_interface,
            enable_mdns,
            use_defaults: false,
        })
    }

    fn validate_interface(&self, interface: &str) -> Result<()> {
        if self.sys.host.interface_exists(interface) {
            return Ok(());
        }

        let available = self.sys.host.wireless_interfaces();
        if available.is_empty() {
            error!("AP interface '{}' not found. No wireless interfaces were detected.", interface);
        } else {
            error!(
                "AP interface '{}' not found. Available wireless interfaces: {}",
                interface,
                available.join(", ")
            );
        }
        Err(BridgeError::InterfaceNotFound(interface.to_string()).into())
    }

    fn prompt_passphrase(&self) -> Result<String> {
        loop {
            let passphrase = self.prompter.secret("AP passphrase", false)?;
            match validate_passphrase(&passphrase) {
                Ok(()) => return Ok(passphrase),
                Err(msg) => warn!("{}", msg),
            }
        }
    }
}

/// First line of `input`, trimmed. Empty or missing is [`BridgeError::PassphraseRequired`].
pub fn read_passphrase(input: &mut dyn BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;

    let passphrase = line.trim();
    if passphrase.is_empty() {
        return Err(BridgeError::PassphraseRequired.into());
    }
    Ok(passphrase.to_string())
}

/// Stages run after the package stage, in order.
pub fn remaining_stages(answers: &SetupAnswers, passphrase: String) -> Vec<Stage> {
    let mut stages = vec![
        Stage::Hostapd {
            interface: answers.interface.clone(),
            ssid: answers.ssid.clone(),
            country: answers.country.clone(),
            passphrase,
        },
        Stage::Dnsmasq {
            interface: answers.interface.clone(),
            gateway: answers.gateway.clone(),
        },
        Stage::NetworkManager {
            interface: answers.interface.clone(),
        },
        Stage::Nat {
            ap_interface: answers.interface.clone(),
            wan_interface: answers.wan_interface.clone(),
        },
        Stage::StaticIpService {
            interface: answers.interface.clone(),
            gateway: answers.gateway.clone(),
        },
        Stage::EnableServices {
            interface: answers.interface.clone(),
        },
    ];
    if answers.enable_mdns {
        stages.push(Stage::Mdns);
    }
    stages
}

fn log_summary(answers: &SetupAnswers) {
    info!("Chipset:       {}", answers.chipset);
    info!("AP interface:  {}", answers.interface);
    info!("WAN interface: {}", answers.wan_interface);
    info!("SSID:          {}", answers.ssid);
    info!("Country:       {}", answers.country);
    info!("Gateway:       {}", answers.gateway);
    info!("mDNS:          {}", if answers.enable_mdns { "enabled" } else { "disabled" });
}
