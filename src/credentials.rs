//! Changing the SSID and passphrase the AP advertises.

use anyhow::Result;
use tracing::{info, warn};

use crate::patch::{key_line, patch_line, replace_or_append};
use crate::prompt::{Prompter, validate_passphrase};
use crate::services::HOSTAPD;
use crate::snapshot::config_value;
use crate::system::System;

/// Requested changes; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialChange {
    pub ssid: Option<String>,
    pub passphrase: Option<String>,
}

impl CredentialChange {
    pub fn is_empty(&self) -> bool {
        self.ssid.is_none() && self.passphrase.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOutcome {
    Updated,
    NothingToChange,
    Aborted,
}

pub fn current_ssid(sys: &System) -> Option<String> {
    let content = sys.files.read(&sys.paths.hostapd_conf).ok()?;
    config_value(&content, "ssid")
}

/// Write `change` into the AP daemon config and restart it.
pub fn apply_credentials(sys: &System, change: &CredentialChange) -> Result<()> {
    let conf = &sys.paths.hostapd_conf;

    if let Some(ssid) = &change.ssid {
        patch_line(sys.files, conf, &key_line("ssid"), &format!("ssid={}", ssid))?;
    }
    if let Some(passphrase) = &change.passphrase {
        // not via patch_line, which logs the replacement line
        let content = sys.files.read(conf)?;
        let updated = replace_or_append(
            &content,
            &key_line("wpa_passphrase"),
            &format!("wpa_passphrase={}", passphrase),
        );
        if updated != content {
            sys.files.write(conf, &updated)?;
            info!("Updated {}: wpa_passphrase", conf.display());
        }
    }

    info!("Restarting {}...", HOSTAPD);
    sys.services.restart(HOSTAPD)
}

/// Interactive credential update.
pub fn update_credentials(sys: &System, prompter: &dyn Prompter) -> Result<CredentialOutcome> {
    let current = current_ssid(sys).unwrap_or_default();
    info!("Leave blank to keep current value.");

    let ssid = prompter.optional_text(&format!("New SSID [{}]", current))?;
    let passphrase = loop {
        let answer = prompter.secret("New passphrase (blank to keep)", true)?;
        if answer.is_empty() {
            break answer;
        }
        match validate_passphrase(&answer) {
            Ok(()) => break answer,
            Err(msg) => warn!("{}", msg),
        }
    };

    let change = CredentialChange {
        ssid,
        passphrase: Some(passphrase).filter(|p| !p.is_empty()),
    };
    if change.is_empty() {
        info!("No changes specified.");
        return Ok(CredentialOutcome::NothingToChange);
    }

    if let Some(ssid) = &change.ssid {
        info!("SSID: {} -> {}", current, ssid);
    }
    if change.passphrase.is_some() {
        info!("Passphrase: (will be updated)");
    }
    if !prompter.confirm("Apply changes?", false)? {
        info!("Aborted.");
        return Ok(CredentialOutcome::Aborted);
    }

    apply_credentials(sys, &change)?;
    info!("AP credentials updated successfully.");
    Ok(CredentialOutcome::Updated)
}
