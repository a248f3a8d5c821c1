//! Current bridge state, derived from the live system on every call.
//!
//! The live system is the only source of truth: config files and the
//! firewall can drift after manual intervention, so nothing here is cached.
//! Reading never fails; any field that cannot be determined takes its
//! configured default.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::rules::{InterfacePair, Table};
use crate::firewall::masquerade_uplinks;
use crate::services::static_ip_unit;
use crate::system::System;

lazy_static! {
    static ref GATEWAY_RE: Regex =
        Regex::new(r"ip addr add (\d+\.\d+\.\d+\.\d+)/\d+ dev").expect("valid gateway pattern");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub current_ap: String,
    pub current_uplink: String,
    pub ap_gateway: String,
}

impl SystemSnapshot {
    pub fn pair(&self) -> InterfacePair {
        InterfacePair::new(&self.current_ap, &self.current_uplink)
    }
}

/// Value of the first `key=value` line in `content`, trimmed.
pub fn config_value(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix('='))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// AP interface named by the AP daemon config, if readable.
pub fn read_ap_interface(sys: &System) -> Option<String> {
    match sys.files.read(&sys.paths.hostapd_conf) {
        Ok(content) => config_value(&content, "interface"),
        Err(err) => {
            debug!("Cannot read AP interface: {:#}", err);
            None
        }
    }
}

/// Uplink named by the first masquerade rule, if any.
pub fn read_uplink(sys: &System) -> Option<String> {
    match sys.firewall.list(Table::Nat, "POSTROUTING") {
        Ok(listing) => masquerade_uplinks(&listing).into_iter().next(),
        Err(err) => {
            debug!("Cannot read NAT uplink: {:#}", err);
            None
        }
    }
}

/// Gateway address assigned by `<ap_interface>-static-ip.service`, if any.
pub fn read_gateway(sys: &System, ap_interface: &str) -> Option<String> {
    let unit = sys.paths.unit_file(&static_ip_unit(ap_interface));
    match sys.files.read(&unit) {
        Ok(content) => GATEWAY_RE.captures(&content).map(|caps| caps[1].to_string()),
        Err(err) => {
            debug!("Cannot read AP gateway: {:#}", err);
            None
        }
    }
}

pub fn read_snapshot(sys: &System) -> SystemSnapshot {
    let current_ap = read_ap_interface(sys).unwrap_or_else(|| sys.defaults.ap_interface.clone());
    let current_uplink = read_uplink(sys).unwrap_or_else(|| sys.defaults.wan_interface.clone());
    let ap_gateway = read_gateway(sys, &current_ap).unwrap_or_else(|| sys.defaults.gateway.clone());

    let snapshot = SystemSnapshot { current_ap, current_uplink, ap_gateway };
    debug!("Snapshot: {:?}", snapshot);
    snapshot
}
