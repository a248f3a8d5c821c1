//! Human-readable bridge status.
//!
//! [`gather`] collects everything from the live system and never fails;
//! missing pieces show up as `unknown` or `not assigned`.

use std::fmt;

use crate::firewall::masquerade_uplinks;
use crate::rules::Table;
use crate::services::{DNSMASQ, HOSTAPD, NETWORK_MANAGER};
use crate::snapshot::{config_value, read_ap_interface};
use crate::system::System;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceState {
    pub unit: String,
    pub state: String,
}

impl ServiceState {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NatState {
    Forwarding {
        wan_interface: String,
        wan_ip: Option<String>,
    },
    NoMasquerade,
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub services: Vec<ServiceState>,
    pub ssid: Option<String>,
    pub country: Option<String>,
    pub interface: String,
    pub ip: Option<String>,
    pub nat: NatState,
    pub clients: usize,
}

pub fn gather(sys: &System) -> StatusReport {
    let interface = read_ap_interface(sys).unwrap_or_else(|| sys.defaults.ap_interface.clone());
    let hostapd_conf = sys.files.read(&sys.paths.hostapd_conf).unwrap_or_default();

    let services = [
        HOSTAPD.to_string(),
        DNSMASQ.to_string(),
        NETWORK_MANAGER.to_string(),
        format!("{}-static-ip", interface),
    ]
    .into_iter()
    .map(|unit| ServiceState {
        state: sys.services.is_active(&unit),
        unit,
    })
    .collect();

    let nat = match sys.firewall.list(Table::Nat, "POSTROUTING") {
        Ok(listing) => match masquerade_uplinks(&listing).into_iter().next() {
            Some(wan_interface) => NatState::Forwarding {
                wan_ip: sys.host.ipv4_address(&wan_interface),
                wan_interface,
            },
            None => NatState::NoMasquerade,
        },
        Err(_) => NatState::Unreadable,
    };

    StatusReport {
        services,
        ssid: config_value(&hostapd_conf, "ssid"),
        country: config_value(&hostapd_conf, "country_code"),
        ip: sys.host.ipv4_address(&interface),
        clients: sys.host.station_count(&interface),
        interface,
        nat,
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Pi Bridge Status ===")?;
        writeln!(f)?;

        writeln!(f, "Services:")?;
        for service in &self.services {
            let icon = if service.is_active() { "●" } else { "○" };
            writeln!(f, "  {} {}: {}", icon, service.unit, service.state)?;
        }
        writeln!(f)?;

        writeln!(f, "AP Configuration:")?;
        writeln!(f, "  SSID:      {}", self.ssid.as_deref().unwrap_or("unknown"))?;
        writeln!(f, "  Country:   {}", self.country.as_deref().unwrap_or("unknown"))?;
        writeln!(f, "  Interface: {}", self.interface)?;
        writeln!(f, "  IP:        {}", self.ip.as_deref().unwrap_or("not assigned"))?;
        writeln!(f)?;

        writeln!(f, "NAT Forwarding:")?;
        match &self.nat {
            NatState::Forwarding { wan_interface, wan_ip } => {
                writeln!(f, "  WAN interface: {}", wan_interface)?;
                writeln!(f, "  WAN IP:        {}", wan_ip.as_deref().unwrap_or("not assigned"))?;
            }
            NatState::NoMasquerade => writeln!(f, "  No MASQUERADE rule found")?,
            NatState::Unreadable => writeln!(f, "  Could not read iptables rules")?,
        }
        writeln!(f)?;

        write!(f, "Connected Clients: {}", self.clients)
    }
}
