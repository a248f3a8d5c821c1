//! Per-uplink NAT forwarding management (`pi-bridge forwarding ...`).

use anyhow::Result;
use tracing::info;

use crate::firewall::{Firewall, masquerade_uplinks};
use crate::reconcile::{ensure_absent, ensure_present};
use crate::rules::{InterfacePair, Table, build_rules};

/// Uplinks that currently have a masquerade rule, in listing order.
pub fn list_forwarding(firewall: &dyn Firewall) -> Result<Vec<String>> {
    let listing = firewall.list(Table::Nat, "POSTROUTING")?;
    Ok(masquerade_uplinks(&listing))
}

/// Install the forwarding rules for `pair` and persist. Returns how many rules were added.
pub fn add_forwarding(firewall: &dyn Firewall, pair: &InterfacePair) -> Result<usize> {
    let added = ensure_present(firewall, &build_rules(pair))?;
    if added == 0 {
        info!("Forwarding rules for {} already exist.", pair.uplink_interface);
    } else {
        info!("Added {} forwarding rule(s) for {}.", added, pair.uplink_interface);
    }

    firewall.save()?;
    Ok(added)
}

/// Remove the forwarding rules for `pair` and persist. Returns how many rules were removed.
pub fn remove_forwarding(firewall: &dyn Firewall, pair: &InterfacePair) -> Result<usize> {
    let removed = ensure_absent(firewall, &build_rules(pair))?;
    if removed == 0 {
        info!("No forwarding rules found for {}.", pair.uplink_interface);
    } else {
        info!("Removed {} forwarding rule(s) for {}.", removed, pair.uplink_interface);
    }

    firewall.save()?;
    Ok(removed)
}
