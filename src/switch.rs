//! Moving the bridge from its current (AP, uplink) pair to a requested one.
//!
//! The switch validates the request, reads a fresh [`SystemSnapshot`], picks
//! the cheapest path and runs it to completion:
//!
//! - **no-op**: both interfaces already match, nothing is touched;
//! - **uplink only**: rules are reconciled, config files and services are left alone;
//! - **full switch**: config files are re-pointed at the new AP interface, its
//!   static-IP unit replaces the old one, rules are reconciled and the network
//!   daemons are restarted.
//!
//! Any failing step aborts the rest without rolling back earlier steps. Every
//! step is idempotent, so the remedy is to fix the cause and run the same
//! switch again.

use anyhow::Result;
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::patch::{key_line, patch_line};
use crate::provision::Stage;
use crate::reconcile::{AppliedCount, reconcile};
use crate::rules::InterfacePair;
use crate::services::{DNSMASQ, HOSTAPD, NETWORK_MANAGER, static_ip_unit};
use crate::snapshot::{SystemSnapshot, read_snapshot};
use crate::system::System;

/// The path a switch takes, decided from the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchPlan {
    NoOp {
        pair: InterfacePair,
    },
    UplinkOnlyChange {
        from: InterfacePair,
        to: InterfacePair,
    },
    FullSwitch {
        from: InterfacePair,
        to: InterfacePair,
        /// Gateway bound to the old AP interface, carried over to the new one.
        gateway: String,
    },
}

/// What a completed switch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    pub plan: SwitchPlan,
    pub rules: AppliedCount,
}

/// Decide the path from `snapshot` to the requested pair. An absent uplink keeps the current one.
pub fn plan_switch(
    snapshot: &SystemSnapshot,
    requested_ap: &str,
    requested_uplink: Option<&str>,
) -> SwitchPlan {
    let from = snapshot.pair();
    let to = InterfacePair::new(
        requested_ap,
        requested_uplink.unwrap_or(snapshot.current_uplink.as_str()),
    );

    if from == to {
        SwitchPlan::NoOp { pair: to }
    } else if from.ap_interface == to.ap_interface {
        SwitchPlan::UplinkOnlyChange { from, to }
    } else {
        SwitchPlan::FullSwitch {
            from,
            to,
            gateway: snapshot.ap_gateway.clone(),
        }
    }
}

pub fn switch_interface(
    sys: &System,
    requested_ap: &str,
    requested_uplink: Option<&str>,
) -> Result<SwitchReport> {
    if !sys.host.interface_exists(requested_ap) {
        return Err(BridgeError::InterfaceNotFound(requested_ap.to_string()).into());
    }

    let snapshot = read_snapshot(sys);
    let plan = plan_switch(&snapshot, requested_ap, requested_uplink);

    let rules = match &plan {
        SwitchPlan::NoOp { pair } => {
            info!(
                "AP already configured on {} with WAN {}.",
                pair.ap_interface, pair.uplink_interface
            );
            AppliedCount::default()
        }
        SwitchPlan::UplinkOnlyChange { from, to } => {
            info!("AP interface unchanged: {}", to.ap_interface);
            info!(
                "Switching WAN interface: {} -> {}",
                from.uplink_interface, to.uplink_interface
            );
            let applied = reconcile(sys.firewall, from, to)?;
            info!("WAN interface switched to {}.", to.uplink_interface);
            applied
        }
        SwitchPlan::FullSwitch { from, to, gateway } => full_switch(sys, from, to, gateway)?,
    };

    Ok(SwitchReport { plan, rules })
}

fn full_switch(
    sys: &System,
    from: &InterfacePair,
    to: &InterfacePair,
    gateway: &str,
) -> Result<AppliedCount> {
    let old_ap = from.ap_interface.as_str();
    let new_ap = to.ap_interface.as_str();

    info!("Switching AP interface: {} -> {}", old_ap, new_ap);
    info!("WAN interface: {}", to.uplink_interface);

    point_configs_at(sys, new_ap)?;

    sys.provisioner.run(&Stage::StaticIpService {
        interface: new_ap.to_string(),
        gateway: gateway.to_string(),
    })?;

    // the old unit may already be gone
    if let Err(err) = sys.services.disable_now(&static_ip_unit(old_ap)) {
        warn!("Could not disable {}: {:#}", static_ip_unit(old_ap), err);
    }
    let new_unit = static_ip_unit(new_ap);
    sys.services.enable(&new_unit)?;
    sys.services.start(&new_unit)?;

    let applied = reconcile(sys.firewall, from, to)?;

    for daemon in [NETWORK_MANAGER, HOSTAPD, DNSMASQ] {
        sys.services.restart(daemon)?;
    }

    info!("AP interface switched to {}.", new_ap);
    Ok(applied)
}

/// Re-point the AP, DHCP and NetworkManager configs at `interface`.
pub fn point_configs_at(sys: &System, interface: &str) -> Result<()> {
    let edits = [
        (&sys.paths.hostapd_conf, "interface", format!("interface={}", interface)),
        (&sys.paths.dnsmasq_conf, "interface", format!("interface={}", interface)),
        (
            &sys.paths.network_manager_conf,
            "unmanaged-devices",
            format!("unmanaged-devices=interface-name:{}", interface),
        ),
    ];

    for (path, key, line) in &edits {
        patch_line(sys.files, path, &key_line(key), line)?;
    }
    Ok(())
}
