mod common;

use pretty_assertions::assert_eq;

use common::{FakeFirewall, bridge_error};
use pi_bridge::error::BridgeError;
use pi_bridge::firewall::Firewall;
use pi_bridge::forwarding::{add_forwarding, list_forwarding, remove_forwarding};
use pi_bridge::rules::Table;
use pi_bridge::InterfacePair;

fn listings(firewall: &FakeFirewall) -> (String, String) {
    (
        firewall.list(Table::Nat, "POSTROUTING").unwrap(),
        firewall.list(Table::Filter, "FORWARD").unwrap(),
    )
}

#[test]
fn add_then_remove_restores_the_rule_set() {
    let firewall = FakeFirewall::with_pair(&InterfacePair::new("wlan1", "eth0"));
    let before = listings(&firewall);
    let usb = InterfacePair::new("wlan1", "usb0");

    assert_eq!(add_forwarding(&firewall, &usb).unwrap(), 3);
    assert_eq!(list_forwarding(&firewall).unwrap(), vec!["eth0", "usb0"]);
    assert_eq!(remove_forwarding(&firewall, &usb).unwrap(), 3);

    assert_eq!(listings(&firewall), before);
    assert_eq!(firewall.saves.get(), 2);
}

#[test]
fn adding_existing_rules_changes_nothing_but_still_saves() {
    let pair = InterfacePair::new("wlan1", "eth0");
    let firewall = FakeFirewall::with_pair(&pair);

    assert_eq!(add_forwarding(&firewall, &pair).unwrap(), 0);
    assert_eq!(firewall.mutations.get(), 0);
    assert_eq!(firewall.saves.get(), 1);
}

#[test]
fn removing_absent_rules_is_harmless() {
    let firewall = FakeFirewall::with_pair(&InterfacePair::new("wlan1", "eth0"));

    let removed = remove_forwarding(&firewall, &InterfacePair::new("wlan1", "usb0")).unwrap();

    assert_eq!(removed, 0);
    assert_eq!(list_forwarding(&firewall).unwrap(), vec!["eth0"]);
}

#[test]
fn empty_nat_table_lists_nothing() {
    let firewall = FakeFirewall::default();
    assert!(list_forwarding(&firewall).unwrap().is_empty());
}

#[test]
fn unreadable_nat_table_is_a_read_error() {
    let firewall = FakeFirewall::default();
    firewall.list_fails.set(true);

    let err = list_forwarding(&firewall).unwrap_err();
    assert!(matches!(bridge_error(&err), BridgeError::Read { .. }));
}
