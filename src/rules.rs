//! NAT rule set derived from an (AP, uplink) interface pairing.
//!
//! A pairing always maps to the same three rules, in the same order:
//!
//! 1. `-t nat -A POSTROUTING -o <uplink> -j MASQUERADE`
//! 2. `-A FORWARD -i <uplink> -o <ap> -m state --state RELATED,ESTABLISHED -j ACCEPT`
//! 3. `-A FORWARD -i <ap> -o <uplink> -j ACCEPT`
//!
//! Nothing here touches the live firewall; see [`crate::firewall`] for that.

use std::fmt;

/// One NAT forwarding configuration: clients of `ap_interface` reach the
/// internet through `uplink_interface`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfacePair {
    pub ap_interface: String,
    pub uplink_interface: String,
}

impl InterfacePair {
    pub fn new(ap_interface: impl Into<String>, uplink_interface: impl Into<String>) -> Self {
        Self {
            ap_interface: ap_interface.into(),
            uplink_interface: uplink_interface.into(),
        }
    }
}

impl fmt::Display for InterfacePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AP {} via {}", self.ap_interface, self.uplink_interface)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Nat,
    Filter,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Nat => "nat",
            Table::Filter => "filter",
        }
    }
}

/// The iptables verb applied to a rule. All three share the same match criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOp {
    Check,
    Append,
    Delete,
}

impl RuleOp {
    pub fn flag(self) -> &'static str {
        match self {
            RuleOp::Check => "-C",
            RuleOp::Append => "-A",
            RuleOp::Delete => "-D",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    pub table: Table,
    pub chain: &'static str,
    pub matches: Vec<String>,
}

impl Rule {
    fn new(table: Table, chain: &'static str, matches: &[&str]) -> Self {
        Self {
            table,
            chain,
            matches: matches.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn masquerade(uplink: &str) -> Self {
        Self::new(Table::Nat, "POSTROUTING", &["-o", uplink, "-j", "MASQUERADE"])
    }

    pub fn forward_established(uplink: &str, ap: &str) -> Self {
        Self::new(
            Table::Filter,
            "FORWARD",
            &[
                "-i",
                uplink,
                "-o",
                ap,
                "-m",
                "state",
                "--state",
                "RELATED,ESTABLISHED",
                "-j",
                "ACCEPT",
            ],
        )
    }

    pub fn forward_new(ap: &str, uplink: &str) -> Self {
        Self::new(Table::Filter, "FORWARD", &["-i", ap, "-o", uplink, "-j", "ACCEPT"])
    }

    /// Arguments to pass to `iptables` for `op`. The filter table is implicit.
    pub fn args(&self, op: RuleOp) -> Vec<String> {
        let mut args = Vec::with_capacity(self.matches.len() + 4);
        if self.table != Table::Filter {
            args.push("-t".to_string());
            args.push(self.table.name().to_string());
        }
        args.push(op.flag().to_string());
        args.push(self.chain.to_string());
        args.extend(self.matches.iter().cloned());
        args
    }

    /// The rule as `iptables -S <chain>` prints it.
    pub fn listing(&self) -> String {
        format!("-A {} {}", self.chain, self.matches.join(" "))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.table.name(), self.listing())
    }
}

/// Exactly three rules, masquerade first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec([Rule; 3]);

impl RuleSpec {
    pub fn rules(&self) -> &[Rule; 3] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.0.iter()
    }

    pub fn contains(&self, rule: &Rule) -> bool {
        self.0.contains(rule)
    }
}

impl<'a> IntoIterator for &'a RuleSpec {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

pub fn build_rules(pair: &InterfacePair) -> RuleSpec {
    let ap = pair.ap_interface.as_str();
    let uplink = pair.uplink_interface.as_str();

    RuleSpec([
        Rule::masquerade(uplink),
        Rule::forward_established(uplink, ap),
        Rule::forward_new(ap, uplink),
    ])
}
