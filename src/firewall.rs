//! Live firewall access.
//!
//! [`Firewall`] is the narrow seam the reconciler and state reader depend on;
//! [`Iptables`] is the production implementation. Existence test, append and
//! delete are separate calls keyed by the same match criteria, so every
//! mutation can be guarded by a check first.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::BridgeError;
use crate::exec::{self, Privilege};
use crate::rules::{Rule, RuleOp, Table};

lazy_static! {
    static ref MASQUERADE_RE: Regex =
        Regex::new(r"-A POSTROUTING -o (\S+) -j MASQUERADE").expect("valid masquerade pattern");
}

pub trait Firewall {
    /// Whether `rule` is currently installed.
    fn exists(&self, rule: &Rule) -> Result<bool>;

    fn append(&self, rule: &Rule) -> Result<()>;

    fn delete(&self, rule: &Rule) -> Result<()>;

    /// Rules of `chain` in `table`, in `iptables -S` format.
    fn list(&self, table: Table, chain: &str) -> Result<String>;

    /// Persist the live rule set so it survives a reboot.
    fn save(&self) -> Result<()>;
}

/// Uplink interfaces named by masquerade rules in a POSTROUTING listing, in order.
pub fn masquerade_uplinks(listing: &str) -> Vec<String> {
    MASQUERADE_RE
        .captures_iter(listing)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// `iptables -C` exit status for "no such rule". Anything else non-zero
/// (lock contention, missing module, bad arguments) is a failure.
const CHECK_ABSENT: i32 = 1;

pub struct Iptables {
    privilege: Privilege,
    program: String,
}

impl Iptables {
    pub fn new(privilege: Privilege) -> Self {
        Self::with_program(privilege, "iptables")
    }

    /// Use `program` in place of the `iptables` found on `PATH`.
    pub fn with_program(privilege: Privilege, program: impl Into<String>) -> Self {
        Self {
            privilege,
            program: program.into(),
        }
    }

    fn iptables(&self, args: &[String]) -> Result<exec::CommandOutput> {
        let mut cmd = self.privilege.command(&self.program);
        cmd.args(args);
        exec::run(&mut cmd)
    }
}

impl Firewall for Iptables {
    fn exists(&self, rule: &Rule) -> Result<bool> {
        let output = self.iptables(&rule.args(RuleOp::Check))?;
        if output.success {
            return Ok(true);
        }
        if output.code == Some(CHECK_ABSENT) {
            return Ok(false);
        }
        Err(BridgeError::Read {
            target: format!("firewall rule '{}'", rule),
            detail: output.diagnostic(),
        }
        .into())
    }

    fn append(&self, rule: &Rule) -> Result<()> {
        let output = self.iptables(&rule.args(RuleOp::Append))?;
        if !output.success {
            return Err(BridgeError::Write {
                target: format!("firewall rule '{}'", rule),
                detail: output.diagnostic(),
            }
            .into());
        }
        Ok(())
    }

    fn delete(&self, rule: &Rule) -> Result<()> {
        let output = self.iptables(&rule.args(RuleOp::Delete))?;
        if !output.success {
            return Err(BridgeError::Write {
                target: format!("firewall rule '{}'", rule),
                detail: output.diagnostic(),
            }
            .into());
        }
        Ok(())
    }

    fn list(&self, table: Table, chain: &str) -> Result<String> {
        let args = [
            "-t".to_string(),
            table.name().to_string(),
            "-S".to_string(),
            chain.to_string(),
        ];
        let output = self.iptables(&args)?;
        if !output.success {
            return Err(BridgeError::Read {
                target: format!("iptables {} {}", table.name(), chain),
                detail: output.diagnostic(),
            }
            .into());
        }
        Ok(output.stdout)
    }

    fn save(&self) -> Result<()> {
        let mut cmd = self.privilege.command("netfilter-persistent");
        cmd.arg("save");
        let output = exec::run(&mut cmd)?;
        if !output.success {
            return Err(BridgeError::Write {
                target: "persistent firewall rules".to_string(),
                detail: output.diagnostic(),
            }
            .into());
        }
        Ok(())
    }
}
