//! Rule reconciliation between two interface pairings.
//!
//! Every mutation is guarded by an existence check, which is what makes a
//! re-run safe after a crash or a partial failure. There is no rollback: a
//! failure while adding new rules surfaces immediately and leaves any
//! deletions already applied in place. Re-running once the cause is fixed
//! converges on the desired rule set.

use anyhow::Result;
use tracing::{debug, info};

use crate::firewall::Firewall;
use crate::rules::{InterfacePair, Rule, build_rules};

/// Number of rules a reconciliation actually changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AppliedCount {
    pub removed: usize,
    pub added: usize,
}

impl AppliedCount {
    pub fn total(&self) -> usize {
        self.removed + self.added
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Append each rule that is not already installed. Returns how many were appended.
pub fn ensure_present<'a>(
    firewall: &dyn Firewall,
    rules: impl IntoIterator<Item = &'a Rule>,
) -> Result<usize> {
    let mut added = 0;
    for rule in rules {
        if firewall.exists(rule)? {
            debug!("Rule already present: {}", rule);
            continue;
        }
        firewall.append(rule)?;
        info!("Added rule: {}", rule);
        added += 1;
    }
    Ok(added)
}

/// Delete each rule that is currently installed. Returns how many were deleted.
pub fn ensure_absent<'a>(
    firewall: &dyn Firewall,
    rules: impl IntoIterator<Item = &'a Rule>,
) -> Result<usize> {
    let mut removed = 0;
    for rule in rules {
        if !firewall.exists(rule)? {
            debug!("Rule already absent: {}", rule);
            continue;
        }
        firewall.delete(rule)?;
        info!("Removed rule: {}", rule);
        removed += 1;
    }
    Ok(removed)
}

/// Move the live firewall from the rules of `old` to the rules of `new`, then persist.
///
/// Rules shared by both pairings are left alone. When the pairings are equal
/// and nothing needed repair, the firewall is not touched at all.
pub fn reconcile(
    firewall: &dyn Firewall,
    old: &InterfacePair,
    new: &InterfacePair,
) -> Result<AppliedCount> {
    let old_rules = build_rules(old);
    let new_rules = build_rules(new);

    let stale = old_rules.iter().filter(|rule| !new_rules.contains(rule));
    let removed = ensure_absent(firewall, stale)?;
    let added = ensure_present(firewall, &new_rules)?;

    let applied = AppliedCount { removed, added };
    if old != new || !applied.is_empty() {
        firewall.save()?;
        info!(
            "Reconciled NAT rules ({} -> {}): {} removed, {} added",
            old, new, applied.removed, applied.added
        );
    } else {
        debug!("NAT rules for {} already in place", new);
    }

    Ok(applied)
}
