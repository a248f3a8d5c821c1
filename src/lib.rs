//! Pi Bridge: a Wi-Fi access point bridged to a wired or wireless uplink.
//!
//! A Raspberry Pi runs an AP on one wireless interface and NAT-forwards its
//! clients through another interface. This library provisions that setup
//! once, resumably across a reboot, and afterwards keeps the AP daemons and
//! the firewall consistent when either interface changes.
//!
//! # Modules
//!
//! - [`rules`] - The three NAT/forward rules derived from an interface pair
//! - [`firewall`] - Live firewall access (`iptables`)
//! - [`reconcile`] - Minimal, idempotent rule diffs between two pairs
//! - [`forwarding`] - Per-uplink rule management
//! - [`patch`] - Line-level `key=value` config patching
//! - [`snapshot`] - Current AP/uplink/gateway, read from the live system
//! - [`switch`] - Moving the bridge to a new interface pair
//! - [`setup`] - First-time provisioning with a reboot checkpoint
//! - [`status`], [`credentials`] - Operator-facing reports and edits
//!
//! # Example Usage
//!
//! ```no_run
//! use pi_bridge::{build_rules, InterfacePair};
//!
//! let rules = build_rules(&InterfacePair::new("wlan1", "eth0"));
//! for rule in &rules {
//!     println!("{}", rule);
//! }
//! ```

/// Checkpoint persisted between the package stage and the rest of setup.
pub mod checkpoint;

/// Tool settings (`config.toml`) and fallback values (`defaults.sh`).
pub mod config;

pub mod credentials;

/// Error taxonomy shared by every operation.
/// Uses `thiserror` for ergonomic error handling.
pub mod error;

/// Running external programs with captured output, optionally through `sudo`.
pub mod exec;

/// Privileged whole-file reads and writes.
pub mod files;

pub mod firewall;
pub mod forwarding;

/// Wireless interface discovery and per-interface queries.
pub mod interface;

pub mod patch;

/// Operator prompts on the terminal.
pub mod prompt;

/// Provisioning stage scripts.
pub mod provision;

pub mod reconcile;
pub mod rules;
pub mod services;
pub mod setup;
pub mod snapshot;
pub mod status;
pub mod switch;
pub mod system;

pub use error::BridgeError;
pub use reconcile::{AppliedCount, reconcile};
pub use rules::{InterfacePair, Rule, RuleSpec, build_rules};
pub use snapshot::{SystemSnapshot, read_snapshot};
pub use switch::{SwitchPlan, SwitchReport, switch_interface};
pub use system::System;
