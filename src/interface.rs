use lazy_static::lazy_static;
use regex::Regex;
use std::process::Command;

use crate::exec;

lazy_static! {
    static ref IW_INTERFACE_RE: Regex =
        Regex::new(r"(?m)^\s*Interface\s+(\S+)").expect("valid iw pattern");
    static ref IP_LINK_RE: Regex =
        Regex::new(r"(?m)^\d+:\s*([^:]+):").expect("valid ip link pattern");
    static ref INET_RE: Regex =
        Regex::new(r"inet (\d+\.\d+\.\d+\.\d+)").expect("valid inet pattern");
}

/// Read-only queries about the host's network interfaces.
pub trait Host {
    /// Whether the kernel knows an interface called `name`.
    fn interface_exists(&self, name: &str) -> bool;

    /// Wireless interface names, sorted and de-duplicated.
    fn wireless_interfaces(&self) -> Vec<String>;

    /// First IPv4 address assigned to `name`, if any.
    fn ipv4_address(&self, name: &str) -> Option<String>;

    /// Number of stations associated with the AP on `name`.
    fn station_count(&self, name: &str) -> usize;
}

/// [`Host`] backed by `ip` and `iw`.
pub struct IpHost;

impl IpHost {
    fn stdout_of(program: &str, args: &[&str]) -> Option<String> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        match exec::run(&mut cmd) {
            Ok(output) if output.success => Some(output.stdout),
            _ => None,
        }
    }
}

impl Host for IpHost {
    fn interface_exists(&self, name: &str) -> bool {
        Self::stdout_of("ip", &["link", "show", name]).is_some()
    }

    fn wireless_interfaces(&self) -> Vec<String> {
        let from_iw = Self::stdout_of("iw", &["dev"])
            .map(|out| parse_iw_dev(&out))
            .unwrap_or_default();
        if !from_iw.is_empty() {
            return from_iw;
        }

        // iw missing or silent: infer from interface names
        Self::stdout_of("ip", &["-o", "link", "show"])
            .map(|out| parse_ip_link_wireless(&out))
            .unwrap_or_default()
    }

    fn ipv4_address(&self, name: &str) -> Option<String> {
        Self::stdout_of("ip", &["-4", "addr", "show", name]).and_then(|out| parse_inet(&out))
    }

    fn station_count(&self, name: &str) -> usize {
        Self::stdout_of("iw", &["dev", name, "station", "dump"])
            .map(|out| count_stations(&out))
            .unwrap_or(0)
    }
}

/// Interface names from `iw dev` output.
pub fn parse_iw_dev(output: &str) -> Vec<String> {
    let mut names: Vec<String> = IW_INTERFACE_RE
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// `wlan*` interface names from `ip -o link show` output.
pub fn parse_ip_link_wireless(output: &str) -> Vec<String> {
    let mut names: Vec<String> = IP_LINK_RE
        .captures_iter(output)
        .map(|caps| {
            let raw = caps[1].trim();
            raw.split('@').next().unwrap_or(raw).to_string()
        })
        .filter(|name| name.starts_with("wlan"))
        .collect();
    names.sort();
    names.dedup();
    names
}

pub fn parse_inet(output: &str) -> Option<String> {
    INET_RE.captures(output).map(|caps| caps[1].to_string())
}

pub fn count_stations(output: &str) -> usize {
    output.matches("Station ").count()
}

/// Resolve the AP interface to offer by default: the configured one when it
/// was detected, else the first detected wireless interface, else the configured one.
pub fn choose_default_ap_interface(host: &dyn Host, configured: &str) -> String {
    let detected = host.wireless_interfaces();
    if detected.is_empty() || detected.iter().any(|name| name == configured) {
        return configured.to_string();
    }
    detected[0].clone()
}
