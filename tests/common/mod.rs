//! In-memory stand-ins for every collaborator, so no test touches the host.
#![allow(dead_code)]

use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use pi_bridge::config::{Defaults, Paths};
use pi_bridge::error::BridgeError;
use pi_bridge::files::ConfigFiles;
use pi_bridge::firewall::Firewall;
use pi_bridge::interface::Host;
use pi_bridge::prompt::Prompter;
use pi_bridge::provision::{Provisioner, Stage};
use pi_bridge::rules::{InterfacePair, Rule, Table, build_rules};
use pi_bridge::services::ServiceManager;
use pi_bridge::System;

pub const HOSTAPD_CONF: &str = "/etc/hostapd/hostapd.conf";
pub const DNSMASQ_CONF: &str = "/etc/dnsmasq.conf";
pub const NM_CONF: &str = "/etc/NetworkManager/NetworkManager.conf";

#[derive(Default)]
pub struct FakeFirewall {
    pub rules: RefCell<Vec<Rule>>,
    pub checks: Cell<usize>,
    pub mutations: Cell<usize>,
    pub saves: Cell<usize>,
    /// Mutations fail once this many have succeeded.
    pub fail_after: Cell<Option<usize>>,
    pub list_fails: Cell<bool>,
}

impl FakeFirewall {
    pub fn with_pair(pair: &InterfacePair) -> Self {
        let firewall = Self::default();
        firewall.rules.borrow_mut().extend(build_rules(pair).iter().cloned());
        firewall
    }

    pub fn installed(&self) -> Vec<Rule> {
        self.rules.borrow().clone()
    }

    /// Rule set as an unordered collection.
    pub fn rule_set(&self) -> HashSet<Rule> {
        self.rules.borrow().iter().cloned().collect()
    }

    pub fn reset_counters(&self) {
        self.checks.set(0);
        self.mutations.set(0);
        self.saves.set(0);
    }

    fn mutate(&self) -> Result<()> {
        if let Some(limit) = self.fail_after.get() {
            if self.mutations.get() >= limit {
                return Err(BridgeError::Write {
                    target: "iptables".to_string(),
                    detail: "injected failure".to_string(),
                }
                .into());
            }
        }
        self.mutations.set(self.mutations.get() + 1);
        Ok(())
    }
}

impl Firewall for FakeFirewall {
    fn exists(&self, rule: &Rule) -> Result<bool> {
        self.checks.set(self.checks.get() + 1);
        Ok(self.rules.borrow().contains(rule))
    }

    fn append(&self, rule: &Rule) -> Result<()> {
        self.mutate()?;
        self.rules.borrow_mut().push(rule.clone());
        Ok(())
    }

    fn delete(&self, rule: &Rule) -> Result<()> {
        self.mutate()?;
        let mut rules = self.rules.borrow_mut();
        if let Some(pos) = rules.iter().position(|r| r == rule) {
            rules.remove(pos);
        }
        Ok(())
    }

    fn list(&self, table: Table, chain: &str) -> Result<String> {
        if self.list_fails.get() {
            return Err(BridgeError::Read {
                target: format!("iptables -t {} -S {}", table.name(), chain),
                detail: "injected failure".to_string(),
            }
            .into());
        }

        let mut lines = vec![format!("-P {} ACCEPT", chain)];
        lines.extend(
            self.rules
                .borrow()
                .iter()
                .filter(|r| r.table == table && r.chain == chain)
                .map(Rule::listing),
        );
        Ok(lines.join("\n") + "\n")
    }

    fn save(&self) -> Result<()> {
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeServices {
    pub calls: RefCell<Vec<String>>,
    pub active: RefCell<HashSet<String>>,
    pub fail_disable: Cell<bool>,
}

impl FakeServices {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, action: &str, unit: &str) {
        self.calls.borrow_mut().push(format!("{} {}", action, unit));
    }
}

impl ServiceManager for FakeServices {
    fn enable(&self, unit: &str) -> Result<()> {
        self.record("enable", unit);
        Ok(())
    }

    fn disable_now(&self, unit: &str) -> Result<()> {
        self.record("disable --now", unit);
        if self.fail_disable.get() {
            return Err(BridgeError::Command {
                command: format!("systemctl disable --now {}", unit),
                detail: "Unit file does not exist.".to_string(),
            }
            .into());
        }
        self.active.borrow_mut().remove(unit);
        Ok(())
    }

    fn start(&self, unit: &str) -> Result<()> {
        self.record("start", unit);
        self.active.borrow_mut().insert(unit.to_string());
        Ok(())
    }

    fn stop(&self, unit: &str) -> Result<()> {
        self.record("stop", unit);
        self.active.borrow_mut().remove(unit);
        Ok(())
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.record("restart", unit);
        self.active.borrow_mut().insert(unit.to_string());
        Ok(())
    }

    fn is_active(&self, unit: &str) -> String {
        let state = if self.active.borrow().contains(unit) { "active" } else { "inactive" };
        state.to_string()
    }
}

#[derive(Default)]
pub struct MemoryFiles {
    pub files: RefCell<HashMap<PathBuf, String>>,
    pub writes: Cell<usize>,
}

impl MemoryFiles {
    pub fn put(&self, path: impl Into<PathBuf>, content: &str) {
        self.files.borrow_mut().insert(path.into(), content.to_string());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.borrow().get(path.as_ref()).cloned()
    }
}

impl ConfigFiles for MemoryFiles {
    fn read(&self, path: &Path) -> Result<String> {
        self.get(path).ok_or_else(|| {
            BridgeError::Read {
                target: path.display().to_string(),
                detail: "No such file or directory".to_string(),
            }
            .into()
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.writes.set(self.writes.get() + 1);
        self.put(path, content);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub interfaces: Vec<String>,
    pub wireless: Vec<String>,
    pub addresses: HashMap<String, String>,
    pub stations: usize,
}

impl FakeHost {
    pub fn new(wireless: &[&str], wired: &[&str]) -> Self {
        let wireless: Vec<String> = wireless.iter().map(|s| s.to_string()).collect();
        let mut interfaces = wireless.clone();
        interfaces.extend(wired.iter().map(|s| s.to_string()));
        Self { interfaces, wireless, ..Self::default() }
    }
}

impl Host for FakeHost {
    fn interface_exists(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i == name)
    }

    fn wireless_interfaces(&self) -> Vec<String> {
        self.wireless.clone()
    }

    fn ipv4_address(&self, name: &str) -> Option<String> {
        self.addresses.get(name).cloned()
    }

    fn station_count(&self, _name: &str) -> usize {
        self.stations
    }
}

#[derive(Default)]
pub struct RecordingProvisioner {
    pub stages: RefCell<Vec<Stage>>,
    /// Script name that exits non-zero.
    pub fail_script: Cell<Option<&'static str>>,
}

impl RecordingProvisioner {
    pub fn scripts(&self) -> Vec<&'static str> {
        self.stages.borrow().iter().map(Stage::script).collect()
    }
}

impl Provisioner for RecordingProvisioner {
    fn run(&self, stage: &Stage) -> Result<()> {
        self.stages.borrow_mut().push(stage.clone());
        if self.fail_script.get() == Some(stage.script()) {
            return Err(BridgeError::Command {
                command: stage.script().to_string(),
                detail: "exit code 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Answers questions from a script, keyed by a prompt substring.
/// Unscripted questions take their default.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub answers: RefCell<Vec<(&'static str, VecDeque<String>)>>,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn answer(self, prompt: &'static str, value: &str) -> Self {
        {
            let mut answers = self.answers.borrow_mut();
            match answers.iter_mut().find(|(key, _)| *key == prompt) {
                Some((_, queue)) => queue.push_back(value.to_string()),
                None => answers.push((prompt, VecDeque::from([value.to_string()]))),
            }
        }
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    fn next(&self, prompt: &str) -> Option<String> {
        self.asked.borrow_mut().push(prompt.to_string());
        let mut answers = self.answers.borrow_mut();
        answers
            .iter_mut()
            .find(|(key, queue)| prompt.contains(*key) && !queue.is_empty())
            .and_then(|(_, queue)| queue.pop_front())
    }
}

impl Prompter for ScriptedPrompter {
    fn text(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        match self.next(prompt).filter(|a| !a.is_empty()) {
            Some(answer) => Ok(answer),
            None => default
                .map(String::from)
                .ok_or_else(|| anyhow::anyhow!("'{}' needs an answer and has no default", prompt)),
        }
    }

    fn optional_text(&self, prompt: &str) -> Result<Option<String>> {
        Ok(self.next(prompt).filter(|a| !a.is_empty()))
    }

    fn select(&self, prompt: &str, _choices: &[&str], default: &str) -> Result<String> {
        Ok(self.next(prompt).unwrap_or_else(|| default.to_string()))
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(self.next(prompt).map(|a| a == "y").unwrap_or(default))
    }

    fn secret(&self, prompt: &str, _allow_empty: bool) -> Result<String> {
        Ok(self.next(prompt).unwrap_or_default())
    }
}

/// A bridge currently serving `wlan1` via `eth0`, with config files in memory.
pub struct Fixture {
    pub firewall: FakeFirewall,
    pub services: FakeServices,
    pub files: MemoryFiles,
    pub host: FakeHost,
    pub provisioner: RecordingProvisioner,
    pub paths: Paths,
    pub defaults: Defaults,
}

impl Fixture {
    pub fn new() -> Self {
        let paths = Paths {
            hostapd_conf: PathBuf::from(HOSTAPD_CONF),
            dnsmasq_conf: PathBuf::from(DNSMASQ_CONF),
            network_manager_conf: PathBuf::from(NM_CONF),
            systemd_dir: PathBuf::from("/etc/systemd/system"),
            state_file: PathBuf::from("/nonexistent/setup-state.json"),
        };

        let files = MemoryFiles::default();
        files.put(
            HOSTAPD_CONF,
            "ctrl_interface=/var/run/hostapd\ninterface=wlan1\nssid=PiNet\ncountry_code=US\nwpa_passphrase=oldsecret123\n",
        );
        files.put(DNSMASQ_CONF, "interface=wlan1\ndhcp-range=192.168.31.50,192.168.31.150,12h\n");
        files.put(NM_CONF, "[main]\nplugins=ifupdown,keyfile\n\n[keyfile]\nunmanaged-devices=interface-name:wlan1\n");
        files.put(
            "/etc/systemd/system/wlan1-static-ip.service",
            "[Service]\nType=oneshot\nExecStart=/sbin/ip addr add 192.168.31.4/24 dev wlan1\n",
        );

        Self {
            firewall: FakeFirewall::with_pair(&InterfacePair::new("wlan1", "eth0")),
            services: FakeServices::default(),
            files,
            host: FakeHost::new(&["wlan0", "wlan1"], &["eth0", "usb0"]),
            provisioner: RecordingProvisioner::default(),
            paths,
            defaults: Defaults::default(),
        }
    }

    pub fn system(&self) -> System<'_> {
        System {
            firewall: &self.firewall,
            services: &self.services,
            files: &self.files,
            host: &self.host,
            provisioner: &self.provisioner,
            paths: &self.paths,
            defaults: &self.defaults,
        }
    }
}

pub fn bridge_error(err: &anyhow::Error) -> &BridgeError {
    err.downcast_ref::<BridgeError>()
        .unwrap_or_else(|| panic!("not a BridgeError: {:#}", err))
}
