mod common;

use pretty_assertions::assert_eq;
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

use common::{FakeHost, Fixture, ScriptedPrompter, bridge_error};
use pi_bridge::checkpoint::{CheckpointStore, SetupAnswers, SetupCheckpoint, SetupMode};
use pi_bridge::error::BridgeError;
use pi_bridge::provision::Stage;
use pi_bridge::setup::{SetupController, SetupOptions, SetupOutcome};

const REMAINING: [&str; 6] = [
    "02-configure-hostapd.sh",
    "03-configure-dnsmasq.sh",
    "04-configure-network-manager.sh",
    "05-setup-nat.sh",
    "06-setup-service.sh",
    "07-enable-services.sh",
];

fn store() -> (TempDir, CheckpointStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("pi-bridge/setup-state.json"));
    (dir, store)
}

fn options(mode: SetupMode) -> SetupOptions {
    SetupOptions { mode, skip_packages: false }
}

fn saved_answers(use_defaults: bool) -> SetupAnswers {
    SetupAnswers {
        chipset: "intel".to_string(),
        interface: "wlan1".to_string(),
        ssid: "PiNet".to_string(),
        country: "US".to_string(),
        gateway: "192.168.31.4".to_string(),
        wan_interface: "eth0".to_string(),
        enable_mdns: false,
        use_defaults,
    }
}

fn run(
    fx: &Fixture,
    prompter: &ScriptedPrompter,
    store: &CheckpointStore,
    options: SetupOptions,
    stdin: &str,
) -> anyhow::Result<SetupOutcome> {
    let sys = fx.system();
    SetupController::new(&sys, prompter, store).run(options, &mut Cursor::new(stdin))
}

#[test]
fn fresh_defaults_run_installs_packages_and_checkpoints() {
    let fx = Fixture::new();
    let (_dir, store) = store();

    let outcome = run(&fx, &ScriptedPrompter::default(), &store, options(SetupMode::Defaults), "").unwrap();

    assert_eq!(outcome, SetupOutcome::RebootRequired);
    assert_eq!(fx.provisioner.scripts(), vec!["01-install-packages.sh"]);
    assert_eq!(store.load(), Some(SetupCheckpoint::packages_installed(saved_answers(true))));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(json["version"], 1);
    assert_eq!(json["stage"], "packages-installed");
}

#[test]
fn resumed_defaults_run_finishes_and_clears_checkpoint() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    store
        .save(&SetupCheckpoint::packages_installed(saved_answers(true)))
        .unwrap();

    let outcome = run(
        &fx,
        &ScriptedPrompter::default(),
        &store,
        options(SetupMode::Defaults),
        "testpassword\n",
    )
    .unwrap();

    assert_eq!(outcome, SetupOutcome::Completed);
    assert_eq!(fx.provisioner.scripts(), REMAINING.to_vec());
    assert_eq!(fx.provisioner.stages.borrow()[0].stdin().as_deref(), Some("testpassword\n"));
    assert!(!store.path().exists());
}

#[test]
fn mode_mismatch_leaves_checkpoint_untouched() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    store
        .save(&SetupCheckpoint::packages_installed(saved_answers(true)))
        .unwrap();
    let before = fs::read(store.path()).unwrap();

    let err = run(
        &fx,
        &ScriptedPrompter::default(),
        &store,
        options(SetupMode::Interactive),
        "",
    )
    .unwrap_err();

    match bridge_error(&err) {
        BridgeError::ModeMismatch { saved, requested, .. } => {
            assert_eq!(*saved, SetupMode::Defaults);
            assert_eq!(*requested, SetupMode::Interactive);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fs::read(store.path()).unwrap(), before);
    assert!(fx.provisioner.scripts().is_empty());
}

#[test]
fn missing_passphrase_on_stdin_is_fatal_and_keeps_checkpoint() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    store
        .save(&SetupCheckpoint::packages_installed(saved_answers(true)))
        .unwrap();

    let err = run(&fx, &ScriptedPrompter::default(), &store, options(SetupMode::Defaults), "\n")
        .unwrap_err();

    assert!(matches!(bridge_error(&err), BridgeError::PassphraseRequired));
    assert!(fx.provisioner.scripts().is_empty());
    assert!(store.load().is_some());
}

#[test]
fn skipped_package_install_runs_straight_through() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    let options = SetupOptions { mode: SetupMode::Defaults, skip_packages: true };

    let outcome = run(&fx, &ScriptedPrompter::default(), &store, options, "testpassword\n").unwrap();

    assert_eq!(outcome, SetupOutcome::Completed);
    assert_eq!(fx.provisioner.scripts(), REMAINING.to_vec());
    assert!(!store.path().exists());
}

#[test]
fn defaults_prefer_a_detected_wireless_interface() {
    let mut fx = Fixture::new();
    fx.host = FakeHost::new(&["wlan0"], &["eth0"]);
    let (_dir, store) = store();

    run(&fx, &ScriptedPrompter::default(), &store, options(SetupMode::Defaults), "").unwrap();

    assert_eq!(store.load().unwrap().config.interface, "wlan0");
}

#[test]
fn unknown_interface_stops_before_any_stage() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    let prompter = ScriptedPrompter::default().answer("AP interface", "wlan9");

    let err = run(&fx, &prompter, &store, options(SetupMode::Interactive), "").unwrap_err();

    match bridge_error(&err) {
        BridgeError::InterfaceNotFound(name) => assert_eq!(name, "wlan9"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(fx.provisioner.scripts().is_empty());
    assert!(!store.path().exists());
}

#[test]
fn declining_to_proceed_aborts_cleanly() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    let prompter = ScriptedPrompter::default().answer("Proceed", "n");

    let outcome = run(&fx, &prompter, &store, options(SetupMode::Interactive), "").unwrap();

    assert_eq!(outcome, SetupOutcome::Aborted);
    assert!(fx.provisioner.scripts().is_empty());
}

#[test]
fn declining_to_resume_discards_checkpoint() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    store
        .save(&SetupCheckpoint::packages_installed(saved_answers(false)))
        .unwrap();
    let prompter = ScriptedPrompter::default().answer("Resume", "n");

    let outcome = run(&fx, &prompter, &store, options(SetupMode::Interactive), "").unwrap();

    assert_eq!(outcome, SetupOutcome::Discarded);
    assert!(!store.path().exists());
    assert!(fx.provisioner.scripts().is_empty());
}

#[test]
fn interactive_answers_reach_the_stages() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    let prompter = ScriptedPrompter::default()
        .answer("chipset", "realtek")
        .answer("AP interface", "wlan0")
        .answer("SSID", "Workshop")
        .answer("United States", "n")
        .answer("Country code", "gb")
        .answer("WAN interface", "usb0")
        .answer("mDNS", "y")
        .answer("passphrase", "short")
        .answer("passphrase", "longenough1");
    let options = SetupOptions { mode: SetupMode::Interactive, skip_packages: true };

    let outcome = run(&fx, &prompter, &store, options, "").unwrap();

    assert_eq!(outcome, SetupOutcome::Completed);
    let stages = fx.provisioner.stages.borrow();
    assert_eq!(
        stages[0],
        Stage::Hostapd {
            interface: "wlan0".to_string(),
            ssid: "Workshop".to_string(),
            country: "GB".to_string(),
            passphrase: "longenough1".to_string(),
        }
    );
    assert_eq!(
        stages[3],
        Stage::Nat {
            ap_interface: "wlan0".to_string(),
            wan_interface: "usb0".to_string(),
        }
    );
    assert_eq!(stages.last().map(Stage::script), Some("08-configure-mdns.sh"));
    assert_eq!(prompter.asked().iter().filter(|q| q.contains("passphrase")).count(), 2);
}

#[test]
fn failing_stage_keeps_checkpoint_for_rerun() {
    let fx = Fixture::new();
    let (_dir, store) = store();
    store
        .save(&SetupCheckpoint::packages_installed(saved_answers(true)))
        .unwrap();
    fx.provisioner.fail_script.set(Some("03-configure-dnsmasq.sh"));

    let err = run(
        &fx,
        &ScriptedPrompter::default(),
        &store,
        options(SetupMode::Defaults),
        "testpassword\n",
    )
    .unwrap_err();

    match bridge_error(&err) {
        BridgeError::Command { command, .. } => assert_eq!(command, "03-configure-dnsmasq.sh"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fx.provisioner.scripts(), REMAINING[..2].to_vec());
    assert!(store.load().is_some());
}
