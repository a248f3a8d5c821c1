use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io;
use tracing_subscriber::EnvFilter;

use pi_bridge::{
    checkpoint::{CheckpointStore, SetupMode},
    config::{self, Defaults, Settings},
    credentials,
    exec::Privilege,
    files::PrivilegedFiles,
    firewall::Iptables,
    forwarding,
    interface::IpHost,
    prompt::TerminalPrompter,
    provision::ScriptProvisioner,
    services::{self, Systemctl},
    setup::{self, SetupController, SetupOptions, SetupOutcome},
    snapshot::{read_ap_interface, read_snapshot},
    status,
    switch::{SwitchPlan, switch_interface},
    InterfacePair, System,
};

#[derive(Parser)]
#[command(name = "pi-bridge")]
#[command(about = "Run a Wi-Fi access point bridged to an uplink interface")]
#[command(version)]
struct Cli {
    /// Log debug output (also enabled by DEBUG=1)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the access point (resumes after the post-install reboot)
    Setup {
        /// Use defaults.sh values without prompting; passphrase is read from stdin
        #[arg(long)]
        use_defaults: bool,
    },

    /// Show or switch the AP and uplink interfaces
    Interface {
        #[command(subcommand)]
        action: InterfaceAction,
    },

    /// Manage NAT forwarding from the AP to uplink interfaces
    Forwarding {
        #[command(subcommand)]
        action: ForwardingAction,
    },

    /// Show services, AP configuration, forwarding and clients
    Status,

    /// Start the AP services
    Start,

    /// Stop the AP services
    Stop,

    /// Change the AP SSID and/or passphrase
    Credentials,

    /// Show effective settings
    Config,
}

#[derive(Subcommand)]
enum InterfaceAction {
    /// Show the configured AP interface
    Show,

    /// Move the AP to another interface and/or change the uplink
    Switch {
        /// New AP interface
        interface: String,

        /// Uplink interface (defaults to the current one)
        #[arg(long)]
        wan: Option<String>,
    },
}

#[derive(Subcommand)]
enum ForwardingAction {
    /// List uplinks with forwarding rules
    List,

    /// Forward AP traffic through an uplink
    Add {
        /// Uplink interface
        interface: String,
    },

    /// Stop forwarding AP traffic through an uplink
    Remove {
        /// Uplink interface
        interface: String,
    },
}

/// Production collaborators, owned for the lifetime of one invocation.
struct Runtime {
    settings: Settings,
    defaults: Defaults,
    firewall: Iptables,
    services: Systemctl,
    files: PrivilegedFiles,
    host: IpHost,
    provisioner: ScriptProvisioner,
}

impl Runtime {
    fn load() -> Result<Self> {
        let settings = Settings::load()?;
        let defaults = Defaults::load(&settings.defaults_file());
        let privilege = Privilege::from_settings(settings.sudo);

        Ok(Self {
            firewall: Iptables::new(privilege),
            services: Systemctl::new(privilege),
            files: PrivilegedFiles::new(privilege),
            host: IpHost,
            provisioner: ScriptProvisioner::new(&settings.setup_dir),
            defaults,
            settings,
        })
    }

    fn system(&self) -> System<'_> {
        System {
            firewall: &self.firewall,
            services: &self.services,
            files: &self.files,
            host: &self.host,
            provisioner: &self.provisioner,
            paths: &self.settings.paths,
            defaults: &self.defaults,
        }
    }
}

fn init_tracing(verbose: bool) {
    let debug = verbose || std::env::var("DEBUG").is_ok_and(|v| v == "1");
    let filter = if debug { "pi_bridge=debug" } else { "pi_bridge=info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = Runtime::load()?;
    let sys = runtime.system();

    match cli.command {
        Commands::Setup { use_defaults } => {
            cmd_setup(&sys, &runtime.settings, SetupMode::from_use_defaults(use_defaults))
        }
        Commands::Interface { action } => match action {
            InterfaceAction::Show => cmd_interface_show(&sys),
            InterfaceAction::Switch { interface, wan } => {
                cmd_interface_switch(&sys, &interface, wan.as_deref())
            }
        },
        Commands::Forwarding { action } => match action {
            ForwardingAction::List => cmd_forwarding_list(&sys),
            ForwardingAction::Add { interface } => cmd_forwarding_add(&sys, &interface),
            ForwardingAction::Remove { interface } => cmd_forwarding_remove(&sys, &interface),
        },
        Commands::Status => cmd_status(&sys),
        Commands::Start => cmd_start(&sys),
        Commands::Stop => cmd_stop(&sys),
        Commands::Credentials => cmd_credentials(&sys),
        Commands::Config => cmd_config(&runtime.settings),
    }
}

fn cmd_setup(sys: &System, settings: &Settings, mode: SetupMode) -> Result<()> {
    let checkpoints = CheckpointStore::new(&settings.paths.state_file);
    let prompter = TerminalPrompter;
    let options = SetupOptions {
        mode,
        skip_packages: std::env::var(setup::SKIP_PACKAGES_ENV).is_ok_and(|v| v == "1"),
    };

    let controller = SetupController::new(sys, &prompter, &checkpoints);
    let outcome = controller.run(options, &mut io::stdin().lock())?;

    if outcome == SetupOutcome::Completed {
        println!("AP is up. Check it with `pi-bridge status`.");
    }
    Ok(())
}

fn cmd_interface_show(sys: &System) -> Result<()> {
    let interface = read_ap_interface(sys).unwrap_or_else(|| "unknown".to_string());
    println!("Configured AP interface: {}", interface);
    Ok(())
}

fn cmd_interface_switch(sys: &System, interface: &str, wan: Option<&str>) -> Result<()> {
    let report = switch_interface(sys, interface, wan)?;

    match report.plan {
        SwitchPlan::NoOp { pair } => println!("Nothing to do: {}", pair),
        SwitchPlan::UplinkOnlyChange { to, .. } | SwitchPlan::FullSwitch { to, .. } => {
            println!(
                "Now serving {} ({} rule(s) removed, {} added)",
                to, report.rules.removed, report.rules.added
            );
        }
    }
    Ok(())
}

fn cmd_forwarding_list(sys: &System) -> Result<()> {
    let uplinks = forwarding::list_forwarding(sys.firewall)?;

    if uplinks.is_empty() {
        println!("No forwarding interfaces configured.");
        return Ok(());
    }

    let ap = read_ap_interface(sys).unwrap_or_else(|| sys.defaults.ap_interface.clone());
    println!("Forwarding interfaces (AP: {}):", ap);
    for uplink in uplinks {
        println!("  {}", uplink);
    }
    Ok(())
}

fn cmd_forwarding_add(sys: &System, uplink: &str) -> Result<()> {
    let pair = InterfacePair::new(read_snapshot(sys).current_ap, uplink);
    forwarding::add_forwarding(sys.firewall, &pair)?;
    Ok(())
}

fn cmd_forwarding_remove(sys: &System, uplink: &str) -> Result<()> {
    let pair = InterfacePair::new(read_snapshot(sys).current_ap, uplink);
    forwarding::remove_forwarding(sys.firewall, &pair)?;
    Ok(())
}

fn cmd_status(sys: &System) -> Result<()> {
    println!("{}", status::gather(sys));
    Ok(())
}

fn cmd_start(sys: &System) -> Result<()> {
    let ap = read_snapshot(sys).current_ap;
    services::start_bridge(sys.services, &ap)?;
    println!("Pi Bridge started on {}.", ap);
    Ok(())
}

fn cmd_stop(sys: &System) -> Result<()> {
    services::stop_bridge(sys.services)?;
    println!("Pi Bridge stopped.");
    Ok(())
}

fn cmd_credentials(sys: &System) -> Result<()> {
    credentials::update_credentials(sys, &TerminalPrompter)?;
    Ok(())
}

fn cmd_config(settings: &Settings) -> Result<()> {
    let path = config::config_path()?;
    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("(not present, showing built-in defaults)");
    }
    println!();
    print!("{}", toml::to_string_pretty(settings)?);
    println!();
    println!("Defaults file: {}", settings.defaults_file().display());
    Ok(())
}
