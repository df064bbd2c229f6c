use std::path::Path;

use anyhow::Result;

use rmon_core::config::Settings;
use rmon_core::identity::NodeIdentity;
use rmon_runtime::privilege::{self, Account};
use rmon_runtime::shell::Runner;
use rmon_runtime::systemd::ServiceManager;
use rmon_runtime::{bundle, docker, host, packages, tunnel, ui};

use crate::prompt;

/// Pipeline stages, in execution order, as shown to the operator.
pub const STEPS: &[&str] = &[
    "Hostname and timezone",
    "System dependencies",
    "Docker engine",
    "Docker group and startup",
    "Docker Compose",
    "Download AppNeta bundle",
    "Activate AppNeta bundle",
    "AppNeta compose service",
    "SSH tunnel",
];

struct Progress {
    next: u32,
}

impl Progress {
    fn new() -> Self {
        Self { next: 1 }
    }

    fn step(&mut self) {
        let n = self.next;
        ui::step(n, STEPS.len() as u32, STEPS[(n - 1) as usize]);
        self.next += 1;
    }
}

/// Provision this machine as a monitoring node.
///
/// Must run as root. Stops at the first failure; nothing done before it is
/// rolled back.
pub fn run_setup(settings: &Settings) -> Result<()> {
    if !privilege::is_root() {
        anyhow::bail!("Setup must be run with root privileges. Try again with sudo.");
    }

    let root = Runner::root();
    let account = Account::lookup(&root, &settings.local_user)?;
    host::grant_sudo(&root, &account.name, Path::new(host::SUDOERS_DIR))?;

    ui::banner(&["Orion RMON Raspberry Pi Setup"]);
    println!("{}", prompt::requirements());

    let node_id = prompt::node_id(settings.prompt_attempts)?;
    let tunnel_server = prompt::tunnel_server(settings.prompt_attempts)?;
    let identity = NodeIdentity::new(node_id, tunnel_server, &settings.hostname_base)?;
    tracing::debug!(hostname = %identity.hostname, "derived node identity");

    let mut progress = Progress::new();

    progress.step();
    host::set_hostname(&root, &identity.hostname)?;
    host::set_timezone(&root, &settings.timezone)?;

    progress.step();
    packages::install_dependencies(&root, settings)?;

    progress.step();
    packages::install_container_runtime(&root, settings, Path::new(packages::OS_RELEASE))?;

    progress.step();
    docker::ensure_group(&root, &account)?;
    docker::enable_on_boot(&root)?;

    progress.step();
    let api_key = prompt::api_key(settings.prompt_attempts)?;
    let compose_bin = docker::install_compose(&root)?;

    progress.step();
    let bundle_dir = bundle::fetch_bundle(settings, &api_key, &identity.hostname_dashes, &account)?;

    progress.step();
    bundle::activate_bundle(&root, settings, &bundle_dir, &docker::credential_store())?;

    progress.step();
    let system = ServiceManager::system(root.clone());
    system.stop(&settings.compose_service)?;
    docker::scaffold_compose_dir(settings, &bundle_dir)?;
    docker::install_compose_service(&system, settings, &compose_bin)?;

    progress.step();
    privilege::run_as(&account, |runner| {
        host::scaffold_user_dirs(&account)?;
        host::check_ssh_keys(&account)?;
        tunnel::install_tunnel(runner, settings, &identity)
    })?;

    ui::success("Setup complete!");
    Ok(())
}
