use anyhow::{Context, Result};

use rmon_core::config::Settings;
use rmon_core::identity::NodeIdentity;

use crate::shell::Runner;
use crate::systemd::ServiceManager;
use crate::units::TunnelUnit;

/// Write, enable, and start the reverse tunnel in the account's user
/// manager. `runner` must be bound to the account.
pub fn install_tunnel(runner: &Runner, settings: &Settings, identity: &NodeIdentity) -> Result<bool> {
    let services = ServiceManager::user(runner)?;
    let account = runner
        .account()
        .context("Tunnel must be installed as the local account")?;

    let unit = TunnelUnit {
        tunnel_server: identity.tunnel_server.as_str().to_string(),
        tunnel_user: settings.tunnel_user.clone(),
        identity_file: account.ssh_dir().join("id_rsa").display().to_string(),
        remote_port: identity.node_id.remote_port(),
    }
    .render()?;

    let name = settings.tunnel_service.as_str();
    services.write_unit(name, &unit)?;
    services.reload()?;
    services.enable(name)?;
    services.start(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::{Account, run_as};
    use crate::shell_mock::{self, MockResponse};
    use rmon_core::identity::{NodeId, TunnelServer};

    #[test]
    fn test_install_tunnel() {
        let home = tempfile::tempdir().unwrap();
        let account = Account {
            name: "pi".to_string(),
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            home: home.path().to_path_buf(),
        };
        std::fs::create_dir_all(account.systemd_user_dir()).unwrap();

        let identity = NodeIdentity::new(
            NodeId::parse("7").unwrap(),
            TunnelServer::parse("tunnel.example.com").unwrap(),
            "rmon.orion.cloud",
        )
        .unwrap();

        let (_guard, calls) = shell_mock::mock()
            .respond("systemctl --user is-active", MockResponse::ok("active\n"))
            .install();

        let started = run_as(&account, |runner| {
            install_tunnel(runner, &Settings::default(), &identity)
        })
        .unwrap();
        assert!(started);

        let unit =
            std::fs::read_to_string(account.systemd_user_dir().join("autossh.service")).unwrap();
        assert!(unit.contains("-R 10007:localhost:22"));
        assert!(unit.contains("rmontunnel@tunnel.example.com"));
        assert!(unit.contains(&format!("-i {}/.ssh/id_rsa", home.path().display())));

        let all = calls.all();
        assert!(all.iter().all(|c| c.user.as_deref() == Some("pi")));
        assert!(calls.position("systemctl --user enable autossh.service").is_some());
        assert!(calls.position("systemctl --user restart autossh.service").is_some());
    }

    #[test]
    fn test_install_tunnel_requires_account() {
        let identity = NodeIdentity::new(
            NodeId::parse("1").unwrap(),
            TunnelServer::parse("tunnel.example.com").unwrap(),
            "rmon.orion.cloud",
        )
        .unwrap();
        assert!(install_tunnel(&Runner::root(), &Settings::default(), &identity).is_err());
    }
}
