use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rmon_core::config::Settings;
use rmon_core::vendor;

use crate::files;
use crate::privilege::Account;
use crate::shell::Runner;
use crate::systemd::ServiceManager;
use crate::ui;
use crate::units::ComposeUnit;

pub const DOCKER_GROUP: &str = "docker";

/// Where `pip3 install docker-compose` puts the binary when run as root.
pub const COMPOSE_BIN: &str = "/usr/local/bin/docker-compose";

/// Create the docker group if needed and add `account` to it.
pub fn ensure_group(runner: &Runner, account: &Account) -> Result<()> {
    let exists = runner.query("getent", &["group", DOCKER_GROUP])?.success();
    if exists {
        ui::info("Docker group already exists");
    } else {
        runner
            .run("groupadd", &[DOCKER_GROUP])
            .context("Error creating docker group")?;
        ui::success("Created docker group");
    }

    let groups = runner
        .run("id", &["-nG", account.name.as_str()])
        .with_context(|| format!("Error reading groups of {}", account.name))?;
    if groups.split_whitespace().any(|g| g == DOCKER_GROUP) {
        ui::info(&format!("{} is already a member of docker group", account.name));
    } else {
        runner
            .run("usermod", &["-aG", DOCKER_GROUP, account.name.as_str()])
            .with_context(|| format!("Error adding {} to docker group", account.name))?;
        ui::success(&format!("Added {} to docker group", account.name));
    }
    Ok(())
}

/// Start docker at boot.
pub fn enable_on_boot(runner: &Runner) -> Result<()> {
    runner
        .run("systemctl", &["enable", "docker"])
        .context("Error setting Docker to start on boot")?;
    ui::success("Set docker to start on boot");
    Ok(())
}

/// Locate docker-compose: PATH first, then the pip install location.
pub fn find_compose() -> Option<PathBuf> {
    which::which("docker-compose")
        .ok()
        .or_else(|| Some(PathBuf::from(COMPOSE_BIN)).filter(|p| p.exists()))
}

/// Install docker-compose with pip3 unless it is already present.
pub fn install_compose(runner: &Runner) -> Result<PathBuf> {
    if let Some(path) = find_compose() {
        ui::info(&format!("Docker compose found at {}", path.display()));
        return Ok(path);
    }

    ui::info("Docker compose executable not found, installing Docker Compose...");
    let sp = ui::spinner("pip3 install docker-compose");
    let result = runner.run("pip3", &["install", "docker-compose"]);
    sp.finish_and_clear();
    result.context("Error installing Docker Compose")?;

    Ok(find_compose().unwrap_or_else(|| PathBuf::from(COMPOSE_BIN)))
}

/// Make sure the docker daemon is running.
pub fn ensure_running(services: &ServiceManager) -> Result<()> {
    if !services.is_active("docker")? {
        services.start("docker")?;
    }
    Ok(())
}

/// `docker login` with the password fed on stdin.
pub fn registry_login(runner: &Runner, registry: &str, username: &str, password: &str) -> Result<()> {
    ui::info(&format!(
        "Logging in to AppNeta Docker registry {} as {}...",
        registry, username
    ));
    let input = format!("{}\n", password);
    runner
        .run_with_stdin(
            "docker",
            &["login", "--username", username, "--password-stdin", registry],
            input.as_bytes(),
        )
        .with_context(|| format!("Error logging in to AppNeta Docker Registry {}", registry))?;
    Ok(())
}

/// Docker's credential store for the invoking user.
pub fn credential_store() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/root"));
    home.join(".docker").join("config.json")
}

/// Whether the credential store at `path` holds an entry for `registry`.
/// A missing store means not logged in.
pub fn login_recorded(path: &Path, registry: &str) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Error reading docker config file {}", path.display()))?;
    vendor::has_registry_auth(&content, registry)
}

/// Copy the compose file and `.env` from the bundle into the system-wide
/// compose directory.
pub fn scaffold_compose_dir(settings: &Settings, bundle_dir: &Path) -> Result<()> {
    let dir = &settings.compose_dir;
    if files::ensure_dir(dir, 0o755, None)? {
        ui::success(&format!("Created {}", dir.display()));
    } else {
        ui::info(&format!("{} already exists", dir.display()));
    }

    let compose_src = bundle_dir.join(vendor::COMPOSE_FILE);
    let compose_dst = settings.compose_file();
    files::copy_file(&compose_src, &compose_dst)?;
    ui::success(&format!(
        "Copied {} to {}",
        compose_src.display(),
        compose_dst.display()
    ));

    let env_src = bundle_dir.join(vendor::ENV_FILE);
    let env_dst = dir.join(vendor::ENV_FILE);
    files::copy_file(&env_src, &env_dst)?;
    ui::success(&format!("Copied {} to {}", env_src.display(), env_dst.display()));
    Ok(())
}

/// Write, enable, and start the system-scope compose service.
pub fn install_compose_service(
    services: &ServiceManager,
    settings: &Settings,
    compose_bin: &Path,
) -> Result<bool> {
    let unit = ComposeUnit {
        description: format!("AppNeta monitoring point ({})", settings.compose_service),
        working_dir: settings.compose_dir.display().to_string(),
        compose_file: settings.compose_file().display().to_string(),
        compose_bin: compose_bin.display().to_string(),
    }
    .render()?;

    let name = settings.compose_service.as_str();
    services.write_unit(name, &unit)?;
    services.reload()?;
    services.enable(name)?;
    services.start(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_mock::{self, MockResponse};

    fn pi() -> Account {
        Account::parse_passwd_line("pi:x:1000:1000::/home/pi:/bin/bash").unwrap()
    }

    #[test]
    fn test_ensure_group_creates_and_adds() {
        let (_guard, calls) = shell_mock::mock()
            .respond("getent group docker", MockResponse::fail(2, ""))
            .respond("id -nG pi", MockResponse::ok("pi adm sudo\n"))
            .install();

        ensure_group(&Runner::root(), &pi()).unwrap();

        assert_eq!(
            calls.lines(),
            vec![
                "getent group docker",
                "groupadd docker",
                "id -nG pi",
                "usermod -aG docker pi"
            ]
        );
    }

    #[test]
    fn test_ensure_group_already_member() {
        let (_guard, calls) = shell_mock::mock()
            .respond("getent group docker", MockResponse::ok("docker:x:998:pi\n"))
            .respond("id -nG pi", MockResponse::ok("pi docker\n"))
            .install();

        ensure_group(&Runner::root(), &pi()).unwrap();

        assert!(calls.position("groupadd").is_none());
        assert!(calls.position("usermod").is_none());
    }

    #[test]
    fn test_registry_login_uses_stdin() {
        let (_guard, calls) = shell_mock::mock().install();

        registry_login(&Runner::root(), "reg.azurecr.io/mp", "TOK-KEY", "hunter2").unwrap();

        let call = &calls.all()[0];
        assert_eq!(
            call.line(),
            "docker login --username TOK-KEY --password-stdin reg.azurecr.io/mp"
        );
        assert_eq!(call.stdin.as_deref(), Some(b"hunter2\n".as_slice()));
    }

    #[test]
    fn test_registry_login_failure() {
        let (_guard, _calls) = shell_mock::mock()
            .respond("docker login", MockResponse::fail(1, "unauthorized"))
            .install();

        let err = registry_login(&Runner::root(), "reg.io", "u", "p").unwrap_err();
        assert!(err.to_string().contains("Error logging in"));
    }

    #[test]
    fn test_login_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(!login_recorded(&path, "reg.azurecr.io").unwrap());

        std::fs::write(&path, r#"{"auths":{"reg.azurecr.io":{}}}"#).unwrap();
        assert!(login_recorded(&path, "reg.azurecr.io/path").unwrap());
        assert!(!login_recorded(&path, "other.io").unwrap());
    }

    #[test]
    fn test_ensure_running_starts_inactive_docker() {
        let (_guard, calls) = shell_mock::mock()
            .respond("systemctl is-active docker", MockResponse::fail(3, "inactive"))
            .install();

        ensure_running(&ServiceManager::system(Runner::root())).unwrap();
        assert!(calls.position("systemctl restart docker.service").is_some());
    }

    #[test]
    fn test_scaffold_compose_dir() {
        let bundle = tempfile::tempdir().unwrap();
        std::fs::write(bundle.path().join("mp-compose.yaml"), "services: {}\n").unwrap();
        std::fs::write(bundle.path().join(".env"), "APPNETA_SERVER_KEY=K\n").unwrap();
        let sys = tempfile::tempdir().unwrap();
        let settings = Settings {
            compose_dir: sys.path().join("compose"),
            ..Settings::default()
        };

        scaffold_compose_dir(&settings, bundle.path()).unwrap();

        let dir = sys.path().join("compose");
        assert_eq!(
            std::fs::read_to_string(dir.join("appneta-cmp.yaml")).unwrap(),
            "services: {}\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.join(".env")).unwrap(),
            "APPNETA_SERVER_KEY=K\n"
        );

        // A second run replaces the copies.
        scaffold_compose_dir(&settings, bundle.path()).unwrap();
    }

    #[test]
    fn test_install_compose_service() {
        let units = tempfile::tempdir().unwrap();
        let (_guard, calls) = shell_mock::mock()
            .respond("systemctl is-active", MockResponse::ok("active\n"))
            .install();
        let services = ServiceManager::system(Runner::root()).with_unit_dir(units.path());

        let started = install_compose_service(
            &services,
            &Settings::default(),
            Path::new("/usr/local/bin/docker-compose"),
        )
        .unwrap();

        assert!(started);
        let unit = std::fs::read_to_string(units.path().join("appneta-cmp.service")).unwrap();
        assert!(unit.contains("-f /etc/docker/compose/appneta-cmp.yaml up -d"));
        let reload = calls.position("systemctl daemon-reload").unwrap();
        let enable = calls.position("systemctl enable appneta-cmp.service").unwrap();
        let restart = calls.position("systemctl restart appneta-cmp.service").unwrap();
        assert!(reload < enable && enable < restart);
    }
}
