use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

use rmon_core::config::Settings;

use crate::shell::Runner;
use crate::ui;

pub const OS_RELEASE: &str = "/etc/os-release";

/// Distribution and release codename, e.g. `raspbian` / `bullseye`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub codename: String,
}

fn patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"^ID=(\w+)$").expect("static regex"),
            Regex::new(r"^VERSION_CODENAME=(\w+)$").expect("static regex"),
        )
    })
}

/// Parse the `ID=` and `VERSION_CODENAME=` lines of an os-release file.
pub fn parse_os_release(content: &str) -> Result<OsRelease> {
    let (id_re, codename_re) = patterns();
    let mut id = None;
    let mut codename = None;

    for line in content.lines() {
        if let Some(c) = id_re.captures(line) {
            id = Some(c[1].to_string());
        }
        if let Some(c) = codename_re.captures(line) {
            codename = Some(c[1].to_string());
        }
    }

    let id = id.context("No OS was detected")?;
    let codename = codename.context("No release was detected")?;
    Ok(OsRelease { id, codename })
}

pub fn detect_os(path: &Path) -> Result<OsRelease> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Error reading OS info from {}", path.display()))?;
    let release = parse_os_release(&content)?;
    ui::info(&format!("OS/Release: {}/{}", release.id, release.codename));
    Ok(release)
}

/// Debian architecture name, e.g. `armhf` or `arm64`.
pub fn architecture(runner: &Runner) -> Result<String> {
    let arch = runner
        .run("dpkg", &["--print-architecture"])
        .context("Error getting CPU architecture")?;
    Ok(arch.trim().to_string())
}

pub fn repository_line(base: &str, arch: &str, release: &OsRelease) -> String {
    format!(
        "deb [arch={}] {}/{} {} stable",
        arch,
        base.trim_end_matches('/'),
        release.id,
        release.codename
    )
}

/// Register the container engine's apt repository for this OS.
pub fn add_vendor_repository(runner: &Runner, settings: &Settings, os_release: &Path) -> Result<()> {
    let arch = architecture(runner)?;
    let release = detect_os(os_release)?;
    let repo = repository_line(&settings.docker_repo_base, &arch, &release);

    runner
        .run("apt-add-repository", &[repo.as_str()])
        .context("Error adding docker APT repository")?;

    ui::success(&format!("Added {} to APT sources", repo));
    Ok(())
}

fn apt_install(runner: &Runner, packages: &[String]) -> Result<()> {
    let mut args = vec!["install", "-y"];
    args.extend(packages.iter().map(String::as_str));
    runner.run("apt-get", &args)?;
    Ok(())
}

/// Install the fixed dependency list.
pub fn install_dependencies(runner: &Runner, settings: &Settings) -> Result<()> {
    let sp = ui::spinner("Installing dependencies...");
    let result = apt_install(runner, &settings.dependencies);
    sp.finish_and_clear();
    result.context("Error installing dependencies")?;

    ui::success(&format!(
        "Installed Dependencies:{}",
        ui::bullets(&settings.dependencies)
    ));
    Ok(())
}

/// Add the repository, refresh indexes, and install the container engine.
pub fn install_container_runtime(
    runner: &Runner,
    settings: &Settings,
    os_release: &Path,
) -> Result<()> {
    ui::info("Installing docker...");
    add_vendor_repository(runner, settings, os_release)?;

    runner
        .run("apt-get", &["update"])
        .context("Error updating APT")?;

    let sp = ui::spinner("Installing container engine...");
    let result = apt_install(runner, &settings.docker_packages);
    sp.finish_and_clear();
    result.context("Error installing Docker")?;

    ui::success("Installed docker");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_mock::{self, MockResponse};

    const RASPBIAN: &str = r#"PRETTY_NAME="Raspbian GNU/Linux 11 (bullseye)"
NAME="Raspbian GNU/Linux"
VERSION_ID="11"
VERSION="11 (bullseye)"
VERSION_CODENAME=bullseye
ID=raspbian
ID_LIKE=debian
"#;

    #[test]
    fn test_parse_os_release() {
        let r = parse_os_release(RASPBIAN).unwrap();
        assert_eq!(r.id, "raspbian");
        assert_eq!(r.codename, "bullseye");
    }

    #[test]
    fn test_parse_os_release_anchored() {
        // ID_LIKE and quoted values must not match.
        let r = parse_os_release("ID_LIKE=debian\nID=\"ubuntu\"\nID=ubuntu\nVERSION_CODENAME=jammy\n")
            .unwrap();
        assert_eq!(r.id, "ubuntu");
    }

    #[test]
    fn test_parse_os_release_missing_fields() {
        let err = parse_os_release("VERSION_CODENAME=bullseye\n").unwrap_err();
        assert!(err.to_string().contains("No OS"));
        let err = parse_os_release("ID=debian\n").unwrap_err();
        assert!(err.to_string().contains("No release"));
    }

    #[test]
    fn test_repository_line() {
        let r = OsRelease {
            id: "raspbian".to_string(),
            codename: "bullseye".to_string(),
        };
        assert_eq!(
            repository_line("https://download.docker.com/linux/", "armhf", &r),
            "deb [arch=armhf] https://download.docker.com/linux/raspbian bullseye stable"
        );
    }

    #[test]
    fn test_install_container_runtime_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let os_release = dir.path().join("os-release");
        std::fs::write(&os_release, RASPBIAN).unwrap();

        let (_guard, calls) = shell_mock::mock()
            .respond("dpkg --print-architecture", MockResponse::ok("armhf\n"))
            .install();

        install_container_runtime(&Runner::root(), &Settings::default(), &os_release).unwrap();

        assert_eq!(
            calls.lines(),
            vec![
                "dpkg --print-architecture",
                "apt-add-repository deb [arch=armhf] https://download.docker.com/linux/raspbian bullseye stable",
                "apt-get update",
                "apt-get install -y docker-ce docker-ce-cli containerd.io",
            ]
        );
    }

    #[test]
    fn test_apt_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let os_release = dir.path().join("os-release");
        std::fs::write(&os_release, RASPBIAN).unwrap();

        let (_guard, calls) = shell_mock::mock()
            .respond("apt-get update", MockResponse::fail(100, "network unreachable"))
            .install();

        let err = install_container_runtime(&Runner::root(), &Settings::default(), &os_release)
            .unwrap_err();
        assert!(err.to_string().contains("Error updating APT"));
        assert!(calls.position("apt-get install").is_none());
    }

    #[test]
    fn test_install_dependencies() {
        let (_guard, calls) = shell_mock::mock().install();
        install_dependencies(&Runner::root(), &Settings::default()).unwrap();
        assert_eq!(
            calls.lines(),
            vec!["apt-get install -y autossh libffi-dev libssl-dev python3 python3-pip"]
        );
    }
}
