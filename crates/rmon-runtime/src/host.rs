use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::files;
use crate::privilege::Account;
use crate::shell::Runner;
use crate::ui;

pub const SUDOERS_DIR: &str = "/etc/sudoers.d";

pub fn set_hostname(runner: &Runner, hostname: &str) -> Result<()> {
    runner
        .run("/usr/bin/hostnamectl", &["set-hostname", hostname])
        .context("Error setting hostname")?;
    ui::success(&format!("Set hostname to {}", hostname));
    Ok(())
}

pub fn set_timezone(runner: &Runner, timezone: &str) -> Result<()> {
    runner
        .run("/usr/bin/timedatectl", &["set-timezone", timezone])
        .context("Error setting timezone")?;
    ui::success(&format!("Set timezone to {}", timezone));
    Ok(())
}

/// Drop-in granting `user` passwordless sudo.
pub fn sudoers_entry(user: &str) -> String {
    format!("{} ALL=(ALL) NOPASSWD: ALL\n", user)
}

/// Give `user` passwordless sudo through a drop-in under `dir`.
///
/// An existing drop-in is left alone. A new one is checked with
/// `visudo -cf` and removed again if the check fails.
pub fn grant_sudo(runner: &Runner, user: &str, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(user);
    if files::exists(&path) {
        ui::info(&format!("{} already has a sudoers entry", user));
        return Ok(path);
    }

    files::write_file(&path, &sudoers_entry(user), 0o440, None)?;
    let path_arg = path.to_string_lossy();
    if let Err(e) = runner.run("visudo", &["-cf", &path_arg]) {
        let _ = std::fs::remove_file(&path);
        return Err(e).with_context(|| format!("Invalid sudoers entry for {}", user));
    }

    ui::success(&format!("Added {} to sudoers", user));
    Ok(path)
}

/// Create `~/.config/systemd/user` and `~/.ssh` for the account.
pub fn scaffold_user_dirs(account: &Account) -> Result<()> {
    let units = account.systemd_user_dir();
    let config = account.home.join(".config");
    let parents: Vec<PathBuf> = [config.clone(), config.join("systemd")]
        .into_iter()
        .filter(|p| !p.is_dir())
        .collect();

    if files::ensure_dir(&units, 0o755, Some(account))? {
        for parent in &parents {
            account.chown(parent)?;
        }
        ui::success(&format!("Created directory '{}'", units.display()));
    } else {
        ui::info(&format!("Directory {} already exists", units.display()));
    }

    let ssh = account.ssh_dir();
    if files::ensure_dir(&ssh, 0o700, Some(account))? {
        ui::success(&format!("Created directory '{}'", ssh.display()));
    }
    Ok(())
}

/// Require the account's RSA key pair and force the private key to 0600.
pub fn check_ssh_keys(account: &Account) -> Result<PathBuf> {
    let ssh = account.ssh_dir();
    let private = ssh.join("id_rsa");
    let public = ssh.join("id_rsa.pub");

    if !files::exists(&public) {
        anyhow::bail!("Public key missing at {}", public.display());
    }
    if !files::exists(&private) {
        anyhow::bail!("Private key missing at {}", private.display());
    }

    if files::ensure_mode(&private, 0o600).context("Error reading SSH private key")? {
        ui::info(&format!(
            "Set permissions for {} to 0600 (-rw-------)",
            private.display()
        ));
    }
    Ok(private)
}
