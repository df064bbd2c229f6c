use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::files;
use crate::shell::Runner;
use crate::ui;

/// Directory holding system-wide unit files.
pub const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";

/// Which systemd instance a [`ServiceManager`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The system manager (`systemctl`).
    System,
    /// One user's manager (`systemctl --user`).
    User,
}

/// Wrapper around `systemctl` for one scope.
#[derive(Debug, Clone)]
pub struct ServiceManager {
    scope: Scope,
    runner: Runner,
    unit_dir: PathBuf,
}

impl ServiceManager {
    /// System-scope manager writing units to `/etc/systemd/system`.
    pub fn system(runner: Runner) -> Self {
        Self {
            scope: Scope::System,
            runner,
            unit_dir: PathBuf::from(SYSTEM_UNIT_DIR),
        }
    }

    /// User-scope manager. The runner must be bound to the account (see
    /// [`crate::privilege::run_as`]); the session bus belongs to it.
    pub fn user(runner: &Runner) -> Result<Self> {
        let account = runner.account().context(
            "User-scope systemd operations must run as the target account",
        )?;
        Ok(Self {
            scope: Scope::User,
            unit_dir: account.systemd_user_dir(),
            runner: runner.clone(),
        })
    }

    /// Override where unit files are read and written.
    pub fn with_unit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = dir.into();
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(format!("{}.service", name))
    }

    fn systemctl(&self, args: &[&str]) -> Result<String> {
        match self.scope {
            Scope::System => self.runner.run("systemctl", args),
            Scope::User => {
                let mut full = vec!["--user"];
                full.extend_from_slice(args);
                self.runner.run("systemctl", &full)
            }
        }
    }

    /// Whether `name` reports `active`.
    pub fn is_active(&self, name: &str) -> Result<bool> {
        let outcome = match self.scope {
            Scope::System => self.runner.query("systemctl", &["is-active", name])?,
            Scope::User => self
                .runner
                .query("systemctl", &["--user", "is-active", name])?,
        };
        Ok(outcome.output.trim() == "active")
    }

    pub fn reload(&self) -> Result<()> {
        self.systemctl(&["daemon-reload"])
            .context("Error reloading systemd services")?;
        Ok(())
    }

    /// Write a rendered unit file. User-scope units are owned by the account.
    pub fn write_unit(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.unit_path(name);
        files::write_file(&path, content, 0o644, self.runner.account())
            .with_context(|| format!("Error writing {} service file", name))?;
        ui::success(&format!("Wrote {} service to {}", name, path.display()));
        Ok(path)
    }

    /// Stop the service if it is running, then enable it. The unit file must exist.
    pub fn enable(&self, name: &str) -> Result<()> {
        let service = format!("{}.service", name);

        if self.is_active(name)? {
            ui::info(&format!("Stopping {} service...", name));
            self.systemctl(&["stop", &service])
                .with_context(|| format!("Error stopping {} service", name))?;
        }

        let path = self.unit_path(name);
        if !files::exists(&path) {
            anyhow::bail!("{} service file is missing ({})", name, path.display());
        }

        self.systemctl(&["enable", &service])
            .with_context(|| format!("Error enabling {} service", name))?;

        match self.scope {
            Scope::System => ui::success(&format!("Set {} service to start at boot", name)),
            Scope::User => ui::success(&format!("Set {} service to start at login", name)),
        }
        Ok(())
    }

    /// Restart the service and report whether it came up. A service that
    /// does not become active is a warning, not an error.
    pub fn start(&self, name: &str) -> Result<bool> {
        ui::info(&format!("Starting {} service...", name));
        let service = format!("{}.service", name);

        self.systemctl(&["restart", &service])
            .with_context(|| format!("Error starting {} service", name))?;

        let active = self.is_active(name)?;
        if active {
            ui::success(&format!("Started {} service", name));
        } else {
            tracing::warn!(service = name, "service not active after restart");
            ui::warn(&format!("{} service failed to start", name));
        }
        Ok(active)
    }

    /// Stop the service if its unit file exists. No-op otherwise.
    pub fn stop(&self, name: &str) -> Result<()> {
        let path = self.unit_path(name);
        if !files::exists(&path) {
            tracing::debug!(service = name, "no unit file, nothing to stop");
            return Ok(());
        }

        let service = format!("{}.service", name);
        if self.is_active(name)? {
            self.systemctl(&["stop", &service])
                .with_context(|| format!("Error stopping {} service", name))?;
        }

        if self.is_active(name)? {
            ui::warn(&format!("{} service is still active after stop", name));
        } else {
            ui::success(&format!("Stopped {} service", name));
        }
        Ok(())
    }
}
