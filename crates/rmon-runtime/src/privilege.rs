use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::shell::Runner;

/// A local account, as recorded in the passwd database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl Account {
    /// Look up `name` with `getent passwd`.
    pub fn lookup(runner: &Runner, name: &str) -> Result<Self> {
        let line = runner
            .run("getent", &["passwd", name])
            .with_context(|| format!("Local user '{}' does not exist", name))?;
        Self::parse_passwd_line(&line)
    }

    /// Parse `name:x:uid:gid:gecos:home:shell`.
    pub fn parse_passwd_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(':').collect();
        if fields.len() < 6 {
            anyhow::bail!("Malformed passwd entry: {:?}", line);
        }
        let uid = fields[2]
            .parse()
            .with_context(|| format!("Invalid uid in passwd entry: {:?}", line))?;
        let gid = fields[3]
            .parse()
            .with_context(|| format!("Invalid gid in passwd entry: {:?}", line))?;
        Ok(Self {
            name: fields[0].to_string(),
            uid,
            gid,
            home: PathBuf::from(fields[5]),
        })
    }

    /// `/run/user/<uid>`, where the user's systemd instance keeps its bus.
    pub fn runtime_dir(&self) -> PathBuf {
        PathBuf::from(format!("/run/user/{}", self.uid))
    }

    pub fn ssh_dir(&self) -> PathBuf {
        self.home.join(".ssh")
    }

    pub fn systemd_user_dir(&self) -> PathBuf {
        self.home.join(".config").join("systemd").join("user")
    }

    /// Hand `path` over to this account.
    pub fn chown(&self, path: &Path) -> Result<()> {
        std::os::unix::fs::chown(path, Some(self.uid), Some(self.gid)).with_context(|| {
            format!(
                "Failed to change ownership of {} to {}",
                path.display(),
                self.name
            )
        })
    }
}

/// Whether the process has an effective uid of 0.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Run `work` with a runner bound to `account`.
///
/// Commands the work issues through the runner execute as that account; the
/// call blocks until the work returns and hands back its result.
pub fn run_as<T, F>(account: &Account, work: F) -> Result<T>
where
    F: FnOnce(&Runner) -> Result<T>,
{
    debug!(user = %account.name, uid = account.uid, "switching identity");
    let runner = Runner::for_account(account.clone());
    work(&runner).with_context(|| format!("Failed while running as {}", account.name))
}
