use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

use crate::privilege::Account;

/// Result of a command that is allowed to fail (e.g. `systemctl is-active`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub code: Option<i32>,
    /// Combined stdout + stderr, trailing newline trimmed.
    pub output: String,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands as a fixed identity.
///
/// The root runner executes commands directly. A runner bound to an
/// [`Account`] (see [`crate::privilege::run_as`]) wraps every command in
/// `runuser -u <name> --` and points it at the account's session bus, so
/// `systemctl --user` talks to that user's manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Runner {
    account: Option<Account>,
}

impl Runner {
    pub fn root() -> Self {
        Self { account: None }
    }

    pub(crate) fn for_account(account: Account) -> Self {
        Self {
            account: Some(account),
        }
    }

    /// The account commands run as, or `None` for root.
    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Run a command, returning combined output. Non-zero exit is an error.
    pub fn run(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let output = self.exec(cmd, args, None, None)?;
        check(cmd, args, &output)
    }

    /// Run a command in `dir`. Non-zero exit is an error.
    pub fn run_in(&self, dir: &Path, cmd: &str, args: &[&str]) -> Result<String> {
        let output = self.exec(cmd, args, Some(dir), None)?;
        check(cmd, args, &output)
    }

    /// Run a command with `input` written to its stdin. Keeps secrets off
    /// the argument list. Non-zero exit is an error.
    pub fn run_with_stdin(&self, cmd: &str, args: &[&str], input: &[u8]) -> Result<String> {
        let output = self.exec(cmd, args, None, Some(input))?;
        check(cmd, args, &output)
    }

    /// Run a command whose exit status is an answer rather than a failure.
    /// Only a spawn error is an error.
    pub fn query(&self, cmd: &str, args: &[&str]) -> Result<Outcome> {
        let output = self.exec(cmd, args, None, None)?;
        Ok(Outcome {
            code: output.status.code(),
            output: combined(&output),
        })
    }

    fn command(&self, cmd: &str, args: &[&str], dir: Option<&Path>) -> Command {
        let mut command = match &self.account {
            None => {
                let mut c = Command::new(cmd);
                c.args(args);
                c
            }
            Some(account) => {
                let runtime_dir = account.runtime_dir();
                let mut c = Command::new("runuser");
                c.args(["-u", account.name.as_str(), "--", cmd])
                    .args(args)
                    .env("XDG_RUNTIME_DIR", &runtime_dir)
                    .env(
                        "DBUS_SESSION_BUS_ADDRESS",
                        format!("unix:path={}/bus", runtime_dir.display()),
                    );
                c
            }
        };
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        command
    }

    fn exec(
        &self,
        cmd: &str,
        args: &[&str],
        dir: Option<&Path>,
        stdin: Option<&[u8]>,
    ) -> Result<Output> {
        #[cfg(test)]
        if let Some(output) = crate::shell_mock::intercept(
            self.account.as_ref().map(|a| a.name.as_str()),
            cmd,
            args,
            stdin,
        ) {
            return Ok(output);
        }

        debug!(
            user = self.account.as_ref().map(|a| a.name.as_str()).unwrap_or("root"),
            command = %describe(cmd, args),
            "running command"
        );

        let mut command = self.command(cmd, args, dir);
        let result = match stdin {
            None => command.output(),
            Some(input) => {
                command
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
                command.spawn().and_then(|mut child| {
                    if let Some(mut pipe) = child.stdin.take() {
                        pipe.write_all(input)?;
                    }
                    child.wait_with_output()
                })
            }
        };
        result.with_context(|| format!("Failed to run: {}", describe(cmd, args)))
    }
}

/// Render a command line for messages.
pub fn describe(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

/// Stdout followed by stderr, trailing newline trimmed.
fn combined(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.trim_end_matches('\n').to_string()
}

fn check(cmd: &str, args: &[&str], output: &Output) -> Result<String> {
    let text = combined(output);
    if !output.status.success() {
        anyhow::bail!(
            "Command failed (exit {}): {}\n{}",
            output.status.code().unwrap_or(-1),
            describe(cmd, args),
            text
        );
    }
    Ok(text)
}
