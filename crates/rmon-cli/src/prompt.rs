//! Interactive prompts for the three operator-supplied values.

use std::fmt::Display;

use anyhow::{Context, Result};
use colored::Colorize;
use inquire::{Password, PasswordDisplayMode, Text};

use rmon_core::identity::{ApiKey, NodeId, TunnelServer};
use rmon_runtime::ui;

/// Ask until `parse` accepts the answer, at most `attempts` times.
///
/// Each rejected answer is reported as a warning. Running out of attempts,
/// or failing to read an answer at all, is an error.
pub fn prompt_until<T, E, A, P>(label: &str, attempts: u32, mut ask: A, parse: P) -> Result<T>
where
    E: Display,
    A: FnMut() -> Result<String>,
    P: Fn(&str) -> Result<T, E>,
{
    for attempt in 1..=attempts {
        let answer = ask()?;
        match parse(&answer) {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::debug!(label, attempt, "rejected answer");
                ui::warn(&e.to_string());
            }
        }
    }
    anyhow::bail!("No valid {} after {} attempts", label, attempts)
}

fn ask_text(message: &str) -> Result<String> {
    Text::new(message)
        .prompt()
        .with_context(|| format!("Failed to read answer to {:?}", message))
}

fn ask_secret(message: &str) -> Result<String> {
    Password::new(message)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .with_context(|| format!("Failed to read answer to {:?}", message))
}

pub fn node_id(attempts: u32) -> Result<NodeId> {
    prompt_until(
        "Node ID",
        attempts,
        || ask_text("Node ID (2 digit number):"),
        NodeId::parse,
    )
}

pub fn tunnel_server(attempts: u32) -> Result<TunnelServer> {
    prompt_until(
        "SSH Tunnel Server",
        attempts,
        || ask_text("SSH Tunnel Server (FQDN):"),
        TunnelServer::parse,
    )
}

pub fn api_key(attempts: u32) -> Result<ApiKey> {
    prompt_until(
        "API Key",
        attempts,
        || ask_secret("Enter the AppNeta API Key from IT Glue:"),
        ApiKey::parse,
    )
}

/// What the operator needs at hand before answering the prompts.
pub fn requirements() -> String {
    format!(
        "{}\n\n  - {} of the unit, a unique 2 digit number between 1-99.\n  - {} of the remote SSH tunnel server.\n",
        "You'll need:".bold(),
        "ID number".bold().blue(),
        "FQDN".bold().yellow(),
    )
}
