//! Parsers for the files shipped in the vendor's docker-compose bundle.
//!
//! Everything here works on strings; reading the files and acting on the
//! results is left to `rmon-runtime`.

use anyhow::{Context, Result};
use serde::Deserialize;

pub const COMPOSE_FILE: &str = "mp-compose.yaml";
pub const ENV_FILE: &str = ".env";
pub const TOKEN_FILE: &str = "tok.txt";
pub const SETUP_SCRIPT: &str = "setup.sh";

const NETWORK_MODE_HOST: &str = "network_mode: host";
const DEFAULT_CONTAINER_ARG: &str = "--containername localhost";
const REGISTRY_ASSIGNMENT: &str = "ACR_REGISTRY=";

/// Error payload returned by the vendor API on a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("Vendor API rejected the request (HTTP {http_status_code})")]
pub struct VendorError {
    pub http_status_code: u16,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// The bundle's `.env` file, e.g.
///
/// ```text
/// APPNETA_SERVER_ADDRESS=app-14.pm.appneta.com
/// APPNETA_SERVER_KEY=9U5AG-Y71V-W-P
/// APPNETA_SERVER_PORTS=80,8080
/// APPNETA_CONTAINER_UUID=0C5D62FF-3EB3-46B1-A2D2-0707BE8A2820
/// APPNETA_CONTAINER_NAME=test
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorEnv {
    pub server_address: String,
    pub server_key: String,
    pub server_ports: Vec<String>,
    pub container_uuid: String,
    pub container_name: String,
}

impl VendorEnv {
    /// Parse `KEY=VALUE` lines. Unknown keys and lines without `=` are ignored.
    pub fn parse(content: &str) -> Self {
        let mut env = Self::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim_end_matches('\r').split_once('=') else {
                continue;
            };
            let value = value.to_string();
            match key.trim() {
                "APPNETA_SERVER_ADDRESS" => env.server_address = value,
                "APPNETA_SERVER_KEY" => env.server_key = value,
                "APPNETA_SERVER_PORTS" => {
                    env.server_ports = value
                        .split(',')
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                "APPNETA_CONTAINER_UUID" => env.container_uuid = value,
                "APPNETA_CONTAINER_NAME" => env.container_name = value,
                _ => {}
            }
        }
        env
    }

    /// Registry username derived from the server key.
    pub fn registry_username(&self) -> String {
        format!("TOK-{}", self.server_key)
    }
}

/// Extract the registry from the vendor setup script.
///
/// Only the first top-level `ACR_REGISTRY=` assignment counts; the script
/// reassigns it later from its own arguments.
pub fn registry_from_script(script: &str) -> Option<String> {
    script
        .lines()
        .find(|l| l.starts_with(REGISTRY_ASSIGNMENT))
        .map(|l| {
            l[REGISTRY_ASSIGNMENT.len()..]
                .trim_end_matches('\r')
                .trim_matches('"')
                .to_string()
        })
        .filter(|r| !r.is_empty())
}

/// The registry credential, without surrounding newlines.
pub fn parse_token(content: &str) -> String {
    content.trim_matches(|c| c == '\n' || c == '\r').to_string()
}

/// What [`rewrite_compose`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeEdits {
    pub removed_network_mode: usize,
    pub renamed_container: usize,
}

/// Drop `network_mode: host` lines and rename the default container.
pub fn rewrite_compose(content: &str, container_name: &str) -> (String, ComposeEdits) {
    let replacement = format!("--containername {}", container_name);
    let mut edits = ComposeEdits::default();
    let mut kept = Vec::new();

    for line in content.split('\n') {
        if line.contains(NETWORK_MODE_HOST) {
            edits.removed_network_mode += 1;
            continue;
        }
        if line.contains(DEFAULT_CONTAINER_ARG) {
            edits.renamed_container += 1;
            kept.push(line.replace(DEFAULT_CONTAINER_ARG, &replacement));
        } else {
            kept.push(line.to_string());
        }
    }

    (kept.join("\n"), edits)
}

/// Registry host as docker records it: everything before the first `/`.
pub fn registry_host(registry: &str) -> &str {
    registry.split('/').next().unwrap_or(registry)
}

/// Escape dots so a key survives [`lookup_path`] as a single segment.
pub fn escape_key(key: &str) -> String {
    key.replace('.', r"\.")
}

fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// Walk a dotted path (`auths.registry\.example\.com`) into a JSON document.
pub fn lookup_path<'a>(doc: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    split_path(path)
        .iter()
        .try_fold(doc, |node, segment| node.get(segment.as_str()))
}

/// Whether docker's credential store has an entry for `registry`.
pub fn has_registry_auth(config_json: &str, registry: &str) -> Result<bool> {
    let doc: serde_json::Value =
        serde_json::from_str(config_json).context("Failed to parse docker config JSON")?;
    let path = format!("auths.{}", escape_key(registry_host(registry)));
    Ok(lookup_path(&doc, &path).is_some())
}
