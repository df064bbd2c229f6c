use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Longest hostname `hostnamectl` will accept.
pub const MAX_HOSTNAME_LEN: usize = 255;

/// Length of a vendor API key.
pub const API_KEY_LEN: usize = 32;

/// Minimum number of labels in the tunnel server FQDN.
pub const MIN_FQDN_LABELS: usize = 3;

/// Validation failures for operator-supplied values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Invalid Node ID {0:?}. Node ID must be a 1 or 2 digit number.")]
    NodeId(String),
    #[error("Invalid SSH tunnel server {0:?}. Must be an FQDN with at least 3 labels.")]
    TunnelServer(String),
    #[error("Invalid API key - expected 32 characters, got {0}")]
    ApiKey(usize),
    #[error("Hostname {hostname} is {len} characters long; it must be no more than 255")]
    HostnameTooLong { hostname: String, len: usize },
}

fn node_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{1,2}$").expect("static regex"))
}

/// Two-digit node number, zero padded ("7" becomes "07").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeId(String);

impl NodeId {
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let input = input.trim();
        if !node_id_pattern().is_match(input) {
            return Err(IdentityError::NodeId(input.to_string()));
        }
        Ok(Self(format!("{:0>2}", input)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Port opened on the tunnel server for this node's reverse SSH forward.
    pub fn remote_port(&self) -> u16 {
        // "100" + two digits always fits in a u16 (10000..=10099).
        10000 + self.0.parse::<u16>().unwrap_or(0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully-qualified name of the reverse SSH tunnel server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelServer(String);

impl TunnelServer {
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let input = input.trim();
        let labels: Vec<&str> = input.split('.').collect();
        if labels.len() < MIN_FQDN_LABELS || labels.iter().any(|l| l.is_empty()) {
            return Err(IdentityError::TunnelServer(input.to_string()));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TunnelServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vendor API key. `Debug` never prints the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let input = input.trim();
        let len = input.chars().count();
        if len != API_KEY_LEN {
            return Err(IdentityError::ApiKey(len));
        }
        Ok(Self(input.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Derive the node hostname: `rpi<NN>.<base>`.
pub fn hostname_for(node_id: &NodeId, base_domain: &str) -> Result<String, IdentityError> {
    let hostname = format!("rpi{}.{}", node_id, base_domain);
    let len = hostname.len();
    if len > MAX_HOSTNAME_LEN {
        return Err(IdentityError::HostnameTooLong { hostname, len });
    }
    Ok(hostname)
}

/// Everything that identifies this node to the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub node_id: NodeId,
    pub tunnel_server: TunnelServer,
    pub hostname: String,
    /// Hostname with dots replaced by dashes; names the bundle directory.
    pub hostname_dashes: String,
}

impl NodeIdentity {
    pub fn new(
        node_id: NodeId,
        tunnel_server: TunnelServer,
        base_domain: &str,
    ) -> Result<Self, IdentityError> {
        let hostname = hostname_for(&node_id, base_domain)?;
        let hostname_dashes = hostname.replace('.', "-");
        Ok(Self {
            node_id,
            tunnel_server,
            hostname,
            hostname_dashes,
        })
    }
}
