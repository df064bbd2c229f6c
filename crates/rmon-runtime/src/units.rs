//! systemd unit files, rendered from typed settings through tera.

use anyhow::{Context, Result};
use serde::Serialize;

const TUNNEL_TEMPLATE: &str = r#"[Unit]
Description=AutoSSH reverse tunnel to {{ tunnel_server }}
Wants=network-online.target
After=network-online.target
StartLimitIntervalSec=0

[Service]
ExecStart=/usr/bin/autossh -M 0 -N \
	-o "ServerAliveInterval 15" \
	-o "ServerAliveCountMax 3" \
	-o "ConnectTimeout 10" \
	-o "ExitOnForwardFailure yes" \
	-i {{ identity_file }} \
	{{ tunnel_user }}@{{ tunnel_server }} \
	-R {{ remote_port }}:localhost:22
Restart=always
RestartSec=10

[Install]
WantedBy=default.target
"#;

const COMPOSE_TEMPLATE: &str = r#"[Unit]
Description={{ description }}
Requires=docker.service
After=docker.service network-online.target
Wants=network-online.target

[Service]
Type=oneshot
RemainAfterExit=yes
WorkingDirectory={{ working_dir }}
ExecStart={{ compose_bin }} -f {{ compose_file }} up -d --remove-orphans
ExecStop={{ compose_bin }} -f {{ compose_file }} down
TimeoutStartSec=0

[Install]
WantedBy=multi-user.target
"#;

fn render<T: Serialize>(name: &str, template: &str, value: &T) -> Result<String> {
    let ctx = tera::Context::from_serialize(value)
        .with_context(|| format!("Failed to build template context for {}", name))?;
    tera::Tera::one_off(template, &ctx, false)
        .with_context(|| format!("Failed to render {} unit", name))
}

/// User-scope unit holding the reverse SSH tunnel open.
#[derive(Debug, Clone, Serialize)]
pub struct TunnelUnit {
    pub tunnel_server: String,
    pub tunnel_user: String,
    /// Private key used to authenticate to the tunnel server.
    pub identity_file: String,
    /// Port opened on the tunnel server, forwarded to local port 22.
    pub remote_port: u16,
}

impl TunnelUnit {
    pub fn render(&self) -> Result<String> {
        render("tunnel", TUNNEL_TEMPLATE, self)
    }
}

/// System-scope unit running the vendor compose bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ComposeUnit {
    pub description: String,
    pub working_dir: String,
    pub compose_file: String,
    pub compose_bin: String,
}

impl ComposeUnit {
    pub fn render(&self) -> Result<String> {
        render("compose", COMPOSE_TEMPLATE, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_unit() {
        let unit = TunnelUnit {
            tunnel_server: "tunnel.example.com".to_string(),
            tunnel_user: "rmontunnel".to_string(),
            identity_file: "/home/stellaraf/.ssh/id_rsa".to_string(),
            remote_port: 10007,
        }
        .render()
        .unwrap();

        assert!(unit.contains("-i /home/stellaraf/.ssh/id_rsa \\"));
        assert!(unit.contains("rmontunnel@tunnel.example.com \\"));
        assert!(unit.contains("-R 10007:localhost:22\n"));
        assert!(unit.contains("WantedBy=default.target"));
        assert!(unit.starts_with("[Unit]\n"));
    }

    #[test]
    fn test_compose_unit() {
        let unit = ComposeUnit {
            description: "AppNeta monitoring point".to_string(),
            working_dir: "/etc/docker/compose".to_string(),
            compose_file: "/etc/docker/compose/appneta-cmp.yaml".to_string(),
            compose_bin: "/usr/local/bin/docker-compose".to_string(),
        }
        .render()
        .unwrap();

        assert!(unit.contains(
            "ExecStart=/usr/local/bin/docker-compose -f /etc/docker/compose/appneta-cmp.yaml up -d"
        ));
        assert!(unit.contains("WorkingDirectory=/etc/docker/compose\n"));
        assert!(unit.contains("Requires=docker.service"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }
}
