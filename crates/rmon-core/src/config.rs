use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings file read when neither `--config` nor `RMON_SETUP_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rmon-setup.toml";

/// Environment variable naming an alternate settings file.
pub const CONFIG_ENV: &str = "RMON_SETUP_CONFIG";

/// Provisioning settings. Every field has a default, so a settings file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Unprivileged account that owns the bundle, SSH keys, and tunnel unit.
    pub local_user: String,
    /// Base domain appended to `rpi<NN>`.
    pub hostname_base: String,
    pub timezone: String,
    /// Vendor organization ID used in the bundle URL.
    pub org_id: String,
    pub api_base: String,
    pub docker_repo_base: String,
    pub dependencies: Vec<String>,
    pub docker_packages: Vec<String>,
    /// System-wide copy of the compose bundle.
    pub compose_dir: PathBuf,
    pub compose_service: String,
    /// Name substituted for `--containername localhost` in the compose file.
    pub container_name: String,
    pub tunnel_service: String,
    /// Account on the tunnel server that accepts the reverse forward.
    pub tunnel_user: String,
    /// Attempts allowed per interactive prompt before giving up.
    pub prompt_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            local_user: "stellaraf".to_string(),
            hostname_base: "rmon.orion.cloud".to_string(),
            timezone: "Etc/UTC".to_string(),
            org_id: "17992".to_string(),
            api_base: "https://app-14.pm.appneta.com/api/v3".to_string(),
            docker_repo_base: "https://download.docker.com/linux".to_string(),
            dependencies: ["autossh", "libffi-dev", "libssl-dev", "python3", "python3-pip"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            docker_packages: ["docker-ce", "docker-ce-cli", "containerd.io"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            compose_dir: PathBuf::from("/etc/docker/compose"),
            compose_service: "appneta-cmp".to_string(),
            container_name: "talos-001".to_string(),
            tunnel_service: "autossh".to_string(),
            tunnel_user: "rmontunnel".to_string(),
            prompt_attempts: 5,
        }
    }
}

impl Settings {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        if settings.prompt_attempts == 0 {
            anyhow::bail!("prompt_attempts must be at least 1 in {}", path.display());
        }
        Ok(settings)
    }

    /// Resolve settings. Priority: explicit path > `RMON_SETUP_CONFIG` >
    /// `/etc/rmon-setup.toml` (if present) > built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::from_file(default_path);
        }
        tracing::debug!("no settings file found, using defaults");
        Ok(Self::default())
    }

    /// Vendor endpoint that returns the docker-compose bundle for `hostname`.
    pub fn bundle_url(&self, hostname: &str) -> String {
        format!(
            "{}/appliance/configuration/{}/DOCKER_COMPOSE/{}",
            self.api_base.trim_end_matches('/'),
            self.org_id,
            hostname
        )
    }

    /// Serialize to TOML, e.g. as a starting point for a settings file.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize settings")
    }

    /// Compose file name inside `compose_dir`.
    pub fn compose_file(&self) -> PathBuf {
        self.compose_dir.join(format!("{}.yaml", self.compose_service))
    }
}
