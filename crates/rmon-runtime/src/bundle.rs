//! Download, unpack, and activate the vendor's docker-compose bundle.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

use rmon_core::config::Settings;
use rmon_core::identity::ApiKey;
use rmon_core::vendor::{self, VendorEnv, VendorError};

use crate::docker;
use crate::files;
use crate::http;
use crate::privilege::Account;
use crate::shell::Runner;
use crate::systemd::ServiceManager;
use crate::ui;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Entry path joined onto `out_dir`, or an error if it would land outside it.
fn contained_path(out_dir: &Path, entry: &Path) -> Result<PathBuf> {
    for component in entry.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => anyhow::bail!(
                "Archive entry {} escapes the output directory",
                entry.display()
            ),
        }
    }
    Ok(out_dir.join(entry))
}

/// Create `path` and any missing parents, handing each new directory to
/// `owner`. Returns the directories that did not exist before.
fn create_dirs(path: &Path, owner: Option<&Account>) -> Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    let mut cur = Some(path);
    while let Some(p) = cur {
        if p.is_dir() {
            break;
        }
        missing.push(p.to_path_buf());
        cur = p.parent();
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Error creating directory {}", path.display()))?;
    missing.reverse();
    if let Some(owner) = owner {
        for dir in &missing {
            owner.chown(dir)?;
        }
    }
    Ok(missing)
}

/// Unpack a tar stream (gzip-compressed or plain) into `out_dir`.
///
/// Directories and files keep their archived permission bits; everything
/// created is handed to `owner`. Directories that already existed keep
/// their mode and owner. Only directories and regular files are extracted.
/// Returns the created or written paths in archive order.
pub fn unpack_bundle(body: &[u8], out_dir: &Path, owner: Option<&Account>) -> Result<Vec<PathBuf>> {
    let reader: Box<dyn Read + '_> = if body.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(body))
    } else {
        Box::new(body)
    };

    let mut archive = tar::Archive::new(reader);
    let mut written = Vec::new();
    let mut created: HashSet<PathBuf> = HashSet::new();

    for entry in archive.entries().context("Error reading bundle archive")? {
        let mut entry = entry.context("Header error")?;
        let name = entry.path().context("Invalid entry path")?.into_owned();
        let path = contained_path(out_dir, &name)?;
        let mode = entry.header().mode().context("Invalid entry mode")? & 0o7777;
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            if name.components().all(|c| c == Component::CurDir) {
                tracing::debug!(entry = %name.display(), "skipping output directory entry");
                continue;
            }
            created.extend(create_dirs(&path, owner)?);
            if !created.contains(&path) {
                tracing::debug!(path = %path.display(), "directory already present, leaving mode");
                continue;
            }
            files::set_mode(&path, mode)?;
        } else if kind.is_file() {
            if let Some(parent) = path.parent() {
                created.extend(create_dirs(parent, owner)?);
            }
            let mut file = fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&path)
                .with_context(|| format!("Error creating path {}", path.display()))?;
            io::copy(&mut entry, &mut file).context("Error writing unpacked file")?;
            files::set_mode(&path, mode)?;
            if let Some(owner) = owner {
                owner.chown(&path)?;
            }
        } else {
            tracing::debug!(entry = %name.display(), ?kind, "skipping archive entry");
            continue;
        }
        written.push(path);
    }

    Ok(written)
}

/// Print each message the vendor attached to a rejected request.
/// Returns how many were printed.
fn report_vendor_error(err: &anyhow::Error) -> usize {
    let Some(vendor) = err.downcast_ref::<VendorError>() else {
        return 0;
    };
    for message in &vendor.messages {
        ui::error(message);
    }
    vendor.messages.len()
}

/// Download the bundle for `name` and unpack it under `out_dir`.
/// The archive is expected to hold a top-level `name/` directory.
pub fn fetch_bundle_into(
    settings: &Settings,
    api_key: &ApiKey,
    name: &str,
    out_dir: &Path,
    owner: Option<&Account>,
) -> Result<PathBuf> {
    ui::info("Downloading AppNeta Docker image...");
    let url = settings.bundle_url(name);

    let sp = ui::spinner(&format!("POST {}", url));
    let body = http::post_archive(&url, api_key.expose());
    sp.finish_and_clear();
    if let Err(e) = &body {
        report_vendor_error(e);
    }
    let body = body.context("Error getting AppNeta Docker image")?;

    let target = out_dir.join(name);
    if target.exists() {
        fs::remove_dir_all(&target).with_context(|| {
            format!(
                "Directory {} already exists, and it was not able to be deleted",
                target.display()
            )
        })?;
        ui::info(&format!(
            "Directory {} already exists, and it was deleted.",
            target.display()
        ));
    }

    let written = unpack_bundle(&body, out_dir, owner)
        .context("Error unpacking AppNeta Docker image")?;
    tracing::debug!(entries = written.len(), "bundle unpacked");

    if !target.is_dir() {
        anyhow::bail!("Unable to download AppNeta Docker Image");
    }
    ui::success(&format!(
        "Downloaded AppNeta Docker image to {}",
        target.display()
    ));
    Ok(target)
}

/// Download the bundle into the account's home directory.
pub fn fetch_bundle(
    settings: &Settings,
    api_key: &ApiKey,
    hostname_dashes: &str,
    account: &Account,
) -> Result<PathBuf> {
    fetch_bundle_into(settings, api_key, hostname_dashes, &account.home, Some(account))
}

/// Outcome of [`activate_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub registry: String,
    pub username: String,
    /// Whether docker's credential store records the registry login.
    pub logged_in: bool,
}

fn read_bundle_file(dir: &Path, name: &str, what: &str) -> Result<String> {
    let path = dir.join(name);
    if !path.exists() {
        anyhow::bail!("AppNeta {} does not exist at {}", what, path.display());
    }
    fs::read_to_string(&path).with_context(|| format!("Error reading AppNeta {} {}", what, path.display()))
}

/// Patch the compose file, then log in to the vendor registry.
///
/// `credential_store` is docker's `config.json` for the invoking user; a
/// login that does not show up there is reported as a warning.
pub fn activate_bundle(
    runner: &Runner,
    settings: &Settings,
    dir: &Path,
    credential_store: &Path,
) -> Result<Activation> {
    let compose_path = dir.join(vendor::COMPOSE_FILE);
    let compose = read_bundle_file(dir, vendor::COMPOSE_FILE, "docker-compose file")?;
    let (patched, edits) = vendor::rewrite_compose(&compose, &settings.container_name);
    if edits.removed_network_mode > 0 {
        ui::info(&format!(
            "Deleted network_mode: host line from {}",
            compose_path.display()
        ));
    }
    if edits.renamed_container > 0 {
        ui::info(&format!(
            "Set container name to {} in {}",
            settings.container_name,
            compose_path.display()
        ));
    }
    fs::write(&compose_path, patched)
        .with_context(|| format!("Error writing to docker-compose file {}", compose_path.display()))?;

    let env = VendorEnv::parse(&read_bundle_file(dir, vendor::ENV_FILE, ".env file")?);
    let password = vendor::parse_token(&read_bundle_file(
        dir,
        vendor::TOKEN_FILE,
        "token/password file",
    )?);
    let script = read_bundle_file(dir, vendor::SETUP_SCRIPT, "bash script")?;
    let registry = vendor::registry_from_script(&script).with_context(|| {
        format!(
            "No registry assignment found in {}",
            dir.join(vendor::SETUP_SCRIPT).display()
        )
    })?;
    let username = env.registry_username();

    docker::ensure_running(&ServiceManager::system(runner.clone()))?;
    docker::registry_login(runner, &registry, &username, &password)?;

    let logged_in = docker::login_recorded(credential_store, &registry)?;
    if logged_in {
        ui::success(&format!("Logged into AppNeta Docker Registry {}", registry));
    } else {
        ui::warn(&format!(
            "AppNeta Docker setup completed, but not logged into AppNeta Docker Registry {}",
            registry
        ));
    }

    Ok(Activation {
        registry,
        username,
        logged_in,
    })
}
