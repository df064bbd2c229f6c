use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};

use crate::privilege::Account;

pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Copy `src` over `dst`, replacing any existing file. Permissions follow `src`.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        anyhow::bail!("Source file {} does not exist", src.display());
    }
    if dst.exists() {
        tracing::debug!(path = %dst.display(), "replacing existing file");
        fs::remove_file(dst)
            .with_context(|| format!("Unable to delete destination {}", dst.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Error copying {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Create `path` (and parents) with `mode` if missing. Returns `true` if it
/// was created. A newly created directory is handed to `owner`.
pub fn ensure_dir(path: &Path, mode: u32, owner: Option<&Account>) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Error creating directory {}", path.display()))?;
    set_mode(path, mode)?;
    if let Some(owner) = owner {
        owner.chown(path)?;
    }
    Ok(true)
}

/// Write `content` to `path` with `mode`, handing it to `owner` if given.
pub fn write_file(path: &Path, content: &str, mode: u32, owner: Option<&Account>) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Error writing {}", path.display()))?;
    set_mode(path, mode)?;
    if let Some(owner) = owner {
        owner.chown(path)?;
    }
    Ok(())
}

/// Permission bits of `path` (without the file type).
pub fn mode(path: &Path) -> Result<u32> {
    let meta =
        fs::metadata(path).with_context(|| format!("Error reading {}", path.display()))?;
    Ok(meta.permissions().mode() & 0o7777)
}

pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Error setting permissions on {}", path.display()))
}

/// Force `path` to `mode`. Returns `true` if the mode had to change.
pub fn ensure_mode(path: &Path, wanted: u32) -> Result<bool> {
    if mode(path)? == wanted {
        return Ok(false);
    }
    set_mode(path, wanted)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.yaml");
        let dst = dir.path().join("dst.yaml");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();

        copy_file(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_copy_file_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_file(&dir.path().join("nope"), &dir.path().join("dst")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_ensure_dir_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c");

        assert!(ensure_dir(&target, 0o700, None).unwrap());
        assert!(target.is_dir());
        assert_eq!(mode(&target).unwrap(), 0o700);
        assert!(!ensure_dir(&target, 0o700, None).unwrap());
    }

    #[test]
    fn test_write_file_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.service");

        write_file(&path, "[Unit]\n", 0o644, None).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[Unit]\n");
        assert_eq!(mode(&path).unwrap(), 0o644);
    }

    #[test]
    fn test_ensure_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_rsa");
        fs::write(&path, "key").unwrap();
        set_mode(&path, 0o644).unwrap();

        assert!(ensure_mode(&path, 0o600).unwrap());
        assert_eq!(mode(&path).unwrap(), 0o600);
        assert!(!ensure_mode(&path, 0o600).unwrap());
    }
}
