//! Local filesystem helpers: the data directory and atomic private writes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Base directory for all local state: `$TGFLEET_HOME`, else `~/.tgfleet`.
///
/// # Errors
///
/// Returns an error if neither is available.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("TGFLEET_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".tgfleet"))
}

/// Write `content` to `path` via a temp file and rename, mode 0600.
///
/// # Errors
///
/// Returns an error if any step fails; `path` is left untouched then.
pub fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("finalizing {}", path.display()))
}
