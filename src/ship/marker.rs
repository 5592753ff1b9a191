use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to files that have been fully shipped.
pub const SHIPPED_SUFFIX: &str = ".shipped";

/// Where `path` ends up once marked.
pub fn shipped_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(SHIPPED_SUFFIX);
    PathBuf::from(name)
}

/// Rename a shipped file so the discovery glob no longer matches it.
pub fn mark_shipped(path: &Path) -> std::io::Result<PathBuf> {
    let target = shipped_path(path);
    std::fs::rename(path, &target)?;
    tracing::debug!(from = %path.display(), to = %target.display(), "Marked file as shipped");
    Ok(target)
}
