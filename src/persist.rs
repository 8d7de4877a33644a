//! Whole-file persistence for the cache directory.
//!
//! Every persisted artifact is overwritten wholesale: the new content goes to
//! a sibling temp file which is then renamed over the target, so readers see
//! either the old file or the new one. There is no locking; concurrent
//! writers are last-writer-wins.

use anyhow::{Context, Result};
use std::path::Path;

/// Write `contents` to `path`, replacing any existing file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache dir: {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "cache".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Read a file as UTF-8, mapping "not found" to `None`.
///
/// Other I/O errors are logged and also yield `None`: unreadable cache state
/// is treated as absent rather than failing the session.
pub fn read_optional(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable cache file, ignoring");
            None
        }
    }
}
