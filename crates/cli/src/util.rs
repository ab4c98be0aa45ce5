//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Canonicalize `path` and make sure it is an existing directory
pub fn resolve_dir(path: &Path) -> Result<PathBuf> {
    let resolved = path
        .canonicalize()
        .with_context(|| format!("Directory not found: {}", path.display()))?;

    if !resolved.is_dir() {
        anyhow::bail!("Not a directory: {}", path.display());
    }
    Ok(resolved)
}

/// Create `path` (and parents) if needed, then resolve it
pub fn ensure_dir(path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    resolve_dir(path)
}

/// Move `src` into `dest_dir`, keeping its file name
///
/// Falls back to copy + remove when a rename is not possible (e.g. across
/// file systems). Refuses to overwrite an existing file.
pub async fn move_into(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .with_context(|| format!("No file name in {}", src.display()))?;
    let dest = dest_dir.join(name);

    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        anyhow::bail!("Destination already exists: {}", dest.display());
    }

    if tokio::fs::rename(src, &dest).await.is_err() {
        tokio::fs::copy(src, &dest)
            .await
            .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
        tokio::fs::remove_file(src)
            .await
            .with_context(|| format!("Failed to remove {} after copy", src.display()))?;
    }

    Ok(dest)
}
