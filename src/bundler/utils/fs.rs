//! File system utilities for bundling.
//!
//! Path lookup across the build and source roots, permission checks, and
//! copying with automatic directory creation.

use crate::bundler::{
    Error, Result,
    error::ErrorExt,
};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Ordered list of directories that relative spec paths are looked up in.
#[derive(Clone, Debug)]
pub struct PathContext {
    locations: Vec<PathBuf>,
}

impl PathContext {
    /// Creates a context searching `locations` in order.
    pub fn new(locations: Vec<PathBuf>) -> Self {
        Self { locations }
    }

    /// Returns the first existing `location/target`.
    ///
    /// Absolute targets are returned as-is when they exist. Symlinks are not
    /// dereferenced here; a dangling symlink counts as missing.
    pub fn find_path(&self, target: impl AsRef<Path>) -> Result<PathBuf> {
        self.locate(target.as_ref())
            .ok_or_else(|| Error::FileNotFound(target.as_ref().to_path_buf()))
    }

    /// Like [`find_path`](Self::find_path) but returns `None` when missing.
    pub fn locate(&self, target: &Path) -> Option<PathBuf> {
        if target.is_absolute() {
            return target.exists().then(|| target.to_path_buf());
        }
        self.locations
            .iter()
            .map(|loc| loc.join(target))
            .find(|p| p.exists())
    }
}

/// Returns whether any execute bit is set on `path`.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path).fs_context("reading metadata", path)?;
    Ok(meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

/// Returns whether `path` is a regular file.
#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> Result<bool> {
    let meta = std::fs::metadata(path).fs_context("reading metadata", path)?;
    Ok(meta.is_file())
}

/// Resolves every symlink in `path`.
pub fn real_path(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).fs_context("resolving real path of", path)
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist. Permissions are
/// carried over by the copy.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::FileNotFound(from.to_path_buf()));
    }
    if !from.is_file() {
        crate::bail!("{:?} is not a file", from);
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

/// Writes `content` to `path` with the given unix mode, creating parent
/// directories.
pub async fn write_with_mode(path: &Path, content: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }
    fs::write(path, content).await.fs_context("writing", path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .fs_context("setting permissions on", path)?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
