//! Bundle version lookup.

use crate::bundler::{Error, Result, error::ErrorExt, utils::fs::PathContext};
use std::path::Path;

/// Reads the version string from `version_file`.
///
/// The file is looked up in the build root first (build steps usually write
/// it) and the spec directory second. Surrounding whitespace is dropped; the
/// rest is used verbatim in the archive name.
pub async fn resolve_version(search: &PathContext, version_file: &str) -> Result<String> {
    let declared = Path::new(version_file);
    let path = search
        .locate(declared)
        .ok_or_else(|| Error::VersionFileMissing(declared.to_path_buf()))?;

    let bytes = tokio::fs::read(&path)
        .await
        .fs_context("reading version file", &path)?;
    let contents = String::from_utf8(bytes).map_err(|e| {
        Error::GenericError(format!(
            "version file {} is not UTF-8: {e}",
            path.display()
        ))
    })?;

    let version = contents.trim();
    if version.is_empty() {
        return Err(Error::VersionFileEmpty(path));
    }

    log::info!("Bundle version: {}", version);
    Ok(version.to_string())
}
