//! Bundle assembly.
//!
//! Plans the bundle layout, materializes it in a scratch directory inside the
//! build root and packs that directory into the final archive. The scratch
//! directory is removed on every exit path.

pub mod archive;
pub mod layout;
pub mod metadata;

pub use layout::{BundleLayout, LayoutSource};
pub use metadata::{BundleMetadata, LauncherScript, METADATA_FILE};

use crate::bundler::{Result, Settings, elf::DependencyClosure, error::ErrorExt, utils::fs::PathContext};
use crate::spec::BundleSpec;
use std::path::PathBuf;

/// Produces `<stem>_<version>.bundle` in the build root and returns its path.
pub async fn assemble(
    settings: &Settings,
    spec: &BundleSpec,
    version: &str,
    closure: &DependencyClosure,
) -> Result<PathBuf> {
    let search = PathContext::new(settings.search_roots());
    let (metadata, scripts) = BundleMetadata::for_spec(spec, version)?;
    let layout = BundleLayout::plan(spec, &search, closure, &metadata, &scripts)?;

    let stage = tempfile::Builder::new()
        .prefix(".bundle-stage-")
        .tempdir_in(settings.build_root())
        .fs_context("creating staging directory in", settings.build_root())?;
    log::debug!(
        "Staging {} entries in {}",
        layout.len(),
        stage.path().display()
    );
    layout.materialize(stage.path()).await?;

    let output = settings
        .build_root()
        .join(settings.archive_name(version));
    archive::create_archive(stage.path(), &output).await?;
    Ok(output)
}
