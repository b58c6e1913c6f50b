//! In-memory bundle layout.
//!
//! Every file the bundle will contain is planned here, destination to
//! source, before anything is written. Conflicting destinations are caught at
//! planning time so a bad spec never leaves a half-built staging tree behind.

use super::metadata::{BundleMetadata, LauncherScript, METADATA_FILE};
use crate::bundler::{
    Error, Result,
    builder::checksum::file_sha256,
    elf::DependencyClosure,
    error::ErrorExt,
    utils::fs::{PathContext, copy_file, real_path, write_with_mode},
};
use crate::spec::{BundleSpec, PathEntry};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Directory executables are copied to.
pub const BIN_DIR: &str = "bin";
/// Directory libraries are copied to.
pub const LIB_DIR: &str = "lib";
/// Directory resources are copied to.
pub const RES_DIR: &str = "res";
/// Optional runner patch at the bundle root.
pub const RUNNER_PATCH: &str = "runner-patch";

/// Where the contents of one bundle path come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutSource {
    /// Copied from disk.
    File(PathBuf),
    /// Written from memory with the given mode.
    Generated { contents: String, mode: u32 },
    /// An (possibly empty) directory.
    Directory,
}

/// Planned bundle contents keyed by `/`-separated bundle path.
#[derive(Clone, Debug, Default)]
pub struct BundleLayout {
    entries: BTreeMap<String, LayoutSource>,
}

impl BundleLayout {
    /// Plans the complete bundle for `spec`.
    pub fn plan(
        spec: &BundleSpec,
        search: &PathContext,
        closure: &DependencyClosure,
        metadata: &BundleMetadata,
        scripts: &[LauncherScript],
    ) -> Result<Self> {
        let mut layout = Self::default();
        let build = &spec.build;

        for entry in &build.executables {
            let source = search
                .locate(entry.path())
                .ok_or_else(|| Error::ExecutableNotFound(entry.path().to_path_buf()))?;
            if !source.is_file() {
                crate::bail!("executable {} is not a regular file", source.display());
            }
            layout.insert_file(join(BIN_DIR, &file_name(entry.path(), &source)), source)?;
        }

        for entry in &build.libraries {
            let source = search.find_path(entry.path())?;
            layout.insert_file(join(LIB_DIR, &file_name(entry.path(), &source)), source)?;
        }

        for (name, library) in &closure.libraries {
            layout.insert_file(join(LIB_DIR, name), library.identity.real_path.clone())?;
        }

        for entry in &build.resources {
            layout.add_resource(entry, search)?;
        }

        layout.insert_generated(METADATA_FILE.to_string(), metadata.to_ini(), 0o644)?;
        for script in scripts {
            layout.insert_generated(script.name.to_string(), script.contents.clone(), 0o755)?;
        }

        if let Some(patch) = &spec.runner_patch {
            let source = search.find_path(patch)?;
            layout.insert_file(RUNNER_PATCH.to_string(), source)?;
        }

        log::debug!("Planned {} bundle entries", layout.entries.len());
        Ok(layout)
    }

    /// Plans one file.
    ///
    /// A destination that is already taken is accepted only if both sources
    /// are the same file or have identical contents.
    pub fn insert_file(&mut self, dest: String, source: PathBuf) -> Result<()> {
        match self.entries.get(&dest) {
            None => {
                self.entries.insert(dest, LayoutSource::File(source));
                Ok(())
            }
            Some(LayoutSource::File(existing)) if same_contents(existing, &source)? => {
                log::debug!("{} already provided by {}", dest, existing.display());
                Ok(())
            }
            Some(_) => Err(collision(dest)),
        }
    }

    fn insert_generated(&mut self, dest: String, contents: String, mode: u32) -> Result<()> {
        if self.entries.contains_key(&dest) {
            return Err(collision(dest));
        }
        self.entries
            .insert(dest, LayoutSource::Generated { contents, mode });
        Ok(())
    }

    fn insert_dir(&mut self, dest: String) -> Result<()> {
        match self.entries.get(&dest) {
            None | Some(LayoutSource::Directory) => {
                self.entries.insert(dest, LayoutSource::Directory);
                Ok(())
            }
            Some(_) => Err(collision(dest)),
        }
    }

    /// Plans one `Resources` entry.
    ///
    /// Files land at `res/<name>`. Directories land at `res/<name>/...`, or
    /// directly under `res/` when the entry ends with a separator.
    fn add_resource(&mut self, entry: &PathEntry, search: &PathContext) -> Result<()> {
        let source = search.find_path(entry.path())?;
        let name = file_name(entry.path(), &source);

        if source.is_file() {
            return self.insert_file(join(RES_DIR, &name), source);
        }

        let base = if entry.expand_contents() {
            RES_DIR.to_string()
        } else {
            join(RES_DIR, &name)
        };
        self.insert_dir(base.clone())?;

        for item in WalkDir::new(&source)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name()
        {
            let item = item?;
            let relative = item.path().strip_prefix(&source)?;
            let dest = join(&base, &slashed(relative));
            if item.file_type().is_dir() {
                self.insert_dir(dest)?;
            } else {
                self.insert_file(dest, item.path().to_path_buf())?;
            }
        }
        Ok(())
    }

    /// Bundle paths in archive order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, dest: &str) -> Option<&LayoutSource> {
        self.entries.get(dest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the planned tree below `stage`.
    pub async fn materialize(&self, stage: &Path) -> Result<()> {
        for (dest, source) in &self.entries {
            let target = stage.join(dest);
            match source {
                LayoutSource::File(from) => copy_file(from, &target).await?,
                LayoutSource::Generated { contents, mode } => {
                    write_with_mode(&target, contents, *mode).await?
                }
                LayoutSource::Directory => tokio::fs::create_dir_all(&target)
                    .await
                    .fs_context("creating staging directory", &target)?,
            }
        }
        Ok(())
    }
}

fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    if a == b || real_path(a)? == real_path(b)? {
        return Ok(true);
    }
    Ok(file_sha256(a)? == file_sha256(b)?)
}

fn collision(dest: String) -> Error {
    match dest.strip_prefix("lib/") {
        Some(name) => Error::LibraryNameCollision(name.to_string()),
        None => Error::DestinationCollision(dest),
    }
}

/// Final component of the declared path, falling back to the located file.
fn file_name(declared: &Path, located: &Path) -> String {
    declared
        .file_name()
        .or_else(|| located.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn join(base: &str, name: &str) -> String {
    format!("{base}/{name}")
}

fn slashed(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
