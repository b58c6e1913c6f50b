//! Core Settings struct and implementations.

use std::path::{Path, PathBuf};

/// Standard library directories searched after an object's own rpath hints
/// and the linker cache, relative to the system root.
pub const DEFAULT_LIBRARY_DIRS: &[&str] = &[
    "lib",
    "lib64",
    "usr/lib",
    "usr/lib64",
    "usr/local/lib",
    "lib/x86_64-linux-gnu",
    "usr/lib/x86_64-linux-gnu",
    "lib/aarch64-linux-gnu",
    "usr/lib/aarch64-linux-gnu",
];

/// Where the precomputed base-system linker cache is installed in the build image.
pub const DEFAULT_BASE_INDEX: &str = "/usr/local/share/bundle-gen/ld.so.cache.vcs";

/// Linker cache of the build container, relative to the system root.
pub const BUILD_LD_CACHE: &str = "etc/ld.so.cache";

/// Extension of produced archives.
pub const BUNDLE_EXTENSION: &str = "bundle";

/// Main settings for a bundle generation run.
///
/// Constructed via [`SettingsBuilder`](super::SettingsBuilder). All paths are
/// absolute once built.
#[derive(Clone, Debug)]
pub struct Settings {
    /// The spec file driving this run.
    spec_path: PathBuf,

    /// Directory holding the spec and the modules/resources it references.
    source_root: PathBuf,

    /// Writable working directory for build steps; the archive lands here.
    build_root: PathBuf,

    /// Root of the filesystem libraries are resolved against.
    ///
    /// `/` when running inside the build container.
    sysroot: PathBuf,

    /// Base-system library index file.
    base_index: PathBuf,

    /// Standard library directories, relative to `sysroot`.
    library_dirs: Vec<PathBuf>,

    /// Program used to install `RequiredPackages`.
    package_manager: PathBuf,

    /// Program used to refresh the linker cache after modules run.
    ldconfig: PathBuf,

    /// Extension of the produced archive.
    extension: String,
}

impl Settings {
    /// Returns the spec file path.
    pub fn spec_path(&self) -> &Path {
        &self.spec_path
    }

    /// Returns the spec file name without its extension.
    ///
    /// Used for the archive name and the build log name.
    pub fn spec_stem(&self) -> String {
        self.spec_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string())
    }

    /// Returns the source root.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Returns the build root.
    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Returns the system root used for library resolution.
    pub fn sysroot(&self) -> &Path {
        &self.sysroot
    }

    /// Returns the base-system library index path.
    pub fn base_index(&self) -> &Path {
        &self.base_index
    }

    /// Returns the standard library directories, rooted at the system root.
    pub fn library_dirs(&self) -> Vec<PathBuf> {
        self.library_dirs
            .iter()
            .map(|dir| self.sysroot.join(dir))
            .collect()
    }

    /// Returns the build container's linker cache path.
    pub fn build_ld_cache(&self) -> PathBuf {
        self.sysroot.join(BUILD_LD_CACHE)
    }

    /// Returns the package manager program.
    pub fn package_manager(&self) -> &Path {
        &self.package_manager
    }

    /// Returns the ldconfig program.
    pub fn ldconfig(&self) -> &Path {
        &self.ldconfig
    }

    /// Returns the archive file name for a resolved version.
    pub fn archive_name(&self, version: &str) -> String {
        format!("{}_{}.{}", self.spec_stem(), version, self.extension)
    }

    /// Returns the build log path.
    pub fn build_log(&self) -> PathBuf {
        self.build_root.join(format!("{}.log", self.spec_stem()))
    }

    /// Locations searched, in order, for files the spec names by relative path.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.build_root.clone()];
        if self.source_root != self.build_root {
            roots.push(self.source_root.clone());
        }
        roots
    }

    /// Creates a new Settings instance (used by SettingsBuilder).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        spec_path: PathBuf,
        source_root: PathBuf,
        build_root: PathBuf,
        sysroot: PathBuf,
        base_index: PathBuf,
        library_dirs: Vec<PathBuf>,
        package_manager: PathBuf,
        ldconfig: PathBuf,
        extension: String,
    ) -> Self {
        Self {
            spec_path,
            source_root,
            build_root,
            sysroot,
            base_index,
            library_dirs,
            package_manager,
            ldconfig,
            extension,
        }
    }
}
