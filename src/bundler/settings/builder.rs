//! Builder for constructing Settings.

use super::Settings;
use super::core::{BUNDLE_EXTENSION, DEFAULT_BASE_INDEX, DEFAULT_LIBRARY_DIRS};
use crate::bundler::builder::tool_detection::{APT_GET, LDCONFIG};
use crate::bundler::error::{Context, ErrorExt};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Overrides the build root (default: current directory).
pub const ENV_BUILD_ROOT: &str = "BUNDLE_GEN_BUILD_ROOT";
/// Overrides the system root libraries are resolved against (default: `/`).
pub const ENV_SYSROOT: &str = "BUNDLE_GEN_SYSROOT";
/// Overrides the base-system library index file.
pub const ENV_BASE_INDEX: &str = "BUNDLE_GEN_BASE_INDEX";

/// Builder for constructing [`Settings`].
///
/// Values set explicitly win over environment overrides, which win over the
/// defaults.
///
/// # Examples
///
/// ```no_run
/// use bundle_gen::bundler::SettingsBuilder;
///
/// # fn example() -> bundle_gen::bundler::Result<()> {
/// let settings = SettingsBuilder::new()
///     .spec_path("specs/pong.yaml")
///     .build_root("/build")
///     .build()?;
/// assert_eq!(settings.archive_name("1.0"), "pong_1.0.bundle");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    spec_path: Option<PathBuf>,
    build_root: Option<PathBuf>,
    sysroot: Option<PathBuf>,
    base_index: Option<PathBuf>,
    library_dirs: Option<Vec<PathBuf>>,
    package_manager: Option<PathBuf>,
    ldconfig: Option<PathBuf>,
    extension: Option<String>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the spec file.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn spec_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.spec_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the build root.
    ///
    /// Default: `$BUNDLE_GEN_BUILD_ROOT`, else the current directory
    pub fn build_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.build_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the system root libraries are resolved against.
    ///
    /// Default: `$BUNDLE_GEN_SYSROOT`, else `/`
    pub fn sysroot<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sysroot = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the base-system library index file.
    ///
    /// Default: `$BUNDLE_GEN_BASE_INDEX`, else [`DEFAULT_BASE_INDEX`]
    pub fn base_index<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.base_index = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the standard library directories (relative to the system root).
    pub fn library_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.library_dirs = Some(dirs);
        self
    }

    /// Sets the package manager program.
    ///
    /// Default: `apt-get` as found on `PATH`
    pub fn package_manager<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.package_manager = Some(program.as_ref().to_path_buf());
        self
    }

    /// Sets the ldconfig program.
    ///
    /// Default: `ldconfig` as found on `PATH`
    pub fn ldconfig<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.ldconfig = Some(program.as_ref().to_path_buf());
        self
    }

    /// Sets the archive extension.
    ///
    /// Default: [`BUNDLE_EXTENSION`]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `spec_path` is missing or a path cannot be made
    /// absolute.
    pub fn build(self) -> crate::bundler::Result<Settings> {
        let spec_path = absolute(&self.spec_path.context("spec_path is required")?)?;
        let source_root = spec_path
            .parent()
            .with_context(|| format!("spec {} has no parent directory", spec_path.display()))?
            .to_path_buf();

        let build_root = match self.build_root.or_else(|| env_path(ENV_BUILD_ROOT)) {
            Some(root) => absolute(&root)?,
            None => std::env::current_dir().fs_context("reading current directory", ".")?,
        };
        let sysroot = absolute(
            &self
                .sysroot
                .or_else(|| env_path(ENV_SYSROOT))
                .unwrap_or_else(|| PathBuf::from("/")),
        )?;
        let base_index = absolute(
            &self
                .base_index
                .or_else(|| env_path(ENV_BASE_INDEX))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_INDEX)),
        )?;

        let library_dirs = self.library_dirs.unwrap_or_else(|| {
            DEFAULT_LIBRARY_DIRS.iter().map(PathBuf::from).collect()
        });

        Ok(Settings::new(
            spec_path,
            source_root,
            build_root,
            sysroot,
            base_index,
            library_dirs,
            self.package_manager.unwrap_or_else(|| APT_GET.clone()),
            self.ldconfig.unwrap_or_else(|| LDCONFIG.clone()),
            self.extension.unwrap_or_else(|| BUNDLE_EXTENSION.to_string()),
        ))
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn absolute(path: &Path) -> crate::bundler::Result<PathBuf> {
    Ok(path
        .absolutize()
        .fs_context("making path absolute", path)?
        .into_owned())
}
