//! Error types for bundle generation.
//!
//! Every stage of the pipeline reports through [`Error`]. Variants are grouped by
//! the stage that raises them so a failure message always names the failing
//! stage and entity (spec field, file path, or exit code).

use std::{
    fmt::Display,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error as DeriveError;

/// Result type alias for bundler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Formats an optional process exit code for error messages.
fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}

/// Errors returned by the bundler.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    // Specification errors
    /// The spec file could not be parsed.
    #[error("failed to parse bundle spec {}: {source}", .path.display())]
    SpecParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// Both StoreID and HomebrewID were given.
    #[error("conflicting origins specified; only one of StoreID or HomebrewID is permitted")]
    ConflictingOrigins,
    /// Neither StoreID nor HomebrewID was given.
    #[error("a bundle must have a unique ID (StoreID or HomebrewID)")]
    NoOriginId,
    /// LauncherExec given without any LauncherTags.
    #[error("unusable launcher has no associated LauncherTags")]
    NoLauncherTags,
    /// LauncherTags or the bundle type require a LauncherExec.
    #[error("no LauncherExec present, but one was expected based on the provided {0}")]
    NoLauncherExec(String),
    /// The bundle type requires an Exec.
    #[error("no Exec present, but one was expected based on the provided {0}")]
    NoExec(String),
    /// Exec given for a bundle type that never runs it.
    #[error("Exec present, but will never be used based on the bundle Type")]
    UselessExec,
    /// Homebrew bundles cannot provide launchers.
    #[error("Homebrew bundles cannot be launchers")]
    NoHomebrewLaunchers,
    /// Homebrew bundles cannot set `Background`, not even to false.
    #[error("Homebrew bundles cannot set Background")]
    NoHomebrewBackgroundBundles,
    /// A command string split into nothing.
    #[error("bad command {0:?} didn't contain a program after parsing")]
    BadCommand(String),

    // Orchestration errors
    /// Package installation exited unsuccessfully.
    #[error("failed to install required packages [{}] ({})", .names.join(", "), exit_code(.code))]
    PackageInstallFailed { names: Vec<String>, code: Option<i32> },
    /// A required module exited unsuccessfully.
    #[error("required module {} failed ({})", .path.display(), exit_code(.code))]
    ModuleFailed { path: PathBuf, code: Option<i32> },
    /// A required module is missing its execute permission.
    #[error("required module {} is not executable", .0.display())]
    ModuleNotExecutable(PathBuf),
    /// The build command exited unsuccessfully.
    #[error("build command failed ({})", exit_code(.0))]
    BuildCommandFailed(Option<i32>),
    /// The build command is missing its execute permission.
    #[error("build command {} is not executable", .0.display())]
    BuildCommandNotExecutable(PathBuf),
    /// An external program could not be started.
    #[error("failed to run {command}: {error}")]
    CommandFailed {
        command: String,
        #[source]
        error: io::Error,
    },
    /// Refreshing the dynamic linker cache failed.
    #[error("ldconfig failed ({})", exit_code(.0))]
    LdconfigFailed(Option<i32>),
    /// The version file does not exist.
    #[error("version file {} not found", .0.display())]
    VersionFileMissing(PathBuf),
    /// The version file is empty after trimming whitespace.
    #[error("version file {} is empty", .0.display())]
    VersionFileEmpty(PathBuf),

    // Resolution errors
    /// A needed shared object could not be located.
    #[error("unresolved library {name} (needed by {})", .requested_by.display())]
    UnresolvedLibrary { name: String, requested_by: PathBuf },
    /// Two distinct files want the same `lib/` name.
    #[error("library name collision: lib/{0} maps to two different files")]
    LibraryNameCollision(String),
    /// The base-system library index could not be loaded.
    #[error("base-system library index {} is unavailable: {reason}", .path.display())]
    BaseIndexUnavailable { path: PathBuf, reason: String },
    /// An ld.so.cache file is malformed.
    #[error("malformed ld.so.cache: {0}")]
    LdCache(#[from] ldcache_rs::CacheError),
    /// goblin failed to parse an ELF object.
    #[error("failed to parse ELF {}: {source}", .path.display())]
    ElfParse {
        path: PathBuf,
        #[source]
        source: goblin::error::Error,
    },

    // Assembly errors
    /// A declared executable does not exist.
    #[error("executable {} not found", .0.display())]
    ExecutableNotFound(PathBuf),
    /// A declared file (library, resource, module, ...) does not exist.
    #[error("could not find file {}", .0.display())]
    FileNotFound(PathBuf),
    /// Two sources with different content map to one bundle path.
    #[error("destination collision: {0} is provided by two different files")]
    DestinationCollision(String),
    /// The archive writer failed.
    #[error("unable to write to bundle: {0}")]
    Zip(#[from] zip::result::ZipError),

    // I/O errors
    /// I/O error with the operation and path that failed.
    #[error("{context} {}: {error}", .path.display())]
    Fs {
        context: &'static str,
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    /// Bare I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),
    /// Directory walk error.
    #[error("{0}")]
    WalkDir(#[from] walkdir::Error),
    /// Path prefix stripping error.
    #[error("{0}")]
    StripPrefix(#[from] std::path::StripPrefixError),
    /// Anything else.
    #[error("{0}")]
    GenericError(String),
}

/// Convenient early return with a [`Error::GenericError`].
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

/// Attach a path and operation to I/O failures.
pub trait ErrorExt<T> {
    /// Converts the error into [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.as_ref().to_path_buf(),
            error,
        })
    }
}

/// Attach a message to a missing value or a foreign error.
pub trait Context<T> {
    /// Adds static context.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Adds lazily computed context.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::GenericError(format!("{context}: {e}")))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::GenericError(format!("{}: {e}", f())))
    }
}

impl Error {
    /// Name of the pipeline stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::SpecParse { .. }
            | Error::ConflictingOrigins
            | Error::NoOriginId
            | Error::NoLauncherTags
            | Error::NoLauncherExec(_)
            | Error::NoExec(_)
            | Error::UselessExec
            | Error::NoHomebrewLaunchers
            | Error::NoHomebrewBackgroundBundles
            | Error::BadCommand(_) => "spec",
            Error::PackageInstallFailed { .. }
            | Error::ModuleFailed { .. }
            | Error::ModuleNotExecutable(_)
            | Error::BuildCommandFailed(_)
            | Error::BuildCommandNotExecutable(_)
            | Error::CommandFailed { .. }
            | Error::LdconfigFailed(_) => "build",
            Error::VersionFileMissing(_) | Error::VersionFileEmpty(_) => "version",
            Error::UnresolvedLibrary { .. }
            | Error::LibraryNameCollision(_)
            | Error::BaseIndexUnavailable { .. }
            | Error::LdCache(_)
            | Error::ElfParse { .. } => "resolve",
            Error::ExecutableNotFound(_)
            | Error::FileNotFound(_)
            | Error::DestinationCollision(_)
            | Error::Zip(_) => "assemble",
            Error::Fs { .. }
            | Error::IoError(_)
            | Error::WalkDir(_)
            | Error::StripPrefix(_)
            | Error::GenericError(_) => "io",
        }
    }
}
