//! Bundle generation.
//!
//! Turns a [`BundleSpec`](crate::spec::BundleSpec) into a self-contained
//! `.bundle` archive: runs the build, reads the version, resolves the
//! shared libraries the built ELF files need beyond the base system, and
//! packs executables, libraries, resources and metadata into a zip.
//!
//! # Module Organization
//!
//! - [`assemble`] - Layout planning, staging and archive writing
//! - [`build`] - Package, module and build-command execution
//! - [`builder`] - The [`Bundler`] pipeline
//! - [`elf`] - ELF parsing, linker caches and dependency closure
//! - [`error`] - Error types
//! - [`settings`] - Run configuration
//! - [`utils`] - Filesystem helpers

pub mod assemble;
pub mod build;
pub mod builder;
pub mod elf;
pub mod error;
pub mod settings;
pub mod utils;

use std::path::PathBuf;

pub use builder::Bundler;
pub use error::{Error, Result};
pub use settings::{Settings, SettingsBuilder};

/// A produced bundle archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundledArtifact {
    /// Location of the archive in the build root.
    pub path: PathBuf,
    /// Version string embedded in the name and metadata.
    pub version: String,
    /// Archive size in bytes.
    pub size: u64,
    /// Hex SHA-256 of the archive.
    pub checksum: String,
}
