//! Command line argument parsing and validation.

use crate::bundler::{Result, Settings, SettingsBuilder};
use clap::Parser;
use std::path::PathBuf;

/// Bundle generator
#[derive(Parser, Debug)]
#[command(
    name = "bundle-gen",
    version,
    about = "Generate a bundle from a spec",
    long_about = "Builds the software described by a bundle spec and packs it, together with
the shared libraries it needs beyond the base system, into <spec>_<version>.bundle.

Usage:
  bundle-gen specs/pong.yaml
  bundle-gen --build-root /build --base-index ./device.txt specs/pong.yaml

Environment:
  BUNDLE_GEN_BUILD_ROOT, BUNDLE_GEN_SYSROOT and BUNDLE_GEN_BASE_INDEX provide
  defaults for the matching options. RUST_LOG controls diagnostics.

Exit code 0 = the archive path printed on stdout exists."
)]
pub struct Args {
    /// The bundle spec to build
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,

    /// Working directory for build steps; the archive is written here
    ///
    /// Defaults to the current directory.
    #[arg(long, value_name = "DIR")]
    pub build_root: Option<PathBuf>,

    /// Root of the filesystem libraries are resolved in
    #[arg(long, value_name = "DIR")]
    pub sysroot: Option<PathBuf>,

    /// Base-system library index (ld.so.cache image or text list)
    #[arg(long, value_name = "FILE")]
    pub base_index: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.spec.as_os_str().is_empty() {
            return Err("Spec path cannot be empty".to_string());
        }
        if !self.spec.is_file() {
            return Err(format!("Spec {} is not a file", self.spec.display()));
        }
        Ok(())
    }

    /// Run settings for these arguments.
    pub fn settings(&self) -> Result<Settings> {
        let mut builder = SettingsBuilder::new().spec_path(&self.spec);
        if let Some(dir) = &self.build_root {
            builder = builder.build_root(dir);
        }
        if let Some(dir) = &self.sysroot {
            builder = builder.sysroot(dir);
        }
        if let Some(file) = &self.base_index {
            builder = builder.base_index(file);
        }
        builder.build()
    }
}
