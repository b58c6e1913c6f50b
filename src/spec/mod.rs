//! Bundle specification model.
//!
//! A spec is a YAML document with PascalCase keys describing the bundle's
//! metadata and a nested `Build` section telling the orchestrator what to run
//! and what to collect. It is parsed once and read-only afterwards.
//!
//! ```yaml
//! Name: Example Game
//! Type: Game
//! StoreID: example-game
//! Exec: bin/game --fullscreen
//! Build:
//!   VersionFile: VERSION
//!   RequiredPackages: [libsdl2-2.0-0]
//!   BuildCommand: build.sh
//!   Executables: [out/game]
//!   Resources: [assets/]
//! ```

mod entry;

pub use entry::PathEntry;

use crate::bundler::{Error, Result, error::ErrorExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// What kind of bundle this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum BundleType {
    Game,
    Application,
    /// Provides a launcher for other bundles and is never run directly.
    LauncherOnly,
}

impl fmt::Display for BundleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BundleType::Game => "Game",
            BundleType::Application => "Application",
            BundleType::LauncherOnly => "LauncherOnly",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for BundleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Game" => Ok(BundleType::Game),
            "Application" => Ok(BundleType::Application),
            "LauncherOnly" => Ok(BundleType::LauncherOnly),
            other => Err(Error::GenericError(format!("unknown bundle type {other:?}"))),
        }
    }
}

/// The `Build` section: what to install, what to run and what to collect.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct BuildSpec {
    pub version_file: String,
    #[serde(default)]
    pub required_packages: Vec<String>,
    #[serde(default)]
    pub required_modules: Vec<String>,
    pub build_command: Option<String>,
    #[serde(default)]
    pub executables: Vec<PathEntry>,
    #[serde(default)]
    pub libraries: Vec<PathEntry>,
    #[serde(default)]
    pub extra_elf_files: Vec<PathEntry>,
    #[serde(default)]
    pub resources: Vec<PathEntry>,
}

/// A complete bundle specification.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct BundleSpec {
    pub name: String,
    #[serde(rename = "Type")]
    pub bundle_type: BundleType,
    #[serde(rename = "StoreID")]
    pub store_id: Option<String>,
    #[serde(rename = "HomebrewID")]
    pub homebrew_id: Option<String>,
    pub exec: Option<String>,
    pub background: Option<bool>,
    #[serde(rename = "PreferXBoxMode")]
    pub prefer_xbox_mode: Option<bool>,
    pub launcher: Option<String>,
    #[serde(default)]
    pub launcher_tags: Vec<String>,
    pub launcher_exec: Option<String>,
    /// Script shipped as `runner-patch` and run by the device after extraction.
    pub runner_patch: Option<String>,
    pub build: BuildSpec,
}

/// The distribution channel a bundle identifies itself through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin<'a> {
    Store(&'a str),
    Homebrew(&'a str),
}

impl BundleSpec {
    /// Reads and parses a spec file without validating it.
    pub fn load(path: &Path) -> Result<BundleSpec> {
        let contents = std::fs::read_to_string(path).fs_context("reading bundle spec", path)?;
        Self::from_yaml(&contents).map_err(|source| match source {
            Error::SpecParse { source, .. } => Error::SpecParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses a spec from YAML text.
    pub fn from_yaml(contents: &str) -> Result<BundleSpec> {
        serde_yaml::from_str(contents).map_err(|source| Error::SpecParse {
            path: "<inline>".into(),
            source,
        })
    }

    /// Parses and validates a spec file.
    pub fn load_checked(path: &Path) -> Result<BundleSpec> {
        let spec = Self::load(path)?;
        spec.check()?;
        log::debug!("Loaded {} spec {:?} from {}", spec.bundle_type, spec.name, path.display());
        Ok(spec)
    }

    /// Returns the bundle's origin. Only meaningful after [`check`](Self::check).
    pub fn origin(&self) -> Result<Origin<'_>> {
        match (&self.store_id, &self.homebrew_id) {
            (Some(id), None) => Ok(Origin::Store(id)),
            (None, Some(id)) => Ok(Origin::Homebrew(id)),
            (Some(_), Some(_)) => Err(Error::ConflictingOrigins),
            (None, None) => Err(Error::NoOriginId),
        }
    }

    /// Rejects contradictory or incomplete metadata before anything runs.
    pub fn check(&self) -> Result<()> {
        match self.origin()? {
            Origin::Store(_) => self.check_store_bundle(),
            Origin::Homebrew(_) => self.check_homebrew_bundle(),
        }
    }

    fn check_store_bundle(&self) -> Result<()> {
        if self.launcher_tags.is_empty() {
            if self.launcher_exec.is_some() {
                return Err(Error::NoLauncherTags);
            }
        } else if self.launcher_exec.is_none() {
            return Err(Error::NoLauncherExec("launcher tags".to_string()));
        }

        match self.bundle_type {
            BundleType::Game | BundleType::Application => {
                if self.exec.is_none() {
                    return Err(Error::NoExec("bundle type".to_string()));
                }
            }
            BundleType::LauncherOnly => {
                if self.launcher_exec.is_none() {
                    return Err(Error::NoLauncherExec("bundle type".to_string()));
                }
                if self.exec.is_some() {
                    return Err(Error::UselessExec);
                }
            }
        }

        Ok(())
    }

    fn check_homebrew_bundle(&self) -> Result<()> {
        if !self.launcher_tags.is_empty() || self.launcher_exec.is_some() {
            return Err(Error::NoHomebrewLaunchers);
        }

        match self.bundle_type {
            BundleType::Game | BundleType::Application => {
                if self.exec.is_none() {
                    return Err(Error::NoExec("bundle type".to_string()));
                }
            }
            BundleType::LauncherOnly => return Err(Error::NoHomebrewLaunchers),
        }

        if self.background.is_some() {
            return Err(Error::NoHomebrewBackgroundBundles);
        }

        Ok(())
    }
}
