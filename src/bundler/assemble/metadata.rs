//! Bundle metadata (`bundle.ini`) and launcher scripts.
//!
//! The metadata record carries the non-build part of the spec plus the
//! resolved version. It is a single `[Bundle]` section of `Key=Value` lines;
//! list values are `;`-separated like desktop entries.

use crate::bundler::{Error, Result, error::ErrorExt};
use crate::spec::{BundleSpec, BundleType};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::io::Read;
use std::path::Path;

/// Name of the metadata file at the bundle root.
pub const METADATA_FILE: &str = "bundle.ini";

/// Wrapper generated for `Exec` when no launcher runs the bundle.
pub const RUN_SCRIPT: &str = "run.sh";

/// Wrapper generated for `LauncherExec`.
pub const LAUNCH_SCRIPT: &str = "launch.sh";

const SECTION: &str = "[Bundle]";

/// Parsed or generated `bundle.ini` contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleMetadata {
    pub name: String,
    pub bundle_type: BundleType,
    pub store_id: Option<String>,
    pub homebrew_id: Option<String>,
    pub exec: Option<String>,
    pub version: String,
    pub background: Option<bool>,
    pub prefer_xbox_mode: Option<bool>,
    pub launcher: Option<String>,
    pub launcher_tags: Vec<String>,
    pub launcher_exec: Option<String>,
}

/// A generated shell wrapper placed at the bundle root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LauncherScript {
    pub name: &'static str,
    pub contents: String,
}

impl BundleMetadata {
    /// Builds the metadata for `spec` and the wrapper scripts it refers to.
    ///
    /// When nothing else launches the bundle, `Exec` is wrapped in `run.sh`
    /// so `lib/` is on the loader path; otherwise it is recorded verbatim as
    /// the launcher's arguments. `LauncherExec` is always wrapped.
    pub fn for_spec(spec: &BundleSpec, version: &str) -> Result<(Self, Vec<LauncherScript>)> {
        let mut scripts = Vec::new();

        let exec = match (&spec.exec, &spec.launcher) {
            (Some(exec), Some(_)) => Some(exec.clone()),
            (Some(exec), None) => {
                scripts.push(LauncherScript {
                    name: RUN_SCRIPT,
                    contents: launcher_script(exec)?,
                });
                Some(RUN_SCRIPT.to_string())
            }
            (None, _) => None,
        };

        let launcher_exec = match &spec.launcher_exec {
            Some(command) => {
                scripts.push(LauncherScript {
                    name: LAUNCH_SCRIPT,
                    contents: launcher_script(command)?,
                });
                Some(LAUNCH_SCRIPT.to_string())
            }
            None => None,
        };

        let metadata = Self {
            name: spec.name.clone(),
            bundle_type: spec.bundle_type,
            store_id: spec.store_id.clone(),
            homebrew_id: spec.homebrew_id.clone(),
            exec,
            version: version.to_string(),
            background: spec.background,
            prefer_xbox_mode: spec.prefer_xbox_mode,
            launcher: spec.launcher.clone(),
            launcher_tags: spec.launcher_tags.clone(),
            launcher_exec,
        };
        Ok((metadata, scripts))
    }

    /// Every present field as `key -> values`, in key order.
    pub fn fields(&self) -> BTreeMap<&'static str, Vec<String>> {
        let single = |value: &Option<String>| value.as_ref().map(|v| vec![v.clone()]);
        let flag = |value: Option<bool>| value.map(|v| vec![v.to_string()]);

        [
            ("Name", Some(vec![self.name.clone()])),
            ("Type", Some(vec![self.bundle_type.to_string()])),
            ("StoreID", single(&self.store_id)),
            ("HomebrewID", single(&self.homebrew_id)),
            ("Exec", single(&self.exec)),
            ("Version", Some(vec![self.version.clone()])),
            ("Background", flag(self.background)),
            ("PreferXBoxMode", flag(self.prefer_xbox_mode)),
            ("Launcher", single(&self.launcher)),
            (
                "LauncherTags",
                (!self.launcher_tags.is_empty()).then(|| self.launcher_tags.clone()),
            ),
            ("LauncherExec", single(&self.launcher_exec)),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }

    /// Renders the `bundle.ini` text.
    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        out.push_str(SECTION);
        out.push('\n');

        let ordered = [
            "Name",
            "Type",
            "StoreID",
            "HomebrewID",
            "Exec",
            "Version",
            "Background",
            "PreferXBoxMode",
            "Launcher",
            "LauncherTags",
            "LauncherExec",
        ];
        let fields = self.fields();
        for key in ordered {
            if let Some(values) = fields.get(key) {
                // Writing to a String cannot fail.
                let _ = writeln!(out, "{}={}", key, values.join(";"));
            }
        }
        out
    }

    /// Parses `bundle.ini` text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        let mut in_section = false;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') {
                in_section = line == SECTION;
                continue;
            }
            if !in_section {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let required = |key: &str| {
            values
                .get(key)
                .cloned()
                .ok_or_else(|| Error::GenericError(format!("{METADATA_FILE} lacks {key}")))
        };
        let flag = |key: &str| -> Result<Option<bool>> {
            values
                .get(key)
                .map(|v| {
                    v.parse::<bool>().map_err(|_| {
                        Error::GenericError(format!("{METADATA_FILE}: {key}={v} is not a boolean"))
                    })
                })
                .transpose()
        };

        Ok(Self {
            name: required("Name")?,
            bundle_type: required("Type")?.parse()?,
            store_id: values.get("StoreID").cloned(),
            homebrew_id: values.get("HomebrewID").cloned(),
            exec: values.get("Exec").cloned(),
            version: required("Version")?,
            background: flag("Background")?,
            prefer_xbox_mode: flag("PreferXBoxMode")?,
            launcher: values.get("Launcher").cloned(),
            launcher_tags: values
                .get("LauncherTags")
                .map(|tags| {
                    tags.split(';')
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            launcher_exec: values.get("LauncherExec").cloned(),
        })
    }

    /// Reads the metadata of a produced bundle archive.
    pub fn from_archive(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).fs_context("opening bundle", path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entry = archive.by_name(METADATA_FILE)?;
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .fs_context("reading bundle metadata from", path)?;
        Self::parse(&text)
    }
}

/// Renders a wrapper that puts the bundle's `lib/` on the loader path and
/// runs `command` (relative to the bundle root) with the caller's arguments.
///
/// The command is split with shell quoting rules; if it cannot be split it is
/// used as the program name unchanged.
pub fn launcher_script(command: &str) -> Result<String> {
    let (program, args) = match shell_words::split(command) {
        Ok(parts) => {
            let mut parts = parts.into_iter();
            let program = parts
                .next()
                .ok_or_else(|| Error::BadCommand(command.to_string()))?;
            let args: Vec<String> = parts.map(|arg| shell_words::quote(&arg).into_owned()).collect();
            (program, args)
        }
        Err(e) => {
            log::warn!("Could not split command {:?}: {}", command, e);
            (command.to_string(), Vec::new())
        }
    };

    let mut invocation = format!("\"${{P}}/{program}\"");
    for arg in &args {
        invocation.push(' ');
        invocation.push_str(arg);
    }

    Ok(format!(
        r#"#!/bin/sh

set -x

P=$(dirname "$(busybox realpath "$0")")

export LD_LIBRARY_PATH="${{LD_LIBRARY_PATH}}:${{P}}/lib"

{invocation} "$@"
"#
    ))
}
