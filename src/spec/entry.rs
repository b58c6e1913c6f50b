//! Path entries of the build section.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file or directory listed under `Executables`, `Libraries`,
/// `ExtraElfFiles` or `Resources`.
///
/// A trailing path separator in the spec (`data/`) marks a directory whose
/// *contents* should be placed directly into the destination directory. The
/// flag is captured once here so nothing downstream re-inspects the raw string.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub struct PathEntry {
    path: PathBuf,
    expand_contents: bool,
}

impl PathEntry {
    /// Creates an entry from its spec spelling.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let expand_contents = raw.len() > 1 && raw.ends_with(std::path::MAIN_SEPARATOR);
        let trimmed = if expand_contents {
            raw.trim_end_matches(std::path::MAIN_SEPARATOR)
        } else {
            raw.as_str()
        };
        Self {
            path: PathBuf::from(trimmed),
            expand_contents,
        }
    }

    /// The path with any trailing separator removed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a directory's contents are copied instead of the directory itself.
    pub fn expand_contents(&self) -> bool {
        self.expand_contents
    }
}

impl From<String> for PathEntry {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for PathEntry {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<PathEntry> for String {
    fn from(entry: PathEntry) -> Self {
        let mut raw = entry.path.to_string_lossy().into_owned();
        if entry.expand_contents {
            raw.push(std::path::MAIN_SEPARATOR);
        }
        raw
    }
}
