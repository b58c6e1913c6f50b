//! Base-system library index.
//!
//! The set of libraries the target device already ships. Anything matching
//! this index is left out of the bundle, along with its own dependencies.

use super::ldcache::{self, LinkerCache};
use crate::bundler::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Sonames and device paths of the libraries the target system provides.
///
/// Loaded once per run and shared read-only by the resolver.
#[derive(Debug, Default)]
pub struct BaseLibraryIndex {
    names: BTreeSet<String>,
    paths: BTreeSet<PathBuf>,
    cache: Option<LinkerCache>,
}

impl BaseLibraryIndex {
    /// Loads an index file.
    ///
    /// Accepts either an `ld.so.cache` image taken from the device or a text
    /// list with one soname or absolute path per line (`#` starts a comment).
    pub fn load(path: &Path) -> Result<Self> {
        let unavailable = |reason: String| Error::BaseIndexUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        let data = std::fs::read(path).map_err(|e| unavailable(e.to_string()))?;

        if ldcache::is_ld_cache(&data) {
            let index = Self::from_ld_cache(&data).map_err(|e| unavailable(e.to_string()))?;
            log::info!("Loaded base library index {} (ld.so.cache)", path.display());
            return Ok(index);
        }

        let text = std::str::from_utf8(&data)
            .map_err(|e| unavailable(format!("neither an ld.so.cache nor a text list: {e}")))?;
        let index = Self::from_text(text);
        if index.is_empty() {
            log::warn!("Base library index {} lists no libraries", path.display());
        }
        log::info!(
            "Loaded base library index {} ({} names, {} paths)",
            path.display(),
            index.names.len(),
            index.paths.len()
        );
        Ok(index)
    }

    /// Builds an index from an `ld.so.cache` image.
    pub fn from_ld_cache(data: &[u8]) -> Result<Self> {
        Ok(Self {
            cache: Some(LinkerCache::parse(data)?),
            ..Default::default()
        })
    }

    /// Builds an index from a text list.
    pub fn from_text(text: &str) -> Self {
        let mut index = Self::default();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                let path = PathBuf::from(line);
                if let Some(name) = path.file_name() {
                    index.names.insert(name.to_string_lossy().into_owned());
                }
                index.paths.insert(path);
            } else {
                index.names.insert(line.to_string());
            }
        }
        index
    }

    /// Builds an index from bare sonames.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Whether the device provides a library by this name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name) || self.cache.as_ref().is_some_and(|c| c.contains(name))
    }

    /// Whether the device provides a library at this absolute path.
    pub fn contains_path(&self, path: &Path) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        let (Some(cache), Some(name)) = (&self.cache, path.file_name()) else {
            return false;
        };
        cache
            .path_of(&name.to_string_lossy())
            .is_some_and(|cached| cached == path)
    }

    /// Whether the index excludes nothing.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty() && self.cache.is_none()
    }
}
