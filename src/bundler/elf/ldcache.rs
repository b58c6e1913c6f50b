//! glibc `ld.so.cache` images, read through `ldcache_rs`.
//!
//! Values are interpreted in native byte order; the cache is always produced
//! on the architecture that consumes it.

use crate::bundler::{Result, error::ErrorExt};
use std::fmt;
use std::path::{Path, PathBuf};

const MAGIC_OLD: &[u8] = b"ld.so-1.7.0";
const MAGIC_NEW: &[u8] = b"glibc-ld.so.cache";

/// Returns whether `data` looks like an ld.so.cache file.
pub fn is_ld_cache(data: &[u8]) -> bool {
    data.starts_with(MAGIC_OLD) || data.starts_with(MAGIC_NEW)
}

/// A parsed linker cache: soname to library path.
pub struct LinkerCache {
    cache: ldcache_rs::Cache,
}

impl LinkerCache {
    /// Parses an ld.so.cache image.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let cache = ldcache_rs::Cache::parse(data, ldcache_rs::TargetEndian::Native)?;
        Ok(Self { cache })
    }

    /// Reads and parses the cache at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::read(path) {
            Ok(data) => Self::parse(&data).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).fs_context("reading linker cache", path),
        }
    }

    pub fn contains(&self, soname: &str) -> bool {
        self.cache.contains(soname)
    }

    /// Path the cache maps `soname` to, as seen on the machine that wrote it.
    pub fn path_of(&self, soname: &str) -> Option<PathBuf> {
        self.cache.get_path(soname).map(|path| {
            let path: &Path = path.as_ref();
            path.to_path_buf()
        })
    }
}

impl fmt::Debug for LinkerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkerCache").finish_non_exhaustive()
    }
}

/// Writes a standalone `glibc-ld.so.cache1.1` image, the layout `ldconfig`
/// emits by default.
#[cfg(test)]
pub(crate) fn synthetic(entries: &[(&str, &str)]) -> Vec<u8> {
    const HEADER_LEN: usize = 48;
    const ENTRY_LEN: usize = 24;

    let strings_start = HEADER_LEN + entries.len() * ENTRY_LEN;
    let mut strings = Vec::new();
    let mut table = Vec::with_capacity(entries.len() * ENTRY_LEN);

    for (soname, path) in entries {
        let key = strings_start + strings.len();
        strings.extend_from_slice(soname.as_bytes());
        strings.push(0);
        let value = strings_start + strings.len();
        strings.extend_from_slice(path.as_bytes());
        strings.push(0);

        // FLAG_ELF_LIBC6 | FLAG_X8664_LIB64
        table.extend_from_slice(&0x0303i32.to_ne_bytes());
        table.extend_from_slice(&(key as u32).to_ne_bytes());
        table.extend_from_slice(&(value as u32).to_ne_bytes());
        table.extend_from_slice(&0u32.to_ne_bytes());
        table.extend_from_slice(&0u64.to_ne_bytes());
    }

    let mut out = Vec::with_capacity(strings_start + strings.len());
    out.extend_from_slice(MAGIC_NEW);
    out.extend_from_slice(b"1.1");
    out.extend_from_slice(&(entries.len() as u32).to_ne_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_ne_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&0u32.to_ne_bytes());
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&table);
    out.extend_from_slice(&strings);
    out
}
