//! Dynamic section extraction.

use crate::bundler::{Error, Result, error::ErrorExt};
use std::path::Path;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// The parts of an ELF dynamic section that drive library resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DynamicInfo {
    /// `DT_NEEDED` entries, in link order.
    pub needed: Vec<String>,
    /// `DT_RPATH` search directories, already split on `:`.
    pub rpaths: Vec<String>,
    /// `DT_RUNPATH` search directories, already split on `:`.
    pub runpaths: Vec<String>,
    /// `DT_SONAME`, if any.
    pub soname: Option<String>,
}

impl DynamicInfo {
    /// Search hints embedded in the object.
    ///
    /// `DT_RUNPATH` replaces `DT_RPATH` when both are present, matching the
    /// dynamic loader.
    pub fn search_hints(&self) -> &[String] {
        if self.runpaths.is_empty() {
            &self.rpaths
        } else {
            &self.runpaths
        }
    }
}

/// Reads dynamic-section information from objects on disk.
///
/// The resolver only talks to this trait so tests can describe a dependency
/// graph without producing real ELF files.
pub trait ElfReader: Send + Sync {
    /// Returns `Ok(None)` for files that are not ELF objects (shell scripts,
    /// linker scripts, data).
    fn read_dynamic(&self, path: &Path) -> Result<Option<DynamicInfo>>;
}

/// [`ElfReader`] backed by goblin.
#[derive(Clone, Copy, Debug, Default)]
pub struct GoblinReader;

impl ElfReader for GoblinReader {
    fn read_dynamic(&self, path: &Path) -> Result<Option<DynamicInfo>> {
        let buffer = std::fs::read(path).fs_context("failed to read ELF candidate", path)?;
        parse_dynamic(path, &buffer)
    }
}

/// Parses the dynamic section of an in-memory object.
pub fn parse_dynamic(path: &Path, buffer: &[u8]) -> Result<Option<DynamicInfo>> {
    if buffer.len() < ELF_MAGIC.len() || &buffer[..ELF_MAGIC.len()] != ELF_MAGIC {
        log::trace!("{} is not an ELF object", path.display());
        return Ok(None);
    }

    let elf = goblin::elf::Elf::parse(buffer).map_err(|source| Error::ElfParse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(DynamicInfo {
        needed: elf.libraries.iter().map(|lib| lib.to_string()).collect(),
        rpaths: split_search_path(&elf.rpaths),
        runpaths: split_search_path(&elf.runpaths),
        soname: elf.soname.map(str::to_string),
    }))
}

fn split_search_path(entries: &[&str]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|entry| entry.split(':'))
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}
