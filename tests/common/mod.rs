//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use bundle_gen::bundler::{BundledArtifact, Bundler, Result, Settings, SettingsBuilder};
use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;
const DYN_SIZE: usize = 16;

const DT_NULL: u64 = 0;
const DT_NEEDED: u64 = 1;
const DT_STRTAB: u64 = 5;
const DT_STRSZ: u64 = 10;
const DT_RUNPATH: u64 = 29;

/// Builds a minimal x86-64 shared object whose dynamic section lists
/// `needed` and, optionally, a `DT_RUNPATH`.
///
/// One `PT_LOAD` maps the whole file at address 0 so virtual addresses equal
/// file offsets.
pub fn elf_bytes(needed: &[&str], runpath: Option<&str>) -> Vec<u8> {
    let mut strtab = vec![0u8];
    let mut add = |s: &str| {
        let offset = strtab.len() as u64;
        strtab.extend_from_slice(s.as_bytes());
        strtab.push(0);
        offset
    };
    let mut dynamic: Vec<(u64, u64)> = needed.iter().map(|n| (DT_NEEDED, add(*n))).collect();
    if let Some(path) = runpath {
        dynamic.push((DT_RUNPATH, add(path)));
    }

    let dyn_offset = EHDR_SIZE + 2 * PHDR_SIZE;
    let dyn_size = (dynamic.len() + 3) * DYN_SIZE;
    let str_offset = dyn_offset + dyn_size;
    let total = str_offset + strtab.len();
    dynamic.push((DT_STRTAB, str_offset as u64));
    dynamic.push((DT_STRSZ, strtab.len() as u64));
    dynamic.push((DT_NULL, 0));

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&3u16.to_le_bytes()); // ET_DYN
    out.extend_from_slice(&62u16.to_le_bytes()); // EM_X86_64
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
    out.extend_from_slice(&(EHDR_SIZE as u64).to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&64u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    push_phdr(&mut out, 1, 4, 0, total as u64, 0x1000); // PT_LOAD
    push_phdr(&mut out, 2, 6, dyn_offset as u64, dyn_size as u64, 8); // PT_DYNAMIC

    for (tag, val) in dynamic {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&val.to_le_bytes());
    }
    out.extend_from_slice(&strtab);
    assert_eq!(out.len(), total);
    out
}

fn push_phdr(out: &mut Vec<u8>, kind: u32, flags: u32, offset: u64, size: u64, align: u64) {
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes()); // p_vaddr
    out.extend_from_slice(&offset.to_le_bytes()); // p_paddr
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&align.to_le_bytes());
}

/// A source tree, build root and fake container filesystem in one tempdir.
pub struct TestEnv {
    _dir: TempDir,
    pub source: PathBuf,
    pub build: PathBuf,
    pub sysroot: PathBuf,
    pub base_index: PathBuf,
    pub calls: PathBuf,
    tools: PathBuf,
}

impl TestEnv {
    /// `base` lists the library names the device already provides.
    pub fn new(base: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let env = Self {
            source: root.join("src"),
            build: root.join("build"),
            sysroot: root.join("sysroot"),
            base_index: root.join("base-index.txt"),
            calls: root.join("calls.txt"),
            tools: root.join("tools"),
            _dir: dir,
        };
        for dir in [&env.source, &env.build, &env.sysroot, &env.tools] {
            std::fs::create_dir_all(dir).unwrap();
        }

        let mut index = String::from("# libraries present on the device\n");
        for name in base {
            index.push_str(name);
            index.push('\n');
        }
        std::fs::write(&env.base_index, index).unwrap();

        let calls = env.calls.display().to_string();
        write_script(
            &env.tools.join("apt-get"),
            &format!("echo \"apt-get $*\" >> {calls}"),
        );
        write_script(&env.tools.join("ldconfig"), &format!("echo ldconfig >> {calls}"));
        env
    }

    /// Writes `<name>.yaml` into the source tree.
    pub fn spec(&self, name: &str, yaml: &str) -> PathBuf {
        let path = self.source.join(format!("{name}.yaml"));
        std::fs::write(&path, yaml).unwrap();
        path
    }

    /// Writes a plain file relative to `dir`.
    pub fn file(&self, dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Writes an executable shell script into the source tree.
    pub fn script(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.source.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_script(&path, body);
        path
    }

    /// Writes an ELF object with the given dependencies, relative to `dir`.
    pub fn elf(&self, dir: &Path, rel: &str, needed: &[&str]) -> PathBuf {
        self.elf_with_runpath(dir, rel, needed, None)
    }

    pub fn elf_with_runpath(
        &self,
        dir: &Path,
        rel: &str,
        needed: &[&str],
        runpath: Option<&str>,
    ) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, elf_bytes(needed, runpath)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Writes a library into the container's `/usr/lib`.
    pub fn system_lib(&self, name: &str, needed: &[&str]) -> PathBuf {
        self.elf(&self.sysroot, &format!("usr/lib/{name}"), needed)
    }

    pub fn symlink(&self, dir: &Path, rel: &str, target: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(target, &path).unwrap();
        path
    }

    pub fn settings(&self, spec: &Path) -> Settings {
        SettingsBuilder::new()
            .spec_path(spec)
            .build_root(&self.build)
            .sysroot(&self.sysroot)
            .base_index(&self.base_index)
            .package_manager(self.tools.join("apt-get"))
            .ldconfig(self.tools.join("ldconfig"))
            .build()
            .unwrap()
    }

    /// Runs the whole pipeline for `spec`.
    pub async fn bundle(&self, spec: &Path) -> Result<BundledArtifact> {
        Bundler::new(self.settings(spec)).await?.bundle().await
    }

    /// Lines recorded by the fake package manager and ldconfig.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.calls)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Every `.bundle` file in the build root.
    pub fn archives(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(&self.build)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "bundle"))
            .collect();
        found.sort();
        found
    }
}

pub fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Entry names of a zip archive.
pub fn entries(archive: &Path) -> BTreeSet<String> {
    let file = std::fs::File::open(archive).unwrap();
    let zip = zip::ZipArchive::new(file).unwrap();
    zip.file_names().map(str::to_string).collect()
}

/// Contents of one archive entry.
pub fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
    use std::io::Read;
    let file = std::fs::File::open(archive).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
}

/// Entries below `lib/`.
pub fn libs(archive: &Path) -> BTreeSet<String> {
    entries(archive)
        .into_iter()
        .filter(|name| name.starts_with("lib/") && name.len() > "lib/".len())
        .collect()
}
