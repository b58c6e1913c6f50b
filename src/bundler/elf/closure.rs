//! Shared-library dependency closure.
//!
//! Walks `DT_NEEDED` breadth-first from every declared ELF object, resolving
//! each name the way the dynamic loader would inside the build container, and
//! collects the libraries the target device does not already provide.
//!
//! The graph is keyed by real (symlink-free) path: two names that resolve to
//! the same file are one node, and every node is parsed at most once.

use super::{BaseLibraryIndex, DynamicInfo, ElfReader, GoblinReader, ldcache::LinkerCache};
use crate::bundler::{Error, Result, Settings, builder::checksum::file_sha256, utils::fs::real_path};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

/// Why an object takes part in the closure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootKind {
    /// Copied to `bin/`.
    Executable,
    /// Only scanned for dependencies, never copied (dlopen'd plugins etc).
    ExtraElf,
    /// Declared library, copied to `lib/` under its own file name.
    Library,
}

/// An ELF object named by the spec, already located on disk.
#[derive(Clone, Debug)]
pub struct ClosureRoot {
    pub path: PathBuf,
    pub kind: RootKind,
}

impl ClosureRoot {
    pub fn new(path: impl Into<PathBuf>, kind: RootKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Name under `lib/` for [`RootKind::Library`] roots.
    fn library_name(&self) -> Option<String> {
        match self.kind {
            RootKind::Library => self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            _ => None,
        }
    }
}

/// A library file as it exists in the build container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryIdentity {
    /// Fully dereferenced path; the deduplication key.
    pub real_path: PathBuf,
    /// Hex SHA-256 of the file contents.
    pub fingerprint: String,
}

/// A discovered library and the name it is bundled under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLibrary {
    /// `DT_NEEDED` name that first led to this file; bundled as `lib/<name>`.
    pub name: String,
    pub identity: LibraryIdentity,
}

/// Result of resolving every root.
#[derive(Clone, Debug, Default)]
pub struct DependencyClosure {
    /// Real paths of the libraries each root needs, keyed by the root's path.
    /// Declared libraries are included here when a root depends on them.
    pub per_entry: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// Libraries to add to `lib/`, keyed by bundle name. Declared libraries
    /// only appear here under an alias some object needs them by.
    pub libraries: BTreeMap<String, ResolvedLibrary>,
}

impl DependencyClosure {
    /// Libraries needed by `root`.
    pub fn needed_by(&self, root: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.per_entry.get(root)
    }
}

/// Where the resolver looks for a `DT_NEEDED` name.
///
/// Every absolute location is interpreted below `sysroot`, so resolving
/// against an unpacked image behaves like resolving inside it.
#[derive(Debug)]
pub struct LibrarySearch {
    sysroot: PathBuf,
    ld_cache: Option<LinkerCache>,
    default_dirs: Vec<PathBuf>,
}

impl LibrarySearch {
    /// `default_dirs` must already be rooted at `sysroot`.
    pub fn new(sysroot: impl Into<PathBuf>, default_dirs: Vec<PathBuf>) -> Self {
        Self {
            sysroot: sysroot.into(),
            ld_cache: None,
            default_dirs,
        }
    }

    /// Search configuration for a run, including the container's linker cache.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.sysroot(), settings.library_dirs())
            .with_ld_cache_file(&settings.build_ld_cache())
    }

    /// Uses the `ld.so.cache` at `path`. A missing file is not an error;
    /// minimal images often have none.
    pub fn with_ld_cache_file(mut self, path: &Path) -> Result<Self> {
        self.ld_cache = LinkerCache::load(path)?;
        match self.ld_cache {
            Some(_) => log::debug!("Using linker cache {}", path.display()),
            None => log::debug!("No linker cache at {}", path.display()),
        }
        Ok(self)
    }

    pub fn sysroot(&self) -> &Path {
        &self.sysroot
    }

    /// Maps an absolute in-container path onto the host.
    fn reroot(&self, path: &Path) -> PathBuf {
        let relative: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.sysroot.join(relative)
    }

    /// Maps a host path back to the path the device would see.
    fn device_path(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.sysroot)
            .ok()
            .map(|rest| Path::new("/").join(rest))
    }

    /// Expands one `DT_RUNPATH`/`DT_RPATH` entry.
    ///
    /// `$ORIGIN` yields a host path already; other absolute entries are
    /// rerooted. Entries with unsupported tokens or relative paths are
    /// skipped, as the loader would resolve them against its own cwd.
    fn expand_hint(&self, hint: &str, origin: &Path) -> Option<PathBuf> {
        let origin_str = origin.to_str()?;
        let uses_origin = hint.contains("$ORIGIN") || hint.contains("${ORIGIN}");
        let expanded = hint
            .replace("${ORIGIN}", origin_str)
            .replace("$ORIGIN", origin_str);
        if expanded.contains('$') {
            log::debug!("Skipping search path with unsupported token: {}", hint);
            return None;
        }

        let path = PathBuf::from(expanded);
        if !path.is_absolute() {
            return None;
        }
        Some(if uses_origin { path } else { self.reroot(&path) })
    }

    /// Locates `name` for an object living in `origin` with the given hints.
    fn locate(&self, name: &str, hints: &[String], origin: &Path) -> Option<PathBuf> {
        if name.contains('/') {
            let path = Path::new(name);
            let candidate = if path.is_absolute() {
                self.reroot(path)
            } else {
                origin.join(path)
            };
            return candidate.is_file().then_some(candidate);
        }

        let from_hints = hints
            .iter()
            .filter_map(|hint| self.expand_hint(hint, origin))
            .map(|dir| dir.join(name));
        let from_cache = self
            .ld_cache
            .as_ref()
            .and_then(|cache| cache.path_of(name))
            .map(|path| self.reroot(&path));
        let from_defaults = self.default_dirs.iter().map(|dir| dir.join(name));

        from_hints
            .chain(from_cache)
            .chain(from_defaults)
            .find(|candidate| candidate.is_file())
            .inspect(|found| log::trace!("Located {} at {}", name, found.display()))
    }
}

/// Computes dependency closures against a base-system index.
pub struct DependencyResolver<'a, R = GoblinReader> {
    index: &'a BaseLibraryIndex,
    search: LibrarySearch,
    reader: R,
}

impl<'a> DependencyResolver<'a, GoblinReader> {
    pub fn new(index: &'a BaseLibraryIndex, search: LibrarySearch) -> Self {
        Self::with_reader(index, search, GoblinReader)
    }
}

/// Traversal state shared by every root of one resolution.
#[derive(Default)]
struct Walk {
    /// Direct, unfiltered dependencies of every parsed node.
    edges: HashMap<PathBuf, Vec<PathBuf>>,
    /// Declared libraries by every name they answer to.
    provided: HashMap<String, PathBuf>,
    /// Declared library real file -> its own file name.
    declared: HashMap<PathBuf, String>,
    /// Names that reached a declared library through one of its aliases.
    aliases: BTreeMap<String, PathBuf>,
    /// Parsed dynamic sections, so each file is read once.
    parsed: HashMap<PathBuf, Option<DynamicInfo>>,
    /// Bundle name -> real file, for collision detection.
    by_name: HashMap<String, PathBuf>,
    /// Real file -> first bundle name it was reached through.
    names: HashMap<PathBuf, String>,
}

impl Walk {
    /// Records `name` when it is an alias under which a declared library was
    /// reached; the library is then also bundled as `lib/<name>`.
    fn note_alias(&mut self, name: &str, real: &Path) {
        let via_alias = self.provided.get(name).is_some_and(|p| p == real);
        let own_name = self.declared.get(real).is_some_and(|n| n == name);
        if via_alias && !own_name {
            self.aliases
                .entry(name.to_string())
                .or_insert_with(|| real.to_path_buf());
        }
    }
}

impl<'a, R: ElfReader> DependencyResolver<'a, R> {
    pub fn with_reader(index: &'a BaseLibraryIndex, search: LibrarySearch, reader: R) -> Self {
        Self {
            index,
            search,
            reader,
        }
    }

    /// Resolves the closure of every root.
    pub fn resolve(&self, roots: &[ClosureRoot]) -> Result<DependencyClosure> {
        let mut walk = Walk::default();

        for root in roots {
            let Some(name) = root.library_name() else {
                continue;
            };
            let real = self.root_real_path(root)?;
            if let Some(existing) = walk.by_name.get(&name)
                && existing != &real
            {
                return Err(Error::LibraryNameCollision(name));
            }
            walk.provided.insert(name.clone(), real.clone());
            walk.by_name.insert(name.clone(), real.clone());
            walk.declared.insert(real, name);
        }
        // Own file names take precedence over aliases.
        for root in roots.iter().filter(|root| root.kind == RootKind::Library) {
            let real = self.root_real_path(root)?;
            for alias in self.library_aliases(root, &real, &mut walk)? {
                log::debug!("{} also answers to {}", root.path.display(), alias);
                walk.provided.entry(alias.clone()).or_insert_with(|| real.clone());
                walk.by_name.entry(alias).or_insert_with(|| real.clone());
            }
        }

        let mut closure = DependencyClosure::default();
        for root in roots {
            let real = self.root_real_path(root)?;
            log::debug!("Resolving dependencies of {}", root.path.display());
            let needed = self.walk_from(&real, &mut walk)?;
            closure.per_entry.insert(root.path.clone(), needed);
        }

        let union: BTreeSet<&PathBuf> = closure.per_entry.values().flatten().collect();
        for real in union {
            if walk.declared.contains_key(real) {
                continue;
            }
            let name = walk
                .names
                .get(real)
                .cloned()
                .ok_or_else(|| Error::GenericError(format!("{} has no name", real.display())))?;
            let identity = LibraryIdentity {
                fingerprint: file_sha256(real)?,
                real_path: real.clone(),
            };
            closure
                .libraries
                .insert(name.clone(), ResolvedLibrary { name, identity });
        }
        for (name, real) in &walk.aliases {
            let identity = LibraryIdentity {
                fingerprint: file_sha256(real)?,
                real_path: real.clone(),
            };
            closure.libraries.insert(
                name.clone(),
                ResolvedLibrary {
                    name: name.clone(),
                    identity,
                },
            );
        }

        log::info!(
            "Resolved {} librar{} to bundle from {} root(s)",
            closure.libraries.len(),
            if closure.libraries.len() == 1 { "y" } else { "ies" },
            roots.len()
        );
        Ok(closure)
    }

    fn root_real_path(&self, root: &ClosureRoot) -> Result<PathBuf> {
        if !root.path.exists() {
            return Err(match root.kind {
                RootKind::Executable => Error::ExecutableNotFound(root.path.clone()),
                _ => Error::FileNotFound(root.path.clone()),
            });
        }
        real_path(&root.path)
    }

    /// Other names a declared library answers to: sibling links whose name
    /// is a dotted prefix of its file name (`libbar.so.1` for
    /// `libbar.so.1.0`) and resolve to the same file, plus its `DT_SONAME`.
    fn library_aliases(
        &self,
        root: &ClosureRoot,
        real: &Path,
        walk: &mut Walk,
    ) -> Result<BTreeSet<String>> {
        let mut aliases = BTreeSet::new();
        if let (Some(dir), Some(file)) = (root.path.parent(), root.path.file_name()) {
            let file = file.to_string_lossy();
            let chunks: Vec<&str> = file.split('.').collect();
            for end in 1..chunks.len() {
                let alias = chunks[..end].join(".");
                if real_path(&dir.join(&alias)).is_ok_and(|target| target == real) {
                    aliases.insert(alias);
                }
            }
        }
        if let Some(soname) = self.dynamic_info(real, walk)?.and_then(|info| info.soname) {
            aliases.insert(soname);
        }
        if let Some(own) = root.library_name() {
            aliases.remove(&own);
        }
        Ok(aliases)
    }

    fn dynamic_info(&self, node: &Path, walk: &mut Walk) -> Result<Option<DynamicInfo>> {
        if let Some(info) = walk.parsed.get(node) {
            return Ok(info.clone());
        }
        let info = self.reader.read_dynamic(node)?;
        walk.parsed.insert(node.to_path_buf(), info.clone());
        Ok(info)
    }

    /// Breadth-first walk returning every library reachable from `start`.
    fn walk_from(&self, start: &Path, walk: &mut Walk) -> Result<BTreeSet<PathBuf>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start.to_path_buf()]);
        let mut reached = BTreeSet::new();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node.clone()) {
                continue;
            }
            for dep in self.direct_deps(&node, walk)? {
                if dep != start {
                    reached.insert(dep.clone());
                }
                queue.push_back(dep);
            }
        }
        Ok(reached)
    }

    fn direct_deps(&self, node: &Path, walk: &mut Walk) -> Result<Vec<PathBuf>> {
        if let Some(deps) = walk.edges.get(node) {
            return Ok(deps.clone());
        }

        let deps = match self.dynamic_info(node, walk)? {
            Some(info) => self.resolve_needed(node, &info, walk)?,
            None => {
                log::debug!(
                    "{} is not an ELF object, no dependencies",
                    node.display()
                );
                Vec::new()
            }
        };
        walk.edges.insert(node.to_path_buf(), deps.clone());
        Ok(deps)
    }

    fn resolve_needed(&self, node: &Path, info: &DynamicInfo, walk: &mut Walk) -> Result<Vec<PathBuf>> {
        let origin = node.parent().unwrap_or(self.search.sysroot());
        let mut deps = Vec::with_capacity(info.needed.len());

        for needed in &info.needed {
            if self.index.contains_name(needed) {
                log::trace!("{} is provided by the base system", needed);
                continue;
            }

            let located = self.search.locate(needed, info.search_hints(), origin);
            let provided = walk.provided.get(needed).cloned();
            let candidate = match (located, provided) {
                (Some(candidate), _) => candidate,
                // Only the declared copy exists.
                (None, Some(declared)) => {
                    walk.note_alias(&bundle_name(needed), &declared);
                    deps.push(declared);
                    continue;
                }
                (None, None) => {
                    return Err(Error::UnresolvedLibrary {
                        name: needed.clone(),
                        requested_by: node.to_path_buf(),
                    });
                }
            };
            let real = real_path(&candidate)?;

            if self.in_base_system(&candidate) || self.in_base_system(&real) {
                log::trace!("{} is provided by the base system", candidate.display());
                continue;
            }

            let name = bundle_name(needed);
            let real = match walk.by_name.get(&name) {
                Some(existing) if existing == &real => real,
                Some(existing) if file_sha256(existing)? == file_sha256(&real)? => {
                    log::debug!(
                        "{} and {} are identical, bundling one copy",
                        existing.display(),
                        real.display()
                    );
                    existing.clone()
                }
                Some(_) => return Err(Error::LibraryNameCollision(name)),
                None => {
                    walk.by_name.insert(name.clone(), real.clone());
                    real
                }
            };
            walk.note_alias(&name, &real);
            walk.names.entry(real.clone()).or_insert(name);
            deps.push(real);
        }

        Ok(deps)
    }

    fn in_base_system(&self, path: &Path) -> bool {
        self.search
            .device_path(path)
            .is_some_and(|device| self.index.contains_path(&device))
    }
}

/// File name a needed entry is bundled under.
fn bundle_name(needed: &str) -> String {
    Path::new(needed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| needed.to_string())
}
