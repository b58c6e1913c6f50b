//! Main bundle pipeline.
//!
//! This module provides the [`Bundler`] that drives one spec from build to
//! archive.

use crate::{
    bundler::{
        BundledArtifact, Error, Result, Settings,
        assemble::assemble,
        build::{BuildContext, resolve_version, run_build},
        elf::{BaseLibraryIndex, ClosureRoot, DependencyClosure, DependencyResolver, LibrarySearch, RootKind},
        error::ErrorExt,
        utils::fs::PathContext,
    },
    spec::{BuildSpec, BundleSpec, PathEntry},
};

use super::checksum::calculate_sha256;

/// Bundle pipeline for a single spec.
///
/// Runs the phases strictly in order: build, version lookup, dependency
/// resolution, assembly. The first failure aborts the run and nothing is
/// written to the output location.
///
/// # Examples
///
/// ```no_run
/// use bundle_gen::bundler::{Bundler, SettingsBuilder};
///
/// # async fn example() -> bundle_gen::bundler::Result<()> {
/// let settings = SettingsBuilder::new()
///     .spec_path("specs/pong.yaml")
///     .build_root("/build")
///     .build()?;
///
/// let bundler = Bundler::new(settings).await?;
/// let artifact = bundler.bundle().await?;
/// println!("Created: {} ({} bytes)", artifact.path.display(), artifact.size);
/// println!("SHA256: {}", artifact.checksum);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Bundler {
    settings: Settings,
    spec: BundleSpec,
}

impl Bundler {
    /// Loads and validates the spec named by `settings`.
    ///
    /// Spec errors surface here, before anything is executed.
    pub async fn new(settings: Settings) -> Result<Self> {
        let path = settings.spec_path().to_path_buf();
        let spec = tokio::task::spawn_blocking(move || BundleSpec::load_checked(&path))
            .await
            .map_err(|e| Error::GenericError(format!("Spec loading task panicked: {}", e)))??;
        log::info!(
            "Loaded spec for {} ({})",
            spec.name,
            settings.spec_path().display()
        );
        Ok(Self { settings, spec })
    }

    /// Runs the whole pipeline and reports the produced archive.
    pub async fn bundle(&self) -> Result<BundledArtifact> {
        let ctx = BuildContext::new(&self.settings).await?;
        run_build(&ctx, &self.spec.build).await?;

        let version = resolve_version(ctx.search(), &self.spec.build.version_file).await?;
        let closure = self.resolve_dependencies(ctx.search()).await?;
        let path = assemble(&self.settings, &self.spec, &version, &closure).await?;

        let size = tokio::fs::metadata(&path)
            .await
            .fs_context("reading artifact metadata", &path)?
            .len();
        let checksum = calculate_sha256(&path).await?;

        Ok(BundledArtifact {
            path,
            version,
            size,
            checksum,
        })
    }

    /// Computes the libraries the bundle must carry.
    ///
    /// Loads the base-system index and the build container's linker cache,
    /// then walks every executable, extra ELF file and declared library.
    pub async fn resolve_dependencies(&self, search: &PathContext) -> Result<DependencyClosure> {
        let roots = closure_roots(&self.spec.build, search)?;
        let settings = self.settings.clone();

        tokio::task::spawn_blocking(move || {
            let index = BaseLibraryIndex::load(settings.base_index())?;
            let search = LibrarySearch::from_settings(&settings)?;
            DependencyResolver::new(&index, search).resolve(&roots)
        })
        .await
        .map_err(|e| Error::GenericError(format!("Resolver task panicked: {}", e)))?
    }

    /// Returns the parsed spec.
    pub fn spec(&self) -> &BundleSpec {
        &self.spec
    }

    /// Returns a reference to the bundler settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Locates every ELF object the spec names.
fn closure_roots(build: &BuildSpec, search: &PathContext) -> Result<Vec<ClosureRoot>> {
    let locate = |entry: &PathEntry, missing: fn(std::path::PathBuf) -> Error| {
        search
            .locate(entry.path())
            .ok_or_else(|| missing(entry.path().to_path_buf()))
    };

    let mut roots = Vec::new();
    for entry in &build.executables {
        roots.push(ClosureRoot::new(
            locate(entry, Error::ExecutableNotFound)?,
            RootKind::Executable,
        ));
    }
    for entry in &build.extra_elf_files {
        roots.push(ClosureRoot::new(
            locate(entry, Error::FileNotFound)?,
            RootKind::ExtraElf,
        ));
    }
    for entry in &build.libraries {
        roots.push(ClosureRoot::new(
            locate(entry, Error::FileNotFound)?,
            RootKind::Library,
        ));
    }
    Ok(roots)
}
