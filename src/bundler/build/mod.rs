//! Build orchestration.
//!
//! Turns the `Build` section of a spec into an ordered list of
//! [`BuildStep`]s and runs them one at a time inside the build root. Every
//! step runs to completion before the next starts; the first failure aborts
//! the run. Steps share state only through the filesystem.

mod runner;
pub mod version;

pub use runner::BuildLog;
pub use version::resolve_version;

use crate::bundler::{
    Error, Result, Settings,
    utils::fs::{PathContext, is_executable},
};
use crate::spec::BuildSpec;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tokio::process::Command;

/// Environment shared by every step of a run.
#[derive(Debug)]
pub struct BuildContext {
    /// Working directory of every spawned program.
    pub working_dir: PathBuf,
    /// Extra environment variables for every spawned program.
    pub env: BTreeMap<String, String>,
    search: PathContext,
    package_manager: PathBuf,
    ldconfig: PathBuf,
    log: BuildLog,
}

impl BuildContext {
    /// Creates the context for a run and truncates its build log.
    pub async fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            working_dir: settings.build_root().to_path_buf(),
            env: BTreeMap::new(),
            search: PathContext::new(settings.search_roots()),
            package_manager: settings.package_manager().to_path_buf(),
            ldconfig: settings.ldconfig().to_path_buf(),
            log: BuildLog::create(&settings.build_log()).await?,
        })
    }

    /// Where spec-relative paths are looked up.
    pub fn search(&self) -> &PathContext {
        &self.search
    }

    pub fn log(&self) -> &BuildLog {
        &self.log
    }

    /// Locates a program the spec names and checks it can be run.
    fn executable(&self, declared: &str, not_executable: fn(PathBuf) -> Error) -> Result<PathBuf> {
        let path = self.search.find_path(declared)?;
        if !is_executable(&path)? {
            return Err(not_executable(path));
        }
        Ok(path)
    }
}

/// One unit of work in the build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildStep {
    /// Install distribution packages in a single package-manager call.
    InstallPackages(Vec<String>),
    /// Run a module script.
    RunModule(String),
    /// Refresh the linker cache so module-installed libraries resolve.
    RefreshLinkerCache,
    /// Run the main build script.
    RunBuildCommand(String),
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::InstallPackages(names) => write!(f, "install {}", names.join(" ")),
            BuildStep::RunModule(module) => write!(f, "module {module}"),
            BuildStep::RefreshLinkerCache => f.write_str("ldconfig"),
            BuildStep::RunBuildCommand(command) => write!(f, "build command {command}"),
        }
    }
}

impl BuildStep {
    /// Runs the step to completion.
    pub async fn run(&self, ctx: &BuildContext) -> Result<()> {
        match self {
            BuildStep::InstallPackages(names) => {
                let mut command = Command::new(&ctx.package_manager);
                command
                    .arg("install")
                    .arg("-y")
                    .args(names)
                    .env("DEBIAN_FRONTEND", "noninteractive");
                let status = runner::run(command, ctx).await?;
                if !status.success() {
                    return Err(Error::PackageInstallFailed {
                        names: names.clone(),
                        code: status.code(),
                    });
                }
            }
            BuildStep::RunModule(module) => {
                let path = ctx.executable(module, Error::ModuleNotExecutable)?;
                log::trace!("Discovered module file at {}", path.display());
                let status = runner::run(Command::new(&path), ctx).await?;
                if !status.success() {
                    return Err(Error::ModuleFailed {
                        path,
                        code: status.code(),
                    });
                }
            }
            BuildStep::RefreshLinkerCache => {
                let status = runner::run(Command::new(&ctx.ldconfig), ctx).await?;
                if !status.success() {
                    return Err(Error::LdconfigFailed(status.code()));
                }
            }
            BuildStep::RunBuildCommand(command) => {
                let path = ctx.executable(command, Error::BuildCommandNotExecutable)?;
                let status = runner::run(Command::new(&path), ctx).await?;
                if !status.success() {
                    return Err(Error::BuildCommandFailed(status.code()));
                }
            }
        }
        Ok(())
    }
}

/// Lists the steps for a build section, in execution order.
pub fn plan(build: &BuildSpec) -> Vec<BuildStep> {
    let mut steps = Vec::new();

    if !build.required_packages.is_empty() {
        steps.push(BuildStep::InstallPackages(build.required_packages.clone()));
    }
    if !build.required_modules.is_empty() {
        steps.extend(build.required_modules.iter().cloned().map(BuildStep::RunModule));
        steps.push(BuildStep::RefreshLinkerCache);
    }
    if let Some(command) = &build.build_command {
        steps.push(BuildStep::RunBuildCommand(command.clone()));
    }

    steps
}

/// Runs every step of `build` in order.
pub async fn run_build(ctx: &BuildContext, build: &BuildSpec) -> Result<()> {
    let steps = plan(build);
    if steps.is_empty() {
        log::info!("Nothing to build");
        return Ok(());
    }

    for (i, step) in steps.iter().enumerate() {
        log::info!("[{}/{}] {}", i + 1, steps.len(), step);
        step.run(ctx).await?;
    }

    log::info!("Build finished; log at {}", ctx.log.path().display());
    Ok(())
}
