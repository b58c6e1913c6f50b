//! External tool detection.
//!
//! Locates the programs the orchestrator shells out to. Results are cached so
//! `PATH` is searched at most once per run.

use std::path::PathBuf;
use std::sync::LazyLock;

/// Package manager used for `RequiredPackages`.
pub static APT_GET: LazyLock<PathBuf> = LazyLock::new(|| locate("apt-get"));

/// Linker cache refresher run after `RequiredModules`.
pub static LDCONFIG: LazyLock<PathBuf> = LazyLock::new(|| locate("ldconfig"));

/// Resolves a program on `PATH`, falling back to the bare name so the
/// spawn error names the missing tool.
fn locate(program: &str) -> PathBuf {
    match which::which(program) {
        Ok(path) => {
            log::debug!("Found {} at: {}", program, path.display());
            path
        }
        Err(e) => {
            log::debug!("{} not found in PATH: {}", program, e);
            PathBuf::from(program)
        }
    }
}
