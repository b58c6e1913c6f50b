//! Subprocess execution with output capture.

use super::BuildContext;
use crate::bundler::{Error, Result, error::ErrorExt};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Build log collecting the output of every step of a run.
#[derive(Clone, Debug)]
pub struct BuildLog {
    path: PathBuf,
}

impl BuildLog {
    /// Creates (or truncates) the log file.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating build log directory", parent)?;
        }
        tokio::fs::File::create(path)
            .await
            .fs_context("creating build log", path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one program's captured output.
    async fn record(&self, program: &str, output: &Output) -> Result<()> {
        let entry = format!(
            "==> {program}\nSTDOUT:\n{}\n\nSTDERR:\n{}\n\n",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .fs_context("opening build log", &self.path)?;
        file.write_all(entry.as_bytes())
            .await
            .fs_context("writing build log", &self.path)?;
        file.flush()
            .await
            .fs_context("writing build log", &self.path)?;
        Ok(())
    }
}

/// Runs `command` to completion inside the build context.
///
/// Output is captured into the build log; on failure stderr is echoed so the
/// cause is visible without opening the log. The caller maps the exit status
/// to the step's error.
pub(super) async fn run(mut command: Command, ctx: &BuildContext) -> Result<ExitStatus> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .current_dir(&ctx.working_dir)
        .envs(&ctx.env)
        .stdin(Stdio::null());

    log::debug!("Running {} in {}", program, ctx.working_dir.display());
    let output = command.output().await.map_err(|error| Error::CommandFailed {
        command: program.clone(),
        error,
    })?;

    ctx.log.record(&program, &output).await?;

    if !output.status.success() {
        log::warn!("{} exited with {}", program, output.status);
        eprint!("{}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(output.status)
}
