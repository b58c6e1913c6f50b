//! Command line interface for bundle-gen.

mod args;

pub use args::Args;

use crate::bundler::Bundler;
use crate::error::{CliError, Result};

/// Main CLI entry point
///
/// Prints the produced archive path on stdout; everything else goes to the
/// log on stderr.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let settings = args.settings()?;
    let bundler = Bundler::new(settings).await?;
    let artifact = bundler.bundle().await?;

    log::info!(
        "Created {} ({} bytes, version {})",
        artifact.path.display(),
        artifact.size,
        artifact.version
    );
    log::info!("SHA256: {}", artifact.checksum);
    println!("{}", artifact.path.display());
    Ok(0)
}
