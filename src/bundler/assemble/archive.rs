//! Archive writer.
//!
//! Packs a staging tree into a zip. Entries are sorted, timestamps fixed and
//! permissions normalized so the same tree always yields the same bytes. The
//! archive is written next to its destination and renamed into place, so the
//! output path only ever holds a complete bundle.

use crate::bundler::{Error, Result, error::ErrorExt};
use std::fs::File;
use std::io;
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Packs `stage` into `output` on the blocking pool. Returns the archive size.
pub async fn create_archive(stage: &Path, output: &Path) -> Result<u64> {
    let stage = stage.to_path_buf();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || write_archive(&stage, &output))
        .await
        .map_err(|e| Error::GenericError(format!("Archive task panicked: {}", e)))?
}

/// Packs `stage` into `output`.
pub fn write_archive(stage: &Path, output: &Path) -> Result<u64> {
    let dir = output
        .parent()
        .ok_or_else(|| Error::GenericError(format!("{} has no parent", output.display())))?;
    let temp = tempfile::Builder::new()
        .prefix(".bundle-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .fs_context("creating temporary archive in", dir)?;

    let mut zip = ZipWriter::new(temp);
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut count = 0usize;
    for entry in WalkDir::new(stage).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let name = archive_name(entry.path().strip_prefix(stage)?);

        if entry.file_type().is_dir() {
            zip.add_directory(name, base.unix_permissions(0o755))?;
            continue;
        }

        let metadata = entry.metadata()?;
        let options = base
            .unix_permissions(normalized_mode(&metadata))
            .large_file(metadata.len() >= u64::from(u32::MAX));
        zip.start_file(name, options)?;

        let mut file = File::open(entry.path()).fs_context("opening staged file", entry.path())?;
        io::copy(&mut file, &mut zip).fs_context("archiving", entry.path())?;
        count += 1;
    }

    let temp = zip.finish()?;
    temp.as_file()
        .sync_all()
        .fs_context("syncing archive", temp.path())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o644))
            .fs_context("setting permissions on", temp.path())?;
    }

    temp.persist(output).map_err(|e| Error::Fs {
        context: "moving archive into place at",
        path: output.to_path_buf(),
        error: e.error,
    })?;

    let size = std::fs::metadata(output)
        .fs_context("reading archive metadata", output)?
        .len();
    log::info!(
        "Wrote {} ({} files, {} bytes)",
        output.display(),
        count,
        size
    );
    Ok(size)
}

/// `/`-separated name of a staged path.
fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// 0755 for anything executable, 0644 otherwise, independent of umask.
#[cfg(unix)]
fn normalized_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn normalized_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}
