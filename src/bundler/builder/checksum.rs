//! SHA-256 checksums.
//!
//! Used both for the produced archive's checksum and for the content
//! fingerprints that decide whether two sources for one bundle path are the
//! same file.

use crate::bundler::{Result, error::ErrorExt};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Calculates the hex-encoded SHA-256 of a file, reading in 8KB chunks.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).fs_context("opening file for hashing", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Async wrapper around [`file_sha256`] for the artifact report.
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_sha256(&path))
        .await
        .map_err(|e| {
            crate::bundler::Error::GenericError(format!("Checksum task panicked: {}", e))
        })?
}
