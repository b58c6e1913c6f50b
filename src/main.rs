//! bundle-gen - builds a bundle archive from a bundle spec.
//!
//! Prints the archive path on success. Diagnostics go to stderr and are
//! controlled with `RUST_LOG`.

use bundle_gen::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            for hint in e.recovery_suggestions() {
                eprintln!("  hint: {}", hint);
            }
            1
        }
    };

    process::exit(exit_code);
}
