//! Top-level error types for the command line tools.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Main error type for the binaries
#[derive(Error, Debug)]
pub enum BundlerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pipeline errors, prefixed with the failing stage
    #[error("{} stage failed: {}", .0.stage(), .0)]
    Bundler(#[from] crate::bundler::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl BundlerError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::bundler::Error;

        match self {
            BundlerError::Bundler(Error::UnresolvedLibrary { .. }) => vec![
                "Install the package providing the library in RequiredPackages".to_string(),
                "Or list the library under Libraries".to_string(),
            ],
            BundlerError::Bundler(Error::BaseIndexUnavailable { .. }) => vec![
                "Pass --base-index or set BUNDLE_GEN_BASE_INDEX".to_string(),
            ],
            BundlerError::Bundler(Error::ModuleNotExecutable(_))
            | BundlerError::Bundler(Error::BuildCommandNotExecutable(_)) => {
                vec!["Set the execute bit on the script (chmod +x)".to_string()]
            }
            BundlerError::Bundler(e) if e.stage() == "build" => {
                vec!["See the build log in the build root for the step's output".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
