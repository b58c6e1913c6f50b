//! Bundle generator library
//!
//! Turns a declarative YAML bundle spec into a self-contained, versioned
//! `.bundle` archive:
//! - runs the declared packages, modules and build command
//! - discovers the shared libraries the built ELF files need that the target
//!   base system does not provide
//! - packs executables, libraries, resources and metadata reproducibly
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;
pub mod spec;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
