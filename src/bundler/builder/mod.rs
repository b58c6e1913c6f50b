//! Bundle pipeline coordination.
//!
//! This module provides the [`Bundler`] that sequences the build, version,
//! resolution and assembly phases for one spec.
//!
//! # Overview
//!
//! The bundler:
//! 1. Loads and validates the spec named in [`Settings`](crate::bundler::Settings)
//! 2. Runs packages, modules and the build command in the build root
//! 3. Reads the bundle version
//! 4. Resolves the shared-library closure of the built ELF files
//! 5. Assembles the archive and returns a [`BundledArtifact`](crate::bundler::BundledArtifact)
//!
//! # Module Organization
//!
//! - [`checksum`] - SHA-256 of artifacts and library contents
//! - [`orchestrator`] - Main [`Bundler`] struct
//! - [`tool_detection`] - Location of external programs

pub mod checksum;
mod orchestrator;
pub mod tool_detection;

pub use orchestrator::Bundler;
