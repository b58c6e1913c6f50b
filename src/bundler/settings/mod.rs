//! Configuration for a bundle generation run.
//!
//! Settings carry every location the pipeline touches (spec, source root,
//! build root, system root, base index) plus the external programs it invokes.

mod builder;
mod core;

pub use builder::{ENV_BASE_INDEX, ENV_BUILD_ROOT, ENV_SYSROOT, SettingsBuilder};
pub use core::{BUNDLE_EXTENSION, DEFAULT_BASE_INDEX, DEFAULT_LIBRARY_DIRS, Settings};
