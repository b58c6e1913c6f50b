//! ELF inspection and shared-library resolution.

mod base_index;
pub mod closure;
mod dynamic;
mod ldcache;

pub use base_index::BaseLibraryIndex;
pub use closure::{
    ClosureRoot, DependencyClosure, DependencyResolver, LibraryIdentity, LibrarySearch,
    ResolvedLibrary, RootKind,
};
pub use dynamic::{DynamicInfo, ElfReader, GoblinReader, parse_dynamic};
pub use ldcache::LinkerCache;
