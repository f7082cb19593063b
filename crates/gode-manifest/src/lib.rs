//! Manifest parsing, dependency-spec grammar, and specifier resolution
//! for the gode-core embedding layer.

mod dependency;
mod error;
mod loader;
mod manifest;
mod resolved;
mod resolver;

pub use dependency::DependencySpec;
pub use error::{ManifestError, Result};
pub use loader::{ModuleCache, ModuleEntry, ModuleLoader, NATIVE_EXPORTS_GLOBAL};
pub use manifest::{BuildHints, GodeSection, Manifest, Permissions, MANIFEST_FILE_NAME};
pub use resolved::{ExtensionClass, ResolvedSpecifier};
pub use resolver::{Resolver, BUILTIN_PREFIX};
