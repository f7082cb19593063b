//! `ResolvedSpecifier`: the tagged outcome of resolution.

use std::path::PathBuf;

/// How a `File` specifier's extension should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionClass {
    Script,
    Data,
    TypedScript,
    Other,
}

impl ExtensionClass {
    pub fn of_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs" | "cjs") => ExtensionClass::Script,
            Some("json") => ExtensionClass::Data,
            Some("ts" | "mts" | "cts") => ExtensionClass::TypedScript,
            _ => ExtensionClass::Other,
        }
    }
}

/// Produced by the resolver, consumed by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSpecifier {
    Builtin(String),
    File(PathBuf, ExtensionClass),
    Remote(String),
    NativePlugin(PathBuf, String),
}
