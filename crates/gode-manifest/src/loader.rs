//! Module loading: turns a [`ResolvedSpecifier`] into source text, and
//! caches the result process-wide keyed by the *input* specifier
//! (spec.md §4.3) — not the resolved path, so that two different
//! aliases resolving to the same file still get independent cache
//! slots, matching the one-entry-per-specifier invariant.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::{ManifestError, Result};
use crate::resolved::{ExtensionClass, ResolvedSpecifier};

/// The name of the global object the plugin bridge installs native
/// exports under. `gode-plugin` populates
/// `globalThis.__gode_native__[canonical_name]` before a module that
/// forwards to it is ever evaluated.
pub const NATIVE_EXPORTS_GLOBAL: &str = "__gode_native__";

/// A loaded module: the specifier it was requested under, how it
/// resolved, and the source text to hand the engine.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub specifier: String,
    pub resolved: ResolvedSpecifier,
    pub source: String,
}

/// Process-global module cache. One entry per input specifier, never
/// evicted — re-importing the same specifier within a process lifetime
/// always returns the first-loaded entry, even if the underlying file
/// changed on disk.
#[derive(Default)]
pub struct ModuleCache {
    entries: RwLock<HashMap<String, Arc<ModuleEntry>>>,
}

impl ModuleCache {
    pub fn global() -> &'static ModuleCache {
        static CACHE: OnceLock<ModuleCache> = OnceLock::new();
        CACHE.get_or_init(ModuleCache::default)
    }

    pub fn get(&self, specifier: &str) -> Option<Arc<ModuleEntry>> {
        self.entries.read().unwrap().get(specifier).cloned()
    }

    /// Insert `entry` unless one already exists for its specifier.
    /// Returns the entry that ends up cached — the new one on a fresh
    /// insert, the pre-existing one if another thread won the race.
    fn insert_if_absent(&self, entry: ModuleEntry) -> Arc<ModuleEntry> {
        let mut entries = self.entries.write().unwrap();
        entries
            .entry(entry.specifier.clone())
            .or_insert_with(|| Arc::new(entry))
            .clone()
    }

    #[cfg(test)]
    fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

/// Reads module source text per spec.md §4.3's per-variant rules and
/// populates the process-global [`ModuleCache`].
pub struct ModuleLoader<'c> {
    cache: &'c ModuleCache,
}

impl<'c> Default for ModuleLoader<'c> {
    fn default() -> Self {
        ModuleLoader {
            cache: ModuleCache::global(),
        }
    }
}

impl<'c> ModuleLoader<'c> {
    pub fn new(cache: &'c ModuleCache) -> Self {
        ModuleLoader { cache }
    }

    /// Load (or fetch from cache) the module bound to `specifier`,
    /// which resolved to `resolved`.
    pub fn load(&self, specifier: &str, resolved: ResolvedSpecifier) -> Result<Arc<ModuleEntry>> {
        if let Some(cached) = self.cache.get(specifier) {
            return Ok(cached);
        }

        let source = self.read_source(specifier, &resolved)?;
        let entry = ModuleEntry {
            specifier: specifier.to_string(),
            resolved,
            source,
        };
        Ok(self.cache.insert_if_absent(entry))
    }

    fn read_source(&self, specifier: &str, resolved: &ResolvedSpecifier) -> Result<String> {
        match resolved {
            // Built-ins are registered directly into the engine by the
            // host before a script ever imports them; the module record
            // itself carries no source.
            ResolvedSpecifier::Builtin(_) => Ok(String::new()),

            ResolvedSpecifier::File(path, class) => self.read_file(specifier, path, *class),

            ResolvedSpecifier::Remote(url) => Err(ManifestError::Unresolvable(format!(
                "remote module '{}' cannot be loaded: remote fetching is not implemented",
                url
            ))),

            ResolvedSpecifier::NativePlugin(_, canonical_name) => Ok(format!(
                "module.exports = globalThis.{}[{:?}];",
                NATIVE_EXPORTS_GLOBAL, canonical_name
            )),
        }
    }

    fn read_file(&self, specifier: &str, path: &Path, class: ExtensionClass) -> Result<String> {
        let raw = fs::read_to_string(path).map_err(|e| {
            let _ = specifier;
            ManifestError::Io(path.display().to_string(), e)
        })?;

        match class {
            ExtensionClass::Data => Ok(format!("module.exports = {};", raw.trim_end())),
            ExtensionClass::Script | ExtensionClass::TypedScript | ExtensionClass::Other => Ok(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn builtin_has_empty_source() {
        let cache = ModuleCache::default();
        let loader = ModuleLoader::new(&cache);
        let entry = loader
            .load("gode:core", ResolvedSpecifier::Builtin("core".to_string()))
            .unwrap();
        assert_eq!(entry.source, "");
    }

    #[test]
    fn script_file_loads_raw_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "mod.js", "module.exports = 42;");
        let cache = ModuleCache::default();
        let loader = ModuleLoader::new(&cache);
        let entry = loader
            .load("./mod.js", ResolvedSpecifier::File(path, ExtensionClass::Script))
            .unwrap();
        assert_eq!(entry.source, "module.exports = 42;");
    }

    #[test]
    fn json_data_file_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "data.json", "{\"a\":1}\n");
        let cache = ModuleCache::default();
        let loader = ModuleLoader::new(&cache);
        let entry = loader
            .load("./data.json", ResolvedSpecifier::File(path, ExtensionClass::Data))
            .unwrap();
        assert_eq!(entry.source, "module.exports = {\"a\":1};");
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let cache = ModuleCache::default();
        let loader = ModuleLoader::new(&cache);
        let err = loader
            .load(
                "./missing.js",
                ResolvedSpecifier::File("/nonexistent/missing.js".into(), ExtensionClass::Script),
            )
            .unwrap_err();
        assert!(matches!(err, ManifestError::Io(..)));
    }

    #[test]
    fn remote_module_is_not_implemented() {
        let cache = ModuleCache::default();
        let loader = ModuleLoader::new(&cache);
        let err = loader
            .load(
                "https://example.com/m.js",
                ResolvedSpecifier::Remote("https://example.com/m.js".to_string()),
            )
            .unwrap_err();
        assert!(matches!(err, ManifestError::Unresolvable(_)));
    }

    #[test]
    fn native_plugin_source_forwards_to_global() {
        let cache = ModuleCache::default();
        let loader = ModuleLoader::new(&cache);
        let entry = loader
            .load(
                "math",
                ResolvedSpecifier::NativePlugin("/plugins/math.so".into(), "math".to_string()),
            )
            .unwrap();
        assert_eq!(
            entry.source,
            format!("module.exports = globalThis.{}[\"math\"];", NATIVE_EXPORTS_GLOBAL)
        );
    }

    #[test]
    fn repeated_load_reuses_cache_entry_even_if_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "mod.js", "module.exports = 1;");
        let cache = ModuleCache::default();
        let loader = ModuleLoader::new(&cache);
        let first = loader
            .load("./mod.js", ResolvedSpecifier::File(path.clone(), ExtensionClass::Script))
            .unwrap();
        fs::write(&path, "module.exports = 2;").unwrap();
        let second = loader
            .load("./mod.js", ResolvedSpecifier::File(path, ExtensionClass::Script))
            .unwrap();
        assert_eq!(first.source, second.source);
        cache.clear();
    }
}
