//! Manifest-driven specifier resolution (spec.md §4.2).
//!
//! Resolution is pure given `(manifest, referrer, specifier)`: no I/O is
//! performed here, only string/path manipulation and manifest lookups.

use std::path::{Component, Path, PathBuf};

use crate::dependency::DependencySpec;
use crate::error::{ManifestError, Result};
use crate::manifest::Manifest;
use crate::resolved::{ExtensionClass, ResolvedSpecifier};

/// Scheme prefix for built-in, host-registered modules.
pub const BUILTIN_PREFIX: &str = "gode:";

const MAX_ALIAS_RECURSION: usize = 16;

/// Resolves import specifiers against a [`Manifest`].
///
/// Aliases are sorted by descending key length at construction time so
/// that overlapping aliases (e.g. both `@app` and `@app/sub`) resolve
/// deterministically — the most specific alias wins — regardless of the
/// manifest's own JSON key order (see DESIGN.md for the rationale).
pub struct Resolver<'m> {
    manifest: &'m Manifest,
    aliases: Vec<(String, String)>,
}

impl<'m> Resolver<'m> {
    pub fn new(manifest: &'m Manifest) -> Self {
        let mut aliases: Vec<(String, String)> = manifest
            .gode
            .imports
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Resolver { manifest, aliases }
    }

    pub fn resolve(&self, specifier: &str, referrer: &Path) -> Result<ResolvedSpecifier> {
        self.resolve_inner(specifier, referrer, 0)
    }

    fn resolve_inner(
        &self,
        specifier: &str,
        referrer: &Path,
        depth: usize,
    ) -> Result<ResolvedSpecifier> {
        if depth >= MAX_ALIAS_RECURSION {
            return Err(ManifestError::Unresolvable(format!(
                "alias recursion limit exceeded resolving '{}'",
                specifier
            )));
        }

        // 1 & 2: alias match, exact then prefix, longest-alias-first.
        for (alias, target) in &self.aliases {
            if specifier == alias {
                return self.resolve_inner(target, referrer, depth + 1);
            }
            if let Some(rest) = specifier.strip_prefix(alias.as_str()) {
                if let Some(rest) = rest.strip_prefix('/') {
                    let expanded = format!("{}/{}", target, rest);
                    return self.resolve_inner(&expanded, referrer, depth + 1);
                }
            }
        }

        // 3: built-in prefix.
        if let Some(name) = specifier.strip_prefix(BUILTIN_PREFIX) {
            return Ok(ResolvedSpecifier::Builtin(name.to_string()));
        }

        // 4: manifest dependency by exact name.
        if let Some(spec) = self.manifest.dependencies.get(specifier) {
            return self.resolve_dependency(specifier, spec);
        }

        // 5: path specifier.
        if is_path_specifier(specifier) {
            let resolved = self.resolve_path(specifier, referrer);
            let class = ExtensionClass::of_path(&resolved);
            return Ok(ResolvedSpecifier::File(resolved, class));
        }

        // 6: remote scheme.
        if specifier.starts_with("http://") || specifier.starts_with("https://") {
            return Ok(ResolvedSpecifier::Remote(specifier.to_string()));
        }

        // 7: unresolved.
        Err(ManifestError::Unresolvable(specifier.to_string()))
    }

    fn resolve_dependency(
        &self,
        name: &str,
        spec: &DependencySpec,
    ) -> Result<ResolvedSpecifier> {
        match spec {
            DependencySpec::File(path) => {
                let absolute = self.manifest.root.join(path);
                if DependencySpec::is_native_plugin_path(path) {
                    let canonical_name = std::path::Path::new(path)
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or(name)
                        .to_string();
                    Ok(ResolvedSpecifier::NativePlugin(absolute, canonical_name))
                } else {
                    let class = ExtensionClass::of_path(&absolute);
                    Ok(ResolvedSpecifier::File(absolute, class))
                }
            }
            DependencySpec::Npm(version) => Ok(self.registry_or_node_modules(name, "npm", version)),
            DependencySpec::Registry { registry, rest } => {
                Ok(self.registry_or_node_modules(name, registry, rest))
            }
            DependencySpec::Bare(version) => {
                Ok(self.registry_or_node_modules(name, "npm", version))
            }
        }
    }

    fn registry_or_node_modules(&self, name: &str, registry: &str, version: &str) -> ResolvedSpecifier {
        if let Some(base) = self.manifest.gode.registries.get(registry) {
            let url = format!("{}/packages/{}@{}", base.trim_end_matches('/'), name, version);
            ResolvedSpecifier::Remote(url)
        } else {
            let path = self.manifest.root.join("node_modules").join(name);
            let class = ExtensionClass::of_path(&path);
            ResolvedSpecifier::File(path, class)
        }
    }

    fn resolve_path(&self, specifier: &str, referrer: &Path) -> PathBuf {
        let candidate = if specifier.starts_with('.') {
            let base_dir = referrer.parent().unwrap_or_else(|| Path::new("."));
            base_dir.join(specifier)
        } else {
            PathBuf::from(specifier)
        };
        normalize_path(&candidate)
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || Path::new(specifier).is_absolute()
}

/// Normalize `.`/`..` components without requiring the path to exist.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_imports(imports: &[(&str, &str)]) -> Manifest {
        let mut manifest = Manifest::default_at("/proj");
        manifest.gode.imports = imports
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        manifest
    }

    #[test]
    fn s1_builtin_import() {
        let manifest = Manifest::default_at("/proj");
        let resolver = Resolver::new(&manifest);
        let resolved = resolver
            .resolve("gode:core", Path::new("/proj/index.js"))
            .unwrap();
        assert_eq!(resolved, ResolvedSpecifier::Builtin("core".to_string()));
    }

    #[test]
    fn s2_alias_with_suffix() {
        let manifest = manifest_with_imports(&[("@app", "./src")]);
        let resolver = Resolver::new(&manifest);
        let resolved = resolver
            .resolve("@app/main.js", Path::new("/proj/index.js"))
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedSpecifier::File(PathBuf::from("/proj/src/main.js"), ExtensionClass::Script)
        );
    }

    #[test]
    fn overlapping_aliases_prefer_longest_match() {
        let manifest = manifest_with_imports(&[("@app", "./src"), ("@app/sub", "./other")]);
        let resolver = Resolver::new(&manifest);
        let resolved = resolver
            .resolve("@app/sub/x.js", Path::new("/proj/index.js"))
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedSpecifier::File(PathBuf::from("/proj/other/x.js"), ExtensionClass::Script)
        );
    }

    #[test]
    fn relative_path_resolves_against_referrer_dir() {
        let manifest = Manifest::default_at("/proj");
        let resolver = Resolver::new(&manifest);
        let resolved = resolver
            .resolve("./utils.js", Path::new("/proj/src/index.js"))
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedSpecifier::File(PathBuf::from("/proj/src/utils.js"), ExtensionClass::Script)
        );
    }

    #[test]
    fn remote_url_resolves_to_remote() {
        let manifest = Manifest::default_at("/proj");
        let resolver = Resolver::new(&manifest);
        let resolved = resolver
            .resolve("https://example.com/mod.js", Path::new("/proj/index.js"))
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedSpecifier::Remote("https://example.com/mod.js".to_string())
        );
    }

    #[test]
    fn unresolvable_specifier_errors() {
        let manifest = Manifest::default_at("/proj");
        let resolver = Resolver::new(&manifest);
        let err = resolver
            .resolve("bare-package-name", Path::new("/proj/index.js"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Unresolvable(_)));
    }

    #[test]
    fn resolution_is_pure_and_repeatable() {
        let manifest = manifest_with_imports(&[("@app", "./src")]);
        let resolver = Resolver::new(&manifest);
        let referrer = Path::new("/proj/index.js");
        let a = resolver.resolve("@app/main.js", referrer).unwrap();
        let b = resolver.resolve("@app/main.js", referrer).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn file_dependency_with_shared_object_extension_is_native_plugin() {
        let mut manifest = Manifest::default_at("/proj");
        manifest
            .dependencies
            .insert("math".to_string(), DependencySpec::File("./plugins/math.so".to_string()));
        let resolver = Resolver::new(&manifest);
        let resolved = resolver.resolve("math", Path::new("/proj/index.js")).unwrap();
        assert_eq!(
            resolved,
            ResolvedSpecifier::NativePlugin(PathBuf::from("/proj/plugins/math.so"), "math".to_string())
        );
    }

    #[test]
    fn bare_version_dependency_maps_to_node_modules() {
        let mut manifest = Manifest::default_at("/proj");
        manifest
            .dependencies
            .insert("leftpad".to_string(), DependencySpec::Bare("1.0.0".to_string()));
        let resolver = Resolver::new(&manifest);
        let resolved = resolver.resolve("leftpad", Path::new("/proj/index.js")).unwrap();
        assert_eq!(
            resolved,
            ResolvedSpecifier::File(PathBuf::from("/proj/node_modules/leftpad"), ExtensionClass::Other)
        );
    }

    #[test]
    fn registry_dependency_with_known_registry_resolves_to_remote() {
        let mut manifest = Manifest::default_at("/proj");
        manifest
            .gode
            .registries
            .insert("jsr".to_string(), "https://jsr.io".to_string());
        manifest
            .dependencies
            .insert("pkg".to_string(), DependencySpec::Registry { registry: "jsr".to_string(), rest: "2.0.0".to_string() });
        let resolver = Resolver::new(&manifest);
        let resolved = resolver.resolve("pkg", Path::new("/proj/index.js")).unwrap();
        assert_eq!(
            resolved,
            ResolvedSpecifier::Remote("https://jsr.io/packages/pkg@2.0.0".to_string())
        );
    }
}
